use api_shared::{
    validate_api_key, ExplainReq, HealthRes, HealthService, KpisRes, ListPatientsQuery,
    ListPatientsRes, OutcomeRes, UploadRes, API_KEY_HEADER,
};
use axum::{
    body::Bytes,
    extract::{Path as AxumPath, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use readmit_core::constants::{COHORT_EXPORT_FILENAME, RESULTS_EXPORT_FILENAME};
use readmit_core::{
    export_cohort, export_results, pick_sample, run_upload, validate_upload_name, BatchOutcome,
    BatchState, Explainer, NormalizedPatientInput, PatientReport, SortDirection, SortKey,
    ViewState,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::state::AppState;

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

type HandlerError = (StatusCode, &'static str);

fn attachment(content_type: &str, file_name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Answers in the same shape as the prediction backend's health route.
#[axum::debug_handler]
pub(crate) async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/patients",
    params(ListPatientsQuery),
    responses(
        (status = 200, description = "One page of the cohort table", body = ListPatientsRes),
        (status = 400, description = "Unknown sort key or direction")
    )
)]
/// One filtered, sorted page of the cohort
///
/// Filters and sorting are applied to a snapshot of the whole cohort; the stored order is
/// never changed. Without `sort` the table is ordered by probability, highest first.
///
/// # Errors
/// Returns `400 Bad Request` if `sort` or `dir` is not recognised.
#[axum::debug_handler]
pub(crate) async fn list_patients(
    State(state): State<AppState>,
    Query(q): Query<ListPatientsQuery>,
) -> Result<Json<ListPatientsRes>, HandlerError> {
    let mut view = ViewState::new(q.per_page.unwrap_or(state.default_page_size));
    view.set_filter(
        q.query.unwrap_or_default(),
        q.specialty.unwrap_or_default(),
        q.age.unwrap_or_default(),
    );

    if q.sort.is_some() || q.dir.is_some() {
        let key = match q.sort.as_deref() {
            Some(s) => s.parse::<SortKey>().map_err(|e| {
                tracing::error!("List patients error: {}", e);
                (StatusCode::BAD_REQUEST, "Unknown sort key")
            })?,
            None => view.sort_key(),
        };
        let direction = match q.dir.as_deref() {
            Some(d) => d.parse::<SortDirection>().map_err(|e| {
                tracing::error!("List patients error: {}", e);
                (StatusCode::BAD_REQUEST, "Unknown sort direction")
            })?,
            None => view.sort_direction(),
        };
        view.set_sort(key, direction);
    }
    view.set_page(q.page.unwrap_or(1));

    let cohort = state.cohort.read().await;
    Ok(Json(ListPatientsRes::from(cohort.view(&view))))
}

#[utoipa::path(
    get,
    path = "/kpis",
    responses(
        (status = 200, description = "KPIs over the full cohort", body = KpisRes)
    )
)]
#[axum::debug_handler]
pub(crate) async fn kpis(State(state): State<AppState>) -> Json<KpisRes> {
    Json(state.cohort.read().await.kpis().into())
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct UploadQuery {
    /// Original file name; when given it must end in `.xls` or `.xlsx`.
    filename: Option<String>,
    /// `xlsx` to receive the results workbook instead of JSON.
    format: Option<String>,
}

fn log_batch_state(state: &BatchState) {
    match state {
        BatchState::Submitting { completed, total } => {
            tracing::debug!("upload progress {}/{}", completed, total)
        }
        other => tracing::debug!("upload state {:?}", other),
    }
}

#[utoipa::path(
    post,
    path = "/upload",
    params(UploadQuery),
    request_body(content = Vec<u8>, description = "Raw .xls or .xlsx workbook", content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Per-row outcomes; successes are added to the cohort", body = UploadRes),
        (status = 400, description = "Unreadable or empty workbook"),
        (status = 401, description = "Missing or invalid API key"),
        (status = 500, description = "Internal server error")
    )
)]
/// Run the bulk prediction pipeline over an uploaded workbook
///
/// Rows are submitted one at a time in sheet order. A row that fails on every host is
/// reported with its error and does not stop the rest of the upload.
///
/// # Errors
/// Returns `401 Unauthorized` if an API key is configured and the request does not carry it,
/// and `400 Bad Request` if the workbook cannot be read or has no data rows.
#[axum::debug_handler]
pub(crate) async fn upload(
    State(state): State<AppState>,
    Query(q): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, HandlerError> {
    let provided = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    if let Err(e) = validate_api_key(state.api_key.as_deref(), provided) {
        tracing::warn!("Upload rejected: {}", e);
        return Err((StatusCode::UNAUTHORIZED, "Missing or invalid API key"));
    }

    if let Some(name) = q.filename.as_deref() {
        validate_upload_name(name).map_err(|e| {
            tracing::error!("Upload error: {}", e);
            (StatusCode::BAD_REQUEST, "Unsupported file type")
        })?;
    }

    let outcomes = run_upload(&state.explainer, &body, |s| log_batch_state(&s))
        .await
        .map_err(|e| {
            tracing::error!("Upload error: {}", e);
            (StatusCode::BAD_REQUEST, "Could not read spreadsheet")
        })?;

    let ingested = state
        .cohort
        .write()
        .await
        .ingest_outcomes(&outcomes, Utc::now());
    tracing::info!("Upload ingested {} of {} rows", ingested, outcomes.len());

    if q.format.as_deref() == Some("xlsx") {
        let bytes = export_results(&outcomes).map_err(|e| {
            tracing::error!("Results export error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        })?;
        return Ok(attachment(XLSX_CONTENT_TYPE, RESULTS_EXPORT_FILENAME, bytes));
    }

    Ok(Json(UploadRes::new(&outcomes, ingested)).into_response())
}

#[utoipa::path(
    post,
    path = "/explain",
    request_body = ExplainReq,
    responses(
        (status = 200, description = "Explanation; the patient is added to the cohort", body = OutcomeRes),
        (status = 502, description = "Every prediction host failed")
    )
)]
/// Submit a single patient for prediction
///
/// # Errors
/// Returns `502 Bad Gateway` if no prediction host produced an explanation.
#[axum::debug_handler]
pub(crate) async fn explain(
    State(state): State<AppState>,
    Json(req): Json<ExplainReq>,
) -> Result<Json<OutcomeRes>, HandlerError> {
    explain_and_ingest(&state, NormalizedPatientInput::from(req)).await
}

#[utoipa::path(
    post,
    path = "/explain/sample",
    responses(
        (status = 200, description = "Explanation of a random sample patient; the patient is added to the cohort", body = OutcomeRes),
        (status = 502, description = "Every prediction host failed")
    )
)]
/// Submit a patient picked at random from the sample set
///
/// # Errors
/// Returns `502 Bad Gateway` if no prediction host produced an explanation.
#[axum::debug_handler]
pub(crate) async fn explain_sample(
    State(state): State<AppState>,
) -> Result<Json<OutcomeRes>, HandlerError> {
    let input = pick_sample(&state.samples, &mut rand::thread_rng());
    explain_and_ingest(&state, input).await
}

async fn explain_and_ingest(
    state: &AppState,
    input: NormalizedPatientInput,
) -> Result<Json<OutcomeRes>, HandlerError> {
    match state.explainer.explain(&input).await {
        Ok(explanation) => {
            let outcome = BatchOutcome::explained(1, input, explanation);
            state
                .cohort
                .write()
                .await
                .ingest_outcomes(std::slice::from_ref(&outcome), Utc::now());
            Ok(Json(OutcomeRes::from(&outcome)))
        }
        Err(e) => {
            tracing::error!("Explain error: {}", e);
            Err((StatusCode::BAD_GATEWAY, "All API endpoints failed for /explain."))
        }
    }
}

#[utoipa::path(
    get,
    path = "/export/patients",
    responses(
        (status = 200, description = "Cohort workbook", content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
pub(crate) async fn export_patients(State(state): State<AppState>) -> Result<Response, HandlerError> {
    let cohort = state.cohort.read().await;
    match export_cohort(cohort.records()) {
        Ok(bytes) => Ok(attachment(XLSX_CONTENT_TYPE, COHORT_EXPORT_FILENAME, bytes)),
        Err(e) => {
            tracing::error!("Cohort export error: {}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Internal error"))
        }
    }
}

#[utoipa::path(
    get,
    path = "/patients/{id}/report",
    params(("id" = u64, Path, description = "Cohort row id")),
    responses(
        (status = 200, description = "Patient report JSON", content_type = "application/json"),
        (status = 404, description = "No such patient"),
        (status = 500, description = "Internal server error")
    )
)]
/// Download the JSON report for one cohort row
///
/// # Errors
/// Returns `404 Not Found` if the id is not in the cohort.
#[axum::debug_handler]
pub(crate) async fn patient_report(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<u64>,
) -> Result<Response, HandlerError> {
    let report = {
        let cohort = state.cohort.read().await;
        match cohort.find(id) {
            Some(record) => PatientReport::from(record),
            None => return Err((StatusCode::NOT_FOUND, "Patient not found")),
        }
    };

    match report.to_json_bytes() {
        Ok(bytes) => Ok(attachment("application/json", &report.file_name(), bytes)),
        Err(e) => {
            tracing::error!("Patient report error: {:?}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, "Internal error"))
        }
    }
}
