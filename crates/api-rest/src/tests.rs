use super::*;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use rand::rngs::StdRng;
use rand::SeedableRng;
use readmit_core::{
    Cohort, CohortConfig, ExplanationResult, Explainer, NormalizedPatientInput, Probability,
};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Succeeds with probability 0.8 unless the patient id is `bad`.
struct FakeExplainer;

impl Explainer for FakeExplainer {
    type Error = String;

    async fn explain(
        &self,
        input: &NormalizedPatientInput,
    ) -> Result<ExplanationResult, Self::Error> {
        if input.patient_id.as_deref() == Some("bad") {
            return Err("All API endpoints failed for /explain.".into());
        }
        Ok(ExplanationResult::local(
            Probability::new(0.8).unwrap(),
            vec!["Frequent inpatient visits".into()],
            vec![],
        ))
    }
}

fn seeded_state(n: usize) -> AppState {
    let mut cohort = Cohort::default();
    cohort.seed_demo(n, &mut StdRng::seed_from_u64(7));
    AppState::new(cohort, ExplainHandle::new(FakeExplainer), &CohortConfig::default())
}

fn workbook(rows: &[[&str; 2]]) -> Vec<u8> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "patient_id").unwrap();
    sheet.write_string(0, 1, "meds").unwrap();
    for (i, [id, meds]) in rows.iter().enumerate() {
        let row = (i + 1) as u32;
        sheet.write_string(row, 0, *id).unwrap();
        sheet.write_number(row, 1, meds.parse::<f64>().unwrap()).unwrap();
    }
    workbook.save_to_buffer().unwrap()
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let res = app
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = res.status();
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

#[tokio::test]
async fn health_reports_ok() {
    let (status, body) = get_json(router(seeded_state(0)), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn patients_default_to_highest_probability_first() {
    let (status, body) = get_json(router(seeded_state(28)), "/patients").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 28);
    assert_eq!(body["page"], 1);
    assert_eq!(body["page_count"], 2);
    assert_eq!(body["has_prev"], false);
    assert_eq!(body["has_next"], true);

    let probs: Vec<f64> = body["patients"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["readmission_probability"].as_f64().unwrap())
        .collect();
    assert_eq!(probs.len(), 15);
    assert!(probs.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn patients_page_past_end_is_empty() {
    let (status, body) = get_json(router(seeded_state(5)), "/patients?page=9&per_page=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["patients"], json!([]));
    assert_eq!(body["total"], 5);
    assert_eq!(body["has_next"], false);
}

#[tokio::test]
async fn patients_sort_by_id_ascending() {
    let (_, body) = get_json(router(seeded_state(4)), "/patients?sort=id&dir=asc").await;
    let ids: Vec<u64> = body["patients"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![1001, 1002, 1003, 1004]);
}

#[tokio::test]
async fn sort_key_case_is_ignored() {
    let (status, body) = get_json(router(seeded_state(3)), "/patients?sort=ID&dir=ASC").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["patients"][0]["id"], 1001);
}

#[tokio::test]
async fn listed_patients_include_their_inputs() {
    let (_, body) = get_json(router(seeded_state(2)), "/patients").await;
    let first = &body["patients"][0];
    assert!(first["input"].is_object());
    assert!(first.get("name").is_none());
}

#[tokio::test]
async fn unknown_sort_key_is_rejected() {
    let (status, _) = get(router(seeded_state(3)), "/patients?sort=colour").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn kpis_cover_whole_cohort() {
    let (status, body) = get_json(router(seeded_state(12)), "/kpis").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 12);
    assert!(body["high_pct"].as_u64().unwrap() <= 100);
}

#[tokio::test]
async fn report_is_served_as_download() {
    let app = router(seeded_state(2));
    let res = app
        .oneshot(
            Request::get("/patients/1001/report")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"patient_P-1001.json\""
    );
    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let report: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(report["patient_id"], "P-1001");
}

#[tokio::test]
async fn unknown_report_is_not_found() {
    let (status, _) = get(router(seeded_state(2)), "/patients/42/report").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn export_returns_workbook() {
    let (status, body) = get(router(seeded_state(3)), "/export/patients").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..2], b"PK");
}

fn upload_request(uri: &str, bytes: Vec<u8>, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::post(uri);
    if let Some(key) = key {
        builder = builder.header(api_shared::API_KEY_HEADER, key);
    }
    builder.body(Body::from(bytes)).unwrap()
}

#[tokio::test]
async fn upload_ingests_successful_rows() {
    let state = seeded_state(0);
    let app = router(state.clone());
    let bytes = workbook(&[["p1", "4"], ["bad", "2"], ["p3", "9"]]);

    let res = app
        .oneshot(upload_request("/upload?filename=batch.xlsx", bytes, None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value =
        serde_json::from_slice(&to_bytes(res.into_body(), usize::MAX).await.unwrap()).unwrap();

    assert_eq!(body["succeeded"], 2);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["ingested"], 2);
    assert_eq!(body["outcomes"][1]["index"], 2);
    assert_eq!(
        body["outcomes"][1]["error"],
        "All API endpoints failed for /explain."
    );
    assert_eq!(state.cohort().read().await.len(), 2);
}

#[tokio::test]
async fn upload_can_return_results_workbook() {
    let app = router(seeded_state(0));
    let res = app
        .oneshot(upload_request(
            "/upload?format=xlsx",
            workbook(&[["p1", "1"]]),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"readmission_predictions.xlsx\""
    );
}

#[tokio::test]
async fn unreadable_upload_is_bad_request() {
    let app = router(seeded_state(0));
    let res = app
        .oneshot(upload_request("/upload", b"not a workbook".to_vec(), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wrong_extension_is_bad_request() {
    let app = router(seeded_state(0));
    let res = app
        .oneshot(upload_request(
            "/upload?filename=batch.csv",
            workbook(&[["p1", "1"]]),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_requires_configured_key() {
    let state = seeded_state(0).with_api_key(Some("s3cret".into()));

    let res = router(state.clone())
        .oneshot(upload_request("/upload", workbook(&[["p1", "1"]]), None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = router(state.clone())
        .oneshot(upload_request(
            "/upload",
            workbook(&[["p1", "1"]]),
            Some("s3cret"),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

fn explain_request(body: Value) -> Request<Body> {
    Request::post("/explain")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn manual_explain_adds_patient() {
    let state = seeded_state(0);
    let res = router(state.clone())
        .oneshot(explain_request(json!({"n_medications": 14})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value =
        serde_json::from_slice(&to_bytes(res.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body["risk_label"], "High risk");

    let cohort = state.cohort().read().await;
    assert_eq!(cohort.len(), 1);
    assert_eq!(cohort.records()[0].patient_id, "U-1001");
}

#[tokio::test]
async fn manual_explain_failure_is_bad_gateway() {
    let state = seeded_state(0);
    let res = router(state.clone())
        .oneshot(explain_request(json!({"patient_id": "bad"})))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert!(state.cohort().read().await.is_empty());
}

fn sample_request() -> Request<Body> {
    Request::post("/explain/sample").body(Body::empty()).unwrap()
}

#[tokio::test]
async fn sample_explain_uses_builtin_patient() {
    let state = seeded_state(0);
    let res = router(state.clone()).oneshot(sample_request()).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let cohort = state.cohort().read().await;
    assert_eq!(cohort.len(), 1);
    assert_eq!(cohort.records()[0].age.as_deref(), Some("[50-60)"));
    assert_eq!(cohort.records()[0].input_features["n_medications"], json!(79));
}

#[tokio::test]
async fn sample_explain_picks_from_configured_samples() {
    let samples = vec![NormalizedPatientInput {
        patient_id: Some("S-1".into()),
        n_medications: 3,
        ..Default::default()
    }];
    let state = seeded_state(0).with_samples(samples);
    let res = router(state.clone()).oneshot(sample_request()).await.unwrap();
    let body: Value =
        serde_json::from_slice(&to_bytes(res.into_body(), usize::MAX).await.unwrap()).unwrap();
    assert_eq!(body["patient_id"], "S-1");
    assert_eq!(state.cohort().read().await.records()[0].patient_id, "S-1");

    let state = seeded_state(0).with_samples(vec![NormalizedPatientInput {
        patient_id: Some("bad".into()),
        ..Default::default()
    }]);
    let res = router(state.clone()).oneshot(sample_request()).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert!(state.cohort().read().await.is_empty());
}
