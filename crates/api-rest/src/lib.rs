//! # API REST
//!
//! REST API for the readmission dashboard.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON and workbook responses, CORS, API key on upload)
//!
//! Uses `api-shared` for wire types and `readmit-core` for everything else.

#![warn(rust_2018_idioms)]

mod handlers;
mod state;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use state::{AppState, ExplainHandle};

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::list_patients,
        handlers::kpis,
        handlers::upload,
        handlers::explain,
        handlers::explain_sample,
        handlers::export_patients,
        handlers::patient_report,
    ),
    components(schemas(
        api_shared::HealthRes,
        api_shared::ContributionRes,
        api_shared::PatientRes,
        api_shared::ListPatientsRes,
        api_shared::KpisRes,
        api_shared::ExplainReq,
        api_shared::OutcomeRes,
        api_shared::UploadRes,
    ))
)]
pub struct ApiDoc;

/// Builds the full application router, Swagger UI included.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/patients", get(handlers::list_patients))
        .route("/patients/:id/report", get(handlers::patient_report))
        .route("/kpis", get(handlers::kpis))
        .route(
            "/upload",
            post(handlers::upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/explain", post(handlers::explain))
        .route("/explain/sample", post(handlers::explain_sample))
        .route("/export/patients", get(handlers::export_patients))
        .merge(
            SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests;
