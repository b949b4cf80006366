//! # Readmit Core
//!
//! Core logic for the readmission risk dashboard.
//!
//! This crate contains pure data operations and workbook handling:
//! - Patient risk records and the in-memory cohort table engine (filter, sort, paginate, KPIs)
//! - Normalisation of uploaded spreadsheet rows onto the prediction backend's input schema
//! - The bulk prediction pipeline, generic over an [`batch::Explainer`]
//! - Workbook import/export and the single-patient JSON report
//!
//! **No transport concerns**: the HTTP client with host fallback lives in `readmit-explain`, and
//! the REST surface in `api-rest`.

pub mod batch;
pub mod cohort;
pub mod config;
pub mod constants;
pub mod demo;
pub mod error;
pub mod ids;
pub mod normalise;
pub mod patient;
pub mod report;
pub mod sample;
pub mod spreadsheet;

pub use batch::{
    run_batch, run_upload, BatchOutcome, BatchProgress, BatchState, Explainer, OutcomeResult,
};
pub use cohort::{
    compute_kpis, visible_slice, Cohort, Kpis, SortDirection, SortKey, ViewState, VisibleSlice,
};
pub use config::{CohortConfig, ExplainConfig};
pub use error::{CoreError, CoreResult, ExportError, ParseError};
pub use ids::IdGenerator;
pub use normalise::{normalise_row, NormalizedPatientInput, RawRow};
pub use patient::{Contribution, ExplanationResult, PatientRecord};
pub use readmit_types::{Probability, RiskLabel};
pub use report::PatientReport;
pub use sample::{builtin_samples, pick_sample, samples_from_json};
pub use spreadsheet::{export_cohort, export_results, parse_spreadsheet, validate_upload_name};
