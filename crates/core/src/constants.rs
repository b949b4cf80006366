//! Constants used throughout the readmit core crate.
//!
//! Endpoint defaults, cohort sizing and spreadsheet layout live here so that the
//! binaries and the REST layer agree on them.

/// Default prediction backend used when no usable override is configured.
pub const DEFAULT_API_BASE: &str =
    "https://hospital-readmission-backend-api-e5fsevbxggfhdxbr.southindia-01.azurewebsites.net";

/// Fallback backends tried, in order, after the primary endpoint.
pub const DEFAULT_FALLBACK_APIS: [&str; 3] = [
    "https://hospital-readmission-backend-api-e5fsevbxggfhdxbr.southindia-01.azurewebsites.net",
    "http://127.0.0.1:8000",
    "http://localhost:8000",
];

/// Hosts that serve the static frontend and never the prediction API.
pub const STATIC_SITE_HOST_MARKER: &str = "azurestaticapps.net";

/// Path of the explanation endpoint relative to a backend base URL.
pub const EXPLAIN_PATH: &str = "/explain";

/// Path of the health endpoint relative to a backend base URL.
pub const HEALTH_PATH: &str = "/health";

/// Default per-attempt request timeout, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Size of the synthetic cohort seeded at startup.
pub const DEFAULT_COHORT_SIZE: usize = 28;

/// Upper bound on records held in memory; oldest records are dropped first.
pub const MAX_COHORT_SIZE: usize = 5_000;

/// Rows per page when no page size is requested.
pub const DEFAULT_PAGE_SIZE: usize = 15;

/// Value the id generator starts counting from (the first id handed out is one higher).
pub const ID_COUNTER_START: u64 = 1_000;

/// Worksheet name used when exporting batch results.
pub const RESULTS_SHEET_NAME: &str = "Predictions";

/// Worksheet name used when exporting the cohort list.
pub const COHORT_SHEET_NAME: &str = "patients";

/// Default file name for an exported results workbook.
pub const RESULTS_EXPORT_FILENAME: &str = "readmission_predictions.xlsx";

/// Default file name for an exported cohort workbook.
pub const COHORT_EXPORT_FILENAME: &str = "patients_export.xlsx";

/// File extensions accepted for upload.
pub const ACCEPTED_UPLOAD_EXTENSIONS: [&str; 2] = [".xls", ".xlsx"];
