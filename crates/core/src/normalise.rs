//! Mapping of free-form spreadsheet rows onto the fixed input schema of the prediction
//! backend.
//!
//! Uploaded workbooks use whatever column names their authors chose. Each canonical field has
//! an ordered list of accepted header names; the first one present (case-insensitively) with
//! a non-blank value wins. Missing or unusable values are replaced with defaults and never
//! reported as errors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A parsed spreadsheet row: header name to cell value, with blanks as `Value::Null`.
pub type RawRow = Map<String, Value>;

/// Ordered header names accepted for one canonical field.
#[derive(Debug, Clone, Copy)]
pub struct FieldCandidates {
    pub field: &'static str,
    pub keys: &'static [&'static str],
}

pub const PATIENT_ID: FieldCandidates = FieldCandidates {
    field: "patient_id",
    keys: &["patient_id", "patientid", "id"],
};
pub const AGE: FieldCandidates = FieldCandidates {
    field: "age",
    keys: &["age"],
};
pub const MEDICAL_SPECIALTY: FieldCandidates = FieldCandidates {
    field: "medical_specialty",
    keys: &["medical_specialty", "specialty", "speciality"],
};
pub const N_OUTPATIENT: FieldCandidates = FieldCandidates {
    field: "n_outpatient",
    keys: &["n_outpatient", "outpatient_visits", "n_out"],
};
pub const N_INPATIENT: FieldCandidates = FieldCandidates {
    field: "n_inpatient",
    keys: &["n_inpatient", "inpatient_visits", "n_in"],
};
pub const N_EMERGENCY: FieldCandidates = FieldCandidates {
    field: "n_emergency",
    keys: &["n_emergency", "emergency_visits", "n_er"],
};
pub const N_PROCEDURES: FieldCandidates = FieldCandidates {
    field: "n_procedures",
    keys: &["n_procedures", "procedures"],
};
pub const N_LAB_PROCEDURES: FieldCandidates = FieldCandidates {
    field: "n_lab_procedures",
    keys: &["n_lab_procedures", "lab_procedures", "labs"],
};
pub const N_MEDICATIONS: FieldCandidates = FieldCandidates {
    field: "n_medications",
    keys: &["n_medications", "medications", "meds"],
};
pub const TIME_IN_HOSPITAL: FieldCandidates = FieldCandidates {
    field: "time_in_hospital",
    keys: &["time_in_hospital", "length_of_stay", "los"],
};
pub const DIAG_1: FieldCandidates = FieldCandidates {
    field: "diag_1",
    keys: &["diag_1", "diagnosis_1", "primary_diag"],
};
pub const DIAG_2: FieldCandidates = FieldCandidates {
    field: "diag_2",
    keys: &["diag_2", "diagnosis_2", "secondary_diag"],
};
pub const DIAG_3: FieldCandidates = FieldCandidates {
    field: "diag_3",
    keys: &["diag_3", "diagnosis_3", "tertiary_diag"],
};
pub const GLUCOSE_TEST: FieldCandidates = FieldCandidates {
    field: "glucose_test",
    keys: &["glucose_test", "glucose"],
};
pub const A1C_TEST: FieldCandidates = FieldCandidates {
    field: "A1Ctest",
    keys: &["A1Ctest", "a1c_test", "a1c"],
};
pub const CHANGE: FieldCandidates = FieldCandidates {
    field: "change",
    keys: &["change"],
};
pub const DIABETES_MED: FieldCandidates = FieldCandidates {
    field: "diabetes_med",
    keys: &["diabetes_med", "diabetesmed"],
};

/// Length of stay is never zero; a stay shorter than a day still counts as one.
const DEFAULT_TIME_IN_HOSPITAL: i64 = 1;

/// The canonical record posted to the explanation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPatientInput {
    #[serde(default)]
    pub patient_id: Option<String>,
    #[serde(default)]
    pub age: Option<String>,
    #[serde(default)]
    pub medical_specialty: Option<String>,
    #[serde(default)]
    pub n_outpatient: i64,
    #[serde(default)]
    pub n_inpatient: i64,
    #[serde(default)]
    pub n_emergency: i64,
    #[serde(default)]
    pub n_procedures: i64,
    #[serde(default)]
    pub n_lab_procedures: i64,
    #[serde(default)]
    pub n_medications: i64,
    #[serde(default = "default_time_in_hospital")]
    pub time_in_hospital: i64,
    #[serde(default)]
    pub diag_1: Option<String>,
    #[serde(default)]
    pub diag_2: Option<String>,
    #[serde(default)]
    pub diag_3: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glucose_test: Option<String>,
    #[serde(default, rename = "A1Ctest", skip_serializing_if = "Option::is_none")]
    pub a1c_test: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diabetes_med: Option<String>,
}

fn default_time_in_hospital() -> i64 {
    DEFAULT_TIME_IN_HOSPITAL
}

impl Default for NormalizedPatientInput {
    fn default() -> Self {
        Self {
            patient_id: None,
            age: None,
            medical_specialty: None,
            n_outpatient: 0,
            n_inpatient: 0,
            n_emergency: 0,
            n_procedures: 0,
            n_lab_procedures: 0,
            n_medications: 0,
            time_in_hospital: DEFAULT_TIME_IN_HOSPITAL,
            diag_1: None,
            diag_2: None,
            diag_3: None,
            glucose_test: None,
            a1c_test: None,
            change: None,
            diabetes_med: None,
        }
    }
}

impl NormalizedPatientInput {
    /// The input as a JSON object, as kept on records for audit and export.
    pub fn to_feature_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Finds the first candidate key present in `row` with a usable value.
///
/// Keys are compared case-insensitively after trimming. Nulls and blank strings are skipped
/// so that a later candidate can still supply the value.
pub fn lookup<'a>(row: &'a RawRow, candidates: &FieldCandidates) -> Option<&'a Value> {
    candidates.keys.iter().find_map(|candidate| {
        row.iter()
            .filter(|(key, _)| key.trim().eq_ignore_ascii_case(candidate))
            .map(|(_, value)| value)
            .find(|value| !is_blank(value))
    })
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn categorical(row: &RawRow, candidates: &FieldCandidates) -> Option<String> {
    match lookup(row, candidates)? {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => format!("{}", f as i64),
            _ => n.to_string(),
        }),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn numeric(row: &RawRow, candidates: &FieldCandidates) -> Option<i64> {
    let value = match lookup(row, candidates)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;

    if value.is_finite() {
        Some(value.round() as i64)
    } else {
        None
    }
}

/// Normalises one raw row. Never fails: absent or non-numeric counts become 0, length of stay
/// becomes 1, and absent categorical fields become `None`.
pub fn normalise_row(row: &RawRow) -> NormalizedPatientInput {
    NormalizedPatientInput {
        patient_id: categorical(row, &PATIENT_ID),
        age: categorical(row, &AGE),
        medical_specialty: categorical(row, &MEDICAL_SPECIALTY),
        n_outpatient: numeric(row, &N_OUTPATIENT).unwrap_or(0),
        n_inpatient: numeric(row, &N_INPATIENT).unwrap_or(0),
        n_emergency: numeric(row, &N_EMERGENCY).unwrap_or(0),
        n_procedures: numeric(row, &N_PROCEDURES).unwrap_or(0),
        n_lab_procedures: numeric(row, &N_LAB_PROCEDURES).unwrap_or(0),
        n_medications: numeric(row, &N_MEDICATIONS).unwrap_or(0),
        time_in_hospital: numeric(row, &TIME_IN_HOSPITAL)
            .filter(|days| *days > 0)
            .unwrap_or(DEFAULT_TIME_IN_HOSPITAL),
        diag_1: categorical(row, &DIAG_1),
        diag_2: categorical(row, &DIAG_2),
        diag_3: categorical(row, &DIAG_3),
        glucose_test: categorical(row, &GLUCOSE_TEST),
        a1c_test: categorical(row, &A1C_TEST),
        change: categorical(row, &CHANGE),
        diabetes_med: categorical(row, &DIABETES_MED),
    }
}
