//! Wire types for the REST surface.
//!
//! Core types stay free of OpenAPI concerns; these mirror them with `ToSchema` derives and
//! convert from the core values.

use readmit_core::{
    BatchOutcome, Contribution, Kpis, NormalizedPatientInput, PatientRecord, VisibleSlice,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ContributionRes {
    pub feature: String,
    pub shap_value: f64,
}

impl From<&Contribution> for ContributionRes {
    fn from(c: &Contribution) -> Self {
        Self {
            feature: c.feature.clone(),
            shap_value: c.shap_value,
        }
    }
}

/// One row of the cohort table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PatientRes {
    pub id: u64,
    pub patient_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub age: Option<String>,
    pub medical_specialty: Option<String>,
    pub readmission_probability: f64,
    /// `Low risk`, `Medium risk` or `High risk`.
    pub risk_label: String,
    pub reasons: Vec<String>,
    pub top_contributions: Vec<ContributionRes>,
    /// The model inputs the prediction was made from.
    #[schema(value_type = Object)]
    pub input: Map<String, Value>,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

impl From<&PatientRecord> for PatientRes {
    fn from(r: &PatientRecord) -> Self {
        Self {
            id: r.id,
            patient_id: r.patient_id.clone(),
            name: r.name.clone(),
            age: r.age.clone(),
            medical_specialty: r.medical_specialty.clone(),
            readmission_probability: r.readmission_probability.value(),
            risk_label: r.risk_label.to_string(),
            reasons: r.reasons.clone(),
            top_contributions: r.top_contributions.iter().map(Into::into).collect(),
            input: r.input_features.clone(),
            created_at: r.created_at.to_rfc3339(),
        }
    }
}

/// Table view parameters. Omitted filters match everything.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListPatientsQuery {
    /// Case-insensitive substring of the patient id.
    pub query: Option<String>,
    /// Exact specialty.
    pub specialty: Option<String>,
    /// Exact age bucket, e.g. `[60-70)`.
    pub age: Option<String>,
    /// `readmission_probability` (default), `created_at`, `id`, `patient_id`, `age` or
    /// `medical_specialty`.
    pub sort: Option<String>,
    /// `asc` or `desc` (default).
    pub dir: Option<String>,
    /// 1-based page number.
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ListPatientsRes {
    pub patients: Vec<PatientRes>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub page_count: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

impl From<VisibleSlice<'_>> for ListPatientsRes {
    fn from(slice: VisibleSlice<'_>) -> Self {
        Self {
            patients: slice.rows.iter().map(|r| PatientRes::from(*r)).collect(),
            total: slice.total,
            page: slice.page,
            page_size: slice.page_size,
            page_count: slice.page_count,
            has_prev: slice.has_prev,
            has_next: slice.has_next,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct KpisRes {
    pub total: usize,
    /// Whole percent of high-risk patients.
    pub high_pct: u32,
    pub avg_prob: f64,
}

impl From<Kpis> for KpisRes {
    fn from(k: Kpis) -> Self {
        Self {
            total: k.total,
            high_pct: k.high_pct,
            avg_prob: k.avg_prob,
        }
    }
}

/// A single patient submitted by hand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExplainReq {
    pub patient_id: Option<String>,
    pub age: Option<String>,
    pub medical_specialty: Option<String>,
    pub n_outpatient: Option<i64>,
    pub n_inpatient: Option<i64>,
    pub n_emergency: Option<i64>,
    pub n_procedures: Option<i64>,
    pub n_lab_procedures: Option<i64>,
    pub n_medications: Option<i64>,
    /// Days; missing, zero or negative is sent as 1.
    pub time_in_hospital: Option<i64>,
    pub diag_1: Option<String>,
    pub diag_2: Option<String>,
    pub diag_3: Option<String>,
    pub glucose_test: Option<String>,
    #[serde(rename = "A1Ctest")]
    pub a1c_test: Option<String>,
    pub change: Option<String>,
    pub diabetes_med: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl From<ExplainReq> for NormalizedPatientInput {
    fn from(req: ExplainReq) -> Self {
        let defaults = NormalizedPatientInput::default();
        Self {
            patient_id: non_blank(req.patient_id),
            age: non_blank(req.age),
            medical_specialty: non_blank(req.medical_specialty),
            n_outpatient: req.n_outpatient.unwrap_or(0),
            n_inpatient: req.n_inpatient.unwrap_or(0),
            n_emergency: req.n_emergency.unwrap_or(0),
            n_procedures: req.n_procedures.unwrap_or(0),
            n_lab_procedures: req.n_lab_procedures.unwrap_or(0),
            n_medications: req.n_medications.unwrap_or(0),
            time_in_hospital: req
                .time_in_hospital
                .filter(|days| *days > 0)
                .unwrap_or(defaults.time_in_hospital),
            diag_1: non_blank(req.diag_1),
            diag_2: non_blank(req.diag_2),
            diag_3: non_blank(req.diag_3),
            glucose_test: non_blank(req.glucose_test),
            a1c_test: non_blank(req.a1c_test),
            change: non_blank(req.change),
            diabetes_med: non_blank(req.diabetes_med),
        }
    }
}

/// Outcome for one submitted row. Exactly one of `risk_label` or `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OutcomeRes {
    /// 1-based row position in the upload.
    pub index: usize,
    pub patient_id: Option<String>,
    pub readmission_probability: Option<f64>,
    pub risk_label: Option<String>,
    pub reasons: Vec<String>,
    pub top_contributions: Vec<ContributionRes>,
    pub error: Option<String>,
}

impl From<&BatchOutcome> for OutcomeRes {
    fn from(o: &BatchOutcome) -> Self {
        let explanation = o.explanation();
        Self {
            index: o.index,
            patient_id: o.input.patient_id.clone(),
            readmission_probability: explanation.map(|e| e.readmission_probability.value()),
            risk_label: explanation.map(|e| e.risk_label.to_string()),
            reasons: explanation.map(|e| e.reasons.clone()).unwrap_or_default(),
            top_contributions: explanation
                .map(|e| e.top_contributions.iter().map(Into::into).collect())
                .unwrap_or_default(),
            error: o.error().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UploadRes {
    pub succeeded: usize,
    pub failed: usize,
    /// Records added to the cohort.
    pub ingested: usize,
    pub outcomes: Vec<OutcomeRes>,
}

impl UploadRes {
    pub fn new(outcomes: &[BatchOutcome], ingested: usize) -> Self {
        let failed = outcomes.iter().filter(|o| o.is_error()).count();
        Self {
            succeeded: outcomes.len() - failed,
            failed,
            ingested,
            outcomes: outcomes.iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use readmit_core::{ExplanationResult, Probability};
    use serde_json::json;

    #[test]
    fn explain_req_fills_defaults() {
        let req: ExplainReq = serde_json::from_str(
            r#"{"patient_id":" ","n_medications":12,"time_in_hospital":0,"A1Ctest":">8"}"#,
        )
        .unwrap();
        let input = NormalizedPatientInput::from(req);
        assert_eq!(input.patient_id, None);
        assert_eq!(input.n_medications, 12);
        assert_eq!(input.time_in_hospital, 1);
        assert_eq!(input.a1c_test.as_deref(), Some(">8"));
        assert_eq!(input.n_inpatient, 0);

        let req: ExplainReq = serde_json::from_str(r#"{"time_in_hospital":-4}"#).unwrap();
        assert_eq!(NormalizedPatientInput::from(req).time_in_hospital, 1);
    }

    #[test]
    fn patient_res_carries_name_and_inputs() {
        let input = NormalizedPatientInput {
            patient_id: Some("P7".into()),
            n_medications: 14,
            ..Default::default()
        };
        let mut record = PatientRecord::with_local_label(
            1001,
            "P7".into(),
            None,
            None,
            Probability::new(0.2).unwrap(),
            vec![],
            vec![],
            input.to_feature_map(),
            chrono::Utc::now(),
        );

        let body = serde_json::to_value(PatientRes::from(&record)).unwrap();
        assert!(body.get("name").is_none());
        assert_eq!(body["input"]["n_medications"], json!(14));

        record.name = Some("Ada Lovelace".into());
        let body = serde_json::to_value(PatientRes::from(&record)).unwrap();
        assert_eq!(body["name"], json!("Ada Lovelace"));
    }

    #[test]
    fn upload_res_counts_outcomes() {
        let input = NormalizedPatientInput {
            patient_id: Some("P1".into()),
            ..Default::default()
        };
        let outcomes = vec![
            BatchOutcome::explained(
                1,
                input.clone(),
                ExplanationResult::local(Probability::new(0.7).unwrap(), vec!["x".into()], vec![]),
            ),
            BatchOutcome::failed(2, input, "All API endpoints failed for /explain.".into()),
        ];

        let res = UploadRes::new(&outcomes, 1);
        assert_eq!((res.succeeded, res.failed, res.ingested), (1, 1, 1));
        assert_eq!(res.outcomes[0].risk_label.as_deref(), Some("High risk"));
        assert_eq!(res.outcomes[0].error, None);
        assert_eq!(res.outcomes[1].risk_label, None);
        assert!(res.outcomes[1].error.is_some());
    }
}
