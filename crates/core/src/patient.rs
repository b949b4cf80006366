//! Patient risk records and the explanation payload they are built from.

use chrono::{DateTime, Utc};
use readmit_types::{Probability, RiskLabel};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::normalise::NormalizedPatientInput;

/// A single signed feature contribution from the explanation service.
///
/// Positive values push towards readmission, negative values away from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub feature: String,
    pub shap_value: f64,
}

impl Contribution {
    pub fn new(feature: impl Into<String>, shap_value: f64) -> Self {
        Self {
            feature: feature.into(),
            shap_value,
        }
    }
}

/// Body returned by `POST {base}/explain`.
///
/// The four required fields are what the dashboard relies on; the optional ones are kept when
/// the backend sends them so exports and reports do not lose information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationResult {
    pub readmission_probability: Probability,
    pub risk_label: RiskLabel,
    pub reasons: Vec<String>,
    pub top_contributions: Vec<Contribution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicted_class: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_positive_contributions: Vec<Contribution>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_negative_contributions: Vec<Contribution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_contributions_count: Option<usize>,
}

impl ExplanationResult {
    /// Builds a minimal result with the label derived locally from `probability`.
    pub fn local(
        probability: Probability,
        reasons: Vec<String>,
        top_contributions: Vec<Contribution>,
    ) -> Self {
        Self {
            readmission_probability: probability,
            risk_label: probability.risk_label(),
            reasons,
            top_contributions,
            predicted_class: None,
            threshold: None,
            base_value: None,
            explanation_summary: None,
            top_positive_contributions: Vec::new(),
            top_negative_contributions: Vec::new(),
            all_contributions_count: None,
        }
    }
}

/// One row of the cohort table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: u64,
    pub patient_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub age: Option<String>,
    pub medical_specialty: Option<String>,
    pub readmission_probability: Probability,
    pub risk_label: RiskLabel,
    pub reasons: Vec<String>,
    pub top_contributions: Vec<Contribution>,
    #[serde(rename = "input")]
    pub input_features: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl PatientRecord {
    /// Builds a record whose label is derived from `probability`, keeping the two consistent.
    #[allow(clippy::too_many_arguments)]
    pub fn with_local_label(
        id: u64,
        patient_id: String,
        age: Option<String>,
        medical_specialty: Option<String>,
        probability: Probability,
        reasons: Vec<String>,
        top_contributions: Vec<Contribution>,
        input_features: Map<String, Value>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            patient_id,
            name: None,
            age,
            medical_specialty,
            readmission_probability: probability,
            risk_label: probability.risk_label(),
            reasons,
            top_contributions,
            input_features,
            created_at,
        }
    }

    /// Builds a record from a remote explanation.
    ///
    /// The remote risk label is trusted as-is. When the input carries no patient id one is
    /// synthesised as `U-{id}`.
    pub fn from_explanation(
        id: u64,
        input: &NormalizedPatientInput,
        explanation: &ExplanationResult,
        created_at: DateTime<Utc>,
    ) -> Self {
        let patient_id = input
            .patient_id
            .clone()
            .unwrap_or_else(|| format!("U-{id}"));

        Self {
            id,
            patient_id,
            name: None,
            age: input.age.clone(),
            medical_specialty: input.medical_specialty.clone(),
            readmission_probability: explanation.readmission_probability,
            risk_label: explanation.risk_label,
            reasons: explanation.reasons.clone(),
            top_contributions: explanation.top_contributions.clone(),
            input_features: input.to_feature_map(),
            created_at,
        }
    }
}
