//! Single-patient JSON report, as downloaded from the detail panel.

use readmit_types::{Probability, RiskLabel};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::patient::PatientRecord;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientReport {
    pub patient_id: String,
    pub probability: Probability,
    pub risk_label: RiskLabel,
    pub reasons: Vec<String>,
    /// Raw inputs the prediction was made from; `null` when none were kept.
    pub input: Option<Map<String, Value>>,
}

impl From<&PatientRecord> for PatientReport {
    fn from(record: &PatientRecord) -> Self {
        Self {
            patient_id: record.patient_id.clone(),
            probability: record.readmission_probability,
            risk_label: record.risk_label,
            reasons: record.reasons.clone(),
            input: if record.input_features.is_empty() {
                None
            } else {
                Some(record.input_features.clone())
            },
        }
    }
}

impl PatientReport {
    /// Pretty-printed JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Serialization`] if the report cannot be encoded.
    pub fn to_json_bytes(&self) -> CoreResult<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(CoreError::Serialization)
    }

    /// Suggested download name, e.g. `patient_P-1001.json`.
    pub fn file_name(&self) -> String {
        let id = if self.patient_id.trim().is_empty() {
            "report"
        } else {
            self.patient_id.as_str()
        };
        let safe: String = id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("patient_{safe}.json")
    }
}
