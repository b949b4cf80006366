//! Sample patients for the "explain a random sample" action.
//!
//! A deployment may ship a JSON array of raw patient rows; when it is missing, empty or
//! unreadable the built-in record below is used instead, so the action always has something
//! to send.

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::Value;
use tracing::warn;

use crate::normalise::{normalise_row, NormalizedPatientInput};

/// The record used when no sample file is available.
pub fn builtin_samples() -> Vec<NormalizedPatientInput> {
    vec![NormalizedPatientInput {
        patient_id: None,
        age: Some("[50-60)".to_string()),
        medical_specialty: Some("Other".to_string()),
        n_outpatient: 0,
        n_inpatient: 10,
        n_emergency: 9,
        n_procedures: 10,
        n_lab_procedures: 39,
        n_medications: 79,
        time_in_hospital: 3,
        diag_1: Some("Respiratory".to_string()),
        diag_2: Some("Other".to_string()),
        diag_3: Some("Circulatory".to_string()),
        ..NormalizedPatientInput::default()
    }]
}

/// Reads a sample file: a JSON array of row objects, each normalised like an uploaded row.
///
/// Anything that is not a non-empty array of objects yields [`builtin_samples`].
pub fn samples_from_json(bytes: &[u8]) -> Vec<NormalizedPatientInput> {
    let rows = match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Array(rows)) => rows,
        Ok(_) => {
            warn!("sample file is not a JSON array, using built-in sample");
            return builtin_samples();
        }
        Err(e) => {
            warn!("sample file is not valid JSON ({e}), using built-in sample");
            return builtin_samples();
        }
    };

    let samples: Vec<NormalizedPatientInput> = rows
        .iter()
        .filter_map(Value::as_object)
        .map(normalise_row)
        .collect();

    if samples.is_empty() {
        builtin_samples()
    } else {
        samples
    }
}

/// Picks one sample uniformly at random, or the first built-in when `samples` is empty.
pub fn pick_sample<R: Rng + ?Sized>(
    samples: &[NormalizedPatientInput],
    rng: &mut R,
) -> NormalizedPatientInput {
    match samples.choose(rng) {
        Some(sample) => sample.clone(),
        None => builtin_samples().remove(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn builtin_sample_matches_reference_record() {
        let sample = &builtin_samples()[0];
        assert_eq!(sample.age.as_deref(), Some("[50-60)"));
        assert_eq!(sample.n_medications, 79);
        assert_eq!(sample.n_inpatient, 10);
        assert_eq!(sample.diag_3.as_deref(), Some("Circulatory"));
    }

    #[test]
    fn sample_file_rows_are_normalised() {
        let bytes = br#"[{"meds": "12", "los": 0, "specialty": "Cardiology"}, 7]"#;
        let samples = samples_from_json(bytes);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].n_medications, 12);
        assert_eq!(samples[0].time_in_hospital, 1);
        assert_eq!(samples[0].medical_specialty.as_deref(), Some("Cardiology"));
    }

    #[test]
    fn unusable_sample_files_fall_back_to_builtin() {
        let builtin = builtin_samples();
        assert_eq!(samples_from_json(b"[]"), builtin);
        assert_eq!(samples_from_json(b"{\"age\": 1}"), builtin);
        assert_eq!(samples_from_json(b"not json"), builtin);
        assert_eq!(samples_from_json(b"[1, \"two\"]"), builtin);
    }

    #[test]
    fn pick_sample_stays_within_the_list() {
        let samples = samples_from_json(br#"[{"meds": 1}, {"meds": 2}, {"meds": 3}]"#);
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..20 {
            let picked = pick_sample(&samples, &mut rng);
            assert!((1..=3).contains(&picked.n_medications));
        }
        assert_eq!(pick_sample(&[], &mut rng).n_medications, 79);
    }
}
