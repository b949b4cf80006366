//! Synthetic cohort used by the demo dashboard.
//!
//! Nothing here is clinically meaningful; it exists so the table, filters and KPIs have
//! realistic-looking data before anything has been uploaded.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use readmit_types::{Probability, RiskLabel};
use serde_json::{json, Map, Value};

use crate::ids::IdGenerator;
use crate::patient::{Contribution, PatientRecord};

pub const AGE_BUCKETS: [&str; 6] = [
    "[20-30)", "[30-40)", "[40-50)", "[50-60)", "[60-70)", "[70-80)",
];
pub const SPECIALTIES: [&str; 5] = [
    "Cardiology",
    "InternalMedicine",
    "Surgery",
    "Orthopedics",
    "Other",
];
const CONTRIBUTION_FEATURES: [&str; 6] = [
    "age",
    "time_in_hospital",
    "n_medications",
    "n_lab_procedures",
    "n_procedures",
    "n_inpatient",
];
const CONTRIBUTIONS_PER_PATIENT: usize = 6;

fn pick<'a, R: Rng + ?Sized>(rng: &mut R, options: &[&'a str]) -> &'a str {
    options.choose(rng).copied().unwrap_or_default()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Six random contributions, largest magnitude first.
pub fn random_contributions<R: Rng + ?Sized>(rng: &mut R) -> Vec<Contribution> {
    let mut contributions: Vec<Contribution> = (0..CONTRIBUTIONS_PER_PATIENT)
        .map(|i| {
            let feature = format!("{}__{}", pick(rng, &CONTRIBUTION_FEATURES), i);
            let shap = round_to((rng.gen::<f64>() - 0.5) * 0.6, 4);
            Contribution::new(feature, shap)
        })
        .collect();
    contributions.sort_by(|a, b| b.shap_value.abs().total_cmp(&a.shap_value.abs()));
    contributions
}

fn demo_reasons(label: RiskLabel) -> Vec<String> {
    match label {
        RiskLabel::High => vec![
            "High medication count".to_string(),
            "Frequent inpatient visits".to_string(),
        ],
        _ => vec!["Routine follow-up".to_string()],
    }
}

/// One synthetic patient. `seed_index` spreads probabilities across the range.
pub fn random_patient<R: Rng + ?Sized>(
    ids: &mut IdGenerator,
    seed_index: usize,
    rng: &mut R,
    now: DateTime<Utc>,
) -> PatientRecord {
    let id = ids.next_id();
    let raw = 0.05 + (seed_index as f64 + rng.gen::<f64>()).sin().abs() * 0.9;
    let probability = Probability::clamped(round_to(raw, 3).clamp(0.01, 0.99));

    let mut input: Map<String, Value> = Map::new();
    input.insert(
        "time_in_hospital".into(),
        json!(rng.gen_range(1..=11_i64)),
    );
    input.insert("n_medications".into(), json!(rng.gen_range(0..=30_i64)));
    input.insert("n_lab_procedures".into(), json!(rng.gen_range(0..=60_i64)));

    let label = probability.risk_label();
    PatientRecord::with_local_label(
        id,
        format!("P-{id}"),
        Some(pick(rng, &AGE_BUCKETS).to_string()),
        Some(pick(rng, &SPECIALTIES).to_string()),
        probability,
        demo_reasons(label),
        random_contributions(rng),
        input,
        now,
    )
}

/// `n` synthetic patients with ids drawn from `ids`.
pub fn generate_cohort<R: Rng + ?Sized>(
    ids: &mut IdGenerator,
    n: usize,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Vec<PatientRecord> {
    (0..n).map(|i| random_patient(ids, i, rng, now)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn generated_records_are_internally_consistent() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut ids = IdGenerator::new();
        let cohort = generate_cohort(&mut ids, 50, &mut rng, Utc::now());

        assert_eq!(cohort.len(), 50);
        for record in &cohort {
            let p = record.readmission_probability.value();
            assert!((0.01..=0.99).contains(&p));
            assert_eq!(record.risk_label, RiskLabel::from_probability(record.readmission_probability));
            assert_eq!(record.patient_id, format!("P-{}", record.id));
            assert_eq!(record.top_contributions.len(), CONTRIBUTIONS_PER_PATIENT);
            assert!(AGE_BUCKETS.contains(&record.age.as_deref().unwrap()));
            assert!(SPECIALTIES.contains(&record.medical_specialty.as_deref().unwrap()));
        }
    }

    #[test]
    fn ids_are_unique_across_cohort() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut ids = IdGenerator::new();
        let cohort = generate_cohort(&mut ids, 28, &mut rng, Utc::now());
        let mut seen: Vec<u64> = cohort.iter().map(|r| r.id).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 28);
    }

    #[test]
    fn contributions_are_sorted_by_magnitude() {
        let mut rng = StdRng::seed_from_u64(9);
        let contributions = random_contributions(&mut rng);
        for pair in contributions.windows(2) {
            assert!(pair[0].shap_value.abs() >= pair[1].shap_value.abs());
        }
    }
}
