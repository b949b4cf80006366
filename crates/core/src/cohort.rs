//! The cohort table engine.
//!
//! A [`Cohort`] owns the in-memory list of [`PatientRecord`]s together with the id generator
//! used to label them. What the dashboard shows is derived on demand by [`visible_slice`], a
//! pure function of the list and a [`ViewState`]; the list itself is never reordered or
//! filtered in place. KPIs are always computed over the full list and refreshed on every
//! mutation.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use readmit_types::RiskLabel;
use serde::{Deserialize, Serialize};

use crate::batch::{BatchOutcome, OutcomeResult};
use crate::constants::{DEFAULT_PAGE_SIZE, MAX_COHORT_SIZE};
use crate::demo;
use crate::ids::IdGenerator;
use crate::patient::PatientRecord;
use crate::CoreError;

/// Field the table is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    ReadmissionProbability,
    CreatedAt,
    Id,
    PatientId,
    Age,
    MedicalSpecialty,
}

impl FromStr for SortKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "readmission_probability" => Ok(SortKey::ReadmissionProbability),
            "created_at" => Ok(SortKey::CreatedAt),
            "id" => Ok(SortKey::Id),
            "patient_id" => Ok(SortKey::PatientId),
            "age" => Ok(SortKey::Age),
            "medical_specialty" => Ok(SortKey::MedicalSpecialty),
            other => Err(CoreError::InvalidInput(format!("unknown sort key: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(CoreError::InvalidInput(format!(
                "unknown sort direction: {other}"
            ))),
        }
    }
}

/// UI-local view parameters. Empty filter strings mean "no filter".
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    query: String,
    specialty: String,
    age_bucket: String,
    sort_key: SortKey,
    sort_direction: SortDirection,
    page: usize,
    page_size: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl ViewState {
    /// Unfiltered view, highest probability first, on page 1.
    pub fn new(page_size: usize) -> Self {
        Self {
            query: String::new(),
            specialty: String::new(),
            age_bucket: String::new(),
            sort_key: SortKey::ReadmissionProbability,
            sort_direction: SortDirection::Desc,
            page: 1,
            page_size: page_size.max(1),
        }
    }

    /// Replaces all three filters and returns to the first page.
    pub fn set_filter(
        &mut self,
        query: impl Into<String>,
        specialty: impl Into<String>,
        age_bucket: impl Into<String>,
    ) {
        self.query = query.into();
        self.specialty = specialty.into();
        self.age_bucket = age_bucket.into();
        self.page = 1;
    }

    /// Changes ordering and returns to the first page.
    pub fn set_sort(&mut self, key: SortKey, direction: SortDirection) {
        self.sort_key = key;
        self.sort_direction = direction;
        self.page = 1;
    }

    /// Moves to page `n` (1-based). Page 0 is treated as page 1; pages past the end are kept
    /// and simply show no rows.
    pub fn set_page(&mut self, n: usize) {
        self.page = n.max(1);
    }

    /// Changes the page size (minimum 1) and returns to the first page.
    pub fn set_page_size(&mut self, n: usize) {
        self.page_size = n.max(1);
        self.page = 1;
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn specialty(&self) -> &str {
        &self.specialty
    }

    pub fn age_bucket(&self) -> &str {
        &self.age_bucket
    }

    pub fn sort_key(&self) -> SortKey {
        self.sort_key
    }

    pub fn sort_direction(&self) -> SortDirection {
        self.sort_direction
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    fn matches(&self, record: &PatientRecord) -> bool {
        let query = self.query.trim().to_lowercase();
        if !query.is_empty() {
            let in_id = record.patient_id.to_lowercase().contains(&query);
            let in_name = record
                .name
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(&query));
            if !in_id && !in_name {
                return false;
            }
        }

        if !self.specialty.is_empty()
            && record.medical_specialty.as_deref() != Some(self.specialty.as_str())
        {
            return false;
        }

        if !self.age_bucket.is_empty() && record.age.as_deref() != Some(self.age_bucket.as_str())
        {
            return false;
        }

        true
    }

    fn compare(&self, a: &PatientRecord, b: &PatientRecord) -> Ordering {
        let ordering = match self.sort_key {
            SortKey::ReadmissionProbability => a
                .readmission_probability
                .value()
                .total_cmp(&b.readmission_probability.value()),
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::Id => a.id.cmp(&b.id),
            SortKey::PatientId => a.patient_id.cmp(&b.patient_id),
            SortKey::Age => a.age.cmp(&b.age),
            SortKey::MedicalSpecialty => a.medical_specialty.cmp(&b.medical_specialty),
        };

        match self.sort_direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

/// One page of the table plus what the pager needs.
#[derive(Debug, Clone)]
pub struct VisibleSlice<'a> {
    pub rows: Vec<&'a PatientRecord>,
    /// Number of records that passed the filters, across all pages.
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub page_count: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

impl VisibleSlice<'_> {
    /// True when the page should render the explicit "no data" row.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Filter, then stably sort, then paginate.
///
/// Records that compare equal keep their order from `list`.
pub fn visible_slice<'a>(list: &'a [PatientRecord], view: &ViewState) -> VisibleSlice<'a> {
    let mut filtered: Vec<&PatientRecord> = list.iter().filter(|r| view.matches(r)).collect();
    // `sort_by` is stable, which keeps ties in insertion order.
    filtered.sort_by(|a, b| view.compare(a, b));

    let total = filtered.len();
    let page_size = view.page_size();
    let page = view.page();
    let page_count = total.div_ceil(page_size);
    let start = (page - 1).saturating_mul(page_size);

    let rows = filtered
        .into_iter()
        .skip(start)
        .take(page_size)
        .collect::<Vec<_>>();

    VisibleSlice {
        rows,
        total,
        page,
        page_size,
        page_count,
        has_prev: page > 1,
        has_next: page.saturating_mul(page_size) < total,
    }
}

/// Headline numbers over the whole cohort.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub total: usize,
    /// Share of high-risk records, rounded to the nearest whole percent.
    pub high_pct: u32,
    pub avg_prob: f64,
}

/// Computes KPIs over the full, unfiltered list.
pub fn compute_kpis(list: &[PatientRecord]) -> Kpis {
    let total = list.len();
    if total == 0 {
        return Kpis {
            total: 0,
            high_pct: 0,
            avg_prob: 0.0,
        };
    }

    let high = list
        .iter()
        .filter(|r| r.risk_label == RiskLabel::High)
        .count();
    let sum: f64 = list
        .iter()
        .map(|r| r.readmission_probability.value())
        .sum();

    Kpis {
        total,
        high_pct: ((high as f64 / total as f64) * 100.0).round() as u32,
        avg_prob: sum / total as f64,
    }
}

/// The in-memory cohort for one session.
#[derive(Debug, Clone)]
pub struct Cohort {
    records: Vec<PatientRecord>,
    ids: IdGenerator,
    max_size: usize,
    kpis: Kpis,
}

impl Default for Cohort {
    fn default() -> Self {
        Self::new(MAX_COHORT_SIZE)
    }
}

impl Cohort {
    /// An empty cohort that holds at most `max_size` records.
    pub fn new(max_size: usize) -> Self {
        Self {
            records: Vec::new(),
            ids: IdGenerator::new(),
            max_size: max_size.max(1),
            kpis: compute_kpis(&[]),
        }
    }

    /// Appends `n` synthetic demo records.
    pub fn seed_demo<R: Rng + ?Sized>(&mut self, n: usize, rng: &mut R) {
        let now = Utc::now();
        let seeded = demo::generate_cohort(&mut self.ids, n, rng, now);
        self.extend(seeded);
    }

    pub fn records(&self) -> &[PatientRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// KPIs as of the last mutation.
    pub fn kpis(&self) -> Kpis {
        self.kpis
    }

    pub fn find(&self, id: u64) -> Option<&PatientRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn view<'a>(&'a self, view: &ViewState) -> VisibleSlice<'a> {
        visible_slice(&self.records, view)
    }

    /// Reserves a fresh id from this cohort's generator.
    pub fn next_id(&mut self) -> u64 {
        self.ids.next_id()
    }

    pub fn push(&mut self, record: PatientRecord) {
        self.extend(std::iter::once(record));
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = PatientRecord>) {
        self.records.extend(records);
        if self.records.len() > self.max_size {
            let excess = self.records.len() - self.max_size;
            self.records.drain(..excess);
            tracing::debug!("cohort cap reached, dropped {} oldest records", excess);
        }
        self.kpis = compute_kpis(&self.records);
    }

    /// Turns every successful outcome into a record and appends it, in outcome order.
    ///
    /// Failed outcomes are skipped. Returns the number of records added.
    pub fn ingest_outcomes(&mut self, outcomes: &[BatchOutcome], now: DateTime<Utc>) -> usize {
        let mut added = Vec::new();
        for outcome in outcomes {
            if let OutcomeResult::Explained(explanation) = &outcome.result {
                let id = self.ids.next_id();
                added.push(PatientRecord::from_explanation(
                    id,
                    &outcome.input,
                    explanation,
                    now,
                ));
            }
        }
        let count = added.len();
        self.extend(added);
        count
    }
}
