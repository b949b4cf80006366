//! The bulk prediction pipeline.
//!
//! A run moves through `Idle -> Parsing -> Submitting(1..=N) -> Done`. Only a parse failure
//! ends a run early (`Error`); a row whose submission fails is recorded as an error outcome
//! and the run carries on with the next row. Rows are submitted strictly one at a time, in
//! upload order.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::normalise::{normalise_row, NormalizedPatientInput};
use crate::patient::ExplanationResult;
use crate::spreadsheet::parse_spreadsheet;

/// Something that can turn a normalised input into a prediction with an explanation.
///
/// The HTTP client with host fallback implements this; tests use in-memory fakes.
pub trait Explainer {
    type Error: std::fmt::Display + Send;

    fn explain(
        &self,
        input: &NormalizedPatientInput,
    ) -> impl Future<Output = Result<ExplanationResult, Self::Error>> + Send;
}

/// Either the explanation for a row or the reason it could not be obtained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutcomeResult {
    Failed { error: String },
    Explained(ExplanationResult),
}

/// Result for one uploaded row. `index` is the 1-based position in the upload.
///
/// Serialises flat: `{index, input, ...explanation}` or `{index, input, error}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub index: usize,
    pub input: NormalizedPatientInput,
    #[serde(flatten)]
    pub result: OutcomeResult,
}

impl BatchOutcome {
    pub fn explained(
        index: usize,
        input: NormalizedPatientInput,
        explanation: ExplanationResult,
    ) -> Self {
        Self {
            index,
            input,
            result: OutcomeResult::Explained(explanation),
        }
    }

    pub fn failed(index: usize, input: NormalizedPatientInput, error: String) -> Self {
        Self {
            index,
            input,
            result: OutcomeResult::Failed { error },
        }
    }

    pub fn explanation(&self) -> Option<&ExplanationResult> {
        match &self.result {
            OutcomeResult::Explained(e) => Some(e),
            OutcomeResult::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.result {
            OutcomeResult::Explained(_) => None,
            OutcomeResult::Failed { error } => Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error().is_some()
    }
}

/// Running count reported after every row, successful or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
}

/// Where a run currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BatchState {
    Idle,
    Parsing,
    Submitting { completed: usize, total: usize },
    Done { succeeded: usize, failed: usize },
    Error { message: String },
}

/// Submits every input in order and collects one outcome per input.
///
/// A failing row never stops the batch. `on_progress` is called after each row.
pub async fn run_batch<E, F>(
    explainer: &E,
    inputs: Vec<NormalizedPatientInput>,
    mut on_progress: F,
) -> Vec<BatchOutcome>
where
    E: Explainer + Sync,
    F: FnMut(BatchProgress) + Send,
{
    let total = inputs.len();
    let mut outcomes = Vec::with_capacity(total);

    for (i, input) in inputs.into_iter().enumerate() {
        let index = i + 1;
        match explainer.explain(&input).await {
            Ok(explanation) => {
                tracing::debug!(
                    "row {}/{} explained: {}",
                    index,
                    total,
                    explanation.risk_label
                );
                outcomes.push(BatchOutcome::explained(index, input, explanation));
            }
            Err(e) => {
                tracing::warn!("row {}/{} failed: {}", index, total, e);
                outcomes.push(BatchOutcome::failed(index, input, e.to_string()));
            }
        }
        on_progress(BatchProgress {
            completed: index,
            total,
        });
    }

    outcomes
}

/// Parses an uploaded workbook and runs the batch over its rows.
///
/// `on_state` sees every state transition, including one `Submitting` per completed row.
///
/// # Errors
///
/// Returns the [`ParseError`] when the workbook cannot be read or has no rows. Nothing is
/// submitted in that case.
pub async fn run_upload<E, F>(
    explainer: &E,
    bytes: &[u8],
    mut on_state: F,
) -> Result<Vec<BatchOutcome>, ParseError>
where
    E: Explainer + Sync,
    F: FnMut(BatchState) + Send,
{
    on_state(BatchState::Parsing);
    let rows = match parse_spreadsheet(bytes) {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!("upload rejected: {}", e);
            on_state(BatchState::Error {
                message: e.to_string(),
            });
            return Err(e);
        }
    };

    let inputs: Vec<NormalizedPatientInput> = rows.iter().map(normalise_row).collect();
    let total = inputs.len();
    tracing::info!("submitting {} rows for explanation", total);
    on_state(BatchState::Submitting {
        completed: 0,
        total,
    });

    let outcomes = run_batch(explainer, inputs, |p| {
        on_state(BatchState::Submitting {
            completed: p.completed,
            total: p.total,
        })
    })
    .await;

    let failed = outcomes.iter().filter(|o| o.is_error()).count();
    let succeeded = outcomes.len() - failed;
    tracing::info!("batch done: {} succeeded, {} failed", succeeded, failed);
    on_state(BatchState::Done { succeeded, failed });

    Ok(outcomes)
}
