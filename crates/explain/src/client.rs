//! Explanation requests with ordered host fallback.

use readmit_core::constants::{EXPLAIN_PATH, HEALTH_PATH};
use readmit_core::{ExplainConfig, ExplanationResult, Explainer, NormalizedPatientInput};
use serde::Deserialize;

use crate::endpoints::EndpointCandidates;
use crate::transport::{
    default_host_failed, Attempt, EndpointUnreachable, ExplainTransport, FailurePredicate,
    ReqwestTransport,
};

/// Longest slice of a non-JSON error body quoted in a failure reason.
const MAX_REASON_BODY: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum ExplainError {
    #[error("All API endpoints failed for /explain.")]
    AllEndpointsUnreachable { attempts: Vec<EndpointUnreachable> },
    #[error("no API endpoints configured")]
    NoEndpoints,
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Result of probing one host's health route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostHealth {
    pub endpoint: String,
    pub healthy: bool,
    pub status: Option<String>,
}

#[derive(Deserialize)]
struct HealthBody {
    status: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

fn describe_failure(attempt: &Attempt) -> String {
    match attempt {
        Err(e) => e.to_string(),
        Ok(response) => {
            let detail = match serde_json::from_slice::<ErrorBody>(&response.body) {
                Ok(ErrorBody {
                    detail: serde_json::Value::String(s),
                }) => s,
                Ok(ErrorBody { detail }) => detail.to_string(),
                Err(_) => String::from_utf8_lossy(&response.body)
                    .chars()
                    .take(MAX_REASON_BODY)
                    .collect(),
            };
            if detail.trim().is_empty() {
                format!("HTTP {}", response.status)
            } else {
                format!("HTTP {}: {}", response.status, detail.trim())
            }
        }
    }
}

/// Submits inputs to the first host that answers, in candidate order.
pub struct FallbackExplainer<T> {
    transport: T,
    candidates: EndpointCandidates,
    host_failed: FailurePredicate,
}

impl FallbackExplainer<ReqwestTransport> {
    /// Client for the configured hosts, with the configured per-attempt timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ExplainError::Client`] if the HTTP client cannot be built.
    pub fn from_config(config: &ExplainConfig) -> Result<Self, ExplainError> {
        let transport = ReqwestTransport::new(config.request_timeout())?;
        Ok(Self::new(transport, EndpointCandidates::from_config(config)))
    }
}

impl<T: ExplainTransport> FallbackExplainer<T> {
    pub fn new(transport: T, candidates: EndpointCandidates) -> Self {
        Self {
            transport,
            candidates,
            host_failed: default_host_failed,
        }
    }

    /// Replaces the rule used to decide that a host failed.
    pub fn with_failure_predicate(mut self, host_failed: FailurePredicate) -> Self {
        self.host_failed = host_failed;
        self
    }

    pub fn candidates(&self) -> &EndpointCandidates {
        &self.candidates
    }

    /// POSTs `input` to `{host}/explain` on each candidate in turn.
    ///
    /// Each host gets exactly one attempt. A host that fails the predicate, returns no
    /// response, or returns a body that is not a valid explanation is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ExplainError::AllEndpointsUnreachable`] carrying every per-host failure once
    /// all candidates have been tried.
    pub async fn submit_for_explanation(
        &self,
        input: &NormalizedPatientInput,
    ) -> Result<ExplanationResult, ExplainError> {
        if self.candidates.is_empty() {
            return Err(ExplainError::NoEndpoints);
        }
        let body = serde_json::to_value(input)?;
        let mut attempts = Vec::with_capacity(self.candidates.len());

        for base in self.candidates.urls() {
            let url = format!("{base}{EXPLAIN_PATH}");
            tracing::debug!("POST {}", url);
            let attempt = self.transport.post_json(&url, &body).await;

            let reason = if (self.host_failed)(&attempt) {
                describe_failure(&attempt)
            } else {
                match &attempt {
                    Err(e) => e.to_string(),
                    Ok(response) => {
                        match serde_json::from_slice::<ExplanationResult>(&response.body) {
                            Ok(explanation) => return Ok(explanation),
                            Err(e) => format!("invalid response body: {e}"),
                        }
                    }
                }
            };

            let failure = EndpointUnreachable {
                endpoint: base.clone(),
                reason,
            };
            tracing::warn!("{}", failure);
            attempts.push(failure);
        }

        tracing::error!(
            "all {} endpoints failed for {}",
            attempts.len(),
            EXPLAIN_PATH
        );
        Err(ExplainError::AllEndpointsUnreachable { attempts })
    }

    /// GETs `{host}/health` on every candidate. A host is healthy on any 2xx.
    pub async fn probe_health(&self) -> Vec<HostHealth> {
        let mut report = Vec::with_capacity(self.candidates.len());
        for base in self.candidates.urls() {
            let url = format!("{base}{HEALTH_PATH}");
            let attempt = self.transport.get(&url).await;
            let health = match attempt {
                Ok(response) if response.is_success() => HostHealth {
                    endpoint: base.clone(),
                    healthy: true,
                    status: serde_json::from_slice::<HealthBody>(&response.body)
                        .ok()
                        .and_then(|b| b.status),
                },
                other => {
                    tracing::debug!("{} unhealthy: {}", base, describe_failure(&other));
                    HostHealth {
                        endpoint: base.clone(),
                        healthy: false,
                        status: None,
                    }
                }
            };
            report.push(health);
        }
        report
    }

    /// Moves the first healthy host to the front of the candidate list.
    ///
    /// The remaining hosts keep their order and stay available as fallbacks. Returns the
    /// preferred host, or `None` when no host reported healthy and the order is unchanged.
    pub async fn prefer_healthy(&mut self) -> Option<String> {
        let healthy = self
            .probe_health()
            .await
            .into_iter()
            .find(|h| h.healthy)?
            .endpoint;
        self.candidates.prefer(&healthy);
        tracing::info!("preferring healthy endpoint {}", healthy);
        Some(healthy)
    }
}

impl<T: ExplainTransport> Explainer for FallbackExplainer<T> {
    type Error = ExplainError;

    async fn explain(
        &self,
        input: &NormalizedPatientInput,
    ) -> Result<ExplanationResult, Self::Error> {
        self.submit_for_explanation(input).await
    }
}
