//! Wire access to a single host, and the rule for deciding that a host has failed.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;

/// Status and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// One request against one host.
pub type Attempt = Result<RawResponse, TransportError>;

/// Decides whether an attempt means "this host failed, try the next one".
pub type FailurePredicate = fn(&Attempt) -> bool;

/// Any network failure or non-2xx status.
pub fn default_host_failed(attempt: &Attempt) -> bool {
    match attempt {
        Ok(response) => !response.is_success(),
        Err(_) => true,
    }
}

/// A single host could not produce a usable explanation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{endpoint} failed: {reason}")]
pub struct EndpointUnreachable {
    pub endpoint: String,
    pub reason: String,
}

/// Minimal HTTP surface the fallback client needs.
pub trait ExplainTransport: Send + Sync {
    fn post_json(&self, url: &str, body: &Value) -> impl Future<Output = Attempt> + Send;

    fn get(&self, url: &str) -> impl Future<Output = Attempt> + Send;
}

/// [`ExplainTransport`] over a shared `reqwest` client.
///
/// The timeout applies to each attempt separately, so a batch row can take at most
/// `hosts x timeout` before it is recorded as failed.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// # Errors
    ///
    /// Returns the `reqwest` error if the TLS backend cannot be initialised.
    pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }

    async fn read(response: reqwest::Response) -> Attempt {
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(RawResponse::new(status, body.to_vec()))
    }
}

impl ExplainTransport for ReqwestTransport {
    async fn post_json(&self, url: &str, body: &Value) -> Attempt {
        let response = self.client.post(url).json(body).send().await?;
        Self::read(response).await
    }

    async fn get(&self, url: &str) -> Attempt {
        let response = self.client.get(url).send().await?;
        Self::read(response).await
    }
}
