//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into services. Environment variables are read by the binaries only; the helpers here
//! take the raw `Option<String>` values so they can be tested without touching process state.

use crate::constants::{
    DEFAULT_API_BASE, DEFAULT_COHORT_SIZE, DEFAULT_FALLBACK_APIS, DEFAULT_PAGE_SIZE,
    DEFAULT_REQUEST_TIMEOUT_SECS, MAX_COHORT_SIZE, STATIC_SITE_HOST_MARKER,
};
use crate::{CoreError, CoreResult};
use std::time::Duration;

/// Where and how to reach the prediction backend.
#[derive(Clone, Debug)]
pub struct ExplainConfig {
    primary_endpoint: String,
    fallback_endpoints: Vec<String>,
    request_timeout: Duration,
}

impl ExplainConfig {
    /// Create a new `ExplainConfig`.
    ///
    /// Trailing slashes are stripped from every endpoint so that paths can be appended
    /// uniformly.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if any endpoint is empty or not an http(s) URL, or
    /// if the timeout is zero.
    pub fn new(
        primary_endpoint: String,
        fallback_endpoints: Vec<String>,
        request_timeout: Duration,
    ) -> CoreResult<Self> {
        let primary_endpoint = validate_endpoint(&primary_endpoint)?;
        let fallback_endpoints = fallback_endpoints
            .iter()
            .map(|e| validate_endpoint(e))
            .collect::<CoreResult<Vec<_>>>()?;

        if request_timeout.is_zero() {
            return Err(CoreError::InvalidInput(
                "request timeout must be greater than zero".into(),
            ));
        }

        Ok(Self {
            primary_endpoint,
            fallback_endpoints,
            request_timeout,
        })
    }

    /// Resolve from the raw values of `READMIT_API_BASE`, `READMIT_FALLBACK_APIS` and
    /// `READMIT_REQUEST_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if the timeout or any endpoint is invalid.
    pub fn from_env_values(
        api_base: Option<String>,
        fallback_apis: Option<String>,
        request_timeout_secs: Option<String>,
    ) -> CoreResult<Self> {
        Self::new(
            primary_endpoint_from_env_value(api_base),
            fallback_endpoints_from_env_value(fallback_apis),
            request_timeout_from_env_value(request_timeout_secs)?,
        )
    }

    pub fn primary_endpoint(&self) -> &str {
        &self.primary_endpoint
    }

    pub fn fallback_endpoints(&self) -> &[String] {
        &self.fallback_endpoints
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            primary_endpoint: DEFAULT_API_BASE.to_string(),
            fallback_endpoints: DEFAULT_FALLBACK_APIS.iter().map(|s| s.to_string()).collect(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Sizing of the in-memory cohort.
#[derive(Clone, Debug)]
pub struct CohortConfig {
    pub seed_size: usize,
    pub max_cohort_size: usize,
    pub default_page_size: usize,
}

impl Default for CohortConfig {
    fn default() -> Self {
        Self {
            seed_size: DEFAULT_COHORT_SIZE,
            max_cohort_size: MAX_COHORT_SIZE,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

fn validate_endpoint(raw: &str) -> CoreResult<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(CoreError::InvalidInput("endpoint cannot be empty".into()));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(CoreError::InvalidInput(format!(
            "endpoint must be an http(s) URL: {trimmed}"
        )));
    }
    Ok(trimmed.to_string())
}

/// Resolve the primary endpoint from an optional override.
///
/// The override is ignored when it is empty or points at the static frontend host, which
/// serves the single page app but never the prediction API.
pub fn primary_endpoint_from_env_value(value: Option<String>) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.contains(STATIC_SITE_HOST_MARKER))
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
}

/// Parse a comma separated fallback list. `None` or blank yields the default list.
pub fn fallback_endpoints_from_env_value(value: Option<String>) -> Vec<String> {
    let parsed: Vec<String> = value
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if parsed.is_empty() {
        DEFAULT_FALLBACK_APIS.iter().map(|s| s.to_string()).collect()
    } else {
        parsed
    }
}

/// Parse the per-attempt timeout in whole seconds.
///
/// # Errors
///
/// Returns [`CoreError::InvalidInput`] if the value is present but not a positive integer.
pub fn request_timeout_from_env_value(value: Option<String>) -> CoreResult<Duration> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)),
        Some(v) => match v.parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(CoreError::InvalidInput(format!(
                "request timeout must be a positive number of seconds, got {v:?}"
            ))),
        },
    }
}

/// Parse the demo cohort size. `None` or blank yields the default.
///
/// # Errors
///
/// Returns [`CoreError::InvalidInput`] if the value is not a non-negative integer or exceeds
/// the cohort cap.
pub fn cohort_size_from_env_value(value: Option<String>) -> CoreResult<usize> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(DEFAULT_COHORT_SIZE),
        Some(v) => match v.parse::<usize>() {
            Ok(n) if n <= MAX_COHORT_SIZE => Ok(n),
            _ => Err(CoreError::InvalidInput(format!(
                "cohort size must be between 0 and {MAX_COHORT_SIZE}, got {v:?}"
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_override_is_used() {
        let v = primary_endpoint_from_env_value(Some(" http://10.0.0.5:8000 ".into()));
        assert_eq!(v, "http://10.0.0.5:8000");
    }

    #[test]
    fn primary_ignores_static_site_and_blank() {
        let v = primary_endpoint_from_env_value(Some(
            "https://proud-sea-1234.azurestaticapps.net".into(),
        ));
        assert_eq!(v, DEFAULT_API_BASE);
        assert_eq!(primary_endpoint_from_env_value(Some("  ".into())), DEFAULT_API_BASE);
        assert_eq!(primary_endpoint_from_env_value(None), DEFAULT_API_BASE);
    }

    #[test]
    fn fallback_list_parses_and_defaults() {
        let v = fallback_endpoints_from_env_value(Some("http://a:1, ,http://b:2".into()));
        assert_eq!(v, vec!["http://a:1".to_string(), "http://b:2".to_string()]);
        assert_eq!(fallback_endpoints_from_env_value(None).len(), 3);
    }

    #[test]
    fn timeout_parses_seconds() {
        assert_eq!(
            request_timeout_from_env_value(Some("5".into())).unwrap(),
            Duration::from_secs(5)
        );
        assert_eq!(
            request_timeout_from_env_value(None).unwrap(),
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS)
        );
        assert!(request_timeout_from_env_value(Some("0".into())).is_err());
        assert!(request_timeout_from_env_value(Some("soon".into())).is_err());
    }

    #[test]
    fn cohort_size_respects_cap() {
        assert_eq!(cohort_size_from_env_value(None).unwrap(), DEFAULT_COHORT_SIZE);
        assert_eq!(cohort_size_from_env_value(Some("3".into())).unwrap(), 3);
        assert!(cohort_size_from_env_value(Some("999999".into())).is_err());
    }

    #[test]
    fn explain_config_strips_trailing_slash() {
        let cfg = ExplainConfig::new(
            "http://primary:8000/".into(),
            vec!["http://backup:8000//".into()],
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(cfg.primary_endpoint(), "http://primary:8000");
        assert_eq!(cfg.fallback_endpoints(), ["http://backup:8000".to_string()]);
    }

    #[test]
    fn explain_config_from_env_values() {
        let cfg = ExplainConfig::from_env_values(
            Some("http://10.0.0.5:8000/".into()),
            Some("http://backup:8000".into()),
            Some("7".into()),
        )
        .unwrap();
        assert_eq!(cfg.primary_endpoint(), "http://10.0.0.5:8000");
        assert_eq!(cfg.fallback_endpoints(), ["http://backup:8000".to_string()]);
        assert_eq!(cfg.request_timeout(), Duration::from_secs(7));

        let defaults = ExplainConfig::from_env_values(None, None, None).unwrap();
        assert_eq!(defaults.primary_endpoint(), DEFAULT_API_BASE);
        assert!(ExplainConfig::from_env_values(None, Some("nope".into()), None).is_err());
    }

    #[test]
    fn explain_config_rejects_bad_input() {
        assert!(ExplainConfig::new("".into(), vec![], Duration::from_secs(1)).is_err());
        assert!(ExplainConfig::new("ftp://x".into(), vec![], Duration::from_secs(1)).is_err());
        assert!(ExplainConfig::new("http://x".into(), vec![], Duration::ZERO).is_err());
    }
}
