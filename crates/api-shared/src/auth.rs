/// Header carrying the caller's API key.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Missing x-api-key header")]
    MissingKey,
    #[error("Invalid API key")]
    InvalidKey,
}

/// Checks a provided API key against the configured one.
///
/// When no key is configured every request is allowed.
pub fn validate_api_key(expected: Option<&str>, provided: Option<&str>) -> Result<(), AuthError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match provided {
        None => Err(AuthError::MissingKey),
        Some(key) if key == expected => Ok(()),
        Some(_) => Err(AuthError::InvalidKey),
    }
}
