//! Attaches the agent API key to outbound gateway requests.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};

use crate::errors::GuardError;

pub const AGENT_KEY_HEADER: HeaderName = HeaderName::from_static("x-agent-api-key");
pub const ORIGINAL_URL_HEADER: HeaderName = HeaderName::from_static("x-original-url");

/// Insert `Authorization: Bearer <key>` and `X-Agent-API-Key: <key>`.
/// Any caller-supplied `Authorization` is replaced; the gateway holds the real
/// upstream credential.
pub fn inject_agent_key(headers: &mut HeaderMap, api_key: &str) -> Result<(), GuardError> {
    let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
        .map_err(|_| GuardError::Config("agent api key contains invalid header characters".into()))?;
    let raw = HeaderValue::from_str(api_key)
        .map_err(|_| GuardError::Config("agent api key contains invalid header characters".into()))?;

    headers.insert(AUTHORIZATION, bearer);
    headers.insert(AGENT_KEY_HEADER, raw);
    Ok(())
}

/// Headers for the management API, which only reads `X-Agent-API-Key`.
pub fn agent_key_headers(api_key: &str) -> Result<HeaderMap, GuardError> {
    let mut headers = HeaderMap::new();
    let raw = HeaderValue::from_str(api_key)
        .map_err(|_| GuardError::Config("agent api key contains invalid header characters".into()))?;
    headers.insert(AGENT_KEY_HEADER, raw);
    Ok(headers)
}
