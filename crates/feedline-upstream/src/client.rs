//! Shared HTTP client construction and error classification.

use feedline_types::{Timeouts, UpstreamError};
use reqwest::{Client, Response};
use serde_json::Value;

const USER_AGENT: &str = concat!("feedline/", env!("CARGO_PKG_VERSION"));

/// Build the process-wide HTTP client.
///
/// The connect budget is client-wide; the read budget is applied per
/// request from [`FetchRequest::timeouts`](feedline_types::FetchRequest::timeouts)
/// and defaults to `timeouts.read` here. Cookies persist across requests
/// so the trends explore step can reuse its session.
///
/// # Errors
///
/// Returns [`UpstreamError`] if the TLS backend cannot be initialized.
pub fn build_http_client(timeouts: Timeouts) -> Result<Client, UpstreamError> {
    Client::builder()
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.read)
        .user_agent(USER_AGENT)
        .cookie_store(true)
        .build()
        .map_err(|e| UpstreamError::connect(format!("failed to build HTTP client: {}", e.without_url())))
}

/// Map a transport error onto the upstream taxonomy.
///
/// URLs are stripped first: weather URLs carry the API key.
pub(crate) fn classify(err: reqwest::Error) -> UpstreamError {
    let err = err.without_url();
    if err.is_timeout() {
        UpstreamError::timeout(err.to_string())
    } else if let Some(status) = err.status() {
        UpstreamError::http(status.as_u16(), err.to_string())
    } else if err.is_decode() {
        UpstreamError::parse(err.to_string())
    } else {
        UpstreamError::connect(err.to_string())
    }
}

/// Read a response body, failing on non-2xx and on non-JSON bodies.
///
/// `strip_prefix` drops everything before the first `{`, which removes the
/// anti-hijacking preamble some providers put in front of JSON.
pub(crate) async fn read_json(
    response: Response,
    provider: &str,
    strip_prefix: bool,
) -> Result<Value, UpstreamError> {
    let status = response.status();
    let text = response.text().await.map_err(classify)?;

    if !status.is_success() {
        let detail = provider_error_message(&text)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());
        return Err(UpstreamError::http(
            status.as_u16(),
            format!("{provider} returned {}: {detail}", status.as_u16()),
        ));
    }

    parse_body(&text, provider, strip_prefix)
}

pub(crate) fn parse_body(text: &str, provider: &str, strip_prefix: bool) -> Result<Value, UpstreamError> {
    let body = if strip_prefix {
        text.find('{').map_or(text, |start| &text[start..])
    } else {
        text
    };
    serde_json::from_str(body)
        .map_err(|e| UpstreamError::parse(format!("{provider} returned malformed JSON: {e}")))
}

/// Extract `error.message` from a provider error document, if present.
fn provider_error_message(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;
    value
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
}
