//! Shared HTTP plumbing for the hosted service.

use scholar_common::{Result, ScholarError};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Turn a non-success response body into an `Api` error.
///
/// The service's `error.message` is surfaced unmodified so callers can match
/// on its text; bodies that are not the standard envelope are kept raw.
pub fn api_error(status: u16, body: &str) -> ScholarError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.to_string());
    ScholarError::Api { status, message }
}

pub fn build_http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ScholarError::Config(format!("Failed to build HTTP client: {e}")))
}

/// Map a transport failure (DNS, TLS, timeout) to a connection error.
pub fn transport_error(context: &str, error: reqwest::Error) -> ScholarError {
    ScholarError::ApiConnection(format!("{context}: {error}"))
}

/// Read a response, failing with the service's error text on non-2xx status.
pub async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    context: &str,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        return Err(api_error(status.as_u16(), &body_text));
    }

    response
        .json()
        .await
        .map_err(|e| ScholarError::Protocol(format!("Failed to parse {context} response: {e}")))
}
