// src/ai/connector.rs
use log::error;
use reqwest::blocking::{Client, RequestBuilder};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// What every provider hands back to the caller: the answer text (Markdown
/// with embedded LaTeX) or a typed failure.
pub type SolveResult = Result<String, SolveError>;

/// Failure kinds shared by all providers. The `Display` output is what the
/// user sees, so each variant carries the status code and provider message
/// where one exists.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SolveError {
    #[error("Failed to read image {path}: {message}")]
    ImageRead { path: String, message: String },

    #[error("Image upload failed: {0}")]
    Upload(String),

    #[error("Connection error: could not reach the API or receive a response. {0}")]
    Connection(String),

    #[error("Invalid JSON response (status {status}): {body}")]
    InvalidJson { status: u16, body: String },

    #[error("API Error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP Error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Unexpected API response structure ({0}). Try drawing the problem more clearly.")]
    UnexpectedStructure(String),
}

/// Interface the UI shell talks to. One implementation per provider.
pub trait Solver: Send + Sync {
    /// Human readable provider/model label
    fn name(&self) -> String;

    /// Send the image at `image_path` with `prompt` and return the model's answer
    fn solve(&self, image_path: &Path, prompt: &str) -> SolveResult;
}

/// Text to show for a finished solve, success or not.
pub fn display_text(result: &SolveResult) -> String {
    match result {
        Ok(text) if text.trim().is_empty() => "The model returned an empty answer.".to_string(),
        Ok(text) => text.clone(),
        Err(e) => e.to_string(),
    }
}

pub(crate) fn http_client(timeout: Option<Duration>) -> reqwest::Result<Client> {
    let mut builder = Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

/// Run one request and hand back `(status, body)`. Only transport failures
/// are errors here; status handling belongs to the response normalizers.
///
/// The URL is stripped from transport errors since some providers carry the
/// API key in the query string.
pub(crate) fn execute(request: RequestBuilder) -> Result<(u16, String), SolveError> {
    let response = request.send().map_err(|e| {
        let e = e.without_url();
        error!("Request failed: {}", e);
        SolveError::Connection(e.to_string())
    })?;

    let status = response.status().as_u16();
    let body = response.text().map_err(|e| {
        let e = e.without_url();
        error!("Failed to read response body (status {}): {}", status, e);
        SolveError::Connection(e.to_string())
    })?;

    Ok((status, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_text_passes_answers_through() {
        let result: SolveResult = Ok("$$x = 2$$".to_string());
        assert_eq!(display_text(&result), "$$x = 2$$");
    }

    #[test]
    fn display_text_never_returns_empty() {
        let result: SolveResult = Ok("  ".to_string());
        assert!(!display_text(&result).trim().is_empty());
    }

    #[test]
    fn api_errors_name_status_and_message() {
        let result: SolveResult = Err(SolveError::Api {
            status: 429,
            message: "rate limited".to_string(),
        });
        let text = display_text(&result);
        assert!(text.contains("429"));
        assert!(text.contains("rate limited"));
    }

    #[test]
    fn unreachable_host_is_a_connection_error() {
        let client = http_client(Some(Duration::from_secs(5))).unwrap();
        let err = execute(client.get("http://127.0.0.1:1/")).unwrap_err();
        assert!(matches!(err, SolveError::Connection(_)));
        assert!(err.to_string().starts_with("Connection error"));
    }

    #[test]
    fn connection_errors_leave_out_the_query_string() {
        let client = http_client(Some(Duration::from_secs(5))).unwrap();
        let request = client.post("http://127.0.0.1:1/v1beta/models/m:generateContent").query(&[("key", "SECRET-KEY-123")]);

        let err = execute(request).unwrap_err();
        assert!(matches!(err, SolveError::Connection(_)));
        assert!(!err.to_string().contains("SECRET-KEY-123"));
    }
}
