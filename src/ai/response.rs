// src/ai/response.rs
//! Turning provider replies into a single answer string.
//!
//! Replies are parsed into a generic `serde_json::Value` and walked with
//! explicit presence checks instead of being deserialized into a fixed
//! schema: the shape differs between model versions, and a missing field
//! must turn into a readable error rather than a crash.
//!
//! Both normalizers take the raw `(status, body)` pair so they can be
//! exercised without a network.

use log::{error, warn};
use serde_json::Value;

use super::connector::{SolveError, SolveResult};

/// Normalize a Chat-Completions style reply (`choices[0].message.content`).
pub fn normalize_chat_completion(status: u16, body: &str) -> SolveResult {
    let result = parse_checked(status, body)?;

    let choices = match result.get("choices").and_then(Value::as_array) {
        Some(choices) if !choices.is_empty() => choices,
        _ => {
            error!("No 'choices' in response: {}", result);
            return Err(missing_field(status, &result, "no choices".to_string()));
        }
    };
    if choices.len() > 1 {
        warn!("Response carried {} choices, using the first", choices.len());
    }
    let first = &choices[0];

    match first.get("message") {
        Some(message) if message.is_object() => match message.get("content") {
            Some(Value::String(text)) => Ok(text.clone()),
            Some(Value::Array(blocks)) => Ok(join_blocks(blocks)),
            Some(Value::Null) | None => Err(SolveError::UnexpectedStructure(
                "message has no content".to_string(),
            )),
            Some(other) => Ok(other.to_string()),
        },
        // legacy completions put the text directly on the choice
        _ => match first.get("text").and_then(Value::as_str) {
            Some(text) => Ok(text.to_string()),
            None => {
                error!("First choice has neither message nor text: {}", first);
                Err(SolveError::UnexpectedStructure(
                    "first choice has neither message nor text".to_string(),
                ))
            }
        },
    }
}

/// Normalize a `generateContent` reply (`candidates[0].content.parts[0].text`).
pub fn normalize_generate_content(status: u16, body: &str) -> SolveResult {
    let result = parse_checked(status, body)?;

    let candidates = match result.get("candidates").and_then(Value::as_array) {
        Some(candidates) if !candidates.is_empty() => candidates,
        _ => {
            error!("No 'candidates' in response: {}", result);
            let detail = match result.pointer("/promptFeedback/blockReason").and_then(Value::as_str) {
                Some(reason) => format!("no candidates, prompt blocked: {}", reason),
                None => "no candidates".to_string(),
            };
            return Err(missing_field(status, &result, detail));
        }
    };
    if candidates.len() > 1 {
        warn!("Response carried {} candidates, using the first", candidates.len());
    }

    let parts = candidates[0]
        .get("content")
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            let reason = candidates[0].get("finishReason").and_then(Value::as_str).unwrap_or("unknown");
            error!("First candidate has no content parts (finishReason: {})", reason);
            SolveError::UnexpectedStructure(format!("candidate has no content parts, finish reason: {}", reason))
        })?;

    parts
        .first()
        .and_then(|part| part.get("text"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            error!("First part has no text: {:?}", parts.first());
            SolveError::UnexpectedStructure("first part has no text".to_string())
        })
}

/// Parse the body and map error-shaped replies. What comes back is a JSON
/// object from a successful call.
fn parse_checked(status: u16, body: &str) -> Result<Value, SolveError> {
    let result: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => {
            error!("Non-JSON response (status {}): {}", status, body);
            return Err(SolveError::InvalidJson { status, body: body.to_string() });
        }
    };

    if !(200..300).contains(&status) {
        return Err(match result.get("error") {
            Some(err) => {
                let message = error_message(err);
                error!("API error {}: {}", status, message);
                SolveError::Api { status, message }
            }
            None => {
                error!("HTTP error {}: {}", status, body);
                SolveError::Http { status, body: body.to_string() }
            }
        });
    }

    if !result.is_object() {
        error!("Unexpected response type: {}", result);
        return Err(SolveError::UnexpectedStructure(format!("expected a JSON object, got {}", result)));
    }

    Ok(result)
}

/// A successful status whose reply lacks the answer list. An embedded
/// `error` still wins; otherwise the status and the whole reply go into the
/// message.
fn missing_field(status: u16, result: &Value, detail: String) -> SolveError {
    match result.get("error") {
        Some(err) => SolveError::Api { status, message: error_message(err) },
        None => SolveError::UnexpectedStructure(format!("{}, status {}: {}", detail, status, result)),
    }
}

fn error_message(err: &Value) -> String {
    match err {
        Value::String(message) => message.clone(),
        Value::Object(fields) => match fields.get("message").and_then(Value::as_str) {
            Some(message) => message.to_string(),
            None => err.to_string(),
        },
        other => other.to_string(),
    }
}

/// Content blocks are concatenated in order with no separator. Blocks
/// without a `text` field are included as their JSON text.
fn join_blocks(blocks: &[Value]) -> String {
    blocks
        .iter()
        .map(|block| match block.get("text") {
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
            None => match block {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            },
        })
        .collect()
}
