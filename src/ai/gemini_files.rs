// src/ai/gemini_files.rs
//! Gemini with the image uploaded to the provider's file storage first.
//!
//! The flow has two network steps: the upload returns an opaque file
//! handle, and a generate call references that handle alongside the
//! prompt. Extraction goes through the same defensive normalizer as the
//! inline variant, so both report failures the same way.

use anyhow::Result;
use log::{error, info};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::path::Path;

use super::connector::{execute, http_client, SolveError, SolveResult, Solver};
use super::encoder::{mime_type_for, read_image};
use super::gemini::{generate_content, Content, FileData, GenerateContentRequest, GenerationConfig, Part};
use super::response::normalize_generate_content;
use crate::config::SolverConfig;

pub struct GeminiFilesSolver {
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
    client: Client,
}

/// Reference to an uploaded image on the provider side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub name: String,
    pub uri: String,
    pub mime_type: String,
}

/// A finished generate call whose reply has not been read yet.
#[derive(Debug)]
pub struct GenerationCall {
    pub file: FileHandle,
    status: u16,
    body: String,
}

/// File part first, then the prompt.
pub fn build_request(file: &FileHandle, prompt: &str, max_tokens: u32) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: "user".to_string(),
            parts: vec![
                Part::FileData(FileData {
                    mime_type: file.mime_type.clone(),
                    file_uri: file.uri.clone(),
                }),
                Part::Text(prompt.to_string()),
            ],
        }],
        generation_config: Some(GenerationConfig { max_output_tokens: max_tokens }),
    }
}

/// Read the handle out of an upload reply (`{"file": {...}}`).
fn parse_upload(status: u16, body: &str, fallback_mime: &str) -> Result<FileHandle, SolveError> {
    let reply: Value = serde_json::from_str(body)
        .map_err(|_| SolveError::Upload(format!("invalid JSON reply (status {}): {}", status, body)))?;

    if !(200..300).contains(&status) {
        let message = reply
            .pointer("/error/message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| body.to_string());
        return Err(SolveError::Upload(format!("status {}: {}", status, message)));
    }

    let file = reply
        .get("file")
        .ok_or_else(|| SolveError::Upload("reply has no file".to_string()))?;
    let uri = file
        .get("uri")
        .and_then(Value::as_str)
        .ok_or_else(|| SolveError::Upload("uploaded file has no uri".to_string()))?;

    Ok(FileHandle {
        name: file.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
        uri: uri.to_string(),
        mime_type: file
            .get("mimeType")
            .and_then(Value::as_str)
            .unwrap_or(fallback_mime)
            .to_string(),
    })
}

impl GeminiFilesSolver {
    pub fn new(config: &SolverConfig) -> Result<Self> {
        info!("Initializing Gemini Files model: {} at {}", config.model, config.base_url);

        Ok(Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            base_url: config.base_url.clone(),
            client: http_client(config.timeout)?,
        })
    }

    /// Send the raw image bytes to the provider's file storage.
    pub fn upload(&self, image_path: &Path) -> Result<FileHandle, SolveError> {
        let bytes = read_image(image_path)?;
        let mime_type = mime_type_for(image_path);
        let url = format!("{}/upload/v1beta/files", self.base_url);
        info!("Uploading {} ({} bytes) to {}", image_path.display(), bytes.len(), url);

        let request = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .header("X-Goog-Upload-Protocol", "raw")
            .header(CONTENT_TYPE, mime_type)
            .body(bytes);

        let (status, body) = execute(request).map_err(|e| match e {
            SolveError::Connection(message) => SolveError::Upload(message),
            other => other,
        })?;

        let handle = parse_upload(status, &body, mime_type)
            .inspect_err(|e| error!("Upload rejected: {}", e))?;
        info!("Uploaded as {} ({})", handle.name, handle.uri);
        Ok(handle)
    }

    /// Upload the image and run the generate call, blocking until the model
    /// has answered.
    pub fn build(&self, image_path: &Path, prompt: &str) -> Result<GenerationCall, SolveError> {
        let file = self.upload(image_path)?;
        let request = build_request(&file, prompt, self.max_tokens);
        let (status, body) = generate_content(&self.client, &self.base_url, &self.model, &self.api_key, &request)?;
        Ok(GenerationCall { file, status, body })
    }

    pub fn extract(&self, call: &GenerationCall) -> SolveResult {
        info!("Reading reply for {} (status {})", call.file.name, call.status);
        normalize_generate_content(call.status, &call.body)
    }
}

impl Solver for GeminiFilesSolver {
    fn name(&self) -> String {
        format!("Gemini Files ({})", self.model)
    }

    fn solve(&self, image_path: &Path, prompt: &str) -> SolveResult {
        let call = self.build(image_path, prompt)?;
        self.extract(&call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderKind;
    use mockito::Matcher;
    use serde_json::json;
    use std::io::Write;

    fn config(base_url: &str) -> SolverConfig {
        SolverConfig {
            provider: ProviderKind::GeminiFiles,
            api_key: "test-key".to_string(),
            model: "gemini-1.5-pro".to_string(),
            max_tokens: 1000,
            base_url: base_url.to_string(),
            timeout: None,
            prompt: "solve".to_string(),
        }
    }

    fn image_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(b"PNG sketch").unwrap();
        file
    }

    const UPLOAD_REPLY: &str = r#"{"file":{"name":"files/abc123","uri":"https://example.test/files/abc123","mimeType":"image/png"}}"#;

    #[test]
    fn request_references_the_uploaded_file() {
        let handle = FileHandle {
            name: "files/abc123".to_string(),
            uri: "https://example.test/files/abc123".to_string(),
            mime_type: "image/png".to_string(),
        };
        let payload = serde_json::to_value(build_request(&handle, "solve it", 256)).unwrap();

        assert_eq!(
            payload,
            json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        {"fileData": {"mimeType": "image/png", "fileUri": "https://example.test/files/abc123"}},
                        {"text": "solve it"}
                    ]
                }],
                "generationConfig": {"maxOutputTokens": 256}
            })
        );
    }

    #[test]
    fn upload_then_generate() {
        let mut server = mockito::Server::new();
        let upload = server
            .mock("POST", "/upload/v1beta/files")
            .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
            .match_header("x-goog-upload-protocol", "raw")
            .match_header("content-type", "image/png")
            .match_body("PNG sketch")
            .with_status(200)
            .with_body(UPLOAD_REPLY)
            .create();
        let generate = server
            .mock("POST", "/v1beta/models/gemini-1.5-pro:generateContent")
            .match_query(Matcher::UrlEncoded("key".into(), "test-key".into()))
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("https://example.test/files/abc123".to_string()),
                Matcher::Regex(r#""maxOutputTokens":1000"#.to_string()),
            ]))
            .with_status(200)
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"x = 7"}]}}]}"#)
            .create();

        let solver = GeminiFilesSolver::new(&config(&server.url())).unwrap();
        let file = image_file();

        let call = solver.build(file.path(), "solve").unwrap();
        assert_eq!(call.file.name, "files/abc123");
        assert_eq!(solver.extract(&call).unwrap(), "x = 7");
        upload.assert();
        generate.assert();
    }

    #[test]
    fn rejected_upload_is_an_upload_error() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/upload/v1beta/files")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"error":{"code":400,"message":"Unsupported MIME type"}}"#)
            .create();
        let generate = server
            .mock("POST", Matcher::Regex("generateContent".to_string()))
            .expect(0)
            .create();

        let solver = GeminiFilesSolver::new(&config(&server.url())).unwrap();
        let file = image_file();

        let err = solver.solve(file.path(), "solve").unwrap_err();
        assert_eq!(err, SolveError::Upload("status 400: Unsupported MIME type".to_string()));
        generate.assert();
    }

    #[test]
    fn unreachable_upload_is_an_upload_error() {
        let solver = GeminiFilesSolver::new(&config("http://127.0.0.1:1")).unwrap();
        let file = image_file();
        assert!(matches!(solver.solve(file.path(), "solve"), Err(SolveError::Upload(_))));
    }

    #[test]
    fn unexpected_generate_reply_is_structural() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/upload/v1beta/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(UPLOAD_REPLY)
            .create();
        server
            .mock("POST", "/v1beta/models/gemini-1.5-pro:generateContent")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"candidates":[]}"#)
            .create();

        let solver = GeminiFilesSolver::new(&config(&server.url())).unwrap();
        let file = image_file();
        assert!(matches!(
            solver.solve(file.path(), "solve"),
            Err(SolveError::UnexpectedStructure(_))
        ));
    }

    #[test]
    fn upload_reply_without_uri() {
        let err = parse_upload(200, r#"{"file":{"name":"files/x"}}"#, "image/png").unwrap_err();
        assert_eq!(err, SolveError::Upload("uploaded file has no uri".to_string()));
    }

    #[test]
    fn upload_reply_mime_falls_back_to_extension() {
        let handle = parse_upload(200, r#"{"file":{"uri":"u"}}"#, "image/jpeg").unwrap();
        assert_eq!(handle.mime_type, "image/jpeg");
        assert_eq!(handle.name, "");
    }
}
