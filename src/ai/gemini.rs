// src/ai/gemini.rs
use anyhow::Result;
use log::info;
use reqwest::blocking::Client;
use serde::Serialize;
use std::path::Path;

use super::connector::{execute, http_client, SolveError, SolveResult, Solver};
use super::encoder::{encode_image, EncodedImage};
use super::response::normalize_generate_content;
use crate::config::SolverConfig;

//Implementation for Gemini generateContent with the image inlined as base64
pub struct GeminiSolver {
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Part {
    Text(String),
    InlineData(Blob),
    FileData(FileData),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub mime_type: String,
    pub file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub max_output_tokens: u32,
}

/// Prompt first, then the image.
pub fn build_payload(image: &EncodedImage, prompt: &str, max_tokens: u32) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: "user".to_string(),
            parts: vec![
                Part::Text(prompt.to_string()),
                Part::InlineData(Blob {
                    mime_type: image.mime_type.to_string(),
                    data: image.data.clone(),
                }),
            ],
        }],
        generation_config: Some(GenerationConfig { max_output_tokens: max_tokens }),
    }
}

/// POST a generateContent request. The key travels as a query parameter.
pub(crate) fn generate_content(
    client: &Client,
    base_url: &str,
    model: &str,
    api_key: &str,
    request: &GenerateContentRequest,
) -> Result<(u16, String), SolveError> {
    let url = format!("{}/v1beta/models/{}:generateContent", base_url, model);
    info!("Sending request to {}", url);

    let (status, body) = execute(client.post(&url).query(&[("key", api_key)]).json(request))?;
    info!("Gemini responded with status {}", status);
    Ok((status, body))
}

impl GeminiSolver {
    pub fn new(config: &SolverConfig) -> Result<Self> {
        info!("Initializing Gemini model: {} at {}", config.model, config.base_url);

        Ok(Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            base_url: config.base_url.clone(),
            client: http_client(config.timeout)?,
        })
    }

    pub fn send(&self, request: &GenerateContentRequest) -> SolveResult {
        let (status, body) = generate_content(&self.client, &self.base_url, &self.model, &self.api_key, request)?;
        normalize_generate_content(status, &body)
    }
}

impl Solver for GeminiSolver {
    fn name(&self) -> String {
        format!("Gemini ({})", self.model)
    }

    fn solve(&self, image_path: &Path, prompt: &str) -> SolveResult {
        let image = encode_image(image_path)?;
        let request = build_payload(&image, prompt, self.max_tokens);
        self.send(&request)
    }
}
