// src/ai/openai.rs
use anyhow::Result;
use log::info;
use reqwest::blocking::Client;
use serde::Serialize;
use std::path::Path;

use super::connector::{execute, http_client, SolveResult, Solver};
use super::encoder::{encode_image, EncodedImage};
use super::response::normalize_chat_completion;
use crate::config::SolverConfig;

//Implementation for the OpenAI Chat Completions API
pub struct OpenAiSolver {
    api_key: String,
    model: String,
    max_tokens: u32,
    base_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// One user message: the prompt text, then the image as a data URI.
pub fn build_payload(image: &EncodedImage, prompt: &str, model: &str, max_tokens: u32) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: vec![
                ContentPart::Text { text: prompt.to_string() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: image.data_uri() },
                },
            ],
        }],
        max_tokens,
    }
}

impl OpenAiSolver {
    pub fn new(config: &SolverConfig) -> Result<Self> {
        info!("Initializing OpenAI model: {} at {}", config.model, config.base_url);

        Ok(Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            base_url: config.base_url.clone(),
            client: http_client(config.timeout)?,
        })
    }

    pub fn send(&self, request: &ChatRequest) -> SolveResult {
        let url = format!("{}/chat/completions", self.base_url);
        info!("Sending request to {}", url);

        let (status, body) = execute(
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(request),
        )?;
        info!("OpenAI responded with status {}", status);

        normalize_chat_completion(status, &body)
    }
}

impl Solver for OpenAiSolver {
    fn name(&self) -> String {
        format!("OpenAI ({})", self.model)
    }

    fn solve(&self, image_path: &Path, prompt: &str) -> SolveResult {
        let image = encode_image(image_path)?;
        let request = build_payload(&image, prompt, &self.model, self.max_tokens);
        self.send(&request)
    }
}
