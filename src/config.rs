// src/config.rs
use clap::ValueEnum;
use log::{debug, info, warn};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MAX_TOKENS: u32 = 1000;

pub const DEFAULT_PROMPT: &str = "Solve the math problem drawn in this image. \
Give only the most concise final answer and the most important calculation steps. \
Format the output strictly as Markdown, and use LaTeX wrapped in $$ for all equations.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// OpenAI Chat Completions with an inline data URI
    #[value(name = "openai")]
    OpenAi,
    /// Gemini generateContent with inline base64 data
    #[value(name = "gemini")]
    Gemini,
    /// Gemini with the image uploaded through the Files API first
    #[value(name = "gemini-files")]
    GeminiFiles,
}

impl ProviderKind {
    pub fn api_key_var(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Gemini | ProviderKind::GeminiFiles => "GEMINI_API_KEY",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Gemini => "gemini-2.5-flash-preview-09-2025",
            ProviderKind::GeminiFiles => "gemini-1.5-pro",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Gemini | ProviderKind::GeminiFiles => "https://generativelanguage.googleapis.com",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::GeminiFiles => "gemini-files",
        };
        f.write_str(name)
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} not found. Set the environment variable or create a .env file")]
    MissingApiKey { var: &'static str },

    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },
}

/// Values given on the command line; they win over the environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub prompt: Option<String>,
}

/// Everything a provider needs, built once at startup and passed in.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    pub provider: ProviderKind,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub base_url: String,
    /// `None` keeps the HTTP client's own default
    pub timeout: Option<Duration>,
    pub prompt: String,
}

impl SolverConfig {
    /// Build from the process environment (after `.env` has been loaded).
    pub fn load(overrides: &Overrides) -> Result<Self, ConfigError> {
        Self::from_lookup(overrides, |var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(overrides: &Overrides, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| {
            lookup(var)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let provider = match overrides.provider {
            Some(provider) => provider,
            None => match get("CALCSKETCH_PROVIDER") {
                Some(value) => value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue { var: "CALCSKETCH_PROVIDER", value })?,
                None => ProviderKind::Gemini,
            },
        };

        let key_var = provider.api_key_var();
        let api_key = get(key_var).ok_or(ConfigError::MissingApiKey { var: key_var })?;

        let max_tokens = match overrides.max_tokens {
            Some(max_tokens) => max_tokens,
            None => match get("CALCSKETCH_MAX_TOKENS") {
                Some(value) => value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue { var: "CALCSKETCH_MAX_TOKENS", value })?,
                None => DEFAULT_MAX_TOKENS,
            },
        };

        let timeout = match get("CALCSKETCH_TIMEOUT_SECS") {
            Some(value) => Some(Duration::from_secs(
                value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue { var: "CALCSKETCH_TIMEOUT_SECS", value })?,
            )),
            None => None,
        };

        let model = overrides
            .model
            .clone()
            .or_else(|| get("CALCSKETCH_MODEL"))
            .unwrap_or_else(|| provider.default_model().to_string());

        let base_url = get("CALCSKETCH_BASE_URL")
            .unwrap_or_else(|| provider.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string();

        let prompt = overrides
            .prompt
            .clone()
            .or_else(|| get("CALCSKETCH_PROMPT"))
            .unwrap_or_else(|| DEFAULT_PROMPT.to_string());

        debug!("Resolved provider {} with model {} at {}", provider, model, base_url);

        Ok(Self {
            provider,
            api_key,
            model,
            max_tokens,
            base_url,
            timeout,
            prompt,
        })
    }
}

/// Load `.env` from the working directory if there is one.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => debug!("No .env file found"),
        Err(e) => warn!("Failed to load .env file: {}", e),
    }
}
