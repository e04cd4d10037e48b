// src/ai/mod.rs
pub mod connector;
pub mod encoder;
pub mod gemini;
pub mod gemini_files;
pub mod openai;
pub mod response;

use anyhow::Result;
use std::sync::Arc;

use crate::config::{ProviderKind, SolverConfig};
use connector::Solver;

/// Pick the provider implementation named by the configuration.
pub fn build_solver(config: &SolverConfig) -> Result<Arc<dyn Solver>> {
    let solver: Arc<dyn Solver> = match config.provider {
        ProviderKind::OpenAi => Arc::new(openai::OpenAiSolver::new(config)?),
        ProviderKind::Gemini => Arc::new(gemini::GeminiSolver::new(config)?),
        ProviderKind::GeminiFiles => Arc::new(gemini_files::GeminiFilesSolver::new(config)?),
    };
    Ok(solver)
}
