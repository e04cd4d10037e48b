// src/main.rs
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::PathBuf;

use crate::ai::connector::display_text;
use crate::config::{Overrides, ProviderKind, SolverConfig};

mod ai;
mod config;
mod gui;
mod sketch;

#[derive(Parser)]
#[command(name = "calcsketch")]
#[command(about = "Sketch a math problem and get a step-by-step solution from a vision model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Model provider (default: $CALCSKETCH_PROVIDER or gemini)
    #[arg(long, short = 'p', value_enum, global = true)]
    provider: Option<ProviderKind>,

    /// Model name (default depends on the provider)
    #[arg(long, short = 'm', global = true)]
    model: Option<String>,

    /// Maximum length of the answer in tokens
    #[arg(long, global = true)]
    max_tokens: Option<u32>,

    /// Instruction sent along with the image
    #[arg(long, global = true)]
    prompt: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the drawing canvas (default)
    Gui {
        /// Where the sketch is written before each solve
        #[arg(long, default_value = "canvas.png")]
        canvas_path: PathBuf,
    },
    /// Solve an existing image file and print the answer
    Solve {
        /// Image of a handwritten math problem
        image: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init_from_env(
        env_logger::Env::default().filter_or("RUST_LOG", "info")
    );

    config::load_dotenv();
    let cli = Cli::parse();

    let overrides = Overrides {
        provider: cli.provider,
        model: cli.model,
        max_tokens: cli.max_tokens,
        prompt: cli.prompt,
    };
    let config = match SolverConfig::load(&overrides) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    match cli.command.unwrap_or(Commands::Gui { canvas_path: PathBuf::from("canvas.png") }) {
        Commands::Gui { canvas_path } => {
            let solver = ai::build_solver(&config)?;
            gui::run_gui(solver, config.prompt, canvas_path)
        }
        Commands::Solve { image } => {
            let solver = ai::build_solver(&config)?;
            info!("Solving {} with {}", image.display(), solver.name());

            let result = solver.solve(&image, &config.prompt);
            if result.is_err() {
                eprintln!("{}", display_text(&result));
                std::process::exit(1);
            }
            println!("{}", display_text(&result));
            Ok(())
        }
    }
}
