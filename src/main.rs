// SPDX-License-Identifier: GPL-3.0-only

use camera_preview::backends::camera::types::LensFacing;
use camera_preview::config::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "camera-preview")]
#[command(about = "Camera preview pipeline with an on-demand GPU renderer")]
#[command(version = env!("GIT_VERSION"))]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras and their output sizes
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the preview resolution selected for a viewport
    Select {
        /// Viewport width in pixels
        #[arg(long)]
        width: u32,

        /// Viewport height in pixels
        #[arg(long)]
        height: u32,

        /// Lens facing (back, front, external)
        #[arg(short, long, default_value = "back")]
        facing: LensFacing,
    },

    /// Run the preview headless
    Preview {
        /// Stop after this many new frames (runs until Ctrl+C if omitted)
        #[arg(short = 'n', long)]
        frames: Option<u64>,

        /// Lens facing (overrides the config)
        #[arg(short, long)]
        facing: Option<LensFacing>,

        /// Record draw calls instead of rendering on the GPU
        #[arg(long)]
        no_gpu: bool,

        /// Press the capture button when the preview ends
        #[arg(long)]
        capture: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Initialize logging; RUST_LOG overrides the configured filter
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .with_target(true)
        .with_level(true)
        .init();

    match cli.command {
        Commands::List { json } => cli::list_cameras(&config, json),
        Commands::Select {
            width,
            height,
            facing,
        } => cli::select_resolution(&config, width, height, facing),
        Commands::Preview {
            frames,
            facing,
            no_gpu,
            capture,
        } => cli::preview(config, frames, facing, no_gpu, capture),
    }
}
