//! Matte CLI: place a foreground over a background and export the result.
//!
//! Usage:
//!   matte edit [OPTIONS]     Start an interactive compositing session
//!   matte info <IMAGE>       Show image and preview geometry information
//!   matte config [--init]    Show or initialize the configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use matte_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "matte",
    about = "Interactive two-layer image compositor with mask export",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the standard location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive compositing session
    Edit {
        /// Background image to load on start
        #[arg(short, long)]
        background: Option<PathBuf>,

        /// Foreground image to load on start
        #[arg(short, long)]
        foreground: Option<PathBuf>,

        /// Composite format: png|jpg
        #[arg(long)]
        format: Option<String>,

        /// Directory exports are written to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show image and preview geometry information
    Info {
        /// Path to the image
        path: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    matte_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Edit {
            background,
            foreground,
            format,
            output,
        } => commands::edit::run(config, background, foreground, format, output).await,
        Commands::Info { path, json } => commands::info::run(&config, path, json).await,
        Commands::Config { init } => commands::config::run(&config, cli.config, init),
    }
}
