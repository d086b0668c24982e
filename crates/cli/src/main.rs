//! VicAgent CLI — the main entry point.
//!
//! Commands:
//! - `chat`     — Interactive chat or single-message mode
//! - `serve`    — Start the browser front-end
//! - `models`   — List the model options
//! - `classify` — Route recorded fragments into answer and thinking
//! - `config`   — Create or inspect the config file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "vicagent",
    about = "VicAgent — a tool-using Claude agent with a visible thinking trace",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent in the terminal
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,

        /// Model option to use, e.g. "Sonnet 3.5:2.0"
        #[arg(long)]
        model: Option<String>,

        /// Disable extended thinking
        #[arg(long)]
        no_thinking: bool,
    },

    /// Start the browser front-end
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List the available model options
    Models,

    /// Classify JSON Lines fragments (stdin when FILE is absent)
    Classify { file: Option<PathBuf> },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default config file if none exists
    Init,
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat {
            message,
            model,
            no_thinking,
        } => commands::chat::run(message, model, no_thinking).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Models => commands::models::run()?,
        Commands::Classify { file } => commands::classify::run(file)?,
        Commands::Config { action } => match action {
            ConfigAction::Init => commands::config_cmd::init()?,
            ConfigAction::Show => commands::config_cmd::show()?,
            ConfigAction::Path => commands::config_cmd::path()?,
        },
    }

    Ok(())
}
