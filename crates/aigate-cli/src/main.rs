//! aigate CLI: entry point.
//!
//! # Commands
//!
//! - `aigate ask [-m MESSAGE]`: ask through the gateway (single-shot or REPL)
//! - `aigate status`: show credentials, chains, and grounding sources
//! - `aigate check-url <URL>`: run a URL through the SSRF gate
//! - `aigate onboard`: write the default config

mod check_url;
mod helpers;
mod onboard;
mod repl;
mod status;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use aigate_core::config::load_config;
use aigate_core::types::TaskType;
use aigate_gateway::{AskRequest, Gateway};

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// aigate: multi-provider AI gateway with credential rotation and fallback
#[derive(Parser)]
#[command(name = "aigate", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a question (single-shot or interactive REPL)
    Ask {
        /// Single message (non-interactive). Omit for REPL mode.
        #[arg(short, long)]
        message: Option<String>,

        #[command(flatten)]
        options: AskOptions,

        /// Print the response as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Show credentials, chains, and grounding status
    Status,

    /// Check whether a URL passes the SSRF gate
    CheckUrl {
        /// URL to check
        url: String,
    },

    /// Write the default configuration
    Onboard,
}

/// Per-request options shared by single-shot and REPL mode.
#[derive(Args, Clone, Debug)]
pub struct AskOptions {
    /// Task type: chat, analysis, title, or vision
    #[arg(short, long, default_value = "chat")]
    pub task: TaskType,

    /// System instruction sent before the conversation
    #[arg(short, long)]
    pub instruction: Option<String>,

    /// Image to attach: an http(s) URL or a local file path
    #[arg(long)]
    pub image: Option<String>,

    /// Fall back to web search when internal content has nothing
    #[arg(long, default_value_t = false)]
    pub web: bool,

    /// Skip grounding entirely
    #[arg(long, default_value_t = false)]
    pub no_grounding: bool,
}

impl AskOptions {
    /// Apply these options to a request.
    pub fn apply(&self, mut request: AskRequest) -> Result<AskRequest> {
        request = request
            .with_task(self.task)
            .with_web_grounding(self.web);
        if let Some(instruction) = &self.instruction {
            request = request.with_instruction(instruction);
        }
        if let Some(image) = &self.image {
            request = request.with_image(helpers::image_source(image)?);
        }
        if self.no_grounding {
            request = request.without_grounding();
        }
        Ok(request)
    }
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Ask {
            message,
            options,
            json,
            logs,
        } => {
            init_logging(logs);
            run_ask(message, options, json).await
        }
        Commands::Status => status::run(),
        Commands::CheckUrl { url } => check_url::run(&url),
        Commands::Onboard => onboard::run(),
    }
}

// ─────────────────────────────────────────────
// Ask command
// ─────────────────────────────────────────────

async fn run_ask(message: Option<String>, options: AskOptions, json: bool) -> Result<()> {
    let config = load_config(None);
    let gateway = Gateway::from_config(&config).context("failed to build gateway")?;

    match message {
        Some(msg) => {
            info!(task = options.task.as_str(), "single-shot request");
            let request = options.apply(AskRequest::question(msg))?;

            // Ctrl-C abandons the in-flight attempt.
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_signal.cancel();
                }
            });

            let response = gateway.ask_with_cancel(request, &cancel).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                helpers::print_response(&response);
            }
            if !response.success {
                std::process::exit(1);
            }
        }
        None => {
            repl::run(&gateway, &options).await?;
        }
    }

    Ok(())
}

/// Initialize tracing/logging.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("aigate=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
