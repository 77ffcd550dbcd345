//! canvass-gateway: WhatsApp Canvass Bot Main Binary
//!
//! Usage:
//!   canvass-gateway                 - Start server mode (WhatsApp webhook)
//!   canvass-gateway --cli [phone]   - Talk to the bot from the terminal
//!   canvass-gateway --metrics       - Print campaign metrics as JSON
//!   canvass-gateway --help          - Show help

mod cli;

use std::sync::Arc;

use cv_core::{Config, ContactManager, ContactRepository};
use cv_whatsapp::WhatsAppBot;
use tracing_subscriber::EnvFilter;

/// Phone used by the console when none is given
const DEFAULT_CLI_PHONE: &str = "570000000000";

/// Run mode
#[derive(Debug, PartialEq, Eq)]
enum RunMode {
    /// Server mode (WhatsApp webhook)
    Server,
    /// Interactive console as the given contact
    Cli(String),
    /// Print the metrics report
    Metrics,
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let mode = parse_args(std::env::args().skip(1));

    match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("canvass-gateway {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    match mode {
        RunMode::Server => {
            let config = Config::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;
            config
                .validate()
                .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;
            run_server(config).await
        }
        RunMode::Cli(phone) => {
            let config =
                Config::load_offline().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;
            tracing::info!("Running in CLI mode as {}", phone);
            cli::run_cli(open_store(&config)?, config.script, phone).await
        }
        RunMode::Metrics => {
            let config =
                Config::load_offline().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;
            let report = open_store(&config)?.metrics().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Parse command line arguments
fn parse_args(args: impl IntoIterator<Item = String>) -> RunMode {
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--cli" | "-c" => {
                let phone = args.next().unwrap_or_else(|| DEFAULT_CLI_PHONE.to_string());
                return RunMode::Cli(phone);
            }
            "--metrics" | "-m" => return RunMode::Metrics,
            "--help" | "-h" => return RunMode::Help,
            "--version" | "-v" => return RunMode::Version,
            _ => {}
        }
    }

    RunMode::Server
}

/// Print help message
fn print_help() {
    println!("canvass-gateway - WhatsApp canvass bot");
    println!();
    println!("Usage:");
    println!("  canvass-gateway                Start server mode (WhatsApp webhook)");
    println!("  canvass-gateway --cli [phone]  Chat with the bot from the terminal");
    println!("  canvass-gateway --metrics      Print campaign metrics as JSON");
    println!("  canvass-gateway --help         Show this help message");
    println!("  canvass-gateway --version      Show version");
    println!();
    println!("Configuration is read from canvass-gateway.toml when present.");
    println!();
    println!("Environment Variables:");
    println!("  WHATSAPP_TOKEN          Cloud API access token (required)");
    println!("  PHONE_NUMBER_ID         Business phone number ID (required)");
    println!("  VERIFY_TOKEN            Webhook verification secret");
    println!("  WHATSAPP_API_VERSION    Graph API version (default: v20.0)");
    println!("  WHATSAPP_BASE_URL       Graph API base URL");
    println!("  SEND_TIMEOUT_SECS       Outbound send timeout (default: 10)");
    println!("  PORT                    Webhook server port (default: 8000)");
    println!("  METRICS_KEY             Bearer key for /metrics (optional)");
    println!("  DB_PATH                 SQLite database path");
    println!("  DISPATCH_MAX_IN_FLIGHT  Concurrent message limit (default: 64)");
    println!("  HANDOFF_AGENT_NUMBERS   Comma-separated advisor numbers");
}

fn open_store(config: &Config) -> anyhow::Result<ContactManager> {
    ContactManager::new(&config.database.path)
        .map_err(|e| anyhow::anyhow!("Failed to open contact store: {}", e))
}

/// Run server mode
async fn run_server(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting canvass-gateway...");
    tracing::info!("Database: {}", config.database.path);

    let repository: Arc<dyn ContactRepository> = Arc::new(open_store(&config)?);

    let bot = WhatsAppBot::new(&config, repository)
        .map_err(|e| anyhow::anyhow!("Failed to create WhatsApp bot: {}", e))?;

    tracing::info!("Webhook server listening on port {}", config.server.port);
    tracing::info!("Press Ctrl+C to exit");

    bot.start(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
        tracing::info!("Shutting down...");
    })
    .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
