//! Connector runtime CLI — the main entry point.
//!
//! Commands:
//! - `gateway`        — Start the HTTP execution gateway
//! - `execute`        — Run a single connector operation
//! - `test-connection`— Probe a connector's credentials
//! - `audit`          — Tail the audit trail
//! - `budget`         — Inspect the budget ledger
//! - `config`         — Configuration management
//! - `status`         — Show resolved runtime configuration
//! - `doctor`         — Diagnose configuration health
//! - `completions`    — Generate shell completions

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

mod commands;

use commands::{DEFAULT_CONFIG_PATH, DEFAULT_DEFINITIONS_DIR};

#[derive(Parser)]
#[command(
    name = "connectorrt",
    about = "Connector execution runtime — a secure, rate-limited HTTP bridge for calling third-party APIs on behalf of tenants",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the runtime config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Directory of connector definition JSON files
    #[arg(long, global = true, default_value = DEFAULT_DEFINITIONS_DIR)]
    definitions: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP execution gateway
    Gateway {
        /// Override the listen port
        #[arg(short, long)]
        port: Option<u16>,
        /// Override the listen host
        #[arg(long)]
        host: Option<String>,
    },

    /// Run a single connector operation and print the result
    Execute {
        /// Connector id (e.g. "slack")
        app_id: String,
        /// Operation id within the connector
        function_id: String,
        /// JSON object of operation parameters
        #[arg(short = 'P', long)]
        parameters: Option<String>,
        /// JSON object of credential fields
        #[arg(long)]
        credentials: Option<String>,
        /// Organization id for rate limiting, budgets, and audit attribution
        #[arg(short, long)]
        organization_id: Option<String>,
    },

    /// Probe a connector's credentials without running a full operation
    TestConnection {
        /// Connector id (e.g. "slack")
        app_id: String,
        /// JSON object of credential fields
        #[arg(long)]
        credentials: Option<String>,
        /// Organization id for rate limiting and audit attribution
        #[arg(short, long)]
        organization_id: Option<String>,
    },

    /// Tail the append-only audit trail
    Audit {
        /// Number of recent entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },

    /// Inspect the budget ledger
    Budget {
        #[command(subcommand)]
        action: BudgetAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show resolved runtime configuration and connector inventory
    Status,

    /// Diagnose configuration and environment health
    Doctor,

    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Show detailed version info
    Version,
}

#[derive(Subcommand)]
enum BudgetAction {
    /// Check whether a hypothetical call would be allowed right now
    Status {
        #[arg(short, long)]
        organization_id: Option<String>,
        #[arg(short, long)]
        user_id: Option<String>,
        #[arg(short, long)]
        workflow_id: Option<String>,
        /// Estimated cost in USD of the call being evaluated
        #[arg(short, long, default_value = "0.0")]
        estimate_usd: f64,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate the config file
    Validate,
    /// Print the resolved config as TOML
    Show,
    /// Print the config file path
    Path,
    /// Write a default config file
    Init,
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Gateway { port, host } => {
            commands::gateway::run(&cli.config, port, host, Some(cli.definitions)).await?
        }

        Commands::Execute { app_id, function_id, parameters, credentials, organization_id } => {
            commands::execute::run(
                &cli.config,
                &cli.definitions,
                &app_id,
                &function_id,
                parameters.as_deref(),
                credentials.as_deref(),
                organization_id.as_deref(),
            )
            .await?
        }

        Commands::TestConnection { app_id, credentials, organization_id } => {
            commands::test_connection::run(
                &cli.config,
                &cli.definitions,
                &app_id,
                credentials.as_deref(),
                organization_id.as_deref(),
            )
            .await?
        }

        Commands::Audit { limit } => commands::audit::run(&cli.config, limit).await?,

        Commands::Budget { action } => match action {
            BudgetAction::Status { organization_id, user_id, workflow_id, estimate_usd } => {
                commands::budget::status(
                    &cli.config,
                    organization_id.as_deref(),
                    user_id.as_deref(),
                    workflow_id.as_deref(),
                    estimate_usd,
                )
                .await?
            }
        },

        Commands::Config { action } => match action {
            ConfigAction::Validate => commands::config_cmd::validate(&cli.config).await?,
            ConfigAction::Show => commands::config_cmd::show(&cli.config).await?,
            ConfigAction::Path => commands::config_cmd::path(&cli.config).await?,
            ConfigAction::Init => commands::config_cmd::init(&cli.config).await?,
        },

        Commands::Status => commands::status::run(&cli.config, &cli.definitions).await?,
        Commands::Doctor => commands::doctor::run(&cli.config, &cli.definitions).await?,

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut std::io::stdout());
        }

        Commands::Version => {
            println!("connectorrt v{}", env!("CARGO_PKG_VERSION"));
            println!("  arch: {}", std::env::consts::ARCH);
            println!("  os:   {}", std::env::consts::OS);
        }
    }

    Ok(())
}
