// ============================================
// File: crates/nodepulse-agent/src/main.rs
// ============================================
//! # Nodepulse Entry Point
//!
//! ## Creation Reason
//! Main entry point for the nodepulse keep-alive agent binary.
//! Handles CLI parsing, logging setup, and agent startup.
//!
//! ## Main Functionality
//! - CLI argument parsing with clap
//! - Logging initialization with tracing
//! - Configuration loading and validation
//! - Agent execution until Ctrl+C
//!
//! ## Usage
//! ```bash
//! # Run every configured node
//! nodepulse start --config nodepulse.toml
//!
//! # Force proxy mode on or off for this run
//! nodepulse start --config nodepulse.toml --proxy
//! nodepulse start --config nodepulse.toml --no-proxy
//!
//! # Other commands
//! nodepulse validate --config nodepulse.toml   # Check config file
//! nodepulse nodes --config nodepulse.toml      # List configured nodes
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `RUST_LOG` wins over `logging.level`
//! - Panics are routed through tracing before the default hook runs
//!
//! ## Last Modified
//! v0.1.0 - Initial CLI implementation

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nodepulse_agent::{Agent, AgentConfig, AgentError};
use nodepulse_transport::ReqwestTransport;

// ============================================
// CLI Definition
// ============================================

/// Nodepulse multi-account node keep-alive agent
#[derive(Parser, Debug)]
#[command(name = "nodepulse")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start keeping every configured node alive
    Start {
        /// Path to configuration file
        #[arg(short, long, default_value = "nodepulse.toml")]
        config: PathBuf,

        #[command(flatten)]
        proxy: ProxyFlags,
    },

    /// Validate configuration file
    Validate {
        /// Path to configuration file
        #[arg(short, long, default_value = "nodepulse.toml")]
        config: PathBuf,
    },

    /// List configured nodes
    Nodes {
        /// Path to configuration file
        #[arg(short, long, default_value = "nodepulse.toml")]
        config: PathBuf,
    },
}

#[derive(Args, Debug)]
#[group(multiple = false)]
struct ProxyFlags {
    /// Route all calls through each node's proxy
    #[arg(long)]
    proxy: bool,

    /// Connect directly, ignoring configured proxies
    #[arg(long)]
    no_proxy: bool,
}

impl ProxyFlags {
    fn override_value(&self) -> Option<bool> {
        match (self.proxy, self.no_proxy) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

// ============================================
// Main
// ============================================

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // `start` initializes logging once its config level is known.
    if !matches!(cli.command, Commands::Start { .. }) {
        init_logging("info");
    }
    install_panic_hook();

    let result = match cli.command {
        Commands::Start { config, proxy } => cmd_start(config, proxy.override_value()).await,
        Commands::Validate { config } => cmd_validate(config).await,
        Commands::Nodes { config } => cmd_nodes(config).await,
    };

    if let Err(e) = result {
        init_logging("info");
        error!("{:#}", e);
        if e
            .downcast_ref::<AgentError>()
            .is_some_and(AgentError::is_config_error)
        {
            eprintln!();
            eprintln!("Check the file with: nodepulse validate --config <path>");
        }
        std::process::exit(1);
    }
}

// ============================================
// Commands
// ============================================

/// Starts the agent.
async fn cmd_start(config_path: PathBuf, proxy_override: Option<bool>) -> anyhow::Result<()> {
    let mut config = AgentConfig::load(&config_path).await?;

    if let Some(enabled) = proxy_override {
        config.proxy.enabled = enabled;
        config.validate()?;
    }

    init_logging(&config.logging.level);

    info!("════════════════════════════════════════");
    info!("Accounts:   {}", config.accounts.len());
    info!("Nodes:      {}", config.node_count());
    info!("Proxy mode: {}", if config.proxy.enabled { "on" } else { "off" });
    info!("════════════════════════════════════════");

    let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(
        config.api.request_timeout_secs,
    )));
    let agent = Agent::new(&config, transport);
    agent.run().await?;

    Ok(())
}

/// Validates configuration file.
async fn cmd_validate(config_path: PathBuf) -> anyhow::Result<()> {
    let config = AgentConfig::load(&config_path).await?;

    println!("✅ Configuration is valid");
    println!();
    println!("API:");
    println!("   Base URL:      {}", config.api.base_url);
    println!("   IP Service:    {}", config.api.ip_service_url);
    println!("   Timeout:       {}s", config.api.request_timeout_secs);
    println!();
    println!("Timing:");
    println!("   Ping Interval:   {}s", config.timing.ping_interval_secs);
    println!("   Restart Delay:   {}s", config.timing.restart_delay_secs);
    println!("   Process Restart: {}s", config.timing.process_restart_delay_secs);
    println!("   Max Ping Errors: {}", config.timing.max_ping_errors);
    println!();
    println!("Accounts:");
    println!("   Accounts:   {}", config.accounts.len());
    println!("   Nodes:      {}", config.node_count());
    println!("   Proxy mode: {}", if config.proxy.enabled { "on" } else { "off" });
    println!();

    Ok(())
}

/// Lists every configured node with its masked token.
async fn cmd_nodes(config_path: PathBuf) -> anyhow::Result<()> {
    let config = AgentConfig::load(&config_path).await?;

    println!();
    println!("{:<4} {:<48} {:<10} PROXY", "#", "NODE ID", "TOKEN");
    println!("════════════════════════════════════════════════════════════════════════");

    let mut index = 1;
    for account in &config.accounts {
        for node in &account.nodes {
            println!(
                "{:<4} {:<48} {:<10} {}",
                index,
                node.node_id.as_str(),
                account.token.masked(),
                node.proxy.as_deref().unwrap_or("-"),
            );
            index += 1;
        }
    }
    println!();

    Ok(())
}

// ============================================
// Helper Functions
// ============================================

/// Initializes the tracing subscriber. Later calls are no-ops.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}

/// Logs panics through tracing, then defers to the default hook.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        error!("Uncaught panic: {}", panic_info);
        default_hook(panic_info);
    }));
}
