//! Medicat CLI - medicine catalog client

mod commands;
mod config;
mod logging;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use commands::{Commands, Context, TerminalNavigator};
use medicat_core::{FileStore, SessionContext};
use medicat_http::CatalogClient;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{Level, debug, error};

#[derive(Parser)]
#[command(name = "medicat")]
#[command(about = "Browse and administer the medicine catalog")]
#[command(version)]
struct Cli {
    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn")]
    log_level: LogLevel,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// State directory holding credentials and configuration
    #[arg(short = 'd', long, global = true)]
    data_dir: Option<PathBuf>,

    /// Configuration file (defaults to <data dir>/medicat.toml)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Request timeout in seconds, overriding the configuration (0 = no timeout)
    #[arg(short = 't', long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logging(cli.log_level.into(), cli.log_json)?;

    match run(cli).await {
        Ok(()) => {
            debug!("Command completed successfully");
        }
        Err(e) => {
            error!("Command failed: {e:#}");
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let state_dir = config::state_dir(cli.data_dir);
    let mut settings = config::CliConfig::load(cli.config.as_deref(), &state_dir)?;
    if let Some(timeout) = cli.timeout {
        settings.timeout_secs = timeout;
    }
    debug!(state_dir = %state_dir.display(), base_url = %settings.base_url, "Loaded configuration");

    let credentials_path = config::credentials_path(&state_dir);
    let session = SessionContext::new(Arc::new(FileStore::new(&credentials_path)));

    let mut builder = CatalogClient::builder()
        .base_url(&settings.base_url)
        .login_path(&settings.login_path)
        .refresh_path(&settings.refresh_path)
        .logout_path(&settings.logout_path)
        .session(session.clone())
        .navigator(Arc::new(TerminalNavigator));
    if let Some(timeout) = settings.timeout() {
        builder = builder.timeout(timeout);
    }

    let ctx = Context {
        client: builder.build()?,
        session,
        credentials_path,
    };

    cli.command.execute(&ctx).await
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(log_level: LogLevel) -> Self {
        match log_level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}
