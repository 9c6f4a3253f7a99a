//! ca-webservices: CA support services.
//!
//! This is the application entry point. It loads `.env`, parses the command
//! line, reads the optional TOML configuration file, initializes tracing, and
//! starts the listener selected by the subcommand.

use std::path::PathBuf;
use std::process::ExitCode;

use axum_server::Handle;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ca_webservices::config::{
    AppConfig, DistributionSettings, LogFormat, VerifySettings, DEFAULT_LOG_FILTER,
};
use ca_webservices::http::{DistributionServer, VerificationServer};
use ca_webservices::tls::TrustConfiguration;
use ca_webservices::Error;

/// Mutual-TLS diagnostics and CRL/AIA distribution for a private CA
#[derive(Parser, Debug)]
#[command(name = "ca-webservices", version, about)]
struct Args {
    /// Path to an optional TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level filter (e.g., "ca_webservices=debug")
    #[arg(short, long)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTPS client certificate test server
    Verify(VerifySettings),
    /// Run the HTTP server publishing CRL and AIA files
    Distribute(DistributionSettings),
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();

    // Parse command line arguments after .env so it can supply env defaults
    let args = Args::parse();

    let file_config = match &args.config {
        Some(path) => match AppConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        },
        None => AppConfig::default(),
    };

    init_tracing(
        args.log_level.clone(),
        args.log_format.unwrap_or(file_config.logging.format),
    );

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded environment file");
    }

    match run(args.command, file_config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Server stopped");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing with priority: CLI > env > default
fn init_tracing(log_level: Option<String>, format: LogFormat) {
    let log_filter = log_level
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

    let registry =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(&log_filter));

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

async fn run(command: Command, file_config: AppConfig) -> Result<(), Error> {
    match command {
        Command::Verify(cli) => {
            let config = cli.merge(file_config.verify).resolve()?;
            let trust = TrustConfiguration::load(&config)?;
            let server = VerificationServer::new(&trust, config.addr)?;

            tracing::info!(
                url = %format!("https://{}", server.addr()),
                mutual = config.require_client_cert,
                "Starting HTTPS test server"
            );
            server.serve(Handle::new()).await?;
        }
        Command::Distribute(cli) => {
            let config = cli.merge(file_config.distribution).resolve()?;
            let server = DistributionServer::new(&config.endpoints, config.routes(), config.host)?;
            server.serve(Handle::new()).await?;
        }
    }
    Ok(())
}
