//! Caritas token verifier
//!
//! Loads the identity provider settings from the environment, verifies one
//! bearer token and prints its claims as JSON on stdout. Logs go to stderr.
//!
//! ```text
//! AUTH0_DOMAIN=example.auth AUTH0_API_IDENTIFIER=my-api \
//!     caritas-verify --token "Bearer eyJ0eXAi..."
//! ```

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use caritas_auth::{AuthError, AuthGuard, TokenVerifier, VerifierConfig};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Verify a Caritas bearer token against the configured identity provider
#[derive(Parser, Debug)]
#[command(name = "caritas-verify", version)]
struct Cli {
    /// Token to verify, with or without the `Bearer ` prefix
    #[arg(long, short = 't', env = "CARITAS_TOKEN")]
    token: Option<String>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(cli: &Cli) -> io::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let subscriber = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    } else {
        subscriber
            .with(fmt::layer().with_writer(io::stderr))
            .try_init()
            .map_err(|e| io::Error::other(e.to_string()))
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    // Refuse to start without a usable identity provider configuration
    let config = VerifierConfig::from_env().context("identity provider configuration")?;
    info!(
        issuer = %config.issuer(),
        audience = %config.audience,
        "Verifier configured"
    );

    let guard = AuthGuard::new(Arc::new(TokenVerifier::new(config)));

    match guard.authenticate(cli.token.as_deref()).await {
        Ok(claims) => {
            println!("{}", serde_json::to_string_pretty(&claims)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ AuthError::KeySetUnavailable(_)) => {
            error!(error = %e, "Could not verify token");
            Ok(ExitCode::from(3))
        }
        Err(e) => {
            error!(error = %e, "Token rejected");
            Ok(ExitCode::from(2))
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&cli) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
