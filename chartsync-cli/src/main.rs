//! chartsync command-line client
//!
//! Runs one sync operation against an EMR server and prints the outcome as
//! JSON.
//!
//! Usage:
//!   chartsync --host emr.example.org --token <TOKEN> fetch patient-77
//!   chartsync --config chartsync.json search Visit/list patientId=patient-77
//!
//! The exit status is non-zero when the server reports any kind of error.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chartsync_cli::{execute, load_config, render, Command, ConfigOverrides};
use chartsync_session::SessionContext;
use chartsync_sync::SyncClient;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "chartsync")]
#[command(about = "Fetch, store and query clinical records on an EMR server")]
struct Args {
    /// Path to a JSON client config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// EMR host; the base URL becomes https://<host>/v1/
    #[arg(long)]
    host: Option<String>,

    /// Full base URL, overriding --host
    #[arg(long)]
    base_url: Option<String>,

    /// Value of the Accept-language header
    #[arg(long)]
    language: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Session token issued at login
    #[arg(long, env = "CHARTSYNC_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let overrides = ConfigOverrides {
        host: args.host,
        base_url: args.base_url,
        language: args.language,
        timeout_secs: args.timeout,
    };
    let config = load_config(args.config.as_deref(), &overrides)?;
    info!("Using {}", config.base_url);

    let client = SyncClient::new(config).context("Failed to create sync client")?;
    if let Some(token) = args.token {
        let session = SessionContext::from_token(token).context("Failed to decode session token")?;
        client.set_session(session).await;
    }

    let outcome = execute(&client, &args.command).await?;
    println!("{}", serde_json::to_string_pretty(&render(&outcome))?);

    Ok(if outcome.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
