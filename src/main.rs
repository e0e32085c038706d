mod api;
mod authenticator;
mod config;
mod error;
mod provider;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use log::info;

use crate::authenticator::Authenticator;

#[derive(Parser, Debug)]
#[command(name = "dnspod-dns01")]
#[command(about = "ACME dns-01 challenge hook for DNSPod")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml", env = "DNSPOD_CONFIG")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the validation TXT record (certbot --manual-auth-hook)
    Perform(HookArgs),
    /// Delete the validation TXT record (certbot --manual-cleanup-hook)
    Cleanup(HookArgs),
    /// Serve /present and /cleanup over HTTP
    Serve,
}

#[derive(ClapArgs, Debug)]
struct HookArgs {
    /// Domain being validated
    #[arg(long, env = "CERTBOT_DOMAIN")]
    domain: String,

    /// Validation token to publish
    #[arg(long, env = "CERTBOT_VALIDATION")]
    validation: String,

    /// Seconds to wait for DNS propagation after creating the record
    #[arg(long)]
    propagation_seconds: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration first (before logger init)
    let config = config::Config::load(&args.config)?;

    // Initialize logger with config log level (env var takes precedence)
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.server.log_level)
    ).init();

    info!("Loading configuration from: {}", args.config);

    match args.command {
        Command::Perform(hook) => {
            let authenticator = Authenticator::new(config.dnspod);
            let validation_name = provider::validation_name(&hook.domain);

            let record_id = authenticator
                .perform(&hook.domain, &validation_name, &hook.validation)
                .await
                .with_context(|| format!("Failed to create TXT record {}", validation_name))?;
            info!("TXT record {} created (record id {})", validation_name, record_id);

            let delay = hook
                .propagation_seconds
                .map(Duration::from_secs)
                .unwrap_or_else(|| authenticator.propagation_delay());
            if !delay.is_zero() {
                info!("Waiting {} seconds for DNS to propagate", delay.as_secs());
                tokio::time::sleep(delay).await;
            }
        }
        Command::Cleanup(hook) => {
            let authenticator = Authenticator::new(config.dnspod);
            let validation_name = provider::validation_name(&hook.domain);

            let deleted = authenticator
                .cleanup(&hook.domain, &validation_name, &hook.validation)
                .await
                .with_context(|| format!("Failed to delete TXT record {}", validation_name))?;
            info!("Removed {} TXT record(s) for {}", deleted, validation_name);
        }
        Command::Serve => {
            let addr = format!("{}:{}", config.server.host, config.server.port);
            let app = api::create_router(config);

            let listener = tokio::net::TcpListener::bind(&addr).await?;

            info!("Server listening on http://{}", addr);
            info!("Challenge endpoints: POST /present, POST /cleanup");

            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
