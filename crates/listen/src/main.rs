//! Reference listener for the edge-chat realtime session.
//!
//! Connects with the credentials from the environment, logs a one-line
//! summary of every event, and runs until Ctrl-C.
//!
//! Usage:
//!   EC_USER_ID=1000... EC_COOKIE='c_user=...; xs=...' ec-listen --config realtime.toml
//!
//! Env vars:
//!   EC_USER_ID   account id (the `c_user` cookie)
//!   EC_COOKIE    raw Cookie header for the logged-in session
//!   EC_FB_DTSG   optional `fb_dtsg` form token for the baseline fetch
//!   EC_CONFIG    config path when `--config` is not given

use std::path::Path;

use anyhow::Context;
use clap::Parser;
use ec_realtime::{
    ConfigSeverity, EventKind, ListenerRegistry, RealtimeClient, RealtimeConfig,
    SessionCredentials,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Listen to a realtime chat session and log every event.
#[derive(Debug, Parser)]
#[command(name = "ec-listen", version, about)]
struct Cli {
    /// Path to the TOML config (defaults apply when the file is missing).
    #[arg(long)]
    config: Option<String>,
    /// Emit structured JSON logs instead of the compact format.
    #[arg(long)]
    json_logs: bool,
    /// Parse and validate the config, print issues, and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let (config, config_path) = load_config(cli.config)?;
    if cli.check {
        if !check(&config, &config_path) {
            std::process::exit(1);
        }
        return Ok(());
    }

    let credentials = credentials_from_env()?;
    let listeners = ListenerRegistry::with_logging_defaults();
    // Lifecycle events are worth a warning when the session ends.
    listeners.register(
        EventKind::Disconnect,
        ec_realtime::listener_fn(|event| {
            tracing::warn!(reason = event.reason().unwrap_or("unknown"), "session disconnected");
            Ok(())
        }),
    );

    let client = RealtimeClient::builder()
        .credentials(credentials)
        .config(config)
        .listeners(std::sync::Arc::new(listeners))
        .build()?;

    client.start().await.context("starting realtime session")?;
    tracing::info!(config = %config_path, "ec-listen running; press Ctrl-C to stop");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received");
            client.stop();
        }
        _ = client.wait() => {}
    }
    client.wait().await;
    Ok(())
}

/// Compact stderr logs by default; JSON lines with `--json-logs`.
fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ec_realtime=info"));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    }
}

fn load_config(path: Option<String>) -> anyhow::Result<(RealtimeConfig, String)> {
    let config_path = path
        .or_else(|| std::env::var("EC_CONFIG").ok())
        .unwrap_or_else(|| "realtime.toml".into());

    let config = if Path::new(&config_path).exists() {
        RealtimeConfig::load(&config_path).with_context(|| format!("loading {config_path}"))?
    } else {
        tracing::info!(path = %config_path, "config file not found, using defaults");
        RealtimeConfig::default()
    };
    Ok((config, config_path))
}

fn check(config: &RealtimeConfig, config_path: &str) -> bool {
    let issues = config.validate();
    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }
    for issue in &issues {
        println!("{issue}");
    }
    let errors = issues
        .iter()
        .filter(|e| e.severity == ConfigSeverity::Error)
        .count();
    println!(
        "\n{} error(s), {} warning(s) in {config_path}",
        errors,
        issues.len() - errors
    );
    errors == 0
}

fn credentials_from_env() -> anyhow::Result<SessionCredentials> {
    let user_id = std::env::var("EC_USER_ID").context("EC_USER_ID is not set")?;
    let cookie = std::env::var("EC_COOKIE").context("EC_COOKIE is not set")?;
    let mut credentials = SessionCredentials::new(user_id.clone(), cookie)
        .with_form_field("__user", user_id);
    if let Ok(dtsg) = std::env::var("EC_FB_DTSG") {
        credentials = credentials.with_form_field("fb_dtsg", dtsg);
    }
    Ok(credentials)
}
