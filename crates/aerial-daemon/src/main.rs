//! aerial-daemon entry point.
//!
//! Thin wiring: tracing, layered config, store, provider and limiter, then
//! optional bootstrap and one driver per known route until ctrl-c.

use std::sync::Arc;

use aerial_config::{load_layered_yaml, report_unused_keys, UnusedKeyPolicy};
use aerial_daemon::bootstrap;
use aerial_daemon::scheduler::{DriverExit, Scheduler};
use aerial_daemon::state::AppState;
use aerial_model::{Line, Model, Stop};
use aerial_upstream::{FetchLimiter, MivbProvider};
use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "aerial-daemon")]
#[command(about = "Tracks vehicle presence per route and publishes movements", long_about = None)]
struct Args {
    /// Config files in merge order (base -> env -> local). Defaults apply
    /// when none is given.
    #[arg(long = "config", value_name = "PATH")]
    config: Vec<String>,

    /// Refresh lines and routes from the provider before starting drivers.
    #[arg(long, default_value_t = false)]
    refresh: bool,

    /// Remove a line and its routes before starting. May be repeated.
    #[arg(long = "delete-line", value_name = "LINE")]
    delete_lines: Vec<String>,

    /// Pull the waiting times of a stop into its attributes before starting.
    /// May be repeated.
    #[arg(long = "refresh-stop", value_name = "STOP")]
    refresh_stops: Vec<String>,

    /// Refuse to start when the config carries keys nothing reads.
    #[arg(long, default_value_t = false)]
    strict_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; deployments inject env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();
    let args = Args::parse();

    let paths: Vec<&str> = args.config.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&paths).context("config load failed")?;
    info!(config_hash = %loaded.config_hash, layers = paths.len(), "config loaded");

    let policy = if args.strict_config {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let report = report_unused_keys(&loaded.config_json, policy)?;
    for pointer in &report.unused_leaf_pointers {
        warn!(pointer = %pointer, "config key is not read by anything");
    }
    let config = loaded.settings()?;

    let store = aerial_store::connect(&config.store)
        .await
        .context("store connect failed")?;
    let provider = Arc::new(MivbProvider::new(&config.upstream));
    let limiter = Arc::new(FetchLimiter::from_settings(provider, &config.upstream));
    info!(
        source = limiter.source_name(),
        max_in_flight = config.upstream.max_in_flight,
        "upstream ready"
    );

    let state = AppState::new(store, limiter, &config);

    for id in &args.delete_lines {
        let line = Line::bind(&state.store, id);
        bootstrap::delete_line(&state, &line).await?;
    }

    if args.refresh {
        bootstrap::refresh_all(&state)
            .await
            .context("bootstrap refresh failed")?;
    }

    for id in &args.refresh_stops {
        let stop = Stop::bind(&state.store, id);
        let positions = bootstrap::refresh_stop(&state, &stop).await?;
        info!(stop = %stop.id(), positions, "stop refreshed");
    }

    let channel = state.publisher.channel().to_string();
    let mut scheduler = Scheduler::new(state);
    let drivers = scheduler.spawn_all().await?;
    if drivers == 0 {
        warn!("no routes known; run with --refresh to seed lines and routes");
    }
    info!(drivers, channel = %channel, "route drivers started");

    tokio::signal::ctrl_c()
        .await
        .context("ctrl-c handler failed")?;
    info!("shutdown requested");

    let exits = scheduler.shutdown().await;
    let fatal = exits
        .iter()
        .filter(|(_, exit)| *exit == DriverExit::Fatal)
        .count();
    if fatal > 0 {
        warn!(fatal, "some route drivers had stopped on registry errors");
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
