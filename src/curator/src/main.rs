//! Curator service binary.
//!
//! Loads the retention configuration, compiles the policy set, and runs the
//! cleanup cycle on a fixed-delay schedule until shut down. SIGHUP rebuilds
//! the policy snapshot from the configuration file and swaps it atomically.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use common::config::Configuration;
use curator::cluster::ElasticsearchClient;
use curator::metrics::CuratorMetrics;
use curator::period::Period;
use curator::policy::PolicySet;
use curator::service::{CuratorService, SharedPolicySet};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "curator.yml")]
    config: String,
}

/// Resolves a configured period expression into a scheduler delay.
fn scheduler_delay(field: &str, expression: &str) -> Result<Duration> {
    let period = Period::parse(expression)
        .with_context(|| format!("Invalid {field} expression '{expression}'"))?;
    let delta = period
        .project_from(Utc::now())
        .with_context(|| format!("{field} '{expression}' does not resolve to a duration"))?;
    delta
        .to_std()
        .with_context(|| format!("{field} '{expression}' must be a positive duration"))
}

/// Waits for a shutdown signal (SIGINT or SIGTERM)
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

        tokio::select! {
            _ = sigint.recv() => info!("Received SIGINT"),
            _ = sigterm.recv() => info!("Received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for shutdown signal")?;
        info!("Received Ctrl+C");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    if !Path::new(&args.config).exists() {
        info!(path = %args.config, "Configuration file not found, using defaults");
    }
    let config = Configuration::load_from_path(Path::new(&args.config))
        .context("Failed to load configuration")?;

    let initial_delay = scheduler_delay("initial_delay", &config.initial_delay)?;
    let repeat_delay = scheduler_delay("repeat_delay", &config.repeat_delay)?;

    let now = Utc::now();
    let policy_set = Arc::new(PolicySet::build(&config.curator, now));
    if policy_set.is_empty() {
        warn!("No valid retention policy configured; cleanup cycles will be no-ops");
    }
    info!(
        policies = policy_set.len(),
        initial_delay = ?initial_delay,
        repeat_delay = ?repeat_delay,
        dry_run = config.dry_run,
        elasticsearch = %config.elasticsearch.url,
        "Starting curator service"
    );

    // Scheduling hint only: a repeat delay longer than the smallest
    // configured period lets indices outlive their thresholds between cycles.
    if let Some(smallest) = policy_set.smallest_period()
        && let Ok(smallest_delta) = smallest.project_from(now)
        && let Ok(smallest_duration) = smallest_delta.to_std()
        && repeat_delay > smallest_duration
    {
        warn!(
            smallest_period = %smallest,
            repeat_delay = ?repeat_delay,
            "Repeat delay exceeds the smallest retention period"
        );
    }

    let policies: SharedPolicySet = Arc::new(RwLock::new(policy_set));
    let store = Arc::new(ElasticsearchClient::new(&config.elasticsearch.url));
    let metrics = CuratorMetrics::new();
    let service = Arc::new(CuratorService::new(
        policies.clone(),
        store,
        metrics,
        config.dry_run,
    ));

    // Cleanup cycles run on one task and are awaited in sequence, so a slow
    // cycle can never interleave with the next tick's cluster snapshot.
    let cleanup_task = {
        let service = service.clone();
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + initial_delay;
            let mut ticker = tokio::time::interval_at(start, repeat_delay);
            // Fixed-delay semantics: a cycle slower than the repeat delay
            // must not trigger back-to-back catch-up ticks.
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                match service.run_cycle().await {
                    Ok(result) => {
                        for failure in &result.errors {
                            error!(error = %failure, "Cleanup action failed");
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Cleanup cycle failed");
                    }
                }
            }
        })
    };

    // SIGHUP publishes a fresh policy snapshot; in-flight cycles keep the
    // snapshot they started with.
    #[cfg(unix)]
    let reload_task = {
        let policies = policies.clone();
        let config_path = args.config.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{SignalKind, signal};

            let mut sighup = match signal(SignalKind::hangup()) {
                Ok(sighup) => sighup,
                Err(e) => {
                    error!(error = %e, "Failed to install SIGHUP handler, reload disabled");
                    return;
                }
            };

            while sighup.recv().await.is_some() {
                info!(path = %config_path, "Reloading retention policies");
                match Configuration::load_from_path(Path::new(&config_path)) {
                    Ok(config) => {
                        let fresh = Arc::new(PolicySet::build(&config.curator, Utc::now()));
                        info!(policies = fresh.len(), "Publishing new policy snapshot");
                        *policies.write().await = fresh;
                    }
                    Err(e) => {
                        error!(error = %e, "Reload failed, keeping previous policy snapshot");
                    }
                }
            }
        })
    };

    info!("Curator service running, waiting for shutdown signal");
    wait_for_shutdown_signal().await?;

    info!("Received shutdown signal, stopping curator service");
    cleanup_task.abort();
    #[cfg(unix)]
    reload_task.abort();

    Ok(())
}
