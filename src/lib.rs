// src/lib.rs

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod metrics;
pub mod plugin;
pub mod pool;
pub mod signal;
pub mod types;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::Registry;
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::{load_and_validate, load_from_path, ValidatedConfig};
use crate::plugin::Plugin;
use crate::pool::ProcessPoolProvider;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the file-watch plugin and its process pool
/// - the metrics registry
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);

    if args.check {
        let validated = load_and_validate(&config_path)?;
        print_check(&validated);
        return Ok(());
    }

    let configurer = load_from_path(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    let plugin = match Plugin::init(&configurer, Arc::new(ProcessPoolProvider)) {
        Ok(plugin) => plugin,
        Err(err) if err.is_disabled() => {
            warn!("{err}; nothing to do");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let registry = Registry::new();
    registry.register(Box::new(plugin.metrics_collector()?))?;

    let mut errors = plugin.serve().await;

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!("failed to listen for Ctrl+C: {e}");
            }
            info!("shutdown requested");
        }
        err = errors.recv() => {
            if let Some(err) = err {
                return Err(err.into());
            }
            info!("watch loop exited");
        }
    }

    plugin.stop().await?;

    if args.print_metrics {
        print!("{}", metrics::encode_text(&registry)?);
    }

    Ok(())
}

/// `--check` output: the effective settings after defaults and validation.
fn print_check(validated: &ValidatedConfig) {
    let cfg = &validated.config;
    println!("watchpool config ok");
    println!("  dir: {} ({})", cfg.dir, validated.root.display());
    println!(
        "  regexp: {}",
        validated.filter.pattern().unwrap_or("<match all>")
    );
    println!("  match_target: {:?}", cfg.match_target);
    println!("  backend: {:?} (poll_interval {:?})", cfg.backend, cfg.poll_interval);
    println!("  recursive: {}", cfg.recursive);
    println!("  payload: {:?}", cfg.payload);
    println!("  job_timeout: {:?}", cfg.job_timeout);
    println!(
        "  max_concurrency: {} (queue_length {})",
        cfg.max_concurrency, cfg.queue_length
    );
    println!("  pool.command: {}", cfg.pool.command);
    println!("  pool.num_workers: {}", cfg.pool.num_workers);
    println!("  pool.allocate_timeout: {:?}", cfg.pool.allocate_timeout());
}
