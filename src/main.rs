// OmniProspect Quota Engine - Command Line Entry Point
//
// Offline tooling around the quota engine:
// - Inspect configured platform policies and usage guidelines
// - Record usage against a throwaway engine
// - Replay captured traffic and report per-principal compliance

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use omniprospect_quota::config::Config;
use omniprospect_quota::metrics;
use omniprospect_quota::rate_limit::{
    DashboardBuilder, ManualClock, QuotaError, RateLimiter, WindowedCounterStore,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// OmniProspect platform quota engine
#[derive(Parser, Debug)]
#[command(name = "omniprospect-quota")]
#[command(author = "OmniProspect Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Per-platform quota and rate-limit engine for OmniProspect", long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Path to the configuration file (defaults to the XDG config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the configured platform policies
    Policies,
    /// Print usage guidelines for every configured platform
    Guidelines,
    /// Record usage against a fresh in-process engine
    Record {
        /// Platform identifier (e.g. linkedin)
        #[arg(long)]
        platform: String,

        /// Principal identifier (e.g. a user ID)
        #[arg(long)]
        principal: String,

        /// Units recorded per call
        #[arg(long, default_value_t = 1)]
        amount: u64,

        /// Number of calls
        #[arg(long, default_value_t = 1)]
        times: u32,
    },
    /// Replay JSON-lines usage events and report compliance
    Replay {
        /// File with one {"platform", "principal", "amount"?, "at"?} object per line
        file: PathBuf,

        /// Append Prometheus metrics to the output
        #[arg(long)]
        metrics: bool,
    },
}

/// One line of a replay file
#[derive(Debug, Deserialize)]
struct ReplayEvent {
    platform: String,
    principal: String,
    #[serde(default = "default_amount")]
    amount: u64,
    /// Event time; events without one are recorded at the previous event's time
    at: Option<DateTime<Utc>>,
}

fn default_amount() -> u64 {
    1
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    init_tracing(&config, args.verbose)?;
    debug!("OmniProspect quota engine v0.1.0 starting...");

    match args.command {
        Some(Commands::Policies) => print_policies(&config)?,
        Some(Commands::Guidelines) => print_guidelines(&config)?,
        Some(Commands::Record {
            platform,
            principal,
            amount,
            times,
        }) => record(&config, &platform, &principal, amount, times)?,
        Some(Commands::Replay { file, metrics }) => replay(&config, &file, metrics)?,
        None => {
            info!("No command specified. Use \"omniprospect-quota --help\" for usage.");
        }
    }

    Ok(())
}

fn init_tracing(config: &Config, verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { config.log_level()? };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match config.logging.format.to_lowercase().as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.compact().init(),
    }
    Ok(())
}

fn print_policies(config: &Config) -> Result<()> {
    let registry = config.registry()?;
    let policies: Vec<_> = registry
        .policies()
        .into_iter()
        .map(|p| {
            json!({
                "platform": p.platform,
                "window_secs": p.window_secs,
                "max_requests": p.max_requests,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&policies)?);
    Ok(())
}

fn print_guidelines(config: &Config) -> Result<()> {
    let limiter = RateLimiter::new(config.registry()?, WindowedCounterStore::new());
    let guidelines = DashboardBuilder::new(&limiter).guidelines();
    println!("{}", serde_json::to_string_pretty(&guidelines)?);
    Ok(())
}

fn record(config: &Config, platform: &str, principal: &str, amount: u64, times: u32) -> Result<()> {
    let limiter = RateLimiter::new(config.registry()?, WindowedCounterStore::new());

    for attempt in 1..=times {
        let admission = limiter
            .check_usage(platform, principal, amount)
            .with_context(|| format!("Failed to record usage on {}", platform))?;
        println!(
            "{}",
            json!({
                "attempt": attempt,
                "allowed": admission.allowed,
                "used": admission.usage.used,
                "remaining": admission.usage.remaining,
                "retry_after_secs": admission.retry_after_secs,
            })
        );
    }

    if let Some(usage) = limiter.get_usage(platform, principal) {
        println!("{}", serde_json::to_string_pretty(&usage)?);
    }
    Ok(())
}

fn replay(config: &Config, file: &Path, with_metrics: bool) -> Result<()> {
    if with_metrics {
        metrics::init().context("Failed to register metrics")?;
    }

    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read replay file {:?}", file))?;

    let clock = ManualClock::new(Utc::now());
    let limiter = RateLimiter::with_clock(
        config.registry()?,
        WindowedCounterStore::new(),
        Arc::new(clock.clone()),
    );

    let mut principals = BTreeSet::new();
    let (mut events, mut admitted, mut exceeded, mut skipped) = (0u64, 0u64, 0u64, 0u64);

    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let event: ReplayEvent = serde_json::from_str(line)
            .with_context(|| format!("Invalid replay event on line {}", index + 1))?;
        events += 1;

        if let Some(at) = event.at {
            clock.set(at);
        }

        match limiter.record_usage(&event.platform, &event.principal, event.amount) {
            Ok(true) => admitted += 1,
            Ok(false) => exceeded += 1,
            Err(err @ (QuotaError::PolicyNotFound(_) | QuotaError::InvalidAmount(_))) => {
                warn!(line = index + 1, "Skipping replay event: {}", err);
                skipped += 1;
                continue;
            }
            Err(err) => return Err(err.into()),
        }
        principals.insert(event.principal);
    }

    let dashboard = DashboardBuilder::new(&limiter);
    let reports: Vec<_> = principals
        .iter()
        .map(|principal| dashboard.principal_report(principal))
        .collect();

    let output = json!({
        "events": events,
        "admitted": admitted,
        "exceeded": exceeded,
        "skipped": skipped,
        "summary": dashboard.summary(),
        "reports": reports,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    if with_metrics {
        print!("{}", metrics::gather_metrics()?);
    }
    Ok(())
}
