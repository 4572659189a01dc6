//! Credit Decision Engine - Main Entry Point
//!
//! Evaluates a credit proposal against the configured rules and routes it
//! to a funding counterparty, printing the full decision report as JSON.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use credit_decision_engine::{
    load_config, DecisionEngine, InMemoryCapacityLedger, InMemoryDecisionLog, Proposal,
};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "engine.toml")]
    config: String,

    /// Path to the proposal payload (JSON)
    #[arg(short, long)]
    proposal: String,

    /// Operating day for capacity accounting (YYYY-MM-DD, defaults to today)
    #[arg(long)]
    operating_day: Option<NaiveDate>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Evaluate and route speculatively: no reservation, no log entry
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    dotenvy::dotenv().ok();

    info!("Loading configuration from {}", args.config);
    let config = load_config(Some(&args.config))?;
    info!(
        rules = config.rules.len(),
        counterparties = config.counterparties.len(),
        arrangements = config.arrangements.len(),
        "configuration loaded"
    );

    let payload = std::fs::read_to_string(&args.proposal)
        .with_context(|| format!("reading proposal file {}", args.proposal))?;
    let proposal = Proposal::from_value(serde_json::from_str(&payload)?)?;

    let operating_day = args
        .operating_day
        .unwrap_or_else(|| Utc::now().date_naive());

    let ledger = Arc::new(InMemoryCapacityLedger::new(config.registry()));
    let log = Arc::new(InMemoryDecisionLog::new());
    let engine = DecisionEngine::new(ledger, log).with_settings(config.settings.clone());

    let report = if args.dry_run {
        engine.preview(&proposal, &config, operating_day).await?
    } else {
        engine.decide(&proposal, &config, operating_day).await?
    };

    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
