//! VeloTrack - research agent for infrastructure project portfolios
//!
//! A CLI tool that ingests scraped findings about capital projects,
//! scores source credibility, asks a local LLM analyst for factor
//! impacts, and maintains velocity scores and portfolio roll-ups.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (arguments, config, persistence)
//!   2 - Run completed with recorded errors and --fail-on-errors set

mod analyst;
mod cli;
mod config;
mod credibility;
mod dedup;
mod intake;
mod models;
mod portfolio;
mod run;
mod store;
mod velocity;

use analyst::{Analyst, AnalystConfig, HttpAnalyst};
use anyhow::{Context, Result};
use cli::Args;
use config::Config;
use intake::{Intake, IntakeConfig};
use models::HealthStatus;
use run::{ResearchRun, RunOptions, RunOutcome, RunStatus};
use std::time::Instant;
use store::DataStore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("VeloTrack v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Run the research cycle
    match run_cycle(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .velotrack.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(".velotrack.toml");

    if path.exists() {
        eprintln!("⚠️  .velotrack.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .velotrack.toml")?;

    println!("✅ Created .velotrack.toml with default settings.");
    println!("   Edit it to customize the data directory, thresholds, and analyst model.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete research cycle. Returns exit code (0 or 2).
async fn run_cycle(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let store = DataStore::new(&config.general.data_dir);
    let intake = Intake::new(IntakeConfig::from(&config.research));

    // Handle --dry-run: classify the inbox and exit
    if args.dry_run {
        return handle_dry_run(&store, &intake, config.validation.credibility_threshold);
    }

    println!("🛰  Portfolio research run");
    println!("   Data dir: {}", store.data_dir().display());
    if args.offline {
        println!("   Analyst: offline (fallback assessments)");
    } else {
        println!("   Model: {}", config.analyst.model);
        println!("   Analyst: {}", config.analyst.base_url);
        println!("   Timeout: {}s", config.analyst.timeout_seconds);
    }
    println!(
        "   Credibility threshold: {}",
        config.validation.credibility_threshold
    );

    let analyst: Option<Box<dyn Analyst>> = if args.offline {
        None
    } else {
        let client = HttpAnalyst::new(AnalystConfig::from(&config.analyst))?;
        Some(Box::new(client))
    };

    let options = RunOptions {
        credibility_threshold: config.validation.credibility_threshold,
        api_delay_ms: config.analyst.api_delay_ms,
        show_progress: !args.quiet,
    };

    println!("\n🔬 Processing findings...\n");
    let mut research_run = ResearchRun::new(store, intake, analyst, options);
    let outcome = research_run.execute().await?;

    print_summary(&outcome, start_time.elapsed().as_secs_f64());

    // Check --fail-on-errors
    if args.fail_on_errors && outcome.run_log.status == RunStatus::CompletedWithErrors {
        eprintln!(
            "\n⛔ Run completed with {} recorded errors. Failing (exit code 2).",
            outcome.run_log.errors.len()
        );
        return Ok(2);
    }

    Ok(0)
}

/// Handle --dry-run: classify intake, print dispositions, exit.
fn handle_dry_run(store: &DataStore, intake: &Intake, threshold: u32) -> Result<i32> {
    println!("\n🔍 Dry run: classifying inbox (no analyst calls, no writes)...\n");

    let previews = run::preview_intake(store, intake, threshold)?;

    if previews.is_empty() {
        println!("   Inbox is empty.");
    } else {
        println!("   {} findings would be processed:\n", previews.len());
        for preview in &previews {
            println!(
                "     📄 {} [{}] {}: {}",
                preview.finding_id, preview.category, preview.project_id, preview.disposition
            );
        }
    }

    println!("\n✅ Dry run complete. No state was written.");
    Ok(0)
}

/// Print the end-of-run summary.
fn print_summary(outcome: &RunOutcome, duration: f64) {
    let log = &outcome.run_log;
    let metrics = &outcome.metrics;

    println!("\n📊 Run Summary:");
    println!(
        "   Findings: {} discovered | {} validated | {} applied | {} rejected | {} duplicates",
        log.findings_discovered,
        log.findings_validated,
        log.findings_applied,
        log.findings_rejected,
        log.duplicates_skipped
    );

    if !log.velocity_changes.is_empty() {
        println!("\n   Velocity changes:");
        for change in &log.velocity_changes {
            println!(
                "     {} {}: {:.1} -> {:.1} ({})",
                change.new_health.emoji(),
                change.project_id,
                change.old_velocity,
                change.new_velocity,
                change.trend
            );
        }
    }

    if !log.health_status_changes.is_empty() {
        println!("\n   Health changes:");
        for change in &log.health_status_changes {
            println!(
                "     {}: {} -> {} {}",
                change.project_id,
                change.from,
                change.to,
                change.to.emoji()
            );
        }
    }

    let h = &metrics.health_counts;
    println!("\n   Portfolio velocity: {:.1}", metrics.portfolio_velocity);
    println!("   Capital committed: {}", metrics.total_capital_display);
    println!(
        "   Health: {} {} | {} {} | {} {} | {} {} | {} {} | {} {}",
        HealthStatus::Executing.emoji(),
        h.executing,
        HealthStatus::OnTrack.emoji(),
        h.on_track,
        HealthStatus::Monitoring.emoji(),
        h.monitoring,
        HealthStatus::Distressed.emoji(),
        h.distressed,
        HealthStatus::Critical.emoji(),
        h.critical,
        HealthStatus::Terminated.emoji(),
        h.terminated
    );
    println!("   At risk: {}%", metrics.at_risk_pct);

    if !log.errors.is_empty() {
        println!("   ⚠️  {} errors recorded (see run log)", log.errors.len());
    }
    println!("   Duration: {:.1}s", duration);

    println!("\n✅ Run {} complete.", log.run_id);
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .velotrack.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
