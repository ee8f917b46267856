//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// VeloTrack - research agent for infrastructure project portfolios
///
/// Ingests scraped findings, scores source credibility, asks a local LLM
/// analyst for factor impacts, and maintains per-project velocity scores
/// and portfolio roll-ups as plain JSON state.
///
/// Examples:
///   velotrack
///   velotrack --data-dir ./portfolio_data --threshold 70
///   velotrack --model llama3.1:latest --analyst-url http://localhost:11434
///   velotrack --offline
///   velotrack --dry-run
///   velotrack --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Data directory holding projects.json and the derived state files
    ///
    /// Defaults to the config file value, or ./data.
    #[arg(short, long, value_name = "DIR", env = "VELOTRACK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Ollama model to use for finding analysis
    ///
    /// Recommended models: llama3.1:latest, qwen2.5:32b, mistral-nemo:latest.
    /// Can also be set via VELOTRACK_MODEL env var or .velotrack.toml config.
    #[arg(short, long, default_value = "llama3.1:latest", env = "VELOTRACK_MODEL")]
    pub model: String,

    /// Analyst API endpoint URL (Ollama-compatible)
    #[arg(
        long,
        default_value = "http://localhost:11434",
        env = "VELOTRACK_ANALYST_URL"
    )]
    pub analyst_url: String,

    /// Temperature for LLM responses (0.0 - 1.0)
    ///
    /// Lower values produce more consistent/deterministic output
    #[arg(long, default_value = "0.2")]
    pub temperature: f32,

    /// Request timeout in seconds
    ///
    /// How long to wait for the analyst to respond per finding.
    /// Default: from config or 120s.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Credibility threshold for admitting findings (0-100)
    ///
    /// Findings scoring below it are rejected. Default: from config or 60.
    #[arg(short = 't', long, value_name = "SCORE")]
    pub threshold: Option<u32>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .velotrack.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Run without the analyst: findings get the fallback assessment
    ///
    /// Dedup, credibility gating and bookkeeping still run; velocity
    /// scores are unchanged until findings are re-assessed.
    #[arg(long)]
    pub offline: bool,

    /// Dry run: read the inbox and report what would be processed
    ///
    /// No analyst calls, no state writes.
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .velotrack.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Fail (exit code 2) if the run completes with recorded errors
    ///
    /// Useful for scheduled/CI invocations.
    #[arg(long)]
    pub fail_on_errors: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Analyst URL only matters when the analyst will be called
        if !self.offline && !self.dry_run {
            if !self.analyst_url.starts_with("http://")
                && !self.analyst_url.starts_with("https://")
            {
                return Err("Analyst URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Validate temperature range
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err("Temperature must be between 0.0 and 1.0".to_string());
        }

        // Validate threshold if provided
        if let Some(threshold) = self.threshold {
            if threshold > 100 {
                return Err("Credibility threshold must be between 0 and 100".to_string());
            }
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
