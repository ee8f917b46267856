//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.velotrack.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Research intake settings.
    #[serde(default)]
    pub research: ResearchConfig,

    /// Finding validation settings.
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Analyst (LLM collaborator) settings.
    #[serde(default)]
    pub analyst: AnalystConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory holding all state files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            verbose: false,
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

/// Research intake settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Inbox records older than this many days are dropped.
    #[serde(default = "default_days_lookback")]
    pub days_lookback: i64,

    /// Cap on findings admitted per project per run.
    #[serde(default = "default_max_findings")]
    pub max_findings_per_project: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            days_lookback: default_days_lookback(),
            max_findings_per_project: default_max_findings(),
        }
    }
}

fn default_days_lookback() -> i64 {
    7
}

fn default_max_findings() -> usize {
    20
}

/// Finding validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Findings scoring below this credibility are rejected.
    #[serde(default = "default_threshold")]
    pub credibility_threshold: u32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            credibility_threshold: default_threshold(),
        }
    }
}

fn default_threshold() -> u32 {
    60
}

/// Analyst collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalystConfig {
    /// Model name served by the analyst endpoint.
    #[serde(default = "default_model")]
    pub model: String,

    /// Analyst API base URL.
    #[serde(default = "default_analyst_url")]
    pub base_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Courtesy delay between analyst calls, in milliseconds.
    #[serde(default = "default_api_delay_ms")]
    pub api_delay_ms: u64,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_analyst_url(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            api_delay_ms: default_api_delay_ms(),
        }
    }
}

fn default_model() -> String {
    "llama3.1:latest".to_string()
}

fn default_analyst_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_timeout() -> u64 {
    120
}

fn default_api_delay_ms() -> u64 {
    1000
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".velotrack.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        // Analyst settings - always override since they have defaults in CLI
        self.analyst.model = args.model.clone();
        self.analyst.base_url = args.analyst_url.clone();
        self.analyst.temperature = args.temperature;

        // Optional settings - only override if explicitly provided
        if let Some(timeout) = args.timeout {
            self.analyst.timeout_seconds = timeout;
        }
        if let Some(threshold) = args.threshold {
            self.validation.credibility_threshold = threshold;
        }
        if let Some(ref data_dir) = args.data_dir {
            self.general.data_dir = data_dir.display().to_string();
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
