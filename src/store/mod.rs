//! JSON persistence for the data directory.
//!
//! All engine state lives in flat JSON files under one directory:
//! `projects.json` (registry), `velocity_scores.json` (score table),
//! `research_log.json` (audit trail), `portfolio_metrics.json`, and one
//! `logs/run_{run_id}.json` per run. Files are pretty-printed and
//! field-stable so collaborators and humans can read them.

use crate::models::{Finding, ProjectRecord};
use crate::portfolio::PortfolioMetrics;
use crate::run::RunLog;
use crate::velocity::ScoreTable;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const PROJECTS_FILE: &str = "projects.json";
pub const SCORES_FILE: &str = "velocity_scores.json";
pub const RESEARCH_LOG_FILE: &str = "research_log.json";
pub const METRICS_FILE: &str = "portfolio_metrics.json";
pub const INBOX_FILE: &str = "findings_inbox.json";
const LOGS_DIR: &str = "logs";

/// The static project registry, maintained by hand or by a seeding script.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectRegistry {
    #[serde(default)]
    pub projects: Vec<ProjectRecord>,
}

/// A finding that failed validation, kept for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedFinding {
    pub finding_id: String,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credibility_score: Option<u32>,
}

/// Running totals across all runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogStatistics {
    #[serde(default)]
    pub total_findings_applied: usize,
    #[serde(default)]
    pub source_breakdown: BTreeMap<String, usize>,
}

/// One line per completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub completed_at: DateTime<Utc>,
    pub findings_applied: usize,
    pub findings_rejected: usize,
    pub duplicates_skipped: usize,
}

/// Append-only audit trail across runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchLog {
    /// Content hashes of every finding ever admitted past dedup.
    #[serde(default)]
    pub seen_hashes: BTreeSet<String>,

    /// Findings that were applied to a velocity state.
    #[serde(default)]
    pub findings: Vec<Finding>,

    /// Findings that failed validation, with the reason.
    #[serde(default)]
    pub rejected_findings: Vec<RejectedFinding>,

    /// Cluster key to applied finding ids, for corroboration lookups.
    #[serde(default)]
    pub semantic_clusters: BTreeMap<String, Vec<String>>,

    #[serde(default)]
    pub statistics: LogStatistics,

    #[serde(default)]
    pub run_history: Vec<RunSummary>,

    /// Findings that went through validation (applied plus rejected);
    /// duplicates are skipped before this point and not counted.
    #[serde(default)]
    pub total_findings_processed: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl ResearchLog {
    /// Records an applied finding: marks its hash seen, appends it to its
    /// semantic cluster, and updates the statistics.
    pub fn register_applied(&mut self, finding: Finding) {
        self.seen_hashes
            .insert(finding.raw_data.content_hash.clone());

        let cluster = crate::dedup::cluster_key(&finding);
        let ids = self.semantic_clusters.entry(cluster).or_default();
        if !ids.contains(&finding.finding_id) {
            ids.push(finding.finding_id.clone());
        }

        self.statistics.total_findings_applied += 1;
        *self
            .statistics
            .source_breakdown
            .entry(source_bucket(&finding.raw_data.source_url))
            .or_insert(0) += 1;
        self.total_findings_processed += 1;

        self.findings.push(finding);
    }

    /// Records a rejected finding. Its hash is still marked seen so
    /// re-ingesting the same content dedups instead of re-validating.
    pub fn register_rejected(&mut self, finding: &Finding, reason: &str) {
        self.seen_hashes
            .insert(finding.raw_data.content_hash.clone());
        self.rejected_findings.push(RejectedFinding {
            finding_id: finding.finding_id.clone(),
            reason: reason.to_string(),
            credibility_score: finding.credibility.as_ref().map(|c| c.score),
        });
        self.total_findings_processed += 1;
    }
}

/// Maps a source URL onto a reporting bucket for the statistics table.
pub fn source_bucket(url: &str) -> String {
    let lower = url.to_lowercase();
    let bucket = if lower.contains("sec.gov") {
        "sec_filings"
    } else if lower.contains("chips") {
        "chips_portal"
    } else if ["pjm", "ercot", "caiso", "miso"]
        .iter()
        .any(|g| lower.contains(g))
    {
        "grid_operators"
    } else if lower.contains("reuters") {
        "news_reuters"
    } else if lower.contains("wsj") {
        "news_wsj"
    } else {
        "other"
    };
    bucket.to_string()
}

/// Handle on the data directory.
pub struct DataStore {
    data_dir: PathBuf,
}

impl DataStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Creates the data directory and its `logs/` subdirectory.
    pub fn ensure_layout(&self) -> Result<()> {
        let logs = self.data_dir.join(LOGS_DIR);
        fs::create_dir_all(&logs)
            .with_context(|| format!("Failed to create data directory: {}", logs.display()))
    }

    pub fn projects_path(&self) -> PathBuf {
        self.data_dir.join(PROJECTS_FILE)
    }

    pub fn scores_path(&self) -> PathBuf {
        self.data_dir.join(SCORES_FILE)
    }

    pub fn research_log_path(&self) -> PathBuf {
        self.data_dir.join(RESEARCH_LOG_FILE)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.data_dir.join(METRICS_FILE)
    }

    pub fn inbox_path(&self) -> PathBuf {
        self.data_dir.join(INBOX_FILE)
    }

    pub fn run_log_path(&self, run_id: &str) -> PathBuf {
        self.data_dir.join(LOGS_DIR).join(format!("run_{}.json", run_id))
    }

    /// Loads the project registry. A missing file is an empty portfolio.
    pub fn load_projects(&self) -> Result<ProjectRegistry> {
        let path = self.projects_path();
        if !path.exists() {
            warn!("No project registry at {}; starting empty", path.display());
            return Ok(ProjectRegistry::default());
        }
        read_json(&path)
    }

    /// Loads the velocity score table, empty if never written.
    pub fn load_scores(&self) -> Result<ScoreTable> {
        let path = self.scores_path();
        if !path.exists() {
            return Ok(ScoreTable::default());
        }
        read_json(&path)
    }

    pub fn save_scores(&self, table: &ScoreTable) -> Result<()> {
        write_json(&self.scores_path(), table)
    }

    /// Loads the research log, fresh if never written.
    pub fn load_research_log(&self) -> Result<ResearchLog> {
        let path = self.research_log_path();
        if !path.exists() {
            return Ok(ResearchLog::default());
        }
        read_json(&path)
    }

    pub fn save_research_log(&self, log: &ResearchLog) -> Result<()> {
        write_json(&self.research_log_path(), log)
    }

    pub fn save_metrics(&self, metrics: &PortfolioMetrics) -> Result<()> {
        write_json(&self.metrics_path(), metrics)
    }

    pub fn save_run_log(&self, log: &RunLog) -> Result<()> {
        write_json(&self.run_log_path(&log.run_id), log)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}
