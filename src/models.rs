//! Data models for the research agent.
//!
//! This module contains the core data structures used throughout the
//! application for representing findings, project velocity state, and the
//! registry of tracked projects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Schedule changes - delays, pushed dates, revised timelines
    Timeline,
    /// Capital events - funding rounds, investments, financing
    Financial,
    /// Physical progress - groundbreaking, phases, completion
    Construction,
    /// Staffing - hiring, layoffs, union and labor news
    Workforce,
    /// Government action - subsidies, awards, grants, incentives
    Regulatory,
    /// Power and grid - interconnection, utility agreements
    Infrastructure,
    /// Anything that fits no other bucket
    General,
}

impl Category {
    /// Returns the lowercase wire name, also used in cluster keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Timeline => "timeline",
            Category::Financial => "financial",
            Category::Construction => "construction",
            Category::Workforce => "workforce",
            Category::Regulatory => "regulatory",
            Category::Infrastructure => "infrastructure",
            Category::General => "general",
        }
    }

    /// Parses a category label, returning `None` for unknown labels so the
    /// caller can fall back to keyword classification.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "timeline" => Some(Category::Timeline),
            "financial" => Some(Category::Financial),
            "construction" => Some(Category::Construction),
            "workforce" => Some(Category::Workforce),
            "regulatory" => Some(Category::Regulatory),
            "infrastructure" => Some(Category::Infrastructure),
            "general" => Some(Category::General),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether evidence comes straight from the operator or via reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Filings, operator announcements, government portals
    Primary,
    /// News coverage, analysis, trade press
    Secondary,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceType::Primary => write!(f, "primary"),
            SourceType::Secondary => write!(f, "secondary"),
        }
    }
}

/// Lifecycle status of a finding.
///
/// `PendingValidation` -> `Validated` | `Rejected`; `Validated` -> `Applied`.
/// `Rejected` and `Applied` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingStatus {
    PendingValidation,
    Validated,
    Applied,
    Rejected,
}

impl fmt::Display for FindingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingStatus::PendingValidation => write!(f, "pending_validation"),
            FindingStatus::Validated => write!(f, "validated"),
            FindingStatus::Applied => write!(f, "applied"),
            FindingStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// Admission recommendation attached by the credibility scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    /// Score >= 80: trustworthy enough to act on alone
    Approve,
    /// Score >= 60: acceptable, normal caution
    ApproveModerate,
    /// Score >= 40: park until another source confirms
    HoldForCorroboration,
    /// Below 40: do not act on this evidence
    Reject,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::Approve => write!(f, "approve"),
            Recommendation::ApproveModerate => write!(f, "approve_moderate"),
            Recommendation::HoldForCorroboration => write!(f, "hold_for_corroboration"),
            Recommendation::Reject => write!(f, "reject"),
        }
    }
}

/// Health classification of a project, derived from its velocity score.
///
/// `Terminated` is never produced by classification; it is set only when the
/// registry records an explicit cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Velocity >= 80 - construction proceeding at or above plan
    Executing,
    /// Velocity >= 65 - minor friction, no intervention needed
    OnTrack,
    /// Velocity >= 50 - watch list
    Monitoring,
    /// Velocity >= 35 - material slippage
    Distressed,
    /// Velocity below 35, including exactly 0
    Critical,
    /// Project cancelled out-of-band; excluded from velocity averages
    Terminated,
}

impl HealthStatus {
    /// Returns an emoji representation for run summaries.
    pub fn emoji(&self) -> &'static str {
        match self {
            HealthStatus::Executing => "🟢",
            HealthStatus::OnTrack => "🔵",
            HealthStatus::Monitoring => "🟡",
            HealthStatus::Distressed => "🟠",
            HealthStatus::Critical => "🔴",
            HealthStatus::Terminated => "⚫",
        }
    }

    /// Whether this status counts toward the portfolio at-risk share.
    pub fn is_at_risk(&self) -> bool {
        matches!(
            self,
            HealthStatus::Monitoring | HealthStatus::Distressed | HealthStatus::Critical
        )
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Executing => write!(f, "executing"),
            HealthStatus::OnTrack => write!(f, "on_track"),
            HealthStatus::Monitoring => write!(f, "monitoring"),
            HealthStatus::Distressed => write!(f, "distressed"),
            HealthStatus::Critical => write!(f, "critical"),
            HealthStatus::Terminated => write!(f, "terminated"),
        }
    }
}

/// The raw evidence carried by a finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEvidence {
    /// URL the evidence was taken from.
    pub source_url: String,
    /// Primary or secondary source.
    pub source_type: SourceType,
    /// Human-readable source name (e.g. "SEC EDGAR - 10-K", "Reuters").
    pub source_name: String,
    /// Publication date as reported by the source; parsed leniently.
    pub publication_date: String,
    /// SHA-256 hex digest of `extracted_text`.
    pub content_hash: String,
    /// Extracted text, bounded to 2,000 characters at intake.
    pub extracted_text: String,
}

/// A single piece of evidence about one project, flowing through the
/// intake -> dedup -> credibility -> analysis -> apply pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Identity: `F-{run_id}-{project_id}-{seq:03}`.
    pub finding_id: String,
    /// Project this evidence is about.
    pub project_id: String,
    /// Project name at discovery time.
    pub project_name: String,
    /// Category of the evidence.
    pub category: Category,
    /// When the finding entered the pipeline.
    pub timestamp: DateTime<Utc>,
    /// Lifecycle status.
    pub status: FindingStatus,
    /// The underlying evidence.
    pub raw_data: RawEvidence,
    /// Attached by the credibility scorer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credibility: Option<Credibility>,
    /// Attached after the analyst call (or the fallback).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<serde_json::Value>,
}

/// Credibility verdict for a finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credibility {
    /// Weighted trust score, 0-100.
    pub score: u32,
    /// Scoring flags (e.g. "PRIMARY_SOURCE", "SEC_FILING_10-K").
    pub flags: Vec<String>,
    /// Admission recommendation tier.
    pub recommendation: Recommendation,
}

/// The four factor scores behind a project's velocity, each 0-100.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FactorScores {
    /// How well the schedule is holding against announced dates.
    pub timeline_adherence: f64,
    /// How secure the committed capital is.
    pub funding_security: f64,
    /// How far the physical build has progressed against plan.
    pub construction_progress: f64,
    /// How stable the operating company is.
    pub operator_stability: f64,
}

impl FactorScores {
    /// All four factors set to the same value.
    pub fn uniform(value: f64) -> Self {
        Self {
            timeline_adherence: value,
            funding_security: value,
            construction_progress: value,
            operator_stability: value,
        }
    }

    /// Unweighted mean of the four factors.
    pub fn mean(&self) -> f64 {
        (self.timeline_adherence
            + self.funding_security
            + self.construction_progress
            + self.operator_stability)
            / 4.0
    }
}

/// Signed adjustments to the four factor scores, as recommended by the
/// analyst. All zero for the fallback assessment.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FactorDeltas {
    pub timeline_adherence: f64,
    pub funding_security: f64,
    pub construction_progress: f64,
    pub operator_stability: f64,
}

impl FactorDeltas {
    /// Whether every delta is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.timeline_adherence == 0.0
            && self.funding_security == 0.0
            && self.construction_progress == 0.0
            && self.operator_stability == 0.0
    }
}

/// Velocity scoring state for one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityState {
    /// Derived velocity score, 0-100, one decimal. Never set independently
    /// of the factors, penalty and bonus.
    pub velocity_score: f64,
    /// The four underlying factor scores.
    pub factor_scores: FactorScores,
    /// Health classification derived from the velocity score.
    pub health_status: HealthStatus,
    /// Nonnegative penalty subtracted after averaging the factors.
    pub delay_penalty: f64,
    /// Nonnegative bonus added after averaging the factors.
    pub ahead_bonus: f64,
    /// Most-recent-first `(date, score)` history, capped at 10 entries.
    pub previous_scores: Vec<(String, f64)>,
    /// Signed one-decimal delta vs. the previous score ("+4.0", "-3.5",
    /// "0.0"), or "NEW" for a project with no prior history.
    pub trend_30d: String,
}

impl VelocityState {
    /// A fresh state with the given factor scores and no history.
    pub fn seeded(factors: FactorScores) -> Self {
        Self {
            velocity_score: factors.mean(),
            factor_scores: factors,
            health_status: HealthStatus::Monitoring,
            delay_penalty: 0.0,
            ahead_bonus: 0.0,
            previous_scores: Vec::new(),
            trend_30d: "NEW".to_string(),
        }
    }
}

/// One project's velocity movement during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityChange {
    pub project_id: String,
    pub old_velocity: f64,
    pub new_velocity: f64,
    pub old_health: HealthStatus,
    pub new_health: HealthStatus,
    /// Trend string recorded on the state after the change.
    pub trend: String,
}

/// A health-status transition observed during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthChange {
    pub project_id: String,
    pub from: HealthStatus,
    pub to: HealthStatus,
}

/// Static registry entry for a tracked project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRecord {
    /// Stable project identifier (e.g. "PRJ-AZ-003").
    pub id: String,
    /// Display name.
    pub name: String,
    /// Sector bucket (e.g. "semiconductors", "data_centers").
    pub sector: String,
    /// Total announced capital, in dollars.
    pub capital_committed: f64,
    /// Capital spent to date, in dollars.
    pub capital_deployed: f64,
    /// First publicly announced production date.
    pub original_production_date: String,
    /// Currently announced production date.
    pub current_production_date: String,
    /// Current headcount on site.
    pub workforce_current: u32,
    /// Announced headcount target.
    pub workforce_target: u32,
    /// Years remaining in the grid interconnection queue.
    pub grid_queue_years: f64,
    /// Explicit cancellation flag; forces health to terminated.
    #[serde(default)]
    pub terminated: bool,
}

/// Read-only merge of registry record and velocity state, handed to the
/// analyst as context for a finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub project_id: String,
    pub name: String,
    pub sector: String,
    pub velocity_score: f64,
    pub health_status: HealthStatus,
    pub factor_scores: FactorScores,
    pub capital_committed: f64,
    pub capital_deployed: f64,
    pub original_production_date: String,
    pub current_production_date: String,
    pub workforce_current: u32,
    pub workforce_target: u32,
    pub grid_queue_years: f64,
}

impl ProjectSnapshot {
    /// Builds a snapshot from a registry record and its velocity state.
    ///
    /// Projects missing from the score table read as monitoring at 50, the
    /// same placeholder the portfolio aggregator uses.
    pub fn from_parts(record: &ProjectRecord, state: Option<&VelocityState>) -> Self {
        let (velocity_score, health_status, factor_scores) = match state {
            Some(s) => (s.velocity_score, s.health_status, s.factor_scores),
            None => (50.0, HealthStatus::Monitoring, FactorScores::uniform(50.0)),
        };
        Self {
            project_id: record.id.clone(),
            name: record.name.clone(),
            sector: record.sector.clone(),
            velocity_score,
            health_status,
            factor_scores,
            capital_committed: record.capital_committed,
            capital_deployed: record.capital_deployed,
            original_production_date: record.original_production_date.clone(),
            current_production_date: record.current_production_date.clone(),
            workforce_current: record.workforce_current,
            workforce_target: record.workforce_target,
            grid_queue_years: record.grid_queue_years,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse() {
        assert_eq!(Category::parse("timeline"), Some(Category::Timeline));
        assert_eq!(Category::parse("Financial"), Some(Category::Financial));
        assert_eq!(Category::parse("REGULATORY"), Some(Category::Regulatory));
        assert_eq!(Category::parse("press_release"), None);
    }

    #[test]
    fn test_category_wire_names() {
        assert_eq!(
            serde_json::to_value(Category::Infrastructure).unwrap(),
            serde_json::json!("infrastructure")
        );
        assert_eq!(Category::Workforce.as_str(), "workforce");
    }

    #[test]
    fn test_health_status_wire_names() {
        assert_eq!(
            serde_json::to_value(HealthStatus::OnTrack).unwrap(),
            serde_json::json!("on_track")
        );
        let parsed: HealthStatus = serde_json::from_str("\"distressed\"").unwrap();
        assert_eq!(parsed, HealthStatus::Distressed);
    }

    #[test]
    fn test_health_status_at_risk() {
        assert!(HealthStatus::Monitoring.is_at_risk());
        assert!(HealthStatus::Distressed.is_at_risk());
        assert!(HealthStatus::Critical.is_at_risk());
        assert!(!HealthStatus::Executing.is_at_risk());
        assert!(!HealthStatus::OnTrack.is_at_risk());
        assert!(!HealthStatus::Terminated.is_at_risk());
    }

    #[test]
    fn test_factor_scores_mean() {
        let factors = FactorScores {
            timeline_adherence: 60.0,
            funding_security: 50.0,
            construction_progress: 46.0,
            operator_stability: 50.0,
        };
        assert_eq!(factors.mean(), 51.5);
        assert_eq!(FactorScores::uniform(50.0).mean(), 50.0);
    }

    #[test]
    fn test_factor_deltas_is_zero() {
        assert!(FactorDeltas::default().is_zero());
        let deltas = FactorDeltas {
            timeline_adherence: -2.0,
            ..Default::default()
        };
        assert!(!deltas.is_zero());
    }

    #[test]
    fn test_velocity_state_seeded() {
        let state = VelocityState::seeded(FactorScores::uniform(50.0));
        assert_eq!(state.velocity_score, 50.0);
        assert_eq!(state.health_status, HealthStatus::Monitoring);
        assert!(state.previous_scores.is_empty());
        assert_eq!(state.trend_30d, "NEW");
    }

    #[test]
    fn test_score_history_serializes_as_pairs() {
        let mut state = VelocityState::seeded(FactorScores::uniform(70.0));
        state.previous_scores.push(("2026-02-01".to_string(), 68.5));
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(
            value["previous_scores"][0],
            serde_json::json!(["2026-02-01", 68.5])
        );
    }

    #[test]
    fn test_snapshot_defaults_without_state() {
        let record = ProjectRecord {
            id: "PRJ-TX-001".to_string(),
            name: "Permian Fab One".to_string(),
            sector: "semiconductors".to_string(),
            capital_committed: 20_000_000_000.0,
            capital_deployed: 4_500_000_000.0,
            original_production_date: "2027-06".to_string(),
            current_production_date: "2027-06".to_string(),
            workforce_current: 1800,
            workforce_target: 3000,
            grid_queue_years: 2.5,
            terminated: false,
        };
        let snapshot = ProjectSnapshot::from_parts(&record, None);
        assert_eq!(snapshot.velocity_score, 50.0);
        assert_eq!(snapshot.health_status, HealthStatus::Monitoring);
        assert_eq!(snapshot.factor_scores.operator_stability, 50.0);
        assert_eq!(snapshot.project_id, "PRJ-TX-001");
    }
}
