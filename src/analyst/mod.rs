//! The external analysis port.
//!
//! Findings are handed to a text-understanding service together with a
//! project snapshot; the service answers with a structured [`Assessment`].
//! The service is a black box that can fail or return garbage, so this
//! module also defines the error taxonomy and the neutral fallback object
//! the pipeline substitutes when it does.

pub mod client;

pub use client::{AnalystConfig, HttpAnalyst};

use crate::models::{FactorDeltas, Finding, ProjectSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors from the analyst transport.
#[derive(Debug, Error)]
pub enum AnalystError {
    #[error("cannot connect to analyst at {0}")]
    Connect(String),
    #[error("analyst request timed out after {0}s")]
    Timeout(u64),
    #[error("analyst API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("assessment was not parseable: {0}")]
    Malformed(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Anything that can turn a finding plus project context into an assessment.
///
/// The production implementation is [`HttpAnalyst`]; tests script their own.
#[async_trait]
pub trait Analyst: Send + Sync {
    async fn assess(
        &self,
        finding: &Finding,
        snapshot: &ProjectSnapshot,
    ) -> Result<Assessment, AnalystError>;
}

/// Analyst confidence in its own assessment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    #[default]
    Low,
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceLevel::High => write!(f, "high"),
            ConfidenceLevel::Medium => write!(f, "medium"),
            ConfidenceLevel::Low => write!(f, "low"),
        }
    }
}

/// Recommended adjustment to one velocity factor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactorImpact {
    /// Signed delta; the velocity model doubles it before clamping.
    #[serde(default)]
    pub change: f64,
    #[serde(default)]
    pub rationale: String,
}

/// Per-factor impacts; a factor the analyst does not mention reads as zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactorImpacts {
    #[serde(default)]
    pub timeline_adherence: FactorImpact,
    #[serde(default)]
    pub funding_security: FactorImpact,
    #[serde(default)]
    pub construction_progress: FactorImpact,
    #[serde(default)]
    pub operator_stability: FactorImpact,
}

/// Self-reported confidence block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Confidence {
    #[serde(default)]
    pub level: ConfidenceLevel,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub data_gaps: Vec<String>,
}

/// Whether the finding's claims line up with the project snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Verification {
    /// `None` means the check was not performed.
    #[serde(default)]
    pub claims_consistent: Option<bool>,
    #[serde(default)]
    pub notes: String,
}

/// An auxiliary risk/action/issue/decision record recommended for the
/// project's tracking ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaidEntry {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

/// A milestone the analyst spotted in the evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneNote {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// The analyst's structured recommendation for one finding.
///
/// `factor_impacts` is the only required block; everything else degrades to
/// an empty default when the analyst omits it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    #[serde(default)]
    pub summary: String,
    pub factor_impacts: FactorImpacts,
    /// The analyst's own estimate of the net velocity effect; informational,
    /// the velocity model derives the real number from the factors.
    #[serde(default)]
    pub net_velocity_change: f64,
    #[serde(default)]
    pub confidence: Confidence,
    #[serde(default)]
    pub verification: Verification,
    #[serde(default)]
    pub risks: Vec<RaidEntry>,
    #[serde(default)]
    pub actions: Vec<RaidEntry>,
    #[serde(default)]
    pub issues: Vec<RaidEntry>,
    #[serde(default)]
    pub decisions: Vec<RaidEntry>,
    #[serde(default)]
    pub early_warnings: Vec<String>,
    #[serde(default)]
    pub milestones: Vec<MilestoneNote>,
    /// Set on fallback assessments so a human looks at the finding.
    #[serde(default)]
    pub needs_review: bool,
}

impl Assessment {
    /// The neutral assessment substituted when the analyst fails: zero
    /// deltas, low confidence, no auxiliary records, flagged for review.
    pub fn fallback(reason: &str) -> Self {
        Self {
            summary: "Automated analysis unavailable; manual review required.".to_string(),
            factor_impacts: FactorImpacts::default(),
            net_velocity_change: 0.0,
            confidence: Confidence {
                level: ConfidenceLevel::Low,
                score: 20,
                assumptions: Vec::new(),
                data_gaps: vec![reason.to_string()],
            },
            verification: Verification {
                claims_consistent: None,
                notes: "not verified".to_string(),
            },
            risks: Vec::new(),
            actions: Vec::new(),
            issues: Vec::new(),
            decisions: Vec::new(),
            early_warnings: Vec::new(),
            milestones: Vec::new(),
            needs_review: true,
        }
    }

    /// Extracts the per-factor deltas for the velocity model.
    pub fn deltas(&self) -> FactorDeltas {
        FactorDeltas {
            timeline_adherence: self.factor_impacts.timeline_adherence.change,
            funding_security: self.factor_impacts.funding_security.change,
            construction_progress: self.factor_impacts.construction_progress.change,
            operator_stability: self.factor_impacts.operator_stability.change,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_is_neutral_and_flagged() {
        let fallback = Assessment::fallback("analyst unreachable");
        assert!(fallback.deltas().is_zero());
        assert!(fallback.needs_review);
        assert_eq!(fallback.confidence.level, ConfidenceLevel::Low);
        assert_eq!(
            fallback.confidence.data_gaps,
            vec!["analyst unreachable".to_string()]
        );
        assert!(fallback.risks.is_empty());
        assert!(fallback.milestones.is_empty());
    }

    #[test]
    fn test_deltas_extraction() {
        let mut assessment = Assessment::fallback("n/a");
        assessment.factor_impacts.timeline_adherence.change = 5.0;
        assessment.factor_impacts.construction_progress.change = -2.0;

        let deltas = assessment.deltas();
        assert_eq!(deltas.timeline_adherence, 5.0);
        assert_eq!(deltas.funding_security, 0.0);
        assert_eq!(deltas.construction_progress, -2.0);
        assert_eq!(deltas.operator_stability, 0.0);
    }

    #[test]
    fn test_confidence_level_wire_names() {
        assert_eq!(
            serde_json::to_value(ConfidenceLevel::Medium).unwrap(),
            serde_json::json!("medium")
        );
        let parsed: ConfidenceLevel = serde_json::from_str("\"high\"").unwrap();
        assert_eq!(parsed, ConfidenceLevel::High);
    }

    #[test]
    fn test_assessment_parses_with_sparse_fields() {
        let json = r#"{
            "factor_impacts": {
                "funding_security": {"change": 3, "rationale": "new tranche closed"}
            },
            "summary": "Funding secured."
        }"#;
        let assessment: Assessment = serde_json::from_str(json).unwrap();
        assert_eq!(assessment.factor_impacts.funding_security.change, 3.0);
        assert_eq!(assessment.factor_impacts.timeline_adherence.change, 0.0);
        assert!(!assessment.needs_review);
        assert_eq!(assessment.confidence.level, ConfidenceLevel::Low);
        assert!(assessment.verification.claims_consistent.is_none());
    }

    #[test]
    fn test_assessment_requires_factor_impacts() {
        let err = serde_json::from_str::<Assessment>(r#"{"summary": "no impacts"}"#);
        assert!(err.is_err());
    }
}
