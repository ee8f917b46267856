//! Inbox reading and finding construction.
//!
//! The acquisition collaborator drops raw records into an inbox file under
//! the data directory; this module turns them into pipeline findings with
//! stable ids, bounded text, content hashes, and a category.

use crate::models::{Category, Finding, FindingStatus, RawEvidence, SourceType};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Configuration for finding intake.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    /// Records older than this many days are dropped.
    pub days_lookback: i64,
    /// Cap on findings admitted per project per run.
    pub max_findings_per_project: usize,
    /// Extracted text is truncated to this many characters.
    pub max_text_chars: usize,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            days_lookback: 7,
            max_findings_per_project: 20,
            max_text_chars: 2000,
        }
    }
}

impl From<&crate::config::ResearchConfig> for IntakeConfig {
    fn from(config: &crate::config::ResearchConfig) -> Self {
        Self {
            days_lookback: config.days_lookback,
            max_findings_per_project: config.max_findings_per_project,
            max_text_chars: IntakeConfig::default().max_text_chars,
        }
    }
}

/// A raw record as written by the acquisition collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxRecord {
    pub project_id: String,
    pub project_name: String,
    /// Optional pre-assigned category label; unknown labels fall back to
    /// keyword classification.
    #[serde(default)]
    pub category: Option<String>,
    pub source_url: String,
    pub source_type: SourceType,
    pub source_name: String,
    pub publication_date: String,
    pub extracted_text: String,
}

/// Turns inbox records into findings.
pub struct Intake {
    config: IntakeConfig,
}

impl Intake {
    pub fn new(config: IntakeConfig) -> Self {
        Self { config }
    }

    /// Reads the inbox file. A missing file is an empty inbox, not an
    /// error; the collaborator may simply not have run yet.
    pub fn read_inbox(&self, path: &Path) -> Result<Vec<InboxRecord>> {
        if !path.exists() {
            debug!("No inbox file at {}", path.display());
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read inbox file: {}", path.display()))?;
        let records: Vec<InboxRecord> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse inbox file: {}", path.display()))?;

        Ok(records)
    }

    /// Builds findings from inbox records: lookback filter, per-project
    /// cap, id assignment, text bounding, hashing, categorization.
    pub fn build_findings(
        &self,
        records: Vec<InboxRecord>,
        run_id: &str,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Vec<Finding> {
        let mut admitted_per_project: BTreeMap<String, usize> = BTreeMap::new();
        let mut findings = Vec::new();

        for record in records {
            if !self.within_lookback(&record.publication_date, today) {
                debug!(
                    "Skipping stale record for {} from {}",
                    record.project_id, record.source_name
                );
                continue;
            }

            let count = admitted_per_project
                .entry(record.project_id.clone())
                .or_insert(0);
            if *count >= self.config.max_findings_per_project {
                debug!("Per-project cap reached for {}", record.project_id);
                continue;
            }
            *count += 1;
            let seq = *count;

            let category = record
                .category
                .as_deref()
                .and_then(Category::parse)
                .unwrap_or_else(|| categorize(&record.extracted_text));

            let text = bound_text(&record.extracted_text, self.config.max_text_chars);
            let hash = content_hash(&text);

            findings.push(Finding {
                finding_id: format!("F-{}-{}-{:03}", run_id, record.project_id, seq),
                project_id: record.project_id,
                project_name: record.project_name,
                category,
                timestamp: now,
                status: FindingStatus::PendingValidation,
                raw_data: RawEvidence {
                    source_url: record.source_url,
                    source_type: record.source_type,
                    source_name: record.source_name,
                    publication_date: record.publication_date,
                    content_hash: hash,
                    extracted_text: text,
                },
                credibility: None,
                analysis: None,
            });
        }

        findings
    }

    /// Whether the publication date falls inside the lookback window.
    /// Unparseable dates pass through; staleness is judged later by the
    /// credibility scorer instead.
    fn within_lookback(&self, publication_date: &str, today: NaiveDate) -> bool {
        let prefix: String = publication_date.chars().take(10).collect();
        match NaiveDate::parse_from_str(&prefix, "%Y-%m-%d") {
            Ok(d) => (today - d).num_days() <= self.config.days_lookback,
            Err(_) => true,
        }
    }
}

/// Keyword classifier for records without a usable category label.
/// Buckets are checked in priority order; first hit wins.
pub fn categorize(text: &str) -> Category {
    let lower = text.to_lowercase();
    let matches = |terms: &[&str]| terms.iter().any(|t| lower.contains(t));

    if matches(&["delay", "postpone", "push back", "timeline", "schedule"]) {
        Category::Timeline
    } else if matches(&[
        "funding",
        "investment",
        "capital",
        "financing",
        "billion",
        "million",
    ]) {
        Category::Financial
    } else if matches(&[
        "construction",
        "building",
        "groundbreaking",
        "completion",
        "phase",
    ]) {
        Category::Construction
    } else if matches(&["workforce", "hiring", "jobs", "employment", "union", "labor"]) {
        Category::Workforce
    } else if matches(&["chips act", "subsidy", "award", "grant", "incentive"]) {
        Category::Regulatory
    } else if matches(&["grid", "power", "electricity", "interconnection", "utility"]) {
        Category::Infrastructure
    } else {
        Category::General
    }
}

/// SHA-256 hex digest of the stored text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Truncates to at most `max_chars` characters on a char boundary.
fn bound_text(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(project_id: &str, date: &str, text: &str) -> InboxRecord {
        InboxRecord {
            project_id: project_id.to_string(),
            project_name: "Test Project".to_string(),
            category: None,
            source_url: "https://reuters.com/a".to_string(),
            source_type: SourceType::Secondary,
            source_name: "Reuters".to_string(),
            publication_date: date.to_string(),
            extracted_text: text.to_string(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn build(records: Vec<InboxRecord>) -> Vec<Finding> {
        Intake::new(IntakeConfig::default()).build_findings(
            records,
            "2026-03-01-120000",
            today(),
            Utc::now(),
        )
    }

    #[test]
    fn test_categorize_keywords() {
        assert_eq!(
            categorize("Production start delayed by six months"),
            Category::Timeline
        );
        assert_eq!(
            categorize("Operator raised $2 billion in new financing"),
            Category::Financial
        );
        assert_eq!(
            categorize("Groundbreaking ceremony held at the site"),
            Category::Construction
        );
        assert_eq!(categorize("Hiring 500 workers this quarter"), Category::Workforce);
        assert_eq!(categorize("CHIPS Act award finalized"), Category::Regulatory);
        assert_eq!(
            categorize("Grid interconnection agreement signed"),
            Category::Infrastructure
        );
        assert_eq!(categorize("Quarterly newsletter recap"), Category::General);
    }

    #[test]
    fn test_categorize_priority_order() {
        // mentions both a delay and funding; timeline wins
        assert_eq!(
            categorize("Funding round closed despite construction delay"),
            Category::Timeline
        );
    }

    #[test]
    fn test_explicit_category_wins_over_keywords() {
        let mut r = record("PRJ-1", "2026-02-28", "Production start delayed");
        r.category = Some("financial".to_string());
        let findings = build(vec![r]);
        assert_eq!(findings[0].category, Category::Financial);
    }

    #[test]
    fn test_unknown_category_label_falls_back_to_keywords() {
        let mut r = record("PRJ-1", "2026-02-28", "Production start delayed");
        r.category = Some("press_release".to_string());
        let findings = build(vec![r]);
        assert_eq!(findings[0].category, Category::Timeline);
    }

    #[test]
    fn test_finding_ids_are_sequential_per_project() {
        let findings = build(vec![
            record("PRJ-1", "2026-02-28", "first"),
            record("PRJ-2", "2026-02-28", "other project"),
            record("PRJ-1", "2026-02-27", "second"),
        ]);

        assert_eq!(findings[0].finding_id, "F-2026-03-01-120000-PRJ-1-001");
        assert_eq!(findings[1].finding_id, "F-2026-03-01-120000-PRJ-2-001");
        assert_eq!(findings[2].finding_id, "F-2026-03-01-120000-PRJ-1-002");
        assert_eq!(findings[0].status, FindingStatus::PendingValidation);
    }

    #[test]
    fn test_lookback_filter() {
        let findings = build(vec![
            record("PRJ-1", "2026-02-22", "exactly seven days old"),
            record("PRJ-1", "2026-02-21", "eight days old, dropped"),
            record("PRJ-1", "last Tuesday", "unparseable date passes"),
        ]);

        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].raw_data.publication_date, "2026-02-22");
        assert_eq!(findings[1].raw_data.publication_date, "last Tuesday");
    }

    #[test]
    fn test_per_project_cap() {
        let records: Vec<_> = (0..25)
            .map(|i| record("PRJ-1", "2026-02-28", &format!("update {}", i)))
            .collect();
        let findings = build(records);

        assert_eq!(findings.len(), 20);
        assert_eq!(findings[19].finding_id, "F-2026-03-01-120000-PRJ-1-020");
    }

    #[test]
    fn test_text_bounded_and_hash_of_stored_text() {
        let long_text = "é".repeat(2500);
        let findings = build(vec![record("PRJ-1", "2026-02-28", &long_text)]);

        let stored = &findings[0].raw_data.extracted_text;
        assert_eq!(stored.chars().count(), 2000);
        // hash covers the stored (bounded) text, not the original
        assert_eq!(findings[0].raw_data.content_hash, content_hash(stored));
        assert_ne!(findings[0].raw_data.content_hash, content_hash(&long_text));
    }

    #[test]
    fn test_content_hash_known_vector() {
        assert_eq!(
            content_hash("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_identical_text_hashes_identically() {
        let findings = build(vec![
            record("PRJ-1", "2026-02-28", "same words"),
            record("PRJ-2", "2026-02-28", "same words"),
        ]);
        assert_eq!(
            findings[0].raw_data.content_hash,
            findings[1].raw_data.content_hash
        );
    }

    #[test]
    fn test_missing_inbox_is_empty() {
        let intake = Intake::new(IntakeConfig::default());
        let records = intake
            .read_inbox(Path::new("/nonexistent/findings_inbox.json"))
            .unwrap();
        assert!(records.is_empty());
    }
}
