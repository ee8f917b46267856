//! Duplicate detection and finding clustering.
//!
//! This module decides whether an incoming finding is new evidence, an exact
//! repeat, or a re-report of the same article, and derives the cluster keys
//! used to group related findings in the research log.

use crate::models::Finding;
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeSet;

/// Outcome of checking a finding against previously processed evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DupClass {
    /// Unseen evidence; proceed to scoring.
    New,
    /// Identical extracted text has already been processed.
    ExactDuplicate,
    /// A prior finding cites the same URL with the same publication date.
    UrlDuplicate,
}

impl DupClass {
    /// Lowercase label used in run-log histograms.
    pub fn as_str(&self) -> &'static str {
        match self {
            DupClass::New => "new",
            DupClass::ExactDuplicate => "exact_duplicate",
            DupClass::UrlDuplicate => "url_duplicate",
        }
    }
}

/// Classifies a finding against the set of seen content hashes and the pool
/// of previously applied findings.
///
/// The hash check runs first, so identical content is caught even when it
/// arrives via a different URL.
pub fn classify(finding: &Finding, seen_hashes: &BTreeSet<String>, pool: &[Finding]) -> DupClass {
    if seen_hashes.contains(&finding.raw_data.content_hash) {
        return DupClass::ExactDuplicate;
    }

    for prior in pool {
        if prior.raw_data.source_url == finding.raw_data.source_url
            && prior.raw_data.publication_date == finding.raw_data.publication_date
        {
            return DupClass::UrlDuplicate;
        }
    }

    DupClass::New
}

/// Derives the semantic cluster key for a finding:
/// `{project_id}_{category}_{quarter}`.
///
/// The quarter comes from the first 10 characters of the publication date
/// parsed as `YYYY-MM-DD`; anything unparseable clusters under "unknown".
pub fn cluster_key(finding: &Finding) -> String {
    format!(
        "{}_{}_{}",
        finding.project_id,
        finding.category.as_str(),
        quarter_of(&finding.raw_data.publication_date)
    )
}

/// "2026Q1"-style quarter label from a date string, "unknown" when the
/// date does not lead with `YYYY-MM-DD`.
fn quarter_of(date: &str) -> String {
    let prefix: String = date.chars().take(10).collect();
    match NaiveDate::parse_from_str(&prefix, "%Y-%m-%d") {
        Ok(d) => format!("{}Q{}", d.year(), (d.month() - 1) / 3 + 1),
        Err(_) => "unknown".to_string(),
    }
}

/// Prior findings that corroborate this one: same project, same category,
/// reported by a different source domain.
pub fn corroborating_findings<'a>(finding: &Finding, pool: &'a [Finding]) -> Vec<&'a Finding> {
    let own_domain = source_domain(&finding.raw_data.source_url);

    pool.iter()
        .filter(|prior| {
            prior.project_id == finding.project_id
                && prior.category == finding.category
                && source_domain(&prior.raw_data.source_url) != own_domain
        })
        .collect()
}

/// Prior findings that contradict this one.
///
/// Contradiction detection requires semantic comparison of the claims
/// themselves, which is outside this engine; the check always comes back
/// empty so callers can treat it uniformly with corroboration.
pub fn contradicting_findings<'a>(_finding: &Finding, _pool: &'a [Finding]) -> Vec<&'a Finding> {
    Vec::new()
}

/// Extracts the lowercased host from a URL, with any leading "www."
/// stripped, so the same outlet compares equal across URL forms.
fn source_domain(url: &str) -> String {
    let rest = match url.find("://") {
        Some(idx) => &url[idx + 3..],
        None => url,
    };
    let host = rest
        .split(|c| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or("");
    let host = host.to_lowercase();
    host.strip_prefix("www.").unwrap_or(&host).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, FindingStatus, RawEvidence, SourceType};
    use chrono::Utc;

    fn test_finding(project_id: &str, category: Category, url: &str, date: &str, hash: &str) -> Finding {
        Finding {
            finding_id: format!("F-test-{}-001", project_id),
            project_id: project_id.to_string(),
            project_name: "Test Project".to_string(),
            category,
            timestamp: Utc::now(),
            status: FindingStatus::PendingValidation,
            raw_data: RawEvidence {
                source_url: url.to_string(),
                source_type: SourceType::Secondary,
                source_name: "Test Source".to_string(),
                publication_date: date.to_string(),
                content_hash: hash.to_string(),
                extracted_text: "some text".to_string(),
            },
            credibility: None,
            analysis: None,
        }
    }

    #[test]
    fn test_exact_duplicate_wins_over_url_check() {
        let finding = test_finding(
            "PRJ-1",
            Category::Timeline,
            "https://reuters.com/a",
            "2026-02-14",
            "abc123",
        );
        let mut seen = BTreeSet::new();
        seen.insert("abc123".to_string());

        assert_eq!(classify(&finding, &seen, &[]), DupClass::ExactDuplicate);
    }

    #[test]
    fn test_url_duplicate() {
        let prior = test_finding(
            "PRJ-1",
            Category::Timeline,
            "https://reuters.com/a",
            "2026-02-14",
            "aaa",
        );
        let incoming = test_finding(
            "PRJ-1",
            Category::Timeline,
            "https://reuters.com/a",
            "2026-02-14",
            "bbb",
        );
        let seen = BTreeSet::new();

        assert_eq!(
            classify(&incoming, &seen, &[prior]),
            DupClass::UrlDuplicate
        );
    }

    #[test]
    fn test_same_url_different_date_is_new() {
        let prior = test_finding(
            "PRJ-1",
            Category::Timeline,
            "https://reuters.com/a",
            "2026-02-14",
            "aaa",
        );
        let incoming = test_finding(
            "PRJ-1",
            Category::Timeline,
            "https://reuters.com/a",
            "2026-02-15",
            "bbb",
        );
        let seen = BTreeSet::new();

        assert_eq!(classify(&incoming, &seen, &[prior]), DupClass::New);
    }

    #[test]
    fn test_cluster_key_quarters() {
        let q1 = test_finding("PRJ-1", Category::Timeline, "https://x.com", "2026-02-14", "h");
        assert_eq!(cluster_key(&q1), "PRJ-1_timeline_2026Q1");

        let q4 = test_finding(
            "PRJ-2",
            Category::Financial,
            "https://x.com",
            "2025-12-01T09:30:00Z",
            "h",
        );
        assert_eq!(cluster_key(&q4), "PRJ-2_financial_2025Q4");
    }

    #[test]
    fn test_cluster_key_unparseable_date() {
        let bad = test_finding("PRJ-1", Category::General, "https://x.com", "last week", "h");
        assert_eq!(cluster_key(&bad), "PRJ-1_general_unknown");

        let empty = test_finding("PRJ-1", Category::General, "https://x.com", "", "h");
        assert_eq!(cluster_key(&empty), "PRJ-1_general_unknown");
    }

    #[test]
    fn test_corroboration_requires_different_domain() {
        let incoming = test_finding(
            "PRJ-1",
            Category::Financial,
            "https://www.reuters.com/article-a",
            "2026-02-14",
            "aaa",
        );
        let same_outlet = test_finding(
            "PRJ-1",
            Category::Financial,
            "https://reuters.com/article-b",
            "2026-02-10",
            "bbb",
        );
        let other_outlet = test_finding(
            "PRJ-1",
            Category::Financial,
            "https://wsj.com/article-c",
            "2026-02-11",
            "ccc",
        );
        let other_category = test_finding(
            "PRJ-1",
            Category::Workforce,
            "https://bloomberg.com/article-d",
            "2026-02-12",
            "ddd",
        );
        let other_project = test_finding(
            "PRJ-2",
            Category::Financial,
            "https://ft.com/article-e",
            "2026-02-13",
            "eee",
        );

        let pool = vec![same_outlet, other_outlet, other_category, other_project];
        let corroborating = corroborating_findings(&incoming, &pool);

        assert_eq!(corroborating.len(), 1);
        assert_eq!(corroborating[0].raw_data.content_hash, "ccc");
    }

    #[test]
    fn test_contradictions_are_empty() {
        let incoming = test_finding(
            "PRJ-1",
            Category::Timeline,
            "https://reuters.com/a",
            "2026-02-14",
            "aaa",
        );
        let prior = test_finding(
            "PRJ-1",
            Category::Timeline,
            "https://wsj.com/b",
            "2026-02-10",
            "bbb",
        );
        assert!(contradicting_findings(&incoming, &[prior]).is_empty());
    }

    #[test]
    fn test_source_domain() {
        assert_eq!(source_domain("https://www.reuters.com/a/b"), "reuters.com");
        assert_eq!(source_domain("http://sec.gov/filings?q=1"), "sec.gov");
        assert_eq!(source_domain("pjm.com"), "pjm.com");
    }
}
