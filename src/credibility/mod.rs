//! Credibility scoring for findings.
//!
//! Produces a deterministic 0-100 trust score from source metadata and
//! extracted content, plus the flags and recommendation tier that drive the
//! admission decision.

use crate::models::{Credibility, Finding, Recommendation, SourceType};
use chrono::NaiveDate;

/// Authority scores by source domain. Checked in order with substring
/// matching on the lowercased URL; first hit wins.
const SOURCE_AUTHORITY: &[(&str, u32)] = &[
    ("sec.gov", 90),
    ("commerce.gov", 85),
    ("energy.gov", 85),
    ("nist.gov", 85),
    ("epa.gov", 80),
    ("state.gov", 80),
    ("pjm.com", 85),
    ("ercot.com", 85),
    ("caiso.com", 85),
    ("misoenergy.org", 85),
    ("nyiso.com", 85),
    ("spp.org", 85),
    ("reuters.com", 75),
    ("wsj.com", 75),
    ("ft.com", 75),
    ("bloomberg.com", 75),
    ("semianalysis.com", 70),
    ("datacenterdynamics.com", 70),
    ("utilitydive.com", 70),
    ("electrek.co", 65),
    ("theelec.net", 65),
];

/// URL markers that identify a local news outlet.
const LOCAL_NEWS_MARKERS: &[&str] = &[
    "gazette",
    "tribune",
    "herald",
    "times",
    "news",
    "post",
    "journal",
    "chronicle",
    "dispatch",
];

/// Authority by SEC filing type, matched in order against the source name.
/// "DEF 14A" must come before "4" so proxy statements do not read as Form 4.
const FILING_AUTHORITY: &[(&str, u32)] = &[
    ("10-K", 95),
    ("10-Q", 90),
    ("8-K", 85),
    ("S-1", 85),
    ("DEF 14A", 80),
    ("4", 75),
];

/// Vocabulary that marks text as carrying concrete data points.
const DATA_INDICATORS: &[&str] = &[
    "$",
    "billion",
    "million",
    "percent",
    "%",
    "2024",
    "2025",
    "2026",
    "2027",
    "Q1",
    "Q2",
    "Q3",
    "Q4",
    "MW",
    "GW",
    "employees",
    "jobs",
    "workforce",
];

/// Phrases that mark promotional or scraped-boilerplate text.
const SPAM_PHRASES: &[&str] = &[
    "click here",
    "subscribe",
    "sign up",
    "limited time",
    "act now",
    "exclusive offer",
];

/// Scores a finding's credibility as of `today`.
///
/// Weighted sum: source type (40/20) + authority x0.4 + filing bonus x0.2 +
/// government bonus + recency x0.1 + content quality x0.1, clamped to
/// [0, 100] and truncated to an integer.
pub fn score(finding: &Finding, today: NaiveDate) -> Credibility {
    let url = finding.raw_data.source_url.to_lowercase();
    let mut total = 0.0_f64;
    let mut flags: Vec<String> = Vec::new();

    match finding.raw_data.source_type {
        SourceType::Primary => {
            total += 40.0;
            flags.push("PRIMARY_SOURCE".to_string());
        }
        SourceType::Secondary => {
            total += 20.0;
            flags.push("SECONDARY_SOURCE".to_string());
        }
    }

    let authority = source_authority(&url);
    total += f64::from(authority) * 0.4;
    if authority >= 85 {
        flags.push("HIGH_AUTHORITY_SOURCE".to_string());
    } else if authority >= 70 {
        flags.push("MODERATE_AUTHORITY_SOURCE".to_string());
    } else {
        flags.push("LOW_AUTHORITY_SOURCE".to_string());
    }

    if url.contains("sec.gov") {
        if let Some((filing, filing_authority)) = filing_match(&finding.raw_data.source_name) {
            total += f64::from(filing_authority) * 0.2;
            flags.push(format!("SEC_FILING_{}", filing));
        }
    }

    if url.contains(".gov") {
        total += 10.0;
        flags.push("GOVERNMENT_SOURCE".to_string());
    }

    let recency = recency_score(&finding.raw_data.publication_date, today);
    total += f64::from(recency) * 0.1;
    if recency >= 90 {
        flags.push("VERY_RECENT".to_string());
    } else if recency >= 70 {
        flags.push("RECENT".to_string());
    } else if recency < 50 {
        flags.push("STALE_DATA".to_string());
    }

    let quality = content_quality(&finding.raw_data.extracted_text);
    total += f64::from(quality) * 0.1;
    if quality >= 80 {
        flags.push("HIGH_QUALITY_CONTENT".to_string());
    } else if quality < 50 {
        flags.push("LOW_QUALITY_CONTENT".to_string());
    }

    let final_score = total.clamp(0.0, 100.0) as u32;
    Credibility {
        score: final_score,
        flags,
        recommendation: recommendation_for(final_score),
    }
}

/// Recommendation tier for a final credibility score.
pub fn recommendation_for(score: u32) -> Recommendation {
    if score >= 80 {
        Recommendation::Approve
    } else if score >= 60 {
        Recommendation::ApproveModerate
    } else if score >= 40 {
        Recommendation::HoldForCorroboration
    } else {
        Recommendation::Reject
    }
}

/// Looks up the authority score for a lowercased URL.
fn source_authority(url_lower: &str) -> u32 {
    for (domain, authority) in SOURCE_AUTHORITY {
        if url_lower.contains(domain) {
            return *authority;
        }
    }
    if LOCAL_NEWS_MARKERS
        .iter()
        .any(|marker| url_lower.contains(marker))
    {
        return 55;
    }
    40
}

/// Finds the first filing type named in the source name.
fn filing_match(source_name: &str) -> Option<(&'static str, u32)> {
    FILING_AUTHORITY
        .iter()
        .find(|(filing, _)| source_name.contains(filing))
        .map(|(filing, authority)| (*filing, *authority))
}

/// Bucketed recency score from the publication date.
///
/// Only the leading `YYYY-MM-DD` is considered; anything unparseable gets
/// the neutral 50.
fn recency_score(publication_date: &str, today: NaiveDate) -> u32 {
    let prefix: String = publication_date.chars().take(10).collect();
    let published = match NaiveDate::parse_from_str(&prefix, "%Y-%m-%d") {
        Ok(d) => d,
        Err(_) => return 50,
    };

    let age_days = (today - published).num_days();
    if age_days <= 1 {
        100
    } else if age_days <= 3 {
        95
    } else if age_days <= 7 {
        90
    } else if age_days <= 14 {
        80
    } else if age_days <= 30 {
        70
    } else if age_days <= 60 {
        60
    } else if age_days <= 90 {
        50
    } else {
        40
    }
}

/// Heuristic quality score for extracted text, 0-100.
fn content_quality(text: &str) -> u32 {
    if text.trim().is_empty() {
        return 30;
    }

    let mut quality: i32 = 50;
    let lower = text.to_lowercase();

    let words = text.split_whitespace().count();
    if words >= 100 {
        quality += 15;
    } else if words >= 50 {
        quality += 10;
    } else if words < 20 {
        quality -= 10;
    }

    let indicator_count = DATA_INDICATORS
        .iter()
        .filter(|indicator| lower.contains(&indicator.to_lowercase()))
        .count() as i32;
    quality += (indicator_count * 3).min(20);

    if text.contains('"') || lower.contains("said") || lower.contains("announced") {
        quality += 10;
    }

    for phrase in SPAM_PHRASES {
        if lower.contains(phrase) {
            quality -= 10;
        }
    }

    quality.clamp(0, 100) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, FindingStatus, RawEvidence};
    use chrono::Utc;

    fn test_finding(
        source_type: SourceType,
        url: &str,
        source_name: &str,
        publication_date: &str,
        text: &str,
    ) -> Finding {
        Finding {
            finding_id: "F-test-PRJ-1-001".to_string(),
            project_id: "PRJ-1".to_string(),
            project_name: "Test Project".to_string(),
            category: Category::Financial,
            timestamp: Utc::now(),
            status: FindingStatus::PendingValidation,
            raw_data: RawEvidence {
                source_url: url.to_string(),
                source_type,
                source_name: source_name.to_string(),
                publication_date: publication_date.to_string(),
                content_hash: "hash".to_string(),
                extracted_text: text.to_string(),
            },
            credibility: None,
            analysis: None,
        }
    }

    fn fixed_today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    #[test]
    fn test_source_authority_table() {
        assert_eq!(source_authority("https://www.sec.gov/archives"), 90);
        assert_eq!(source_authority("https://pjm.com/queue"), 85);
        assert_eq!(source_authority("https://reuters.com/article"), 75);
        assert_eq!(source_authority("https://utilitydive.com/news"), 70);
        assert_eq!(source_authority("https://example-blog.io/entry"), 40);
    }

    #[test]
    fn test_local_news_heuristic() {
        assert_eq!(source_authority("https://phoenixgazette.com/story"), 55);
        assert_eq!(source_authority("https://columbus-dispatch.com/a"), 55);
    }

    #[test]
    fn test_filing_match_order() {
        assert_eq!(filing_match("SEC EDGAR - 10-K"), Some(("10-K", 95)));
        assert_eq!(filing_match("SEC EDGAR - DEF 14A"), Some(("DEF 14A", 80)));
        assert_eq!(filing_match("SEC EDGAR - Form 4"), Some(("4", 75)));
        assert_eq!(filing_match("Operator press release"), None);
    }

    #[test]
    fn test_recency_buckets() {
        let today = fixed_today();
        assert_eq!(recency_score("2026-03-01", today), 100);
        assert_eq!(recency_score("2026-02-28", today), 100);
        assert_eq!(recency_score("2026-02-26", today), 95);
        assert_eq!(recency_score("2026-02-22", today), 90);
        assert_eq!(recency_score("2026-02-15", today), 80);
        assert_eq!(recency_score("2026-01-30", today), 70);
        assert_eq!(recency_score("2025-12-31", today), 60);
        assert_eq!(recency_score("2025-12-01", today), 50);
        assert_eq!(recency_score("2025-11-30", today), 40);
    }

    #[test]
    fn test_recency_tolerates_datetime_suffix_and_garbage() {
        let today = fixed_today();
        assert_eq!(recency_score("2026-02-28T09:30:00Z", today), 100);
        assert_eq!(recency_score("last Tuesday", today), 50);
        assert_eq!(recency_score("", today), 50);
    }

    #[test]
    fn test_content_quality_empty_and_spam() {
        assert_eq!(content_quality(""), 30);
        assert_eq!(content_quality("   "), 30);
        // 5 words (-10), two spam phrases (-20)
        assert_eq!(content_quality("Click here to subscribe now"), 20);
    }

    #[test]
    fn test_content_quality_indicator_cap() {
        // 14 words (-10); 7 indicators would add 21, capped at 20
        let text = "$ billion million percent 2025 2026 MW plus some more \
                    filler words here today";
        assert_eq!(content_quality(text), 50 - 10 + 20);
    }

    #[test]
    fn test_score_truncates_fraction() {
        // secondary 20 + unknown authority 16 + unparseable date 5 +
        // quality 74 * 0.1 = 48.4, truncated to 48
        let body = "alignment ".repeat(100);
        let text = format!("{}$ billion million", body);
        let finding = test_finding(
            SourceType::Secondary,
            "https://example-blog.io/entry/42",
            "Example Blog",
            "sometime",
            &text,
        );
        let credibility = score(&finding, fixed_today());
        assert_eq!(credibility.score, 48);
        assert_eq!(
            credibility.recommendation,
            Recommendation::HoldForCorroboration
        );
    }

    #[test]
    fn test_primary_beats_secondary() {
        let secondary = test_finding(
            SourceType::Secondary,
            "https://example-blog.io/entry/42",
            "Example Blog",
            "sometime",
            "Construction update.",
        );
        let mut primary = secondary.clone();
        primary.raw_data.source_type = SourceType::Primary;

        let today = fixed_today();
        assert!(score(&primary, today).score > score(&secondary, today).score);
    }

    #[test]
    fn test_sec_filing_published_yesterday_approves() {
        let body = "expansion ".repeat(140);
        let text = format!(
            "The operator said the $20 billion project remains on schedule \
             for 2026. {}",
            body
        );
        let finding = test_finding(
            SourceType::Primary,
            "https://www.sec.gov/Archives/edgar/data/0000123/10-k.htm",
            "SEC EDGAR - 10-K",
            "2026-02-28",
            &text,
        );

        let credibility = score(&finding, fixed_today());
        assert_eq!(credibility.score, 100);
        assert_eq!(credibility.recommendation, Recommendation::Approve);
        assert!(credibility.flags.contains(&"PRIMARY_SOURCE".to_string()));
        assert!(credibility
            .flags
            .contains(&"HIGH_AUTHORITY_SOURCE".to_string()));
        assert!(credibility.flags.contains(&"SEC_FILING_10-K".to_string()));
        assert!(credibility.flags.contains(&"GOVERNMENT_SOURCE".to_string()));
        assert!(credibility.flags.contains(&"VERY_RECENT".to_string()));
    }

    #[test]
    fn test_recommendation_tiers() {
        assert_eq!(recommendation_for(100), Recommendation::Approve);
        assert_eq!(recommendation_for(80), Recommendation::Approve);
        assert_eq!(recommendation_for(79), Recommendation::ApproveModerate);
        assert_eq!(recommendation_for(60), Recommendation::ApproveModerate);
        assert_eq!(
            recommendation_for(59),
            Recommendation::HoldForCorroboration
        );
        assert_eq!(
            recommendation_for(40),
            Recommendation::HoldForCorroboration
        );
        assert_eq!(recommendation_for(39), Recommendation::Reject);
        assert_eq!(recommendation_for(0), Recommendation::Reject);
    }
}
