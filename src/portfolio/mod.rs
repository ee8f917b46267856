//! Portfolio-wide metric aggregation.
//!
//! Recomputes every roll-up from scratch each cycle: health tallies,
//! capital totals, portfolio velocity, top movers, and per-sector metrics.
//! Nothing here is incremental, so a recompute over identical inputs is
//! bit-identical.

use crate::models::{HealthStatus, ProjectRecord, VelocityState};
use crate::velocity::{round1, ScoreTable};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Project tallies per health status.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HealthCounts {
    pub executing: usize,
    pub on_track: usize,
    pub monitoring: usize,
    pub distressed: usize,
    pub critical: usize,
    pub terminated: usize,
}

impl HealthCounts {
    /// Tallies one project.
    pub fn record(&mut self, status: HealthStatus) {
        match status {
            HealthStatus::Executing => self.executing += 1,
            HealthStatus::OnTrack => self.on_track += 1,
            HealthStatus::Monitoring => self.monitoring += 1,
            HealthStatus::Distressed => self.distressed += 1,
            HealthStatus::Critical => self.critical += 1,
            HealthStatus::Terminated => self.terminated += 1,
        }
    }

    /// Monitoring or worse, excluding terminated.
    pub fn at_risk(&self) -> usize {
        self.monitoring + self.distressed + self.critical
    }
}

/// One entry in the top improvers or top decliners panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopMover {
    /// 1-based rank within its panel.
    pub rank: u32,
    pub project_id: String,
    pub project_name: String,
    pub sector: String,
    pub velocity_score: f64,
    /// The trend string that earned the placement.
    pub change: String,
}

/// Roll-up for one sector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorMetrics {
    /// Mean velocity over every project in the sector, one decimal.
    pub avg_velocity: f64,
    /// Capital committed across the sector, in dollars.
    pub capital_committed: f64,
    /// Number of projects in the sector.
    pub projects: usize,
    pub executing: usize,
    pub on_track: usize,
    /// Distressed, critical, or terminated.
    pub distressed_or_worse: usize,
}

/// The derived portfolio-wide metrics document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioMetrics {
    pub as_of: DateTime<Utc>,
    pub total_projects: usize,
    /// Capital committed across all projects, terminated included.
    pub total_capital_committed: f64,
    /// Human-readable short form of the total ("$1.76T").
    pub total_capital_display: String,
    /// Mean velocity over non-terminated projects, one decimal.
    pub portfolio_velocity: f64,
    pub health_counts: HealthCounts,
    /// Share of projects monitoring or worse, as a rounded percentage.
    pub at_risk_pct: u32,
    pub top_improvers: Vec<TopMover>,
    pub top_decliners: Vec<TopMover>,
    pub sectors: BTreeMap<String, SectorMetrics>,
}

#[derive(Default)]
struct SectorAccum {
    velocity_sum: f64,
    projects: usize,
    capital_committed: f64,
    executing: usize,
    on_track: usize,
    distressed_or_worse: usize,
}

/// Recomputes the full metrics document from the registry and score table.
///
/// Projects missing from the score table read as monitoring at velocity 50.
/// A `terminated` registry flag wins over whatever the state says, so the
/// roll-up is correct even against a table that missed a termination sync.
pub fn recompute(
    records: &[ProjectRecord],
    table: &ScoreTable,
    as_of: DateTime<Utc>,
) -> PortfolioMetrics {
    let mut health_counts = HealthCounts::default();
    let mut total_capital = 0.0_f64;
    let mut active_velocity_sum = 0.0_f64;
    let mut active_count = 0_usize;
    let mut accums: BTreeMap<String, SectorAccum> = BTreeMap::new();
    let mut movers: Vec<(f64, &ProjectRecord, &VelocityState)> = Vec::new();

    for record in records {
        let state = table.scores.get(&record.id);
        let velocity = state.map(|s| s.velocity_score).unwrap_or(50.0);
        let health = if record.terminated {
            HealthStatus::Terminated
        } else {
            state
                .map(|s| s.health_status)
                .unwrap_or(HealthStatus::Monitoring)
        };

        health_counts.record(health);
        total_capital += record.capital_committed;

        if health != HealthStatus::Terminated {
            active_velocity_sum += velocity;
            active_count += 1;

            if let Some(s) = state {
                let value = trend_value(&s.trend_30d);
                if value != 0.0 {
                    movers.push((value, record, s));
                }
            }
        }

        let accum = accums.entry(record.sector.clone()).or_default();
        accum.velocity_sum += velocity;
        accum.projects += 1;
        accum.capital_committed += record.capital_committed;
        match health {
            HealthStatus::Executing => accum.executing += 1,
            HealthStatus::OnTrack => accum.on_track += 1,
            HealthStatus::Monitoring => {}
            HealthStatus::Distressed | HealthStatus::Critical | HealthStatus::Terminated => {
                accum.distressed_or_worse += 1
            }
        }
    }

    let total_projects = records.len();
    let portfolio_velocity = if active_count > 0 {
        round1(active_velocity_sum / active_count as f64)
    } else {
        0.0
    };

    let improvers: Vec<_> = movers.iter().filter(|(v, _, _)| *v > 0.0).cloned().collect();
    let decliners: Vec<_> = movers.iter().filter(|(v, _, _)| *v < 0.0).cloned().collect();

    let sectors = accums
        .into_iter()
        .map(|(sector, a)| {
            let metrics = SectorMetrics {
                avg_velocity: round1(a.velocity_sum / a.projects as f64),
                capital_committed: a.capital_committed,
                projects: a.projects,
                executing: a.executing,
                on_track: a.on_track,
                distressed_or_worse: a.distressed_or_worse,
            };
            (sector, metrics)
        })
        .collect();

    PortfolioMetrics {
        as_of,
        total_projects,
        total_capital_committed: total_capital,
        total_capital_display: format_currency(total_capital),
        portfolio_velocity,
        at_risk_pct: percentage(health_counts.at_risk(), total_projects),
        health_counts,
        top_improvers: ranked(improvers, true),
        top_decliners: ranked(decliners, false),
        sectors,
    }
}

/// Numeric value of a trend string for ranking.
///
/// "NEW" sorts as +100 so newly tracked projects surface in the improvers
/// panel at least once; anything unparseable counts as no movement.
fn trend_value(trend: &str) -> f64 {
    if trend == "NEW" {
        return 100.0;
    }
    trend.parse::<f64>().unwrap_or(0.0)
}

/// Sorts movers, keeps the top 5, and assigns 1-based ranks.
fn ranked(
    mut entries: Vec<(f64, &ProjectRecord, &VelocityState)>,
    descending: bool,
) -> Vec<TopMover> {
    entries.sort_by(|a, b| {
        let ord = a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal);
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });

    entries
        .into_iter()
        .take(5)
        .enumerate()
        .map(|(i, (_, record, state))| TopMover {
            rank: i as u32 + 1,
            project_id: record.id.clone(),
            project_name: record.name.clone(),
            sector: record.sector.clone(),
            velocity_score: state.velocity_score,
            change: state.trend_30d.clone(),
        })
        .collect()
}

/// Rounded integer percentage; 0 when the denominator is 0.
fn percentage(part: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (part as f64 / total as f64 * 100.0).round() as u32
}

/// Short-form dollar display: "$1.76T", "$20.0B", "$3.5M", "$950,000".
pub(crate) fn format_currency(dollars: f64) -> String {
    if dollars >= 1e12 {
        format!("${:.2}T", dollars / 1e12)
    } else if dollars >= 1e9 {
        format!("${:.1}B", dollars / 1e9)
    } else if dollars >= 1e6 {
        format!("${:.1}M", dollars / 1e6)
    } else {
        format!("${}", group_thousands(dollars.round() as u64))
    }
}

/// Inserts thousands separators into a nonnegative integer.
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
