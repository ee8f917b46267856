//! Research run orchestration.
//!
//! A run moves findings through the pipeline one at a time: dedup,
//! credibility gate, analyst assessment, velocity update. Per-finding
//! failures never abort the run; the analyst degrades to the fallback
//! assessment and the error is recorded in the run log.

use crate::analyst::{Analyst, AnalystError, Assessment};
use crate::credibility;
use crate::dedup::{self, DupClass};
use crate::intake::Intake;
use crate::models::{FindingStatus, HealthChange, ProjectSnapshot, VelocityChange};
use crate::portfolio::{self, PortfolioMetrics};
use crate::store::{DataStore, ResearchLog, RunSummary};
use crate::velocity::{self, ScoreTable};
use anyhow::Result;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Final disposition of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    CompletedWithErrors,
    Failed,
}

/// Per-run audit record, written to `logs/run_{run_id}.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLog {
    pub run_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub projects_researched: usize,
    pub findings_discovered: usize,
    pub findings_validated: usize,
    pub findings_applied: usize,
    pub findings_rejected: usize,
    pub duplicates_skipped: usize,
    pub rejection_reasons: BTreeMap<String, usize>,
    pub projects_updated: Vec<String>,
    pub velocity_changes: Vec<VelocityChange>,
    pub health_status_changes: Vec<HealthChange>,
    pub errors: Vec<String>,
}

impl RunLog {
    pub fn new(run_id: &str, start_time: DateTime<Utc>) -> Self {
        Self {
            run_id: run_id.to_string(),
            start_time,
            end_time: None,
            status: RunStatus::Running,
            projects_researched: 0,
            findings_discovered: 0,
            findings_validated: 0,
            findings_applied: 0,
            findings_rejected: 0,
            duplicates_skipped: 0,
            rejection_reasons: BTreeMap::new(),
            projects_updated: Vec::new(),
            velocity_changes: Vec::new(),
            health_status_changes: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn record_rejection(&mut self, reason: &str) {
        self.findings_rejected += 1;
        *self.rejection_reasons.entry(reason.to_string()).or_insert(0) += 1;
    }

    /// Stamps the end time and settles the status. A status already
    /// forced to `Failed` is left alone.
    fn finalize(&mut self, end_time: DateTime<Utc>) {
        self.end_time = Some(end_time);
        if self.status == RunStatus::Running {
            self.status = if self.errors.is_empty() {
                RunStatus::Completed
            } else {
                RunStatus::CompletedWithErrors
            };
        }
    }
}

/// Knobs for a single run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Findings scoring below this are rejected.
    pub credibility_threshold: u32,
    /// Courtesy delay between analyst calls.
    pub api_delay_ms: u64,
    /// Whether to show the progress bar.
    pub show_progress: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            credibility_threshold: 60,
            api_delay_ms: 1000,
            show_progress: true,
        }
    }
}

/// What a completed run hands back to the caller.
pub struct RunOutcome {
    pub run_log: RunLog,
    pub metrics: PortfolioMetrics,
}

/// One research cycle over the portfolio.
pub struct ResearchRun {
    store: DataStore,
    intake: Intake,
    /// `None` runs offline: every finding gets the fallback assessment.
    analyst: Option<Box<dyn Analyst>>,
    options: RunOptions,
}

impl ResearchRun {
    pub fn new(
        store: DataStore,
        intake: Intake,
        analyst: Option<Box<dyn Analyst>>,
        options: RunOptions,
    ) -> Self {
        Self {
            store,
            intake,
            analyst,
            options,
        }
    }

    /// Executes the full cycle: load state, sync terminations, intake,
    /// process findings, recompute metrics, persist everything.
    pub async fn execute(&mut self) -> Result<RunOutcome> {
        let start_time = Utc::now();
        let run_id = start_time.format("%Y-%m-%d-%H%M%S").to_string();
        let today = start_time.date_naive();
        let mut run_log = RunLog::new(&run_id, start_time);

        info!("Starting research run {}", run_id);
        self.store.ensure_layout()?;

        let registry = self.store.load_projects()?;
        let mut scores = self.store.load_scores()?;
        let mut research_log = self.store.load_research_log()?;

        for project_id in velocity::sync_terminations(&mut scores, &registry.projects) {
            info!("Project {} marked terminated", project_id);
        }

        run_log.projects_researched = registry
            .projects
            .iter()
            .filter(|p| !p.terminated)
            .count();

        let records = self.intake.read_inbox(&self.store.inbox_path())?;
        let findings = self
            .intake
            .build_findings(records, &run_id, today, start_time);
        run_log.findings_discovered = findings.len();
        info!("Intake produced {} findings", run_log.findings_discovered);

        let progress = make_progress(findings.len() as u64, self.options.show_progress);
        // Flipped to false on a connect failure; later findings skip the
        // analyst instead of timing out one by one.
        let mut analyst_reachable = true;

        for mut finding in findings {
            if let Some(ref pb) = progress {
                pb.set_message(finding.finding_id.clone());
                pb.inc(1);
            }

            match dedup::classify(&finding, &research_log.seen_hashes, &research_log.findings) {
                DupClass::New => {}
                dup => {
                    debug!("Skipping {} ({})", finding.finding_id, dup.as_str());
                    run_log.duplicates_skipped += 1;
                    continue;
                }
            }

            let assessed = credibility::score(&finding, today);
            let cred_score = assessed.score;
            finding.credibility = Some(assessed);

            if cred_score < self.options.credibility_threshold {
                debug!(
                    "Rejecting {} (credibility {} < {})",
                    finding.finding_id, cred_score, self.options.credibility_threshold
                );
                finding.status = FindingStatus::Rejected;
                research_log.register_rejected(&finding, "insufficient_credibility");
                run_log.record_rejection("insufficient_credibility");
                continue;
            }

            finding.status = FindingStatus::Validated;
            run_log.findings_validated += 1;

            let corroboration = dedup::corroborating_findings(&finding, &research_log.findings);
            if !corroboration.is_empty() {
                debug!(
                    "{} corroborated by {} prior findings",
                    finding.finding_id,
                    corroboration.len()
                );
            }
            let contradictions = dedup::contradicting_findings(&finding, &research_log.findings);
            if !contradictions.is_empty() {
                warn!(
                    "{} contradicts {} prior findings",
                    finding.finding_id,
                    contradictions.len()
                );
            }

            let record = registry.projects.iter().find(|p| p.id == finding.project_id);

            let assessment = match (&self.analyst, record) {
                (None, _) => Assessment::fallback("offline mode"),
                (Some(_), None) => {
                    warn!(
                        "Finding {} references unknown project {}",
                        finding.finding_id, finding.project_id
                    );
                    Assessment::fallback("project not in registry")
                }
                (Some(_), Some(_)) if !analyst_reachable => {
                    Assessment::fallback("analyst unreachable")
                }
                (Some(analyst), Some(rec)) => {
                    let snapshot =
                        ProjectSnapshot::from_parts(rec, scores.scores.get(&finding.project_id));
                    let result = analyst.assess(&finding, &snapshot).await;
                    if self.options.api_delay_ms > 0 {
                        tokio::time::sleep(Duration::from_millis(self.options.api_delay_ms)).await;
                    }
                    match result {
                        Ok(assessment) => assessment,
                        Err(err @ AnalystError::Connect(_)) => {
                            warn!("Analyst unreachable, continuing without it: {}", err);
                            run_log.errors.push(err.to_string());
                            analyst_reachable = false;
                            Assessment::fallback("analyst unreachable")
                        }
                        Err(err) => {
                            warn!("Analyst failed for {}: {}", finding.finding_id, err);
                            run_log
                                .errors
                                .push(format!("{}: {}", finding.finding_id, err));
                            Assessment::fallback("analyst error")
                        }
                    }
                }
            };

            let deltas = assessment.deltas();
            finding.analysis =
                Some(serde_json::to_value(&assessment).unwrap_or(serde_json::Value::Null));

            match velocity::apply(&mut scores, &finding.project_id, deltas, today) {
                Some(change) => {
                    if change.old_health != change.new_health {
                        run_log.health_status_changes.push(HealthChange {
                            project_id: change.project_id.clone(),
                            from: change.old_health,
                            to: change.new_health,
                        });
                    }
                    if !run_log.projects_updated.contains(&finding.project_id) {
                        run_log.projects_updated.push(finding.project_id.clone());
                    }
                    run_log.velocity_changes.push(change);
                }
                None => {
                    debug!(
                        "No velocity state for {}; finding kept without score change",
                        finding.project_id
                    );
                }
            }

            finding.status = FindingStatus::Applied;
            run_log.findings_applied += 1;
            research_log.register_applied(finding);
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        let end_time = Utc::now();
        research_log.run_history.push(RunSummary {
            run_id: run_id.clone(),
            completed_at: end_time,
            findings_applied: run_log.findings_applied,
            findings_rejected: run_log.findings_rejected,
            duplicates_skipped: run_log.duplicates_skipped,
        });
        research_log.last_updated = Some(end_time);
        scores.last_updated = Some(end_time);

        let metrics = portfolio::recompute(&registry.projects, &scores, end_time);
        run_log.finalize(end_time);

        if let Err(err) = self.persist(&scores, &research_log, &metrics, &run_log) {
            run_log.status = RunStatus::Failed;
            let _ = self.store.save_run_log(&run_log);
            return Err(err);
        }

        info!(
            "Run {} finished: {} applied, {} rejected, {} duplicates",
            run_id, run_log.findings_applied, run_log.findings_rejected, run_log.duplicates_skipped
        );

        Ok(RunOutcome { run_log, metrics })
    }

    fn persist(
        &self,
        scores: &ScoreTable,
        research_log: &ResearchLog,
        metrics: &PortfolioMetrics,
        run_log: &RunLog,
    ) -> Result<()> {
        self.store.save_scores(scores)?;
        self.store.save_research_log(research_log)?;
        self.store.save_metrics(metrics)?;
        self.store.save_run_log(run_log)?;
        Ok(())
    }
}

fn make_progress(len: u64, show: bool) -> Option<ProgressBar> {
    if !show {
        return None;
    }
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    Some(pb)
}

/// Preview of what a run would process, for `--dry-run`.
pub struct IntakePreview {
    pub finding_id: String,
    pub project_id: String,
    pub category: String,
    pub disposition: String,
}

/// Classifies and scores intake without touching any state. Nothing is
/// written and the analyst is never called.
pub fn preview_intake(
    store: &DataStore,
    intake: &Intake,
    threshold: u32,
) -> Result<Vec<IntakePreview>> {
    let now = Utc::now();
    let today = now.date_naive();
    let research_log = store.load_research_log()?;

    let records = intake.read_inbox(&store.inbox_path())?;
    let findings = intake.build_findings(records, "preview", today, now);

    let mut previews = Vec::new();
    for mut finding in findings {
        let disposition =
            match dedup::classify(&finding, &research_log.seen_hashes, &research_log.findings) {
                DupClass::New => {
                    let assessed = credibility::score(&finding, today);
                    let label = if assessed.score >= threshold {
                        format!("would validate (credibility {})", assessed.score)
                    } else {
                        format!("would reject (credibility {})", assessed.score)
                    };
                    finding.credibility = Some(assessed);
                    label
                }
                dup => format!("would skip ({})", dup.as_str()),
            };

        previews.push(IntakePreview {
            finding_id: finding.finding_id,
            project_id: finding.project_id,
            category: finding.category.to_string(),
            disposition,
        });
    }

    Ok(previews)
}
