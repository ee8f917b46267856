//! The four-factor velocity model.
//!
//! Owns the per-project score table and the arithmetic that folds analyst
//! factor deltas into an updated velocity score, health status, score
//! history, and trend string.

use crate::models::{
    FactorDeltas, FactorScores, HealthStatus, ProjectRecord, VelocityChange, VelocityState,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The persisted velocity score table, keyed by project id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreTable {
    /// Velocity state per project.
    pub scores: BTreeMap<String, VelocityState>,
    /// Stamped by the store on save.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Applies factor deltas to one project's state as of `today`.
///
/// Each factor moves by twice the recommended delta (sensitivity choice) and
/// is clamped to [0, 100] after doubling. The new velocity is the clamped,
/// one-decimal-rounded factor mean minus the delay penalty plus the ahead
/// bonus. Returns `None` when the project is not in the table or is already
/// terminated; evidence cannot revive a cancelled project.
pub fn apply(
    table: &mut ScoreTable,
    project_id: &str,
    deltas: FactorDeltas,
    today: NaiveDate,
) -> Option<VelocityChange> {
    let state = table.scores.get_mut(project_id)?;
    if state.health_status == HealthStatus::Terminated {
        return None;
    }

    let old_velocity = state.velocity_score;
    let old_health = state.health_status;

    let f = state.factor_scores;
    state.factor_scores = FactorScores {
        timeline_adherence: shift(f.timeline_adherence, deltas.timeline_adherence),
        funding_security: shift(f.funding_security, deltas.funding_security),
        construction_progress: shift(f.construction_progress, deltas.construction_progress),
        operator_stability: shift(f.operator_stability, deltas.operator_stability),
    };

    let base = state.factor_scores.mean();
    let new_velocity = round1((base - state.delay_penalty + state.ahead_bonus).clamp(0.0, 100.0));
    state.velocity_score = new_velocity;
    state.health_status = health_for(new_velocity);

    let first_score = state.previous_scores.is_empty();
    state
        .previous_scores
        .insert(0, (today.format("%Y-%m-%d").to_string(), old_velocity));
    state.previous_scores.truncate(10);

    state.trend_30d = if first_score {
        "NEW".to_string()
    } else {
        trend_string(old_velocity, new_velocity)
    };

    Some(VelocityChange {
        project_id: project_id.to_string(),
        old_velocity,
        new_velocity,
        old_health,
        new_health: state.health_status,
        trend: state.trend_30d.clone(),
    })
}

/// Forces terminated registry records onto their velocity state.
///
/// Returns the ids that transitioned on this call; already-terminated
/// states are left alone so repeated syncs stay quiet.
pub fn sync_terminations(table: &mut ScoreTable, records: &[ProjectRecord]) -> Vec<String> {
    let mut transitioned = Vec::new();

    for record in records {
        if !record.terminated {
            continue;
        }
        if let Some(state) = table.scores.get_mut(&record.id) {
            if state.health_status != HealthStatus::Terminated {
                state.health_status = HealthStatus::Terminated;
                transitioned.push(record.id.clone());
            }
        }
    }

    transitioned
}

/// Health classification step function over the velocity score.
///
/// Exactly 0 classifies as critical; terminated is never produced here.
pub fn health_for(velocity: f64) -> HealthStatus {
    if velocity >= 80.0 {
        HealthStatus::Executing
    } else if velocity >= 65.0 {
        HealthStatus::OnTrack
    } else if velocity >= 50.0 {
        HealthStatus::Monitoring
    } else if velocity >= 35.0 {
        HealthStatus::Distressed
    } else {
        HealthStatus::Critical
    }
}

/// Rounds to one decimal place.
pub(crate) fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

/// Signed one-decimal trend string ("+4.0", "-3.5", "0.0").
fn trend_string(old: f64, new: f64) -> String {
    let change = round1(new - old);
    if change > 0.0 {
        format!("+{:.1}", change)
    } else {
        format!("{:.1}", change)
    }
}

/// A factor score shifted by a doubled delta, clamped after doubling.
fn shift(current: f64, delta: f64) -> f64 {
    (current + 2.0 * delta).clamp(0.0, 100.0)
}
