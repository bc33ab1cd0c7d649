//! Stage model for the search protocol: identifiers, per-stage results and
//! the promotion rules that shrink the candidate pool.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use edgelab_core::{CandidateDefinition, ComparisonResult};

use crate::config::SearchConfig;

/// Stages of the search, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Stage 0: run the baseline once to fix the broad-screen reference.
    LockBaseline,
    /// Stage 1: every candidate, cheapest sample count.
    BroadScreen,
    /// Stage 2: survivors of the screen against a fresh, larger baseline run.
    Narrow,
    /// Stage 3: the few remaining candidates at the largest sample count.
    FinalValidation,
}

impl Stage {
    pub fn number(self) -> u8 {
        match self {
            Stage::LockBaseline => 0,
            Stage::BroadScreen => 1,
            Stage::Narrow => 2,
            Stage::FinalValidation => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::LockBaseline => "Lock baseline",
            Stage::BroadScreen => "Broad screen",
            Stage::Narrow => "Narrow",
            Stage::FinalValidation => "Final validation",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage {} ({})", self.number(), self.label())
    }
}

/// A comparison tagged with the candidate that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub definition: CandidateDefinition,
    /// Display name reported by the compiled artifact.
    pub name: String,
    pub comparison: ComparisonResult,
}

impl StageResult {
    pub fn mean_delta(&self) -> f64 {
        self.comparison.mean_delta
    }
}

/// A candidate dropped from a stage because it could not be compiled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedCandidate {
    pub candidate_id: String,
    pub errors: Vec<String>,
}

/// Everything observed in one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: Stage,
    pub sample_count: usize,
    /// Mean edge of this stage's own baseline run.
    pub baseline_mean: f64,
    /// All evaluated candidates, best mean delta first.
    pub ranking: Vec<StageResult>,
    pub skipped: Vec<SkippedCandidate>,
    /// Ids of the candidates carried into the next stage.
    pub promoted: Vec<String>,
}

impl StageReport {
    pub fn baseline_lock(sample_count: usize, baseline_mean: f64) -> Self {
        Self {
            stage: Stage::LockBaseline,
            sample_count,
            baseline_mean,
            ranking: Vec::new(),
            skipped: Vec::new(),
            promoted: Vec::new(),
        }
    }
}

/// Why the search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Nothing survived the broad screen; only the baseline is reported.
    NoSurvivors,
    /// No narrowed candidate had a positive mean delta.
    NoImprovement,
    /// Final validation ran.
    Completed,
}

impl Termination {
    pub fn describe(self) -> &'static str {
        match self {
            Termination::NoSurvivors => "no candidate survived the broad screen",
            Termination::NoImprovement => {
                "no candidate shows a positive mean delta after narrowing; the baseline is at or near the practical ceiling"
            }
            Termination::Completed => "final validation completed",
        }
    }
}

/// What a stage decides about the pool.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    Continue(Vec<CandidateDefinition>),
    Terminate(Termination),
}

/// Sort best-first by mean delta. Stable, so equal deltas keep evaluation order.
/// NaN deltas sort last.
pub fn rank_by_delta(results: &mut [StageResult]) {
    results.sort_by(|a, b| {
        let (a, b) = (a.mean_delta(), b.mean_delta());
        match (a.is_nan(), b.is_nan()) {
            (false, false) => b.total_cmp(&a),
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (true, true) => Ordering::Equal,
        }
    })
}

/// Broad-screen rule: drop anything below `floor`, keep the best `keep`.
///
/// `ranking` must already be sorted by [`rank_by_delta`].
pub fn screen(ranking: &[StageResult], floor: f64, keep: usize) -> Vec<&StageResult> {
    ranking
        .iter()
        .filter(|r| r.mean_delta() >= floor)
        .take(keep)
        .collect()
}

/// Narrowing rule: only strictly positive mean deltas, best `keep`.
///
/// `ranking` must already be sorted by [`rank_by_delta`].
pub fn narrow(ranking: &[StageResult], keep: usize) -> Vec<&StageResult> {
    ranking
        .iter()
        .filter(|r| r.mean_delta() > 0.0)
        .take(keep)
        .collect()
}

/// Apply the promotion rule of `report.stage` and record the promoted ids.
///
/// Only the broad screen and the narrowing stage carry candidates forward.
/// Any other stage ends the search as completed.
pub fn promote(report: &mut StageReport, config: &SearchConfig) -> StageOutcome {
    let (kept, empty) = match report.stage {
        Stage::BroadScreen => (
            screen(&report.ranking, config.elimination_floor, config.stage1_keep),
            Termination::NoSurvivors,
        ),
        Stage::Narrow => (
            narrow(&report.ranking, config.stage2_keep),
            Termination::NoImprovement,
        ),
        Stage::LockBaseline | Stage::FinalValidation => {
            return StageOutcome::Terminate(Termination::Completed)
        }
    };
    if kept.is_empty() {
        return StageOutcome::Terminate(empty);
    }
    let next: Vec<CandidateDefinition> = kept.iter().map(|r| r.definition.clone()).collect();
    report.promoted = next.iter().map(|d| d.id.clone()).collect();
    StageOutcome::Continue(next)
}
