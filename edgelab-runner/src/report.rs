//! Search reports: recommendation rule, text rendering and the rating bridge.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use edgelab_core::{ComparisonResult, RatingSystem, Verdict};

use crate::config::SearchConfig;
use crate::fdr::{adjust_ranking, FdrResult};
use crate::search::PairEvaluation;
use crate::stage::{Stage, StageReport, StageResult, Termination};

const RULE: &str = "======================================================================";

// ─── Recommendation ─────────────────────────────────────────────────

/// What to do with the best candidate of the final ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recommendation {
    /// Clear improvement: adopt the candidate.
    Adopt {
        candidate: String,
        mean_delta: f64,
        t_stat: f64,
    },
    /// Positive but not convincing; the baseline remains acceptable.
    Marginal { candidate: String, mean_delta: f64 },
    KeepBaseline,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::Adopt {
                candidate,
                mean_delta,
                t_stat,
            } => write!(f, "adopt {candidate} (delta={mean_delta:+.2}, t={t_stat:+.2})"),
            Recommendation::Marginal {
                candidate,
                mean_delta,
            } => write!(f, "marginal improvement: {candidate} (delta={mean_delta:+.2})"),
            Recommendation::KeepBaseline => write!(f, "keep the baseline"),
        }
    }
}

/// Apply the adoption rule to the best entry of a best-first ranking.
pub fn recommend(ranking: &[StageResult], config: &SearchConfig) -> Recommendation {
    let Some(best) = ranking.first() else {
        return Recommendation::KeepBaseline;
    };
    let c = &best.comparison;
    if c.mean_delta > config.adopt_min_delta && c.t_stat.abs() > config.adopt_min_abs_t {
        Recommendation::Adopt {
            candidate: best.name.clone(),
            mean_delta: c.mean_delta,
            t_stat: c.t_stat,
        }
    } else if c.mean_delta > 0.0 {
        Recommendation::Marginal {
            candidate: best.name.clone(),
            mean_delta: c.mean_delta,
        }
    } else {
        Recommendation::KeepBaseline
    }
}

// ─── Search report ──────────────────────────────────────────────────

/// Complete record of one search run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchReport {
    pub generated_at: DateTime<Utc>,
    /// Display name of the baseline artifact.
    pub baseline: String,
    pub config: SearchConfig,
    /// Stage 0 first, then every stage that ran.
    pub stages: Vec<StageReport>,
    pub termination: Termination,
    /// Ranking of the last stage that evaluated candidates. Empty when nothing
    /// survived the broad screen.
    pub final_ranking: Vec<StageResult>,
    pub final_baseline_mean: f64,
    /// Benjamini-Hochberg view of `final_ranking`, same order.
    pub adjusted: Vec<FdrResult>,
    pub recommendation: Recommendation,
}

impl SearchReport {
    pub fn new(
        baseline: String,
        config: SearchConfig,
        stages: Vec<StageReport>,
        termination: Termination,
        final_ranking: Vec<StageResult>,
        final_baseline_mean: f64,
        recommendation: Recommendation,
    ) -> Self {
        let adjusted = adjust_ranking(&final_ranking, config.fdr_alpha);
        Self {
            generated_at: Utc::now(),
            baseline,
            config,
            stages,
            termination,
            final_ranking,
            final_baseline_mean,
            adjusted,
            recommendation,
        }
    }

    pub fn best(&self) -> Option<&StageResult> {
        self.final_ranking.first()
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Record every stage comparison as a match of candidate vs baseline,
    /// scored by seeds won and lost. Returns the number of matches that
    /// changed ratings.
    pub fn record_matches(&self, ratings: &mut RatingSystem) -> usize {
        let mut recorded = 0;
        for report in &self.stages {
            for result in &report.ranking {
                let c = &result.comparison;
                if result.name == self.baseline || c.seed_wins + c.seed_losses == 0 {
                    continue;
                }
                ratings.update_ratings(
                    &result.name,
                    &self.baseline,
                    saturating_u32(c.seed_wins),
                    saturating_u32(c.seed_losses),
                );
                recorded += 1;
            }
        }
        recorded
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable summary of every stage plus the final recommendation.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for report in &self.stages {
            out.push_str(&render_stage(report));
            out.push('\n');
        }
        if self.termination != Termination::Completed {
            out.push_str(&format!("  Stopping: {}.\n\n", self.termination.describe()));
        }
        out.push_str(&self.render_summary());
        out
    }

    fn render_summary(&self) -> String {
        let mut out = format!("{RULE}\n  FINAL SUMMARY\n{RULE}\n");
        out.push_str(&format!(
            "  Baseline ({}) mean edge: {:.2}\n\n",
            self.baseline, self.final_baseline_mean
        ));

        if self.final_ranking.is_empty() {
            out.push_str("  No candidates to report.\n");
        } else {
            out.push_str("  Ranking:\n");
            for (i, result) in self.final_ranking.iter().enumerate() {
                let c = &result.comparison;
                let marker = if i == 0 { " <-- BEST" } else { "" };
                let fdr = self
                    .adjusted
                    .get(i)
                    .map(|a| format!("  q={:.4}", a.adjusted_p))
                    .unwrap_or_default();
                out.push_str(&format!(
                    "    {}. {}: edge={:.2}  delta={:+.2}  t={:+.2}  p={:.4}{}{}\n",
                    i + 1,
                    result.name,
                    c.cand_mean,
                    c.mean_delta,
                    c.t_stat,
                    c.p_value,
                    fdr,
                    marker
                ));
            }
        }
        out.push('\n');

        match &self.recommendation {
            Recommendation::Adopt { .. } => {
                out.push_str(&format!("  Recommendation: {}\n", self.recommendation));
            }
            Recommendation::Marginal { .. } => {
                out.push_str(&format!("  {}\n", capitalize(&self.recommendation.to_string())));
                out.push_str(&format!(
                    "  Consider it, but {} is also a strong choice.\n",
                    self.baseline
                ));
            }
            Recommendation::KeepBaseline => {
                out.push_str(&format!("  No candidate beats {}.\n", self.baseline));
                out.push_str(&format!("  Recommendation: keep {}.\n", self.baseline));
            }
        }
        out
    }
}

// ─── Text helpers ───────────────────────────────────────────────────

/// One evaluated-candidate line: `delta=+1.23  SE=0.45  t=+2.73  win=61% **`.
pub fn format_stage_line(c: &ComparisonResult) -> String {
    format!(
        "delta={:+.2}  SE={:.2}  t={:+.2}  win={:.0}% {}",
        c.mean_delta,
        c.se,
        c.t_stat,
        c.win_rate * 100.0,
        c.significance().stars()
    )
    .trim_end()
    .to_string()
}

fn render_stage(report: &StageReport) -> String {
    let mut out = format!(
        "{RULE}\n  {} at {} samples\n{RULE}\n",
        report.stage, report.sample_count
    );
    out.push_str(&format!("  Baseline mean edge: {:.2}\n", report.baseline_mean));
    if report.stage == Stage::LockBaseline {
        return out;
    }

    for result in &report.ranking {
        out.push_str(&format!(
            "  {}: {}\n",
            result.name,
            format_stage_line(&result.comparison)
        ));
    }
    for skipped in &report.skipped {
        out.push_str(&format!(
            "  {}: COMPILE FAILED: {}\n",
            skipped.candidate_id,
            skipped.errors.join("; ")
        ));
    }
    out.push_str(&format!(
        "  Summary: {} evaluated, {} promoted\n",
        report.ranking.len(),
        report.promoted.len()
    ));
    out
}

/// Full block for a single pair evaluation.
pub fn render_comparison(evaluation: &PairEvaluation) -> String {
    let c = &evaluation.comparison;
    let mut out = format!(
        "{RULE}\n  Candidate: {}\n  Baseline:  {}\n  Samples:   {}\n{RULE}\n",
        evaluation.candidate, evaluation.baseline, c.n
    );
    out.push_str(&format!("  Candidate mean edge: {:.2}\n", c.cand_mean));
    out.push_str(&format!("  Baseline mean edge:  {:.2}\n", c.base_mean));
    out.push_str(&format!("  Mean delta:          {:+.2}\n", c.mean_delta));
    out.push_str(&format!("  SE(delta):           {:.2}\n", c.se));
    out.push_str(&format!("  t-stat:              {:+.3}\n", c.t_stat));
    out.push_str(&format!("  p-value:             {:.4}\n", c.p_value));
    out.push_str(&format!("  Win rate:            {:.1}%\n", c.win_rate * 100.0));

    let stars = c.significance().stars();
    let verdict = match c.verdict() {
        Verdict::Better => format!("Candidate BETTER by {:.2} {stars}", c.mean_delta),
        Verdict::Worse => format!("Candidate WORSE by {:.2} {stars}", c.mean_delta.abs()),
        Verdict::NoDifference => "No difference".to_string(),
    };
    out.push_str(&format!("  => {}\n", verdict.trim_end()));
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn saturating_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
