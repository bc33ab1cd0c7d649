//! Paired-seed comparison of candidate vs baseline edges.
//!
//! Both strategies are run on the same seeds, so `delta_i = cand_i - base_i`
//! cancels the scenario noise they share. The test statistic is the mean delta
//! over its standard error.
//!
//! Statistical caveat: the p-value uses a normal approximation to the
//! distribution of the t statistic. It is accurate for the sample counts the
//! search protocol uses (hundreds of seeds) and increasingly optimistic as `n`
//! shrinks.

use std::f64::consts::SQRT_2;

use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;
use thiserror::Error;

use crate::edge::mean;

/// The two sequences are not seed-aligned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompareError {
    #[error("edge sequences are not seed-aligned: candidate has {candidate} samples, baseline has {baseline}")]
    LengthMismatch { candidate: usize, baseline: usize },
}

/// Outcome of one paired comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Number of paired seeds.
    pub n: usize,
    pub cand_mean: f64,
    pub base_mean: f64,
    pub mean_delta: f64,
    /// Standard error of the mean delta.
    pub se: f64,
    pub t_stat: f64,
    /// Two-sided, in [0, 1]. 1.0 when there is no variance or no samples.
    pub p_value: f64,
    /// Fraction of seeds where the candidate strictly beat the baseline.
    pub win_rate: f64,
    /// Seeds with delta > 0.
    pub seed_wins: usize,
    /// Seeds with delta < 0.
    pub seed_losses: usize,
}

impl ComparisonResult {
    pub fn significance(&self) -> Significance {
        Significance::from_p_value(self.p_value)
    }

    pub fn verdict(&self) -> Verdict {
        if self.mean_delta > 0.0 {
            Verdict::Better
        } else if self.mean_delta < 0.0 {
            Verdict::Worse
        } else {
            Verdict::NoDifference
        }
    }
}

/// Conventional star grading of a p-value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Significance {
    None,
    /// p < 0.10
    Weak,
    /// p < 0.05
    Moderate,
    /// p < 0.01
    Strong,
}

impl Significance {
    pub fn from_p_value(p_value: f64) -> Self {
        if p_value < 0.01 {
            Significance::Strong
        } else if p_value < 0.05 {
            Significance::Moderate
        } else if p_value < 0.10 {
            Significance::Weak
        } else {
            Significance::None
        }
    }

    pub fn stars(self) -> &'static str {
        match self {
            Significance::None => "",
            Significance::Weak => "*",
            Significance::Moderate => "**",
            Significance::Strong => "***",
        }
    }
}

/// Direction of the observed difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Better,
    Worse,
    NoDifference,
}

/// Standard normal CDF.
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / SQRT_2)
}

/// Two-sided normal-approximation p-value for a test statistic.
pub fn two_sided_p_value(t_stat: f64) -> f64 {
    // 2 * (1 - Phi(|t|)) == erfc(|t| / sqrt 2), without the cancellation.
    erfc(t_stat.abs() / SQRT_2).clamp(0.0, 1.0)
}

/// Compare seed-aligned candidate and baseline edges.
///
/// Zero samples or zero variance produce neutral statistics (`t_stat = 0`,
/// `p_value = 1`), never a spurious signal.
pub fn paired_compare(candidate: &[f64], baseline: &[f64]) -> Result<ComparisonResult, CompareError> {
    if candidate.len() != baseline.len() {
        return Err(CompareError::LengthMismatch {
            candidate: candidate.len(),
            baseline: baseline.len(),
        });
    }

    let n = candidate.len();
    let deltas: Vec<f64> = candidate
        .iter()
        .zip(baseline)
        .map(|(c, b)| c - b)
        .collect();

    let mean_delta = mean(&deltas);
    let std_delta = if n > 1 {
        let ss: f64 = deltas.iter().map(|d| (d - mean_delta).powi(2)).sum();
        (ss / (n - 1) as f64).sqrt()
    } else {
        0.0
    };
    let se = if n > 0 { std_delta / (n as f64).sqrt() } else { 0.0 };

    let (t_stat, p_value) = if se > 0.0 {
        let t = mean_delta / se;
        (t, two_sided_p_value(t))
    } else {
        (0.0, 1.0)
    };

    let seed_wins = deltas.iter().filter(|&&d| d > 0.0).count();
    let seed_losses = deltas.iter().filter(|&&d| d < 0.0).count();
    let win_rate = if n > 0 { seed_wins as f64 / n as f64 } else { 0.0 };

    Ok(ComparisonResult {
        n,
        cand_mean: mean(candidate),
        base_mean: mean(baseline),
        mean_delta,
        se,
        t_stat,
        p_value,
        win_rate,
        seed_wins,
        seed_losses,
    })
}
