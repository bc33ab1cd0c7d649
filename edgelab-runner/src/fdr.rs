//! Benjamini-Hochberg false discovery rate adjustment for stage rankings.
//!
//! A stage compares every candidate against the same baseline, so the raw
//! p-values form one family. The adjusted p-values are reported next to the
//! ranking; they never change which candidates are promoted.

use serde::{Deserialize, Serialize};

use crate::stage::StageResult;

/// BH-adjusted view of one candidate's p-value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FdrResult {
    pub candidate_id: String,
    pub raw_p: f64,
    pub adjusted_p: f64,
    /// `adjusted_p <= alpha`.
    pub significant: bool,
}

/// Apply the Benjamini-Hochberg step-up procedure.
///
/// `adjusted_(k) = min over j >= k of p_(j) * m / j`, capped at 1. Results are
/// returned in the order of `p_values`.
pub fn benjamini_hochberg(p_values: &[(String, f64)], alpha: f64) -> Vec<FdrResult> {
    let m = p_values.len();
    if m == 0 {
        return Vec::new();
    }

    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&a, &b| p_values[a].1.total_cmp(&p_values[b].1));

    let mut adjusted = vec![1.0_f64; m];
    let mut running_min = 1.0_f64;
    for (rank0, &idx) in order.iter().enumerate().rev() {
        let scaled = p_values[idx].1 * m as f64 / (rank0 + 1) as f64;
        running_min = running_min.min(scaled).min(1.0);
        adjusted[idx] = running_min;
    }

    p_values
        .iter()
        .zip(adjusted)
        .map(|((id, raw_p), adjusted_p)| FdrResult {
            candidate_id: id.clone(),
            raw_p: *raw_p,
            adjusted_p,
            significant: adjusted_p <= alpha,
        })
        .collect()
}

/// Adjust a stage ranking, preserving its order.
pub fn adjust_ranking(ranking: &[StageResult], alpha: f64) -> Vec<FdrResult> {
    let p_values: Vec<(String, f64)> = ranking
        .iter()
        .map(|r| (r.definition.id.clone(), r.comparison.p_value))
        .collect();
    benjamini_hochberg(&p_values, alpha)
}
