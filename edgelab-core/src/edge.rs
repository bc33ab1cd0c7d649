//! Per-seed edge samples.

use serde::{Deserialize, Serialize};

/// Ordered per-seed performance values for one strategy in one evaluation run.
///
/// Index `i` is the edge realised on seed `i`. Two samples are only comparable
/// when they were produced on the same seeds, which in practice means the same
/// simulator and the same sample count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeSample(Vec<f64>);

impl EdgeSample {
    pub fn new(edges: Vec<f64>) -> Self {
        Self(edges)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }

    /// Arithmetic mean, or 0.0 for an empty sample.
    pub fn mean(&self) -> f64 {
        mean(&self.0)
    }
}

impl From<Vec<f64>> for EdgeSample {
    fn from(edges: Vec<f64>) -> Self {
        Self(edges)
    }
}

impl FromIterator<f64> for EdgeSample {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
