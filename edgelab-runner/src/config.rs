//! Search protocol configuration, loadable from TOML.
//!
//! A protocol file has three parts:
//!
//! ```toml
//! [search]
//! stage1_samples = 200
//! stage2_samples = 500
//! stage3_samples = 1000
//!
//! [baseline]
//! id = "S80"
//! family = "StaticSym"
//! params = { bps = 80 }
//!
//! [[candidates]]
//! id = "A1"
//! family = "StaticAsym"
//! params = { bid_bps = 82, ask_bps = 78 }
//! ```
//!
//! Every `[search]` field has a default, so the table may be omitted.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use edgelab_core::{CandidateDefinition, RatingConfig};

use crate::stage::Stage;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("fdr_alpha must be in (0, 1], got {0}")]
    Alpha(f64),
    #[error("duplicate candidate id '{0}'")]
    DuplicateCandidate(String),
}

/// Sample counts, cutoffs and caps for the staged search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Seeds per run in the baseline lock and the broad screen.
    pub stage1_samples: usize,
    /// Seeds per run in the narrowing stage.
    pub stage2_samples: usize,
    /// Seeds per run in the final validation.
    pub stage3_samples: usize,
    /// Broad-screen candidates with a mean delta below this are eliminated.
    pub elimination_floor: f64,
    /// Maximum candidates promoted out of the broad screen.
    pub stage1_keep: usize,
    /// Maximum candidates promoted out of the narrowing stage.
    pub stage2_keep: usize,
    /// Mean delta the best candidate must exceed to be recommended outright.
    pub adopt_min_delta: f64,
    /// |t| the best candidate must exceed to be recommended outright.
    pub adopt_min_abs_t: f64,
    /// Significance level for the Benjamini-Hochberg adjusted ranking.
    pub fdr_alpha: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            stage1_samples: 200,
            stage2_samples: 500,
            stage3_samples: 1000,
            elimination_floor: -5.0,
            stage1_keep: 8,
            stage2_keep: 3,
            adopt_min_delta: 3.0,
            adopt_min_abs_t: 1.5,
            fdr_alpha: 0.05,
        }
    }
}

impl SearchConfig {
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let counts = [
            ("stage1_samples", self.stage1_samples),
            ("stage2_samples", self.stage2_samples),
            ("stage3_samples", self.stage3_samples),
            ("stage1_keep", self.stage1_keep),
            ("stage2_keep", self.stage2_keep),
        ];
        for (field, value) in counts {
            if value == 0 {
                return Err(ConfigError::Zero(field));
            }
        }
        if !(self.fdr_alpha > 0.0 && self.fdr_alpha <= 1.0) {
            return Err(ConfigError::Alpha(self.fdr_alpha));
        }
        Ok(())
    }

    /// Seeds per run for a stage. The baseline lock shares the broad screen's count.
    pub fn samples_for(&self, stage: Stage) -> usize {
        match stage {
            Stage::LockBaseline | Stage::BroadScreen => self.stage1_samples,
            Stage::Narrow => self.stage2_samples,
            Stage::FinalValidation => self.stage3_samples,
        }
    }
}

/// A complete search definition: settings, baseline and candidate population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolFile {
    #[serde(default)]
    pub search: SearchConfig,
    /// Used when stage comparisons are recorded into a rating population.
    #[serde(default)]
    pub rating: RatingConfig,
    pub baseline: CandidateDefinition,
    #[serde(default)]
    pub candidates: Vec<CandidateDefinition>,
}

impl ProtocolFile {
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let file: Self = toml::from_str(toml_str)?;
        file.validate()?;
        Ok(file)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let toml_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&toml_str)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.search.validate()?;
        let mut seen = HashSet::new();
        for candidate in &self.candidates {
            if !seen.insert(candidate.id.as_str()) {
                return Err(ConfigError::DuplicateCandidate(candidate.id.clone()));
            }
        }
        Ok(())
    }
}
