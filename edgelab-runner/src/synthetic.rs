//! Deterministic synthetic compiler and simulator.
//!
//! Stand-ins for a real strategy compiler and market simulator. A candidate's
//! `edge` and `noise` params describe its per-seed edge distribution:
//!
//! ```text
//! edge_i = (edge - reference.edge) + scenario_i + noise * z_i
//! ```
//!
//! `scenario_i` depends only on `(master_seed, sample_count, i)`, so every
//! artifact run at the same sample count sees the same scenarios and the
//! shared component cancels in a paired comparison. `z_i` is idiosyncratic
//! per artifact name. Seeds are derived with BLAKE3, so results do not depend
//! on how rayon schedules the work.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde_json::Value;

use edgelab_core::{
    CandidateDefinition, CompileFailure, Compiler, EdgeSample, SimulationError, Simulator,
    StrategyArtifact,
};

/// Spread of the scenario component shared by all artifacts.
pub const DEFAULT_SCENARIO_SIGMA: f64 = 10.0;

/// A compiled synthetic strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticArtifact {
    pub name: String,
    /// Mean edge before normalization.
    pub edge: f64,
    /// Standard deviation of the idiosyncratic component.
    pub noise: f64,
}

impl SyntheticArtifact {
    pub fn new(name: impl Into<String>, edge: f64, noise: f64) -> Self {
        Self {
            name: name.into(),
            edge,
            noise,
        }
    }

    /// Zero-edge normalizer handed to the simulator as the reference side.
    pub fn reference() -> Self {
        Self::new("Normalizer", 0.0, 0.0)
    }
}

impl StrategyArtifact for SyntheticArtifact {
    fn name(&self) -> &str {
        &self.name
    }
}

// ─── Compiler ───────────────────────────────────────────────────────

/// Builds [`SyntheticArtifact`]s from candidate params.
///
/// Recognized params: `edge` (number, default 0), `noise` (non-negative
/// number, default 1), `name` (string, default the candidate id) and
/// `fail_compile` (bool; `true` forces a compile failure).
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticCompiler;

impl SyntheticCompiler {
    fn number(
        candidate: &CandidateDefinition,
        key: &str,
        default: f64,
        errors: &mut Vec<String>,
    ) -> f64 {
        match candidate.param(key) {
            None => default,
            Some(value) => match value.as_f64() {
                Some(x) if x.is_finite() => x,
                _ => {
                    errors.push(format!("param '{key}' must be a finite number, got {value}"));
                    default
                }
            },
        }
    }
}

impl Compiler for SyntheticCompiler {
    type Artifact = SyntheticArtifact;

    fn compile(&self, candidate: &CandidateDefinition) -> Result<SyntheticArtifact, CompileFailure> {
        let mut errors = Vec::new();

        if let Some(Value::Bool(true)) = candidate.param("fail_compile") {
            errors.push("compilation forced to fail by 'fail_compile'".to_string());
        }
        let edge = Self::number(candidate, "edge", 0.0, &mut errors);
        let noise = Self::number(candidate, "noise", 1.0, &mut errors);
        if noise < 0.0 {
            errors.push(format!("param 'noise' must be non-negative, got {noise}"));
        }
        let name = match candidate.param("name") {
            Some(Value::String(name)) => name.clone(),
            _ => candidate.id.clone(),
        };

        if errors.is_empty() {
            Ok(SyntheticArtifact::new(name, edge, noise))
        } else {
            Err(CompileFailure::new(candidate.id.clone(), errors))
        }
    }
}

// ─── Simulator ──────────────────────────────────────────────────────

/// Seed-aligned synthetic edge generator.
#[derive(Debug, Clone)]
pub struct SyntheticSimulator {
    master_seed: u64,
    scenario_sigma: f64,
}

impl SyntheticSimulator {
    pub fn new(master_seed: u64) -> Self {
        Self {
            master_seed,
            scenario_sigma: DEFAULT_SCENARIO_SIGMA,
        }
    }

    pub fn with_scenario_sigma(mut self, sigma: f64) -> Self {
        self.scenario_sigma = sigma;
        self
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Scenario seed for seed index `i` of a run of `sample_count` seeds.
    pub fn scenario_seed(&self, sample_count: usize, i: usize) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(&(sample_count as u64).to_le_bytes());
        hasher.update(&(i as u64).to_le_bytes());
        first_u64(hasher.finalize().as_bytes())
    }

    fn artifact_seed(scenario_seed: u64, artifact: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&scenario_seed.to_le_bytes());
        hasher.update(artifact.as_bytes());
        first_u64(hasher.finalize().as_bytes())
    }
}

impl Simulator<SyntheticArtifact> for SyntheticSimulator {
    fn run(
        &self,
        subject: &SyntheticArtifact,
        reference: &SyntheticArtifact,
        sample_count: usize,
    ) -> Result<EdgeSample, SimulationError> {
        if !self.scenario_sigma.is_finite() || self.scenario_sigma < 0.0 {
            return Err(SimulationError::new(
                &subject.name,
                format!("invalid scenario sigma {}", self.scenario_sigma),
            ));
        }

        let offset = subject.edge - reference.edge;
        let edges: Vec<f64> = (0..sample_count)
            .into_par_iter()
            .map(|i| {
                let seed = self.scenario_seed(sample_count, i);
                let scenario = standard_normal(&mut StdRng::seed_from_u64(seed));
                let mut own = StdRng::seed_from_u64(Self::artifact_seed(seed, &subject.name));
                offset + self.scenario_sigma * scenario + subject.noise * standard_normal(&mut own)
            })
            .collect();
        Ok(EdgeSample::new(edges))
    }
}

fn first_u64(bytes: &[u8; 32]) -> u64 {
    let mut head = [0u8; 8];
    head.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(head)
}

/// Box-Muller draw from N(0, 1).
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
}
