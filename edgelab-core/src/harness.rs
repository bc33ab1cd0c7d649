//! Collaborator contracts: the strategy compiler and the match simulator.
//!
//! Neither is implemented by this crate. The search protocol is generic over
//! both so that a real toolchain, a recorded replay or a synthetic model can be
//! plugged in without touching the statistics.

use thiserror::Error;

use crate::candidate::CandidateDefinition;
use crate::edge::EdgeSample;

/// A compiled, runnable strategy.
pub trait StrategyArtifact {
    /// Display name reported by the artifact itself.
    fn name(&self) -> &str;
}

/// Compilation of a candidate definition failed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("failed to compile '{candidate}': {}", .errors.join("; "))]
pub struct CompileFailure {
    pub candidate: String,
    pub errors: Vec<String>,
}

impl CompileFailure {
    pub fn new(candidate: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            candidate: candidate.into(),
            errors,
        }
    }
}

/// The simulator could not produce an edge sample.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("simulation of '{artifact}' failed: {message}")]
pub struct SimulationError {
    pub artifact: String,
    pub message: String,
}

impl SimulationError {
    pub fn new(artifact: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            message: message.into(),
        }
    }
}

/// Turns candidate definitions into runnable artifacts.
pub trait Compiler {
    type Artifact: StrategyArtifact;

    fn compile(&self, definition: &CandidateDefinition) -> Result<Self::Artifact, CompileFailure>;
}

/// Runs a strategy over a fixed number of seeded scenarios.
///
/// Implementations must return exactly `sample_count` edges for `subject`,
/// ordered by seed, and must reuse identical seeds whenever the same
/// `sample_count` is requested again. `reference` is the value-normalizing
/// counterparty; its own edges are not reported.
pub trait Simulator<A> {
    fn run(&self, subject: &A, reference: &A, sample_count: usize)
        -> Result<EdgeSample, SimulationError>;
}
