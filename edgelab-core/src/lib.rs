//! EdgeLab Core — ratings and paired-seed statistics for strategy variants.
//!
//! This crate holds the pure, in-memory parts of the evaluation engine:
//! - Elo-style rating population with margin-of-victory and experience-scaled K
//! - Paired-seed comparator (mean delta, standard error, t, p, win rate)
//! - Candidate definitions and per-seed edge samples
//! - Compiler / simulator collaborator traits
//!
//! Nothing here performs I/O or persists state.

pub mod candidate;
pub mod edge;
pub mod harness;
pub mod paired;
pub mod rating;

pub use candidate::CandidateDefinition;
pub use edge::EdgeSample;
pub use harness::{CompileFailure, Compiler, SimulationError, Simulator, StrategyArtifact};
pub use paired::{
    normal_cdf, paired_compare, two_sided_p_value, CompareError, ComparisonResult, Significance,
    Verdict,
};
pub use rating::{GameResult, PlayerRating, RatingConfig, RatingSystem};
