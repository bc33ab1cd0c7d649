//! EdgeLab Runner — staged candidate search on top of `edgelab-core`.
//!
//! This crate provides:
//! - The four-stage search protocol (lock baseline, broad screen, narrow,
//!   final validation) with its promotion rules
//! - Single-pair evaluation of a candidate against a baseline
//! - Search configuration loaded from TOML
//! - Search reports with recommendation, FDR-adjusted ranking and a bridge
//!   into the rating system
//! - Deterministic synthetic compiler and simulator
//! - JSON and CSV file formats

pub mod config;
pub mod export;
pub mod fdr;
pub mod report;
pub mod search;
pub mod stage;
pub mod synthetic;

pub use config::{ConfigError, ProtocolFile, SearchConfig};
pub use export::{
    read_edges, read_edges_csv, read_matches, read_matches_csv, read_report_json,
    write_report_json, ExportError, MatchRecord,
};
pub use fdr::{adjust_ranking, benjamini_hochberg, FdrResult};
pub use report::{
    format_stage_line, recommend, render_comparison, Recommendation, SearchReport,
};
pub use search::{evaluate_pair, PairEvaluation, SearchError, SearchProtocol};
pub use stage::{
    narrow, promote, rank_by_delta, screen, SkippedCandidate, Stage, StageOutcome, StageReport,
    StageResult, Termination,
};
pub use synthetic::{SyntheticArtifact, SyntheticCompiler, SyntheticSimulator};
