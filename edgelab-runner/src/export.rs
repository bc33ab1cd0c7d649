//! File formats: search report JSON, per-seed edge CSV and match CSV.
//!
//! Edge CSV holds one value per seed, in seed order. Either a headed file with
//! an `edge` column, or a headerless file whose first column is the edge:
//!
//! ```text
//! seed,edge
//! 0,412.7
//! 1,398.2
//! ```
//!
//! Match CSV rows are `player_a,player_b,score_a,score_b` with a header.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use edgelab_core::EdgeSample;

use crate::report::SearchReport;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("row {row}: '{value}' is not a number")]
    NotANumber { row: usize, value: String },
    #[error("row {row} has no column {column}")]
    MissingColumn { row: usize, column: usize },
}

fn open(path: &Path) -> Result<File, ExportError> {
    File::open(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ─── Report JSON ────────────────────────────────────────────────────

pub fn write_report_json(report: &SearchReport, path: &Path) -> Result<(), ExportError> {
    let json = report.to_json_pretty()?;
    std::fs::write(path, json).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_report_json(path: &Path) -> Result<SearchReport, ExportError> {
    Ok(serde_json::from_reader(open(path)?)?)
}

// ─── Edge CSV ───────────────────────────────────────────────────────

pub fn read_edges_csv(path: &Path) -> Result<EdgeSample, ExportError> {
    read_edges(open(path)?)
}

/// Parse per-seed edges. A first row whose first field is not a number is
/// treated as a header; its `edge` column is used if present.
pub fn read_edges<R: Read>(reader: R) -> Result<EdgeSample, ExportError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut column = 0;
    let mut edges = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        let row = i + 1;
        if i == 0 {
            let first = record.get(0).unwrap_or_default();
            if first.parse::<f64>().is_err() {
                column = record
                    .iter()
                    .position(|h| h.eq_ignore_ascii_case("edge"))
                    .unwrap_or(0);
                continue;
            }
        }
        let field = record
            .get(column)
            .ok_or(ExportError::MissingColumn { row, column })?;
        let value = field.parse::<f64>().map_err(|_| ExportError::NotANumber {
            row,
            value: field.to_string(),
        })?;
        edges.push(value);
    }
    Ok(EdgeSample::new(edges))
}

// ─── Match CSV ──────────────────────────────────────────────────────

/// One decided match, as recorded for the rating system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub player_a: String,
    pub player_b: String,
    pub score_a: u32,
    pub score_b: u32,
}

pub fn read_matches_csv(path: &Path) -> Result<Vec<MatchRecord>, ExportError> {
    read_matches(open(path)?)
}

pub fn read_matches<R: Read>(reader: R) -> Result<Vec<MatchRecord>, ExportError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut matches = Vec::new();
    for record in rdr.deserialize() {
        matches.push(record?);
    }
    Ok(matches)
}
