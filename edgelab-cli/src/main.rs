//! EdgeLab CLI — paired comparisons, ratings and staged candidate search.
//!
//! Commands:
//! - `compare`: paired comparison of two recorded per-seed edge CSV files
//! - `rate`: apply a CSV of match results to a rating population
//! - `search`: run the staged search from a TOML protocol file

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use edgelab_core::RatingSystem;
use edgelab_runner::{
    read_edges_csv, read_matches_csv, render_comparison, write_report_json, PairEvaluation,
    ProtocolFile, SearchProtocol, SyntheticArtifact, SyntheticCompiler, SyntheticSimulator,
};

#[derive(Parser)]
#[command(
    name = "edgelab",
    about = "EdgeLab CLI — paired-seed evaluation and rating of strategy variants"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare seed-aligned candidate and baseline edges.
    Compare {
        /// Candidate per-seed edges (CSV, `edge` column or first column).
        #[arg(long)]
        candidate: PathBuf,

        /// Baseline per-seed edges, same seeds in the same order.
        #[arg(long)]
        baseline: PathBuf,
    },
    /// Update ratings from match results and print the leaderboard.
    Rate {
        /// Match CSV with columns player_a, player_b, score_a, score_b.
        #[arg(long)]
        matches: PathBuf,

        /// Rating state JSON. Loaded if it exists, written back after the update.
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Run the staged search against the synthetic simulator.
    Search {
        /// Protocol TOML: [search], [rating], [baseline] and [[candidates]].
        #[arg(long)]
        config: PathBuf,

        /// Master seed for scenario generation.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Write the full report as JSON.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Record every stage comparison into this rating state JSON.
        #[arg(long)]
        ratings: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compare {
            candidate,
            baseline,
        } => run_compare(&candidate, &baseline),
        Commands::Rate { matches, state } => run_rate(&matches, state.as_deref()),
        Commands::Search {
            config,
            seed,
            output,
            ratings,
        } => run_search(&config, seed, output.as_deref(), ratings.as_deref()),
    }
}

// ─── compare ────────────────────────────────────────────────────────

fn run_compare(candidate: &Path, baseline: &Path) -> Result<()> {
    let cand = read_edges_csv(candidate)
        .with_context(|| format!("reading candidate edges {}", candidate.display()))?;
    let base = read_edges_csv(baseline)
        .with_context(|| format!("reading baseline edges {}", baseline.display()))?;

    // Empty files give the neutral comparison.
    let evaluation =
        PairEvaluation::from_edges(display_stem(candidate), display_stem(baseline), &cand, &base)?;
    println!("{}", render_comparison(&evaluation));
    Ok(())
}

fn display_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ─── rate ───────────────────────────────────────────────────────────

fn load_ratings(path: Option<&Path>, fallback: RatingSystem) -> Result<RatingSystem> {
    match path {
        Some(path) if path.exists() => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading rating state {}", path.display()))?;
            let ratings: RatingSystem = serde_json::from_str(&json)
                .with_context(|| format!("parsing rating state {}", path.display()))?;
            info!(players = ratings.len(), path = %path.display(), "loaded ratings");
            Ok(ratings)
        }
        _ => Ok(fallback),
    }
}

fn save_ratings(path: &Path, ratings: &RatingSystem) -> Result<()> {
    let json = serde_json::to_string_pretty(ratings)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    info!(players = ratings.len(), path = %path.display(), "saved ratings");
    Ok(())
}

fn print_leaderboard(ratings: &RatingSystem) {
    println!(
        "{:>4}  {:<24} {:>8} {:>6} {:>5} {:>5} {:>5} {:>6}",
        "rank", "player", "rating", "games", "W", "L", "D", "win%"
    );
    for (i, p) in ratings.leaderboard().iter().enumerate() {
        println!(
            "{:>4}  {:<24} {:>8.1} {:>6} {:>5} {:>5} {:>5} {:>5.1}%",
            i + 1,
            p.name,
            p.rating,
            p.matches_played,
            p.wins,
            p.losses,
            p.draws,
            p.win_rate() * 100.0
        );
    }
}

fn run_rate(matches: &Path, state: Option<&Path>) -> Result<()> {
    let records = read_matches_csv(matches)
        .with_context(|| format!("reading matches {}", matches.display()))?;
    let mut ratings = load_ratings(state, RatingSystem::default())?;

    for m in &records {
        let (a, b) = ratings.update_ratings(&m.player_a, &m.player_b, m.score_a, m.score_b);
        debug!(player_a = %m.player_a, player_b = %m.player_b, a, b, "match applied");
    }
    info!(matches = records.len(), players = ratings.len(), "ratings updated");

    print_leaderboard(&ratings);
    if let Some(path) = state {
        save_ratings(path, &ratings)?;
    }
    Ok(())
}

// ─── search ─────────────────────────────────────────────────────────

fn run_search(
    config: &Path,
    seed: u64,
    output: Option<&Path>,
    ratings_path: Option<&Path>,
) -> Result<()> {
    let protocol_file = ProtocolFile::load(config)?;
    info!(
        candidates = protocol_file.candidates.len(),
        seed,
        "loaded protocol {}",
        config.display()
    );

    let simulator = SyntheticSimulator::new(seed);
    let reference = SyntheticArtifact::reference();
    let protocol = SearchProtocol::new(
        &SyntheticCompiler,
        &simulator,
        &reference,
        protocol_file.search.clone(),
    )?;
    let report = protocol.run(&protocol_file.baseline, &protocol_file.candidates)?;

    println!("{}", report.render_text());

    if let Some(path) = output {
        write_report_json(&report, path)?;
        info!(path = %path.display(), "report written");
    }

    if let Some(path) = ratings_path {
        let mut ratings =
            load_ratings(Some(path), RatingSystem::new(protocol_file.rating))?;
        let recorded = report.record_matches(&mut ratings);
        info!(recorded, "stage comparisons recorded as matches");
        save_ratings(path, &ratings)?;
    }
    Ok(())
}
