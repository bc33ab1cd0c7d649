//! Integration tests for the staged search protocol.
//!
//! A scripted compiler and simulator make every stage outcome exact: each
//! candidate's per-seed edge is a shared scenario value plus its scripted
//! offset plus a zero-mean wobble, so its mean delta against the baseline is
//! the offset whenever the sample count is a multiple of 4.

use std::cell::RefCell;
use std::collections::BTreeMap;

use edgelab_core::{
    CandidateDefinition, CompileFailure, Compiler, EdgeSample, RatingConfig, RatingSystem,
    SimulationError, Simulator, StrategyArtifact,
};
use edgelab_runner::{
    evaluate_pair, Recommendation, SearchConfig, SearchError, SearchProtocol, Stage, Termination,
};

// ─── Scripted collaborators ─────────────────────────────────────────

#[derive(Debug, Clone)]
struct ScriptedArtifact {
    name: String,
    offset: f64,
    /// Offset overrides keyed by sample count.
    offset_at: BTreeMap<usize, f64>,
    jitter: f64,
    /// Sample count at which seed 3 comes back as NaN.
    nan_at: Option<usize>,
    fail_sim: bool,
    short: bool,
}

impl StrategyArtifact for ScriptedArtifact {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Reads `offset`, `offset_<n>`, `jitter`, `name`, `fail_compile`,
/// `fail_compile_after`, `nan_at`, `fail_sim` and `short` from the candidate
/// params. `fail_compile_after = n` lets the first `n` compiles of an id
/// succeed and fails every later one.
#[derive(Default)]
struct ScriptedCompiler {
    compiled: RefCell<Vec<String>>,
}

impl Compiler for ScriptedCompiler {
    type Artifact = ScriptedArtifact;

    fn compile(&self, def: &CandidateDefinition) -> Result<ScriptedArtifact, CompileFailure> {
        let previous = self.compiled.borrow().iter().filter(|id| **id == def.id).count();
        self.compiled.borrow_mut().push(def.id.clone());
        let flag = |key: &str| def.param(key).and_then(|v| v.as_bool()).unwrap_or(false);
        let exhausted = def
            .param("fail_compile_after")
            .and_then(|v| v.as_u64())
            .is_some_and(|n| previous as u64 >= n);
        if flag("fail_compile") || exhausted {
            return Err(CompileFailure::new(&def.id, vec!["syntax error at line 1".into()]));
        }

        let offset_at = def
            .params
            .iter()
            .filter_map(|(key, value)| {
                let n = key.strip_prefix("offset_")?.parse::<usize>().ok()?;
                Some((n, value.as_f64()?))
            })
            .collect();

        Ok(ScriptedArtifact {
            name: def
                .param("name")
                .and_then(|v| v.as_str())
                .unwrap_or(def.id.as_str())
                .to_string(),
            offset: def.param("offset").and_then(|v| v.as_f64()).unwrap_or(0.0),
            offset_at,
            jitter: def.param("jitter").and_then(|v| v.as_f64()).unwrap_or(1.0),
            nan_at: def
                .param("nan_at")
                .and_then(|v| v.as_u64())
                .map(|n| n as usize),
            fail_sim: flag("fail_sim"),
            short: flag("short"),
        })
    }
}

#[derive(Default)]
struct ScriptedSimulator {
    calls: RefCell<Vec<(String, usize)>>,
}

impl ScriptedSimulator {
    fn counts_for(&self, name: &str) -> Vec<usize> {
        self.calls
            .borrow()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, count)| *count)
            .collect()
    }
}

impl Simulator<ScriptedArtifact> for ScriptedSimulator {
    fn run(
        &self,
        subject: &ScriptedArtifact,
        _reference: &ScriptedArtifact,
        sample_count: usize,
    ) -> Result<EdgeSample, SimulationError> {
        self.calls
            .borrow_mut()
            .push((subject.name.clone(), sample_count));
        if subject.fail_sim {
            return Err(SimulationError::new(&subject.name, "engine crashed"));
        }

        let offset = subject
            .offset_at
            .get(&sample_count)
            .copied()
            .unwrap_or(subject.offset);
        let n = if subject.short { sample_count - 1 } else { sample_count };
        let poisoned = subject.nan_at == Some(sample_count);
        Ok((0..n)
            .map(|i| {
                if poisoned && i == 3 {
                    return f64::NAN;
                }
                let scenario = 100.0 + (i % 7) as f64;
                let wobble = ((i % 4) as f64 - 1.5) * subject.jitter;
                scenario + offset + wobble
            })
            .collect())
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn reference() -> ScriptedArtifact {
    ScriptedArtifact {
        name: "Normalizer".into(),
        offset: 0.0,
        offset_at: BTreeMap::new(),
        jitter: 0.0,
        nan_at: None,
        fail_sim: false,
        short: false,
    }
}

fn baseline() -> CandidateDefinition {
    CandidateDefinition::new("S80", "StaticSym")
        .with_param("name", "Static_80")
        .with_param("jitter", 0.0)
}

fn candidate(id: &str, offset: f64) -> CandidateDefinition {
    CandidateDefinition::new(id, "Scripted").with_param("offset", offset)
}

fn small_config() -> SearchConfig {
    SearchConfig {
        stage1_samples: 8,
        stage2_samples: 12,
        stage3_samples: 16,
        ..SearchConfig::default()
    }
}

fn ids(results: &[edgelab_runner::StageResult]) -> Vec<&str> {
    results.iter().map(|r| r.definition.id.as_str()).collect()
}

// ─── Full runs ──────────────────────────────────────────────────────

#[test]
fn full_run_adopts_clear_winner() {
    let compiler = ScriptedCompiler::default();
    let simulator = ScriptedSimulator::default();
    let reference = reference();
    let protocol = SearchProtocol::new(&compiler, &simulator, &reference, small_config()).unwrap();

    let candidates = vec![
        candidate("B", 2.0),
        candidate("D", -6.0),
        candidate("A", 4.0),
        candidate("C", -1.0),
    ];
    let report = protocol.run(&baseline(), &candidates).unwrap();

    assert_eq!(report.termination, Termination::Completed);
    assert_eq!(report.baseline, "Static_80");
    let numbers: Vec<u8> = report.stages.iter().map(|s| s.stage.number()).collect();
    assert_eq!(numbers, vec![0, 1, 2, 3]);

    let screen = report.stage(Stage::BroadScreen).unwrap();
    assert_eq!(ids(&screen.ranking), vec!["A", "B", "C", "D"]);
    assert_eq!(screen.promoted, vec!["A", "B", "C"]);

    let narrow = report.stage(Stage::Narrow).unwrap();
    assert_eq!(narrow.promoted, vec!["A", "B"]);

    assert_eq!(ids(&report.final_ranking), vec!["A", "B"]);
    assert!((report.final_ranking[0].mean_delta() - 4.0).abs() < 1e-9);
    assert_eq!(report.adjusted.len(), 2);
    assert!(matches!(
        report.recommendation,
        Recommendation::Adopt { ref candidate, .. } if candidate == "A"
    ));
}

#[test]
fn baseline_runs_once_per_sample_count() {
    let compiler = ScriptedCompiler::default();
    let simulator = ScriptedSimulator::default();
    let reference = reference();
    let protocol = SearchProtocol::new(&compiler, &simulator, &reference, small_config()).unwrap();

    protocol
        .run(&baseline(), &[candidate("A", 4.0), candidate("D", -6.0)])
        .unwrap();

    assert_eq!(simulator.counts_for("Static_80"), vec![8, 12, 16]);
    assert_eq!(simulator.counts_for("A"), vec![8, 12, 16]);
    assert_eq!(simulator.counts_for("D"), vec![8]);
}

#[test]
fn eliminated_candidate_is_never_promoted() {
    let compiler = ScriptedCompiler::default();
    let simulator = ScriptedSimulator::default();
    let reference = reference();
    let protocol = SearchProtocol::new(&compiler, &simulator, &reference, small_config()).unwrap();

    let report = protocol
        .run(&baseline(), &[candidate("worse", -6.0), candidate("ok", -4.5)])
        .unwrap();
    let screen = report.stage(Stage::BroadScreen).unwrap();
    assert_eq!(screen.promoted, vec!["ok"]);
    // Still listed in the ranking, below the survivor.
    assert_eq!(ids(&screen.ranking), vec!["ok", "worse"]);
}

#[test]
fn broad_screen_truncates_to_eight() {
    let compiler = ScriptedCompiler::default();
    let simulator = ScriptedSimulator::default();
    let reference = reference();
    let protocol = SearchProtocol::new(&compiler, &simulator, &reference, small_config()).unwrap();

    let candidates: Vec<CandidateDefinition> = (0..12)
        .map(|i| candidate(&format!("c{i:02}"), i as f64 + 0.5))
        .collect();
    let report = protocol.run(&baseline(), &candidates).unwrap();

    let screen = report.stage(Stage::BroadScreen).unwrap();
    assert_eq!(screen.ranking.len(), 12);
    assert_eq!(
        screen.promoted,
        vec!["c11", "c10", "c09", "c08", "c07", "c06", "c05", "c04"]
    );
    let narrow = report.stage(Stage::Narrow).unwrap();
    assert_eq!(narrow.ranking.len(), 8);
    assert_eq!(narrow.promoted, vec!["c11", "c10", "c09"]);
    assert_eq!(ids(&report.final_ranking), vec!["c11", "c10", "c09"]);
}

// ─── Early termination ──────────────────────────────────────────────

#[test]
fn no_survivors_reports_baseline_only() {
    let compiler = ScriptedCompiler::default();
    let simulator = ScriptedSimulator::default();
    let reference = reference();
    let protocol = SearchProtocol::new(&compiler, &simulator, &reference, small_config()).unwrap();

    let report = protocol
        .run(&baseline(), &[candidate("X", -6.0), candidate("Y", -10.0)])
        .unwrap();

    assert_eq!(report.termination, Termination::NoSurvivors);
    assert_eq!(report.stages.len(), 2);
    assert!(report.final_ranking.is_empty());
    assert_eq!(report.recommendation, Recommendation::KeepBaseline);
    assert_eq!(simulator.counts_for("Static_80"), vec![8]);
    assert!(report.render_text().contains("No candidates to report."));
}

#[test]
fn empty_population_has_no_survivors() {
    let compiler = ScriptedCompiler::default();
    let simulator = ScriptedSimulator::default();
    let reference = reference();
    let protocol = SearchProtocol::new(&compiler, &simulator, &reference, small_config()).unwrap();

    let report = protocol.run(&baseline(), &[]).unwrap();
    assert_eq!(report.termination, Termination::NoSurvivors);
}

#[test]
fn stage_two_without_positive_delta_stops() {
    let compiler = ScriptedCompiler::default();
    let simulator = ScriptedSimulator::default();
    let reference = reference();
    let protocol = SearchProtocol::new(&compiler, &simulator, &reference, small_config()).unwrap();

    let candidates = vec![
        candidate("A", 1.0).with_param("offset_12", -0.5),
        candidate("B", 2.0).with_param("offset_12", -2.0),
    ];
    let report = protocol.run(&baseline(), &candidates).unwrap();

    assert_eq!(report.termination, Termination::NoImprovement);
    assert_eq!(report.stages.len(), 3);
    assert!(report.stage(Stage::FinalValidation).is_none());
    assert!(simulator.counts_for("Static_80").iter().all(|&n| n != 16));
    // The narrowing ranking is what gets reported.
    assert_eq!(ids(&report.final_ranking), vec!["A", "B"]);
    assert_eq!(report.recommendation, Recommendation::KeepBaseline);
}

#[test]
fn modest_final_delta_is_marginal() {
    let compiler = ScriptedCompiler::default();
    let simulator = ScriptedSimulator::default();
    let reference = reference();
    let protocol = SearchProtocol::new(&compiler, &simulator, &reference, small_config()).unwrap();

    let report = protocol
        .run(&baseline(), &[candidate("M", 2.0)])
        .unwrap();
    assert!(matches!(
        report.recommendation,
        Recommendation::Marginal { ref candidate, .. } if candidate == "M"
    ));
}

// ─── Failures ───────────────────────────────────────────────────────

#[test]
fn compile_failure_skips_candidate() {
    let compiler = ScriptedCompiler::default();
    let simulator = ScriptedSimulator::default();
    let reference = reference();
    let protocol = SearchProtocol::new(&compiler, &simulator, &reference, small_config()).unwrap();

    let candidates = vec![
        candidate("broken", 10.0).with_param("fail_compile", true),
        candidate("A", 4.0),
    ];
    let report = protocol.run(&baseline(), &candidates).unwrap();

    let screen = report.stage(Stage::BroadScreen).unwrap();
    assert_eq!(ids(&screen.ranking), vec!["A"]);
    assert_eq!(screen.skipped.len(), 1);
    assert_eq!(screen.skipped[0].candidate_id, "broken");
    assert_eq!(screen.skipped[0].errors, vec!["syntax error at line 1"]);
    assert!(simulator.counts_for("broken").is_empty());
    assert_eq!(report.termination, Termination::Completed);
}

#[test]
fn compile_failure_in_narrow_stage_skips_candidate() {
    let compiler = ScriptedCompiler::default();
    let simulator = ScriptedSimulator::default();
    let reference = reference();
    let protocol = SearchProtocol::new(&compiler, &simulator, &reference, small_config()).unwrap();

    let candidates = vec![
        candidate("A", 4.0).with_param("fail_compile_after", 1),
        candidate("B", 2.0),
    ];
    let report = protocol.run(&baseline(), &candidates).unwrap();

    assert_eq!(report.stage(Stage::BroadScreen).unwrap().promoted, vec!["A", "B"]);
    let narrow = report.stage(Stage::Narrow).unwrap();
    assert_eq!(ids(&narrow.ranking), vec!["B"]);
    assert_eq!(narrow.skipped.len(), 1);
    assert_eq!(narrow.skipped[0].candidate_id, "A");
    assert_eq!(simulator.counts_for("A"), vec![8]);

    assert_eq!(report.termination, Termination::Completed);
    assert_eq!(ids(&report.final_ranking), vec!["B"]);
    assert!(matches!(
        report.recommendation,
        Recommendation::Marginal { ref candidate, .. } if candidate == "B"
    ));
}

#[test]
fn non_finite_edge_aborts_the_run() {
    let compiler = ScriptedCompiler::default();
    let simulator = ScriptedSimulator::default();
    let reference = reference();
    let protocol = SearchProtocol::new(&compiler, &simulator, &reference, small_config()).unwrap();

    let candidates = vec![
        candidate("A", 4.0).with_param("nan_at", 12),
        candidate("B", 2.0),
    ];
    let err = protocol.run(&baseline(), &candidates).unwrap_err();
    assert!(matches!(
        err,
        SearchError::NonFiniteEdge { ref artifact, seed: 3, value } if artifact == "A" && value.is_nan()
    ));
    assert_eq!(simulator.counts_for("A"), vec![8, 12]);
    assert!(simulator.counts_for("B").iter().all(|&n| n != 16));
}

#[test]
fn simulator_failure_aborts_the_run() {
    let compiler = ScriptedCompiler::default();
    let simulator = ScriptedSimulator::default();
    let reference = reference();
    let protocol = SearchProtocol::new(&compiler, &simulator, &reference, small_config()).unwrap();

    let candidates = vec![
        candidate("crash", 1.0).with_param("fail_sim", true),
        candidate("A", 4.0),
    ];
    let err = protocol.run(&baseline(), &candidates).unwrap_err();
    assert!(matches!(err, SearchError::Simulation(ref e) if e.artifact == "crash"));
    assert!(simulator.counts_for("A").is_empty());
}

#[test]
fn short_edge_sample_is_rejected() {
    let compiler = ScriptedCompiler::default();
    let simulator = ScriptedSimulator::default();
    let reference = reference();
    let protocol = SearchProtocol::new(&compiler, &simulator, &reference, small_config()).unwrap();

    let err = protocol
        .run(&baseline(), &[candidate("short", 1.0).with_param("short", true)])
        .unwrap_err();
    assert!(matches!(
        err,
        SearchError::SampleCount { expected: 8, actual: 7, .. }
    ));
}

#[test]
fn baseline_compile_failure_is_fatal() {
    let compiler = ScriptedCompiler::default();
    let simulator = ScriptedSimulator::default();
    let reference = reference();
    let protocol = SearchProtocol::new(&compiler, &simulator, &reference, small_config()).unwrap();

    let err = protocol
        .run(
            &baseline().with_param("fail_compile", true),
            &[candidate("A", 4.0)],
        )
        .unwrap_err();
    assert!(matches!(err, SearchError::Baseline(_)));
    assert_eq!(*compiler.compiled.borrow(), vec!["S80"]);
    assert!(simulator.calls.borrow().is_empty());
}

#[test]
fn invalid_config_is_rejected() {
    let compiler = ScriptedCompiler::default();
    let simulator = ScriptedSimulator::default();
    let reference = reference();
    let config = SearchConfig {
        stage2_keep: 0,
        ..small_config()
    };
    let result = SearchProtocol::new(&compiler, &simulator, &reference, config);
    assert!(matches!(result, Err(SearchError::Config(_))));
}

// ─── Pair evaluation and ratings ────────────────────────────────────

#[test]
fn evaluate_pair_compares_on_shared_seeds() {
    let compiler = ScriptedCompiler::default();
    let simulator = ScriptedSimulator::default();

    let evaluation = evaluate_pair(
        &compiler,
        &simulator,
        &reference(),
        &candidate("A", 3.0),
        &baseline(),
        40,
    )
    .unwrap();

    assert_eq!(evaluation.candidate, "A");
    assert_eq!(evaluation.baseline, "Static_80");
    assert_eq!(evaluation.comparison.n, 40);
    assert!((evaluation.comparison.mean_delta - 3.0).abs() < 1e-9);
    assert_eq!(evaluation.comparison.win_rate, 1.0);
}

#[test]
fn evaluate_pair_candidate_compile_failure() {
    let compiler = ScriptedCompiler::default();
    let simulator = ScriptedSimulator::default();
    let err = evaluate_pair(
        &compiler,
        &simulator,
        &reference(),
        &candidate("A", 3.0).with_param("fail_compile", true),
        &baseline(),
        40,
    )
    .unwrap_err();
    assert!(matches!(err, SearchError::Candidate(_)));
}

#[test]
fn stage_comparisons_feed_the_rating_system() {
    let compiler = ScriptedCompiler::default();
    let simulator = ScriptedSimulator::default();
    let reference = reference();
    let protocol = SearchProtocol::new(&compiler, &simulator, &reference, small_config()).unwrap();

    let candidates = vec![
        candidate("A", 4.0),
        candidate("B", 2.0),
        candidate("C", -1.0),
        candidate("D", -6.0),
    ];
    let report = protocol.run(&baseline(), &candidates).unwrap();

    let mut ratings = RatingSystem::new(RatingConfig::default());
    // 4 screened + 3 narrowed + 2 validated.
    assert_eq!(report.record_matches(&mut ratings), 9);

    let base = ratings.rating("Static_80").unwrap();
    assert_eq!(base.matches_played, 9);
    assert_eq!(ratings.rating("A").unwrap().wins, 3);
    assert_eq!(ratings.rating("D").unwrap().losses, 1);
    assert!(ratings.rating("A").unwrap().rating > 1500.0);
    assert!(ratings.rating("D").unwrap().rating < 1500.0);
}
