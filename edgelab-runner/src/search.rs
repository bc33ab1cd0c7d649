//! Staged paired-seed search over a candidate population.
//!
//! Cheap screens run on every candidate; larger sample counts are spent only
//! on candidates that survive:
//! - **Stage 0 (lock baseline):** baseline at the stage-1 sample count.
//! - **Stage 1 (broad screen):** every candidate vs the stage-0 baseline.
//!   Mean delta below the elimination floor is dropped; the best 8 advance.
//! - **Stage 2 (narrow):** fresh baseline run at the stage-2 count; only
//!   strictly positive mean deltas advance, best 3.
//! - **Stage 3 (final validation):** fresh baseline run at the stage-3 count.
//!
//! Baseline edges are never shared across stages: each stage compares against
//! its own baseline run at its own sample count.
//!
//! Compile failures drop the candidate from the stage and the run continues.
//! Simulator failures abort the run.

use thiserror::Error;
use tracing::{debug, info, info_span, warn};

use edgelab_core::{
    paired_compare, CandidateDefinition, CompareError, CompileFailure, ComparisonResult, Compiler,
    EdgeSample, SimulationError, Simulator, StrategyArtifact,
};

use crate::config::{ConfigError, SearchConfig};
use crate::report::{recommend, SearchReport};
use crate::stage::{
    promote, rank_by_delta, SkippedCandidate, Stage, StageOutcome, StageReport, StageResult,
    Termination,
};

/// Errors that abort a search or a pair evaluation.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("baseline could not be compiled: {0}")]
    Baseline(CompileFailure),
    #[error("candidate could not be compiled: {0}")]
    Candidate(CompileFailure),
    #[error(transparent)]
    Simulation(#[from] SimulationError),
    #[error("simulator returned {actual} samples for '{artifact}', expected {expected}")]
    SampleCount {
        artifact: String,
        expected: usize,
        actual: usize,
    },
    #[error("simulator returned non-finite edge {value} for '{artifact}' at seed {seed}")]
    NonFiniteEdge {
        artifact: String,
        seed: usize,
        value: f64,
    },
    #[error(transparent)]
    Compare(#[from] CompareError),
}

/// Single paired evaluation of one candidate against one baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct PairEvaluation {
    pub candidate: String,
    pub baseline: String,
    pub comparison: ComparisonResult,
}

impl PairEvaluation {
    /// Compare already-recorded, seed-aligned edges.
    ///
    /// Empty samples are valid and produce the neutral comparison.
    pub fn from_edges(
        candidate: impl Into<String>,
        baseline: impl Into<String>,
        candidate_edges: &EdgeSample,
        baseline_edges: &EdgeSample,
    ) -> Result<Self, CompareError> {
        Ok(Self {
            candidate: candidate.into(),
            baseline: baseline.into(),
            comparison: paired_compare(candidate_edges.as_slice(), baseline_edges.as_slice())?,
        })
    }
}

/// Run `artifact` and check the simulator honoured the requested sample count
/// and returned only finite edges.
fn simulate<A, S>(
    simulator: &S,
    artifact: &A,
    reference: &A,
    sample_count: usize,
) -> Result<EdgeSample, SearchError>
where
    A: StrategyArtifact,
    S: Simulator<A>,
{
    let edges = simulator.run(artifact, reference, sample_count)?;
    if edges.len() != sample_count {
        return Err(SearchError::SampleCount {
            artifact: artifact.name().to_string(),
            expected: sample_count,
            actual: edges.len(),
        });
    }
    if let Some((seed, &value)) = edges
        .as_slice()
        .iter()
        .enumerate()
        .find(|(_, e)| !e.is_finite())
    {
        return Err(SearchError::NonFiniteEdge {
            artifact: artifact.name().to_string(),
            seed,
            value,
        });
    }
    Ok(edges)
}

/// Compile both strategies, run them on the same seeds and compare.
pub fn evaluate_pair<C, S>(
    compiler: &C,
    simulator: &S,
    reference: &C::Artifact,
    candidate: &CandidateDefinition,
    baseline: &CandidateDefinition,
    sample_count: usize,
) -> Result<PairEvaluation, SearchError>
where
    C: Compiler,
    S: Simulator<C::Artifact>,
{
    let cand_artifact = compiler.compile(candidate).map_err(SearchError::Candidate)?;
    let base_artifact = compiler.compile(baseline).map_err(SearchError::Baseline)?;

    info!(candidate = cand_artifact.name(), sample_count, "running candidate");
    let cand_edges = simulate(simulator, &cand_artifact, reference, sample_count)?;
    info!(baseline = base_artifact.name(), sample_count, "running baseline");
    let base_edges = simulate(simulator, &base_artifact, reference, sample_count)?;

    Ok(PairEvaluation::from_edges(
        cand_artifact.name(),
        base_artifact.name(),
        &cand_edges,
        &base_edges,
    )?)
}

/// The staged search, bound to its collaborators.
///
/// `reference` is the value-normalizing counterparty handed to every
/// simulator call.
pub struct SearchProtocol<'a, C: Compiler, S> {
    compiler: &'a C,
    simulator: &'a S,
    reference: &'a C::Artifact,
    config: SearchConfig,
}

impl<'a, C, S> SearchProtocol<'a, C, S>
where
    C: Compiler,
    S: Simulator<C::Artifact>,
{
    pub fn new(
        compiler: &'a C,
        simulator: &'a S,
        reference: &'a C::Artifact,
        config: SearchConfig,
    ) -> Result<Self, SearchError> {
        config.validate()?;
        Ok(Self {
            compiler,
            simulator,
            reference,
            config,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Run all stages until one terminates the search.
    pub fn run(
        &self,
        baseline: &CandidateDefinition,
        candidates: &[CandidateDefinition],
    ) -> Result<SearchReport, SearchError> {
        let baseline_artifact = self
            .compiler
            .compile(baseline)
            .map_err(SearchError::Baseline)?;
        let baseline_name = baseline_artifact.name().to_string();

        let mut stages = Vec::with_capacity(4);
        let locked_edges = self.lock_baseline(&baseline_artifact)?;
        stages.push(StageReport::baseline_lock(
            self.config.stage1_samples,
            locked_edges.mean(),
        ));
        let mut locked = Some(locked_edges);

        let mut pool: Vec<CandidateDefinition> = candidates.to_vec();
        let mut termination = Termination::Completed;

        for stage in [Stage::BroadScreen, Stage::Narrow, Stage::FinalValidation] {
            let baseline_edges = match locked.take() {
                Some(edges) => edges,
                None => self.run_baseline(stage, &baseline_artifact)?,
            };

            let mut report = self.evaluate_stage(stage, &baseline_edges, &pool)?;
            let outcome = self.promote(&mut report);
            stages.push(report);

            match outcome {
                StageOutcome::Continue(next) => pool = next,
                StageOutcome::Terminate(reason) => {
                    termination = reason;
                    break;
                }
            }
        }

        let (final_ranking, final_baseline_mean) = match (termination, stages.last()) {
            (Termination::NoSurvivors, Some(last)) => (Vec::new(), last.baseline_mean),
            (_, Some(last)) => (last.ranking.clone(), last.baseline_mean),
            (_, None) => (Vec::new(), 0.0),
        };
        let recommendation = recommend(&final_ranking, &self.config);

        info!(
            termination = ?termination,
            recommendation = %recommendation,
            "search finished"
        );

        Ok(SearchReport::new(
            baseline_name,
            self.config.clone(),
            stages,
            termination,
            final_ranking,
            final_baseline_mean,
            recommendation,
        ))
    }

    fn lock_baseline(&self, baseline: &C::Artifact) -> Result<EdgeSample, SearchError> {
        let edges = self.run_baseline(Stage::LockBaseline, baseline)?;
        info!(
            baseline = baseline.name(),
            mean_edge = edges.mean(),
            samples = edges.len(),
            "baseline locked"
        );
        Ok(edges)
    }

    fn run_baseline(&self, stage: Stage, baseline: &C::Artifact) -> Result<EdgeSample, SearchError> {
        let _span = info_span!("stage", stage = stage.number()).entered();
        let samples = self.config.samples_for(stage);
        info!(baseline = baseline.name(), samples, "running baseline");
        simulate(self.simulator, baseline, self.reference, samples)
    }

    /// Evaluate every definition in `pool` against `baseline_edges`.
    fn evaluate_stage(
        &self,
        stage: Stage,
        baseline_edges: &EdgeSample,
        pool: &[CandidateDefinition],
    ) -> Result<StageReport, SearchError> {
        let _span = info_span!("stage", stage = stage.number()).entered();
        let samples = self.config.samples_for(stage);
        info!(candidates = pool.len(), samples, "{} started", stage.label());

        let mut ranking = Vec::with_capacity(pool.len());
        let mut skipped = Vec::new();

        for (i, definition) in pool.iter().enumerate() {
            let artifact = match self.compiler.compile(definition) {
                Ok(artifact) => artifact,
                Err(failure) => {
                    warn!(
                        candidate = %definition.id,
                        errors = ?failure.errors,
                        "[{}/{}] compile failed, skipping",
                        i + 1,
                        pool.len()
                    );
                    skipped.push(SkippedCandidate {
                        candidate_id: definition.id.clone(),
                        errors: failure.errors,
                    });
                    continue;
                }
            };

            debug!(candidate = %definition.id, fingerprint = %definition.fingerprint(), "compiled");
            let edges = simulate(self.simulator, &artifact, self.reference, samples)?;
            let comparison = paired_compare(edges.as_slice(), baseline_edges.as_slice())?;
            info!(
                candidate = %definition.id,
                name = artifact.name(),
                delta = comparison.mean_delta,
                se = comparison.se,
                t = comparison.t_stat,
                win = comparison.win_rate,
                "[{}/{}] evaluated {}",
                i + 1,
                pool.len(),
                comparison.significance().stars()
            );

            ranking.push(StageResult {
                definition: definition.clone(),
                name: artifact.name().to_string(),
                comparison,
            });
        }

        rank_by_delta(&mut ranking);

        Ok(StageReport {
            stage,
            sample_count: samples,
            baseline_mean: baseline_edges.mean(),
            ranking,
            skipped,
            promoted: Vec::new(),
        })
    }

    /// Apply the stage's promotion rule and log who advances.
    fn promote(&self, report: &mut StageReport) -> StageOutcome {
        let outcome = promote(report, &self.config);
        match &outcome {
            StageOutcome::Continue(_) => {
                info!(
                    evaluated = report.ranking.len(),
                    promoted = report.promoted.len(),
                    "{} summary",
                    report.stage.label()
                );
            }
            StageOutcome::Terminate(reason) => {
                info!(evaluated = report.ranking.len(), "stopping: {}", reason.describe());
            }
        }
        outcome
    }
}
