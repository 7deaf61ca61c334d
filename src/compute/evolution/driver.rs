//! Optimization loop with a CSV progress log.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::compute::ReactionLibrary;
use crate::schema::{ProgressRecord, StopReason};

use super::search::{EvolutionError, EvolvingLibraries};

const PROGRESS_HEADER: [&str; 5] = [
    "step",
    "curr_fittest",
    "overall_fittest",
    "overall_fittest_norm",
    "model",
];

/// Cooperative stop signal, checked once per generation.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop after the current generation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Raw flag, for signal handlers that only accept an `AtomicBool`.
    pub fn handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }
}

/// Options of [`optimize`].
#[derive(Debug, Clone)]
pub struct OptimizeOptions {
    /// Stop once a generation's best score reaches this value.
    pub fitness_threshold: f64,
    /// Maximum number of generations.
    pub nsteps: usize,
    /// Progress log destination.
    pub output_path: PathBuf,
    /// Replace an existing progress log instead of failing.
    pub overwrite: bool,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            fitness_threshold: 0.999999999,
            nsteps: 100,
            output_path: PathBuf::from("gp_loss.csv"),
            overwrite: false,
        }
    }
}

/// How an optimization run ended.
#[derive(Debug, Clone)]
pub struct OptimizeSummary {
    /// Generations evaluated.
    pub steps: usize,
    pub stop_reason: StopReason,
    /// Best score ever seen.
    pub overall_fittest_score: f64,
    pub overall_fittest_norm: f64,
    /// Best library ever seen, if any generation ran.
    pub overall_fittest: Option<ReactionLibrary>,
}

/// Step `engine` until the threshold, `nsteps` or cancellation, writing one
/// progress row per generation.
///
/// Rows are flushed as they are written so a partial log survives an abort.
pub fn optimize(
    engine: &mut EvolvingLibraries,
    options: &OptimizeOptions,
    token: &CancellationToken,
) -> Result<OptimizeSummary, DriverError> {
    let path = &options.output_path;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    if path.exists() && !options.overwrite {
        return Err(DriverError::OutputExists(path.clone()));
    }

    log::debug!("Initial population:");
    for (idx, library) in engine.population().iter().enumerate() {
        log::debug!("library {idx}:\n{library}");
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(File::create(path)?);
    writer.write_record(PROGRESS_HEADER)?;
    writer.flush()?;

    let mut steps = 0;
    let mut stop_reason = StopReason::MaxGenerations;
    for step in 0..options.nsteps {
        let outcome = engine.step()?;
        steps += 1;

        let record = ProgressRecord {
            step,
            curr_fittest: outcome.current_fittest_score,
            overall_fittest: outcome.overall_fittest_score,
            overall_fittest_norm: outcome.overall_fittest_norm,
            model: serde_json::to_string(&outcome.overall_fittest.to_snapshot())?,
        };
        writer.serialize(&record)?;
        writer.flush()?;
        log::info!(
            "{step},{},{},{}",
            record.curr_fittest,
            record.overall_fittest,
            record.overall_fittest_norm
        );

        if outcome.current_fittest_score >= options.fitness_threshold {
            stop_reason = StopReason::TargetReached;
            break;
        }
        if token.is_cancelled() {
            stop_reason = StopReason::Cancelled;
            break;
        }
    }

    if let Some(fittest) = engine.fittest() {
        log::info!("Fittest in last generation:\n{}", fittest.print_model());
    }
    if let Some(overall) = engine.overall_fittest() {
        log::info!("Fittest overall:\n{}", overall.print_model());
    }
    log::info!("Optimization stopped after {steps} generations: {stop_reason:?}");

    Ok(OptimizeSummary {
        steps,
        stop_reason,
        overall_fittest_score: engine.overall_fittest_score(),
        overall_fittest_norm: engine.overall_fittest_norm(),
        overall_fittest: engine.overall_fittest().cloned(),
    })
}

/// Read every row of a progress log.
pub fn read_progress<P: AsRef<Path>>(path: P) -> Result<Vec<ProgressRecord>, DriverError> {
    let mut reader = csv::Reader::from_path(path)?;
    let records = reader.deserialize().collect::<Result<Vec<ProgressRecord>, _>>()?;
    Ok(records)
}

/// Errors of the optimization loop and its log.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Output file {0} already exists")]
    OutputExists(PathBuf),
    #[error(transparent)]
    Evolution(#[from] EvolutionError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::SpeciesAlphabet;
    use crate::compute::evolution::{Evaluation, OracleError, PenaltyFn, SequentialExecutor};
    use crate::schema::EvolutionConfig;
    use tempfile::tempdir;

    fn constant_oracle(
        score: f64,
    ) -> impl Fn(ReactionLibrary, Option<&PenaltyFn>) -> Result<Evaluation, OracleError> + Send + Sync
    {
        move |library, _| {
            Ok(Evaluation {
                score,
                norm: 0.1,
                library,
            })
        }
    }

    fn engine(score: f64) -> EvolvingLibraries {
        let config = EvolutionConfig {
            num_reactions: 3,
            pop_size: 4,
            n_parents: 2,
            co_points: 1,
            random_seed: Some(42),
            ..Default::default()
        };
        EvolvingLibraries::with_alphabet(config, SpeciesAlphabet::anonymous(2), constant_oracle(score))
            .unwrap()
            .with_executor(SequentialExecutor)
    }

    #[test]
    fn test_runs_all_steps() {
        let dir = tempdir().unwrap();
        let options = OptimizeOptions {
            nsteps: 4,
            output_path: dir.path().join("runs/sir/gp_loss.csv"),
            ..Default::default()
        };
        let mut engine = engine(0.5);
        let summary = optimize(&mut engine, &options, &CancellationToken::new()).unwrap();

        assert_eq!(summary.steps, 4);
        assert_eq!(summary.stop_reason, StopReason::MaxGenerations);

        let rows = read_progress(&options.output_path).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[3].step, 3);
        let snapshot = rows[3].snapshot().unwrap();
        let rebuilt = ReactionLibrary::from_snapshot(snapshot).unwrap();
        assert_eq!(rebuilt.mutable_reactions().len(), 3);
    }

    #[test]
    fn test_header() {
        let dir = tempdir().unwrap();
        let options = OptimizeOptions {
            nsteps: 1,
            output_path: dir.path().join("gp_loss.csv"),
            ..Default::default()
        };
        optimize(&mut engine(0.5), &options, &CancellationToken::new()).unwrap();
        let content = fs::read_to_string(&options.output_path).unwrap();
        assert!(content.starts_with("step,curr_fittest,overall_fittest,overall_fittest_norm,model\n"));
    }

    #[test]
    fn test_threshold_stops() {
        let dir = tempdir().unwrap();
        let options = OptimizeOptions {
            nsteps: 50,
            output_path: dir.path().join("gp_loss.csv"),
            ..Default::default()
        };
        let summary = optimize(&mut engine(1.0), &options, &CancellationToken::new()).unwrap();
        assert_eq!(summary.steps, 1);
        assert_eq!(summary.stop_reason, StopReason::TargetReached);
        assert_eq!(read_progress(&options.output_path).unwrap().len(), 1);
    }

    #[test]
    fn test_cancelled_after_row() {
        let dir = tempdir().unwrap();
        let options = OptimizeOptions {
            nsteps: 50,
            output_path: dir.path().join("gp_loss.csv"),
            ..Default::default()
        };
        let token = CancellationToken::new();
        token.cancel();
        let summary = optimize(&mut engine(0.2), &options, &token).unwrap();
        assert_eq!(summary.steps, 1);
        assert_eq!(summary.stop_reason, StopReason::Cancelled);
        assert_eq!(read_progress(&options.output_path).unwrap().len(), 1);
    }

    #[test]
    fn test_existing_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gp_loss.csv");
        fs::write(&path, "keep me").unwrap();
        let options = OptimizeOptions {
            nsteps: 1,
            output_path: path.clone(),
            ..Default::default()
        };
        let result = optimize(&mut engine(0.5), &options, &CancellationToken::new());
        assert!(matches!(result, Err(DriverError::OutputExists(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep me");

        let options = OptimizeOptions {
            overwrite: true,
            ..options
        };
        assert!(optimize(&mut engine(0.5), &options, &CancellationToken::new()).is_ok());
    }

    #[test]
    fn test_token_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(token.handle().load(Ordering::Relaxed));
    }
}
