//! Population evaluation backends.

use std::num::NonZeroUsize;
use std::thread;

use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::compute::ReactionLibrary;

use super::fitness::{Evaluation, FitnessOracle, OracleError, PenaltyFn};

/// One oracle call: a library copy, its population index and the penalty.
#[derive(Clone)]
pub struct WorkItem {
    pub index: usize,
    pub library: ReactionLibrary,
    pub penalty: Option<PenaltyFn>,
}

/// Runs a batch of oracle calls.
///
/// Blocks until every call returned. Results come back in input order,
/// paired with the index of their work item.
pub trait Executor: Send + Sync {
    fn evaluate_all(
        &self,
        oracle: &dyn FitnessOracle,
        items: Vec<WorkItem>,
    ) -> Result<Vec<(usize, Evaluation)>, OracleError>;

    /// Number of concurrent workers.
    fn workers(&self) -> usize;
}

fn run_item(oracle: &dyn FitnessOracle, item: WorkItem) -> Result<(usize, Evaluation), OracleError> {
    let WorkItem {
        index,
        library,
        penalty,
    } = item;
    let evaluation = oracle.evaluate(library, penalty.as_ref())?;
    Ok((index, evaluation))
}

/// Evaluates on a dedicated rayon pool.
pub struct RayonExecutor {
    pool: ThreadPool,
}

impl RayonExecutor {
    /// Pool sized to the available cores divided by `cpu_div` (at least one thread).
    pub fn new(cpu_div: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let cores = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self::with_threads((cores / cpu_div.max(1)).max(1))
    }

    /// Pool with an explicit thread count.
    pub fn with_threads(num_threads: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads.max(1))
            .thread_name(|i| format!("evolib-eval-{i}"))
            .build()?;
        log::debug!("Evaluation pool with {} threads", pool.current_num_threads());
        Ok(Self { pool })
    }
}

impl Executor for RayonExecutor {
    fn evaluate_all(
        &self,
        oracle: &dyn FitnessOracle,
        items: Vec<WorkItem>,
    ) -> Result<Vec<(usize, Evaluation)>, OracleError> {
        self.pool.install(|| {
            items
                .into_par_iter()
                .map(|item| run_item(oracle, item))
                .collect()
        })
    }

    fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }
}

/// Evaluates in order on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialExecutor;

impl Executor for SequentialExecutor {
    fn evaluate_all(
        &self,
        oracle: &dyn FitnessOracle,
        items: Vec<WorkItem>,
    ) -> Result<Vec<(usize, Evaluation)>, OracleError> {
        items.into_iter().map(|item| run_item(oracle, item)).collect()
    }

    fn workers(&self) -> usize {
        1
    }
}
