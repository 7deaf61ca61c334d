//! Evolutionary search over reaction libraries.
//!
//! # Overview
//!
//! - **Fitness** (`fitness`): the oracle interface that scores a library
//! - **Executors** (`executor`): parallel or sequential population evaluation
//! - **Search** (`search`): the generational engine, evolutionary or random search
//! - **Driver** (`driver`): the optimization loop and its progress log
//!
//! # Example
//!
//! ```rust,no_run
//! use evolib::compute::ReactionLibrary;
//! use evolib::compute::evolution::{
//!     CancellationToken, Evaluation, EvolvingLibraries, OptimizeOptions, OracleError,
//!     PenaltyFn, optimize,
//! };
//! use evolib::schema::EvolutionConfig;
//!
//! let config = EvolutionConfig {
//!     num_reactions: 4,
//!     ref_data_path: "data/sir_0.csv".into(),
//!     ..Default::default()
//! };
//!
//! // stand-in oracle; a real one fits rates against the reference data
//! let oracle = |library: ReactionLibrary,
//!               _penalty: Option<&PenaltyFn>|
//!  -> Result<Evaluation, OracleError> { Ok(Evaluation { score: 0.0, norm: 1.0, library }) };
//!
//! let mut engine = EvolvingLibraries::new(config, oracle)?;
//! let summary = optimize(&mut engine, &OptimizeOptions::default(), &CancellationToken::new())?;
//! println!("best score {} after {} generations", summary.overall_fittest_score, summary.steps);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod driver;
mod executor;
mod fitness;
mod search;

pub use driver::{
    CancellationToken, DriverError, OptimizeOptions, OptimizeSummary, optimize, read_progress,
};
pub use executor::{Executor, RayonExecutor, SequentialExecutor, WorkItem};
pub use fitness::{
    Evaluation, FitnessOracle, OracleError, PenaltyFn, active_reaction_penalty, penalized,
};
pub use search::{EvolutionError, EvolvingLibraries, StepOutcome};
