//! Fitness oracle interface.
//!
//! The engine does not know how a library is scored. An oracle takes a
//! library, fits its rates against reference data and returns a score where
//! larger is better, the residual norm and the fitted library.

use std::sync::Arc;

use crate::compute::ReactionLibrary;

/// Penalty on library complexity, subtracted from the goodness of fit.
///
/// Must be pure and non-negative.
pub type PenaltyFn = Arc<dyn Fn(&ReactionLibrary) -> f64 + Send + Sync>;

/// Result of a single oracle call.
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Goodness of fit minus penalty.
    pub score: f64,
    /// Residual norm of the fit.
    pub norm: f64,
    /// The input library with fitted rates assigned.
    pub library: ReactionLibrary,
}

impl Evaluation {
    /// Sentinel result for a library whose fit failed numerically.
    pub fn failed(library: ReactionLibrary) -> Self {
        Self {
            score: f64::NEG_INFINITY,
            norm: f64::INFINITY,
            library,
        }
    }
}

/// Scores reaction libraries.
///
/// Calls for different libraries run concurrently on the evaluation pool, so
/// implementations must not share mutable state between calls. An oracle
/// that parallelises its own numerics should limit itself to one thread per
/// call when the pool has more than one worker, otherwise the machine gets
/// oversubscribed.
///
/// Numerical failures inside the fit should be reported as
/// [`Evaluation::failed`] rather than as an error; an error aborts the run.
pub trait FitnessOracle: Send + Sync {
    fn evaluate(
        &self,
        library: ReactionLibrary,
        penalty: Option<&PenaltyFn>,
    ) -> Result<Evaluation, OracleError>;
}

impl<F> FitnessOracle for F
where
    F: Fn(ReactionLibrary, Option<&PenaltyFn>) -> Result<Evaluation, OracleError> + Send + Sync,
{
    fn evaluate(
        &self,
        library: ReactionLibrary,
        penalty: Option<&PenaltyFn>,
    ) -> Result<Evaluation, OracleError> {
        self(library, penalty)
    }
}

/// Apply an optional penalty to a goodness-of-fit value.
pub fn penalized(goodness: f64, library: &ReactionLibrary, penalty: Option<&PenaltyFn>) -> f64 {
    match penalty {
        Some(penalty) => goodness - penalty(library),
        None => goodness,
    }
}

/// Penalty proportional to the number of reactions with a non-zero rate.
pub fn active_reaction_penalty(weight: f64) -> PenaltyFn {
    Arc::new(move |library: &ReactionLibrary| {
        weight * library.reactions().filter(|r| r.rate > 0.0).count() as f64
    })
}

/// Opaque failure raised by a fitness oracle.
#[derive(Debug, thiserror::Error)]
#[error("Fitness oracle failed: {message}")]
pub struct OracleError {
    message: String,
}

impl OracleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Reaction;

    fn library() -> ReactionLibrary {
        ReactionLibrary::new(
            vec![
                Reaction::new(vec![0], vec![1], 0.0, 2),
                Reaction::new(vec![1], vec![], 3.0, 2),
            ],
            2,
        )
    }

    #[test]
    fn test_closure_oracle() {
        let oracle = |library: ReactionLibrary,
                      penalty: Option<&PenaltyFn>|
         -> Result<Evaluation, OracleError> {
            let score = penalized(1.0, &library, penalty);
            Ok(Evaluation {
                score,
                norm: 0.0,
                library,
            })
        };
        let penalty = active_reaction_penalty(0.25);

        let plain = oracle.evaluate(library(), None).unwrap();
        let penalised = oracle.evaluate(library(), Some(&penalty)).unwrap();
        assert_eq!(plain.score, 1.0);
        assert_eq!(penalised.score, 0.75);
    }

    #[test]
    fn test_failed_sentinel_ranks_last() {
        let failed = Evaluation::failed(library());
        assert!(failed.score < -1e300);
    }

    #[test]
    fn test_error_message() {
        let err = OracleError::new("singular matrix");
        assert_eq!(err.to_string(), "Fitness oracle failed: singular matrix");
    }
}
