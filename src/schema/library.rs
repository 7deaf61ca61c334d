//! Serializable records of libraries and of search progress.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::Reaction;

/// Structured, schema-checked form of a reaction library.
///
/// Enough to rebuild an equivalent library without the enumerator that
/// produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    /// Number of species in the alphabet.
    pub num_species: usize,
    /// Species display names.
    #[serde(default)]
    pub species_names: Vec<String>,
    /// Immutable prefix.
    #[serde(default)]
    pub fixated_reactions: Vec<Reaction>,
    /// Reactions under search.
    pub mutable_reactions: Vec<Reaction>,
    /// Reference dataset the library was fitted against.
    #[serde(default)]
    pub ref_data_path: PathBuf,
}

/// One row of the progress log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Generation index.
    pub step: usize,
    /// Best score in this generation.
    pub curr_fittest: f64,
    /// Best score so far.
    pub overall_fittest: f64,
    /// Residual norm of the best library so far.
    pub overall_fittest_norm: f64,
    /// JSON-encoded [`LibrarySnapshot`] of the best library so far.
    pub model: String,
}

impl ProgressRecord {
    /// Decode the `model` column.
    pub fn snapshot(&self) -> serde_json::Result<LibrarySnapshot> {
        serde_json::from_str(&self.model)
    }
}

/// Reason a search stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// Reached the configured number of generations.
    MaxGenerations,
    /// Generation best reached the fitness threshold.
    TargetReached,
    /// Cancellation was requested.
    Cancelled,
}

/// Score history for plotting.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvolutionHistory {
    /// Best score per generation.
    pub best_fitness: Vec<f64>,
    /// Mean score per generation.
    pub avg_fitness: Vec<f64>,
    /// Best score so far, per generation.
    pub overall_fitness: Vec<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_json() {
        let snapshot = LibrarySnapshot {
            num_species: 2,
            species_names: vec!["S".into(), "W".into()],
            fixated_reactions: vec![Reaction::new(vec![1], vec![], 8.0, 2)],
            mutable_reactions: vec![Reaction::new(vec![0, 1], vec![1, 1], 0.01, 2)],
            ref_data_path: PathBuf::from("data/predatorprey_0.csv"),
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let record = ProgressRecord {
            step: 0,
            curr_fittest: 0.5,
            overall_fittest: 0.5,
            overall_fittest_norm: 1.0,
            model: json,
        };
        assert_eq!(record.snapshot().unwrap(), snapshot);
    }

    #[test]
    fn test_snapshot_missing_field_rejected() {
        let json = r#"{"num_species": 2}"#;
        assert!(serde_json::from_str::<LibrarySnapshot>(json).is_err());
    }
}
