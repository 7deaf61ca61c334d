//! Configuration types for reaction enumeration and library evolution.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{Reaction, SpeciesIndex};

/// Structural constraint applied to every enumerated reaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Constraint {
    /// The species may not appear on either side.
    ExcludeSpecies { species: SpeciesIndex },
    /// At most this many species in total (reactands plus products).
    MaxTotalSpecies { max: usize },
}

impl Constraint {
    /// Whether a `(left, right)` pair satisfies the constraint.
    pub fn admits(&self, left: &[SpeciesIndex], right: &[SpeciesIndex]) -> bool {
        match self {
            Constraint::ExcludeSpecies { species } => {
                !left.contains(species) && !right.contains(species)
            }
            Constraint::MaxTotalSpecies { max } => left.len() + right.len() <= *max,
        }
    }
}

/// Parameters of a [`ReactionEnumerator`](crate::compute::ReactionEnumerator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumeratorConfig {
    /// Size of the species alphabet.
    pub num_species: usize,
    /// Maximum number of reactands.
    #[serde(default = "default_max_side")]
    pub max_num_left: usize,
    /// Maximum number of products.
    #[serde(default = "default_max_side")]
    pub max_num_right: usize,
    /// Cap on the absolute net change of any single species.
    #[serde(default = "default_enumerator_stoichiometry")]
    pub max_stoichiometry: u32,
    /// Additional structural constraints.
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    /// Shuffle the output of full enumeration.
    #[serde(default = "default_shuffle")]
    pub shuffle: bool,
    /// Display names of the species.
    #[serde(default)]
    pub species_names: Vec<String>,
    /// Reactions (by structure) that are never produced.
    #[serde(default)]
    pub blacklist: Vec<(Vec<SpeciesIndex>, Vec<SpeciesIndex>)>,
    /// Disjoint partition of species; one side may not mix parts.
    #[serde(default)]
    pub subgroups: Vec<Vec<SpeciesIndex>>,
}

impl EnumeratorConfig {
    /// Defaults for an alphabet of `num_species` species.
    pub fn new(num_species: usize) -> Self {
        Self {
            num_species,
            max_num_left: default_max_side(),
            max_num_right: default_max_side(),
            max_stoichiometry: default_enumerator_stoichiometry(),
            constraints: Vec::new(),
            shuffle: default_shuffle(),
            species_names: Vec::new(),
            blacklist: Vec::new(),
            subgroups: Vec::new(),
        }
    }

    /// Blacklist the structure of each given reaction.
    pub fn with_blacklisted_reactions<'a>(
        mut self,
        reactions: impl IntoIterator<Item = &'a Reaction>,
    ) -> Self {
        self.blacklist.extend(
            reactions
                .into_iter()
                .map(|r| (r.reactands().to_vec(), r.products().to_vec())),
        );
        self
    }

    /// Validate enumerator parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_species == 0 {
            return Err(ConfigError::NoSpecies);
        }
        if !self.species_names.is_empty() && self.species_names.len() != self.num_species {
            return Err(ConfigError::SpeciesNameCount {
                names: self.species_names.len(),
                num_species: self.num_species,
            });
        }
        validate_subgroups(&self.subgroups, self.num_species)
    }
}

fn default_max_side() -> usize {
    2
}
fn default_enumerator_stoichiometry() -> u32 {
    99
}
fn default_shuffle() -> bool {
    true
}

/// Check that subgroups are in range and pairwise disjoint.
pub fn validate_subgroups(
    subgroups: &[Vec<SpeciesIndex>],
    num_species: usize,
) -> Result<(), ConfigError> {
    let mut owner: Vec<Option<usize>> = vec![None; num_species];
    for (group, members) in subgroups.iter().enumerate() {
        for &species in members {
            let slot = owner
                .get_mut(species)
                .ok_or(ConfigError::SubgroupSpeciesOutOfRange {
                    species,
                    num_species,
                })?;
            match slot {
                Some(other) if *other != group => {
                    return Err(ConfigError::OverlappingSubgroups { species });
                }
                _ => *slot = Some(group),
            }
        }
    }
    Ok(())
}

/// Configuration of the library evolution engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Number of mutable reactions per library.
    pub num_reactions: usize,
    /// Maximum number of reactands per reaction.
    #[serde(default = "default_max_side")]
    pub max_num_left: usize,
    /// Maximum number of products per reaction.
    #[serde(default = "default_max_side")]
    pub max_num_right: usize,
    /// Reference dataset (CSV, first column time).
    #[serde(default)]
    pub ref_data_path: PathBuf,
    /// Known reactions included in every library and never mutated.
    #[serde(default)]
    pub fixated_reactions: Vec<Reaction>,
    /// Species subgroups in which species interact.
    #[serde(default)]
    pub subgroups: Vec<Vec<SpeciesIndex>>,
    /// Number of libraries per generation.
    #[serde(default = "default_pop_size")]
    pub pop_size: usize,
    /// Relative weight of crossover.
    #[serde(default = "default_co_prob")]
    pub co_prob: f64,
    /// Relative weight of mutation.
    #[serde(default = "default_mut_prob")]
    pub mut_prob: f64,
    /// Number of best libraries used as parents.
    #[serde(default = "default_n_parents")]
    pub n_parents: usize,
    /// Number of consecutive swaps per crossover.
    #[serde(default = "default_co_points")]
    pub co_points: usize,
    /// Net-change cap per species for generated reactions.
    #[serde(default = "default_engine_stoichiometry")]
    pub max_stoichiometry: u32,
    /// Structural constraints on generated reactions.
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    /// Log population dumps at info level.
    #[serde(default)]
    pub verbose: bool,
    /// Resample random populations instead of evolving.
    #[serde(default)]
    pub random_search: bool,
    /// Divisor applied to the available cores for the worker pool.
    #[serde(default = "default_cpu_div")]
    pub cpu_div: usize,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            num_reactions: 10,
            max_num_left: default_max_side(),
            max_num_right: default_max_side(),
            ref_data_path: PathBuf::new(),
            fixated_reactions: Vec::new(),
            subgroups: Vec::new(),
            pop_size: default_pop_size(),
            co_prob: default_co_prob(),
            mut_prob: default_mut_prob(),
            n_parents: default_n_parents(),
            co_points: default_co_points(),
            max_stoichiometry: default_engine_stoichiometry(),
            constraints: Vec::new(),
            verbose: false,
            random_search: false,
            cpu_div: default_cpu_div(),
            random_seed: None,
        }
    }
}

fn default_pop_size() -> usize {
    10
}
fn default_co_prob() -> f64 {
    0.2
}
fn default_mut_prob() -> f64 {
    0.8
}
fn default_n_parents() -> usize {
    3
}
fn default_co_points() -> usize {
    4
}
fn default_engine_stoichiometry() -> u32 {
    1
}
fn default_cpu_div() -> usize {
    1
}

impl EvolutionConfig {
    /// Validate evolution configuration.
    ///
    /// Parent-pool and crossover-point limits only apply in evolutionary mode.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_reactions == 0 {
            return Err(ConfigError::NoReactions);
        }
        if self.pop_size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }
        if self.cpu_div == 0 {
            return Err(ConfigError::InvalidCpuDivisor);
        }

        if !self.random_search {
            if self.n_parents == 0 || self.n_parents > self.pop_size {
                return Err(ConfigError::InvalidParentCount {
                    n_parents: self.n_parents,
                    pop_size: self.pop_size,
                });
            }
            if self.co_points >= self.num_reactions {
                return Err(ConfigError::TooManyCrossoverPoints {
                    co_points: self.co_points,
                    num_reactions: self.num_reactions,
                });
            }
            let valid = |p: f64| p.is_finite() && p >= 0.0;
            if !valid(self.co_prob) || !valid(self.mut_prob) || self.co_prob + self.mut_prob <= 0.0
            {
                return Err(ConfigError::InvalidOperatorWeights {
                    co_prob: self.co_prob,
                    mut_prob: self.mut_prob,
                });
            }
        }

        Ok(())
    }

    /// Enumerator configuration for an alphabet read from the reference data.
    ///
    /// Fixated reactions are blacklisted so they never reappear as mutable ones.
    pub fn enumerator_config(&self, species_names: Vec<String>) -> EnumeratorConfig {
        EnumeratorConfig {
            num_species: species_names.len(),
            max_num_left: self.max_num_left,
            max_num_right: self.max_num_right,
            max_stoichiometry: self.max_stoichiometry,
            constraints: self.constraints.clone(),
            shuffle: true,
            species_names,
            blacklist: Vec::new(),
            subgroups: self.subgroups.clone(),
        }
        .with_blacklisted_reactions(&self.fixated_reactions)
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Species alphabet must be non-empty")]
    NoSpecies,
    #[error("Got {names} species names for {num_species} species")]
    SpeciesNameCount { names: usize, num_species: usize },
    #[error("Subgroup species {species} out of range for {num_species} species")]
    SubgroupSpeciesOutOfRange { species: usize, num_species: usize },
    #[error("Species {species} appears in more than one subgroup")]
    OverlappingSubgroups { species: usize },
    #[error("No reaction satisfies the enumeration constraints")]
    EmptyReactionSpace,
    #[error("Library size must be at least 1")]
    NoReactions,
    #[error("Population size must be at least 1")]
    EmptyPopulation,
    #[error("cpu_div must be at least 1")]
    InvalidCpuDivisor,
    #[error("n_parents ({n_parents}) must be between 1 and pop_size ({pop_size})")]
    InvalidParentCount { n_parents: usize, pop_size: usize },
    #[error("co_points ({co_points}) >= num_reactions ({num_reactions})")]
    TooManyCrossoverPoints { co_points: usize, num_reactions: usize },
    #[error("Invalid operator weights: co_prob={co_prob}, mut_prob={mut_prob}")]
    InvalidOperatorWeights { co_prob: f64, mut_prob: f64 },
    #[error("Fixated reaction {index} is over {num_species} species, alphabet has {alphabet}")]
    FixatedSpeciesMismatch {
        index: usize,
        num_species: usize,
        alphabet: usize,
    },
    #[error("Reference data path must be non-empty")]
    MissingReferenceData,
    #[error("Library size {num_reactions} exceeds the {admissible} admissible reactions")]
    LibraryTooLarge {
        num_reactions: usize,
        admissible: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = EvolutionConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parent_count_exceeds_population() {
        let config = EvolutionConfig {
            pop_size: 4,
            n_parents: 5,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidParentCount { .. })
        ));

        // ignored in random-search mode
        let config = EvolutionConfig {
            random_search: true,
            ..config
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_crossover_points_exceed_library() {
        let config = EvolutionConfig {
            num_reactions: 4,
            co_points: 4,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::TooManyCrossoverPoints {
                co_points: 4,
                num_reactions: 4
            })
        );
    }

    #[test]
    fn test_operator_weights() {
        let config = EvolutionConfig {
            co_prob: 0.0,
            mut_prob: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_subgroups_disjoint() {
        assert!(validate_subgroups(&[vec![0, 1], vec![2]], 3).is_ok());
        assert_eq!(
            validate_subgroups(&[vec![0, 1], vec![1, 2]], 3),
            Err(ConfigError::OverlappingSubgroups { species: 1 })
        );
        assert!(matches!(
            validate_subgroups(&[vec![7]], 3),
            Err(ConfigError::SubgroupSpeciesOutOfRange { .. })
        ));
    }

    #[test]
    fn test_enumerator_config_blacklists_fixated() {
        let config = EvolutionConfig {
            fixated_reactions: vec![Reaction::new(vec![0], vec![1], 1.0, 2)],
            ..Default::default()
        };
        let enum_config = config.enumerator_config(vec!["A".into(), "B".into()]);
        assert_eq!(enum_config.num_species, 2);
        assert_eq!(enum_config.max_stoichiometry, 1);
        assert_eq!(enum_config.blacklist, vec![(vec![0], vec![1])]);
    }

    #[test]
    fn test_serialization() {
        let config = EvolutionConfig {
            constraints: vec![Constraint::ExcludeSpecies { species: 1 }],
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: EvolutionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.pop_size, config.pop_size);
        assert_eq!(parsed.constraints, config.constraints);
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let parsed: EvolutionConfig = serde_json::from_str(r#"{"num_reactions": 5}"#).unwrap();
        assert_eq!(parsed.num_reactions, 5);
        assert_eq!(parsed.pop_size, 10);
        assert_eq!(parsed.co_points, 4);
        assert_eq!(parsed.max_stoichiometry, 1);
    }

    #[test]
    fn test_constraints() {
        let exclude = Constraint::ExcludeSpecies { species: 2 };
        assert!(exclude.admits(&[0, 1], &[1]));
        assert!(!exclude.admits(&[0], &[2]));

        let max = Constraint::MaxTotalSpecies { max: 3 };
        assert!(max.admits(&[0, 1], &[1]));
        assert!(!max.admits(&[0, 1], &[1, 1]));
    }
}
