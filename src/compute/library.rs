//! Reaction libraries: the genomes under search.
//!
//! A library holds an immutable prefix of fixated reactions and a fixed-size
//! list of mutable reactions. Crossover and mutation only touch the mutable
//! part, and every mutating operator re-establishes that no two mutable
//! reactions are equal (same structure, rate and alphabet size) by removing
//! duplicates and drawing fresh reactions from the enumerator.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::prelude::*;

use crate::schema::{ConfigError, EnumeratorConfig, LibrarySnapshot, Reaction};

use super::dataset::{DatasetError, SpeciesAlphabet};
use super::enumerator::ReactionEnumerator;

/// A set of reactions, some of which are fixated.
#[derive(Debug, Clone)]
pub struct ReactionLibrary {
    fixated: Vec<Reaction>,
    mutable: Vec<Reaction>,
    num_species: usize,
    species_names: Vec<String>,
    ref_data_path: PathBuf,
    enumerator: Option<Arc<ReactionEnumerator>>,
}

impl ReactionLibrary {
    /// Create a library without an enumerator.
    ///
    /// Duplicate mutable reactions are removed (and not refilled).
    pub fn new(mutable: Vec<Reaction>, num_species: usize) -> Self {
        let mut library = Self {
            fixated: Vec::new(),
            mutable,
            num_species,
            species_names: Vec::new(),
            ref_data_path: PathBuf::new(),
            enumerator: None,
        };
        library.dedup();
        library
    }

    /// Set the fixated prefix.
    pub fn with_fixated(mut self, fixated: Vec<Reaction>) -> Self {
        self.fixated = fixated;
        self
    }

    /// Set species display names.
    pub fn with_species_names(mut self, names: Vec<String>) -> Self {
        self.species_names = names;
        self
    }

    /// Set the reference dataset path.
    pub fn with_ref_data_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.ref_data_path = path.as_ref().to_path_buf();
        self
    }

    /// Attach the enumerator used for mutation and refills.
    pub fn with_enumerator(mut self, enumerator: Arc<ReactionEnumerator>) -> Self {
        self.enumerator = Some(enumerator);
        self
    }

    /// Library of `size` random reactions drawn from `enumerator`.
    pub fn random<R: Rng + ?Sized>(
        enumerator: Arc<ReactionEnumerator>,
        size: usize,
        fixated: Vec<Reaction>,
        rng: &mut R,
    ) -> Result<Self, LibraryError> {
        let mutable = (0..size).map(|_| enumerator.get_random(rng)).collect();
        let mut library = Self {
            fixated,
            mutable,
            num_species: enumerator.num_species(),
            species_names: enumerator.species_names().to_vec(),
            ref_data_path: PathBuf::new(),
            enumerator: Some(enumerator),
        };
        library.clean_duplicate_reactions(rng)?;
        Ok(library)
    }

    /// Library for rediscovering a reference dataset; species come from its header.
    pub fn from_ref_data<P: AsRef<Path>>(
        reactions: Vec<Reaction>,
        ref_data_path: P,
    ) -> Result<Self, LibraryError> {
        let alphabet = SpeciesAlphabet::from_csv(&ref_data_path)?;
        Ok(Self::new(reactions, alphabet.len())
            .with_species_names(alphabet.into_names())
            .with_ref_data_path(ref_data_path))
    }

    /// Library containing every admissible reaction of the given space.
    pub fn library_for(config: EnumeratorConfig) -> Result<Self, LibraryError> {
        let enumerator = ReactionEnumerator::new(EnumeratorConfig {
            shuffle: false,
            ..config
        })?;
        let reactions = enumerator.iter().collect();
        Ok(Self::new(reactions, enumerator.num_species())
            .with_species_names(enumerator.species_names().to_vec()))
    }

    /// Rebuild a library from its snapshot.
    pub fn from_snapshot(snapshot: LibrarySnapshot) -> Result<Self, LibraryError> {
        let LibrarySnapshot {
            num_species,
            species_names,
            fixated_reactions,
            mutable_reactions,
            ref_data_path,
        } = snapshot;

        if !species_names.is_empty() && species_names.len() != num_species {
            return Err(LibraryError::InvalidSnapshot(format!(
                "{} species names for {} species",
                species_names.len(),
                num_species
            )));
        }
        if let Some(r) = fixated_reactions
            .iter()
            .chain(&mutable_reactions)
            .find(|r| r.num_species() != num_species)
        {
            return Err(LibraryError::InvalidSnapshot(format!(
                "reaction {r} is over {} species, library over {num_species}",
                r.num_species()
            )));
        }

        Ok(Self {
            fixated: fixated_reactions,
            mutable: mutable_reactions,
            num_species,
            species_names,
            ref_data_path,
            enumerator: None,
        })
    }

    /// Structured snapshot of this library.
    pub fn to_snapshot(&self) -> LibrarySnapshot {
        LibrarySnapshot {
            num_species: self.num_species,
            species_names: self.species_names.clone(),
            fixated_reactions: self.fixated.clone(),
            mutable_reactions: self.mutable.clone(),
            ref_data_path: self.ref_data_path.clone(),
        }
    }

    pub fn num_species(&self) -> usize {
        self.num_species
    }

    pub fn species_names(&self) -> &[String] {
        &self.species_names
    }

    pub fn ref_data_path(&self) -> &Path {
        &self.ref_data_path
    }

    pub fn enumerator(&self) -> Option<&Arc<ReactionEnumerator>> {
        self.enumerator.as_ref()
    }

    pub fn fixated_reactions(&self) -> &[Reaction] {
        &self.fixated
    }

    pub fn mutable_reactions(&self) -> &[Reaction] {
        &self.mutable
    }

    /// Mutable reactions, for rate assignment by a fitness oracle.
    ///
    /// Only rates should be changed through this; the structure of each
    /// reaction is fixed.
    pub fn mutable_reactions_mut(&mut self) -> &mut [Reaction] {
        &mut self.mutable
    }

    /// All reactions, fixated first.
    pub fn reactions(&self) -> impl Iterator<Item = &Reaction> {
        self.fixated.iter().chain(&self.mutable)
    }

    /// Number of reactions including fixated ones.
    pub fn len(&self) -> usize {
        self.fixated.len() + self.mutable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reset the rate of every mutable reaction to zero.
    pub fn reset_rates(&mut self) {
        for reaction in &mut self.mutable {
            reaction.rate = 0.0;
        }
    }

    /// Remove duplicate mutable reactions and refill from the enumerator.
    ///
    /// Without an enumerator the library simply shrinks. Returns the number
    /// of reactions that were redrawn.
    pub fn clean_duplicate_reactions<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<usize, LibraryError> {
        let target = self.mutable.len();
        self.dedup();

        let Some(enumerator) = self.enumerator.clone() else {
            return Ok(0);
        };
        if self.mutable.len() == target {
            return Ok(0);
        }

        // fresh reactions have rate 0, so at most `admissible` of them can
        // coexist next to the reactions we keep
        let zero_rate = self.mutable.iter().filter(|r| r.rate == 0.0).count();
        let missing = target - self.mutable.len();
        let available = enumerator.admissible_count().saturating_sub(zero_rate);
        if missing > available {
            return Err(LibraryError::SpaceExhausted {
                required: target,
                admissible: enumerator.admissible_count(),
            });
        }

        let mut seen: HashSet<_> = self.mutable.iter().map(Reaction::key).collect();
        let mut redrawn = 0;
        while self.mutable.len() < target {
            let candidate = enumerator.get_random(rng);
            redrawn += 1;
            if seen.insert(candidate.key()) {
                self.mutable.push(candidate);
            }
        }
        Ok(redrawn)
    }

    /// Keep the first occurrence of every mutable reaction.
    fn dedup(&mut self) {
        let mut seen = HashSet::with_capacity(self.mutable.len());
        self.mutable.retain(|r| seen.insert(r.key()));
    }

    /// Drop every mutable reaction with `rate <= threshold`.
    ///
    /// Destructive: the library no longer has its search size afterwards.
    /// Only meant for finished, evaluated libraries.
    pub fn clean_slow_reactions(&mut self, threshold: f64) {
        self.mutable.retain(|r| r.rate > threshold);
    }

    /// Swap one random mutable reaction with one of `other`'s.
    ///
    /// Both libraries are repaired afterwards.
    pub fn crossover<R: Rng + ?Sized>(
        &mut self,
        other: &mut ReactionLibrary,
        rng: &mut R,
    ) -> Result<(), LibraryError> {
        if self.mutable.is_empty() || other.mutable.is_empty() {
            return Ok(());
        }
        let place_self = rng.gen_range(0..self.mutable.len());
        let place_other = rng.gen_range(0..other.mutable.len());
        std::mem::swap(
            &mut self.mutable[place_self],
            &mut other.mutable[place_other],
        );

        self.clean_duplicate_reactions(rng)?;
        other.clean_duplicate_reactions(rng)?;
        Ok(())
    }

    /// Replace one random mutable reaction with a fresh random one.
    pub fn mutate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), LibraryError> {
        let enumerator = self.enumerator.clone().ok_or(LibraryError::NoEnumerator)?;
        if self.mutable.is_empty() {
            return Ok(());
        }
        let place = rng.gen_range(0..self.mutable.len());
        self.mutable[place] = enumerator.get_random(rng);
        self.clean_duplicate_reactions(rng)?;
        Ok(())
    }

    /// Move mutable reactions into the fixated prefix.
    ///
    /// With `invert`, every reaction not selected is fixated instead.
    pub fn fixate(&mut self, selection: &FixateSelection, invert: bool) {
        let mut remaining = Vec::with_capacity(self.mutable.len());
        for (idx, reaction) in std::mem::take(&mut self.mutable).into_iter().enumerate() {
            let selected = match selection {
                FixateSelection::Indices(indices) => indices.contains(&idx),
                FixateSelection::Reactions(reactions) => reactions.contains(&reaction),
            };
            if selected != invert {
                self.fixated.push(reaction);
            } else {
                remaining.push(reaction);
            }
        }
        self.mutable = remaining;
    }

    /// Library holding the mutable reactions of `self` that are structurally
    /// present anywhere in `other`. Rates and fixated reactions are dropped.
    pub fn intersection(&self, other: &ReactionLibrary) -> ReactionLibrary {
        let common = self
            .mutable
            .iter()
            .filter(|r| other.reactions().any(|o| r.equal_structure(o)))
            .cloned()
            .collect();
        ReactionLibrary {
            fixated: Vec::new(),
            mutable: common,
            num_species: self.num_species,
            species_names: self.species_names.clone(),
            ref_data_path: self.ref_data_path.clone(),
            enumerator: None,
        }
    }

    /// Time derivative of the mass-action system at `state`.
    pub fn derivative(&self, state: &[f64]) -> Vec<f64> {
        let mut deriv = vec![0.0; state.len()];
        for reaction in self.reactions() {
            for (d, term) in deriv.iter_mut().zip(reaction.derivative(state)) {
                *d += term;
            }
        }
        deriv
    }

    /// Display form skipping zero-rate reactions.
    pub fn print_model(&self) -> String {
        let mut out = String::new();
        for reaction in self.fixated.iter().filter(|r| r.rate > 0.0) {
            out.push_str(&format!("{} (fix)\n", reaction.display_with(&self.species_names)));
        }
        for reaction in self.mutable.iter().filter(|r| r.rate > 0.0) {
            out.push_str(&format!("{}\n", reaction.display_with(&self.species_names)));
        }
        out
    }
}

impl fmt::Display for ReactionLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for reaction in &self.fixated {
            writeln!(f, "{} (fix)", reaction.display_with(&self.species_names))?;
        }
        for reaction in &self.mutable {
            writeln!(f, "{}", reaction.display_with(&self.species_names))?;
        }
        Ok(())
    }
}

/// Which reactions [`ReactionLibrary::fixate`] moves.
#[derive(Debug, Clone)]
pub enum FixateSelection {
    /// Positions in the mutable list.
    Indices(Vec<usize>),
    /// Reactions compared with full equality.
    Reactions(Vec<Reaction>),
}

/// Library operation errors.
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("Library has no enumerator to draw reactions from")]
    NoEnumerator,
    #[error("Library needs {required} distinct reactions, only {admissible} are admissible")]
    SpaceExhausted { required: usize, admissible: usize },
    #[error("Invalid library snapshot: {0}")]
    InvalidSnapshot(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}
