//! Generational search over reaction libraries.

use std::sync::Arc;

use rand::prelude::*;

use crate::compute::{
    DatasetError, LibraryError, ReactionEnumerator, ReactionLibrary, SpeciesAlphabet,
};
use crate::schema::{ConfigError, EvolutionConfig, EvolutionHistory};

use super::executor::{Executor, RayonExecutor, WorkItem};
use super::fitness::{Evaluation, FitnessOracle, OracleError, PenaltyFn};

/// Scores of one generation and the best library found so far.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Best score of the generation just evaluated.
    pub current_fittest_score: f64,
    /// Best score ever seen.
    pub overall_fittest_score: f64,
    /// Residual norm belonging to the best score ever seen.
    pub overall_fittest_norm: f64,
    /// Independent copy of the best library ever seen.
    pub overall_fittest: ReactionLibrary,
}

/// Evolution engine over a population of reaction libraries.
///
/// Either evolves the population with elitism, crossover and mutation, or
/// (in random-search mode) resamples it every generation while keeping the
/// best library seen so far in slot 0.
pub struct EvolvingLibraries {
    config: EvolutionConfig,
    alphabet: SpeciesAlphabet,
    enumerator: Arc<ReactionEnumerator>,
    oracle: Box<dyn FitnessOracle>,
    penalty: Option<PenaltyFn>,
    executor: Box<dyn Executor>,
    rng: StdRng,
    population: Vec<ReactionLibrary>,
    fittest: Option<Evaluation>,
    overall_fittest: Option<ReactionLibrary>,
    overall_fittest_score: f64,
    overall_fittest_norm: f64,
    history: EvolutionHistory,
    generation: usize,
    stagnation_count: usize,
}

impl EvolvingLibraries {
    /// Create an engine for the reference dataset named in the config.
    pub fn new<O>(config: EvolutionConfig, oracle: O) -> Result<Self, EvolutionError>
    where
        O: FitnessOracle + 'static,
    {
        if config.ref_data_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingReferenceData.into());
        }
        let alphabet = SpeciesAlphabet::from_csv(&config.ref_data_path)?;
        Self::with_alphabet(config, alphabet, oracle)
    }

    /// Create an engine over an explicit species alphabet.
    pub fn with_alphabet<O>(
        config: EvolutionConfig,
        alphabet: SpeciesAlphabet,
        oracle: O,
    ) -> Result<Self, EvolutionError>
    where
        O: FitnessOracle + 'static,
    {
        config.validate()?;
        if alphabet.is_empty() {
            return Err(ConfigError::NoSpecies.into());
        }
        if let Some((index, reaction)) = config
            .fixated_reactions
            .iter()
            .enumerate()
            .find(|(_, r)| r.num_species() != alphabet.len())
        {
            return Err(ConfigError::FixatedSpeciesMismatch {
                index,
                num_species: reaction.num_species(),
                alphabet: alphabet.len(),
            }
            .into());
        }

        let enumerator = ReactionEnumerator::new(config.enumerator_config(alphabet.names().to_vec()))?;
        if config.num_reactions > enumerator.admissible_count() {
            return Err(ConfigError::LibraryTooLarge {
                num_reactions: config.num_reactions,
                admissible: enumerator.admissible_count(),
            }
            .into());
        }
        log::info!(
            "Library size: {} reactions ({} admissible)",
            enumerator.get_number(false),
            enumerator.admissible_count()
        );

        let executor = RayonExecutor::new(config.cpu_div)?;
        let seed = config.random_seed.unwrap_or_else(rand::random);

        let mut engine = Self {
            config,
            alphabet,
            enumerator: Arc::new(enumerator),
            oracle: Box::new(oracle),
            penalty: None,
            executor: Box::new(executor),
            rng: StdRng::seed_from_u64(seed),
            population: Vec::new(),
            fittest: None,
            overall_fittest: None,
            overall_fittest_score: f64::NEG_INFINITY,
            overall_fittest_norm: f64::INFINITY,
            history: EvolutionHistory::default(),
            generation: 0,
            stagnation_count: 0,
        };
        engine.init_population()?;
        Ok(engine)
    }

    /// Subtract `penalty` from every score.
    pub fn with_penalty(mut self, penalty: PenaltyFn) -> Self {
        self.penalty = Some(penalty);
        self
    }

    /// Replace the evaluation backend.
    pub fn with_executor<E: Executor + 'static>(mut self, executor: E) -> Self {
        self.executor = Box::new(executor);
        self
    }

    /// Replace the population with fresh random libraries.
    pub fn init_population(&mut self) -> Result<(), EvolutionError> {
        self.population = self.random_population()?;
        Ok(())
    }

    fn random_population(&mut self) -> Result<Vec<ReactionLibrary>, LibraryError> {
        (0..self.config.pop_size)
            .map(|_| {
                ReactionLibrary::random(
                    Arc::clone(&self.enumerator),
                    self.config.num_reactions,
                    self.config.fixated_reactions.clone(),
                    &mut self.rng,
                )
                .map(|library| library.with_ref_data_path(&self.config.ref_data_path))
            })
            .collect()
    }

    /// Evaluate the population and breed the next generation.
    pub fn step(&mut self) -> Result<StepOutcome, EvolutionError> {
        log::debug!("Generation {}: fitness evaluation", self.generation);
        let items = self
            .population
            .iter()
            .enumerate()
            .map(|(index, library)| WorkItem {
                index,
                library: library.clone(),
                penalty: self.penalty.clone(),
            })
            .collect();
        let mut results = self.executor.evaluate_all(self.oracle.as_ref(), items)?;

        for (index, evaluation) in &mut results {
            if evaluation.score.is_nan() {
                log::warn!(
                    "Generation {}: library {index} scored NaN, ranking it last",
                    self.generation
                );
                evaluation.score = f64::NEG_INFINITY;
            }
        }
        // stable: ties keep evaluation order
        results.sort_by(|a, b| b.1.score.total_cmp(&a.1.score));

        if self.config.verbose {
            for (index, evaluation) in &results {
                log::info!(
                    "Generation {} library {index} scored {}:\n{}",
                    self.generation,
                    evaluation.score,
                    evaluation.library
                );
            }
        }

        let (_, best) = results.first().ok_or(EvolutionError::EmptyGeneration)?;
        let current_score = best.score;
        log::debug!(
            "Fittest library in generation {} scored {current_score}",
            self.generation
        );

        if self.overall_fittest.is_none() || current_score > self.overall_fittest_score {
            self.overall_fittest_score = current_score;
            self.overall_fittest_norm = best.norm;
            self.overall_fittest = Some(best.library.clone());
            self.stagnation_count = 0;
        } else {
            self.stagnation_count += 1;
        }
        self.fittest = Some(best.clone());

        let avg = results.iter().map(|(_, e)| e.score).sum::<f64>() / results.len() as f64;
        self.history.best_fitness.push(current_score);
        self.history.avg_fitness.push(avg);
        self.history.overall_fitness.push(self.overall_fittest_score);

        let overall = self
            .overall_fittest
            .clone()
            .ok_or(EvolutionError::EmptyGeneration)?;

        if self.config.random_search {
            self.population = self.random_population()?;
            self.population[0] = overall.clone();
        } else {
            self.population = self.breed(results)?;
        }
        self.generation += 1;

        Ok(StepOutcome {
            current_fittest_score: current_score,
            overall_fittest_score: self.overall_fittest_score,
            overall_fittest_norm: self.overall_fittest_norm,
            overall_fittest: overall,
        })
    }

    /// Next population from results sorted best first.
    fn breed(
        &mut self,
        ranked: Vec<(usize, Evaluation)>,
    ) -> Result<Vec<ReactionLibrary>, LibraryError> {
        let mut parents: Vec<ReactionLibrary> =
            ranked.into_iter().map(|(_, e)| e.library).collect();
        parents.truncate(self.config.n_parents);

        let co_weight = self.config.co_prob / (self.config.co_prob + self.config.mut_prob);
        let mut next = Vec::with_capacity(self.config.pop_size);
        next.push(parents[0].clone());

        while next.len() < self.config.pop_size {
            let mut member = self.pick_parent(&parents);
            if self.rng.gen_bool(co_weight) {
                let mut other = self.pick_parent(&parents);
                for _ in 0..self.config.co_points {
                    member.crossover(&mut other, &mut self.rng)?;
                }
            } else {
                member.mutate(&mut self.rng)?;
            }
            // rates are refitted from scratch; without them equal
            // structures collide again
            member.reset_rates();
            member.clean_duplicate_reactions(&mut self.rng)?;
            next.push(member);
        }
        Ok(next)
    }

    fn pick_parent(&mut self, parents: &[ReactionLibrary]) -> ReactionLibrary {
        parents[self.rng.gen_range(0..parents.len())].clone()
    }

    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    pub fn alphabet(&self) -> &SpeciesAlphabet {
        &self.alphabet
    }

    pub fn enumerator(&self) -> &Arc<ReactionEnumerator> {
        &self.enumerator
    }

    /// Libraries to be evaluated in the next step.
    pub fn population(&self) -> &[ReactionLibrary] {
        &self.population
    }

    /// Fitted best library of the last evaluated generation.
    pub fn fittest(&self) -> Option<&ReactionLibrary> {
        self.fittest.as_ref().map(|e| &e.library)
    }

    pub fn overall_fittest(&self) -> Option<&ReactionLibrary> {
        self.overall_fittest.as_ref()
    }

    pub fn overall_fittest_score(&self) -> f64 {
        self.overall_fittest_score
    }

    pub fn overall_fittest_norm(&self) -> f64 {
        self.overall_fittest_norm
    }

    /// Number of generations evaluated so far.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Generations since the best score last improved.
    pub fn stagnation_count(&self) -> usize {
        self.stagnation_count
    }

    pub fn history(&self) -> &EvolutionHistory {
        &self.history
    }

    pub fn workers(&self) -> usize {
        self.executor.workers()
    }
}

/// Errors raised while building or running the engine.
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error("Failed to build evaluation pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("Evaluation returned no results")]
    EmptyGeneration,
}
