//! Evolib - Evolutionary search for chemical reaction networks.
//!
//! Given a reference dataset of species trajectories, the crate searches
//! the space of mass-action reaction libraries for one that explains the
//! data. Libraries are evolved with a genetic algorithm (or resampled at
//! random) and scored by a pluggable fitness oracle.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: Configuration, reactions and serializable records
//! - `compute`: Enumeration, library genomes, the search engine and driver
//!
//! # Example
//!
//! ```rust
//! use evolib::{
//!     compute::{ReactionEnumerator, ReactionLibrary},
//!     schema::EnumeratorConfig,
//! };
//! use rand::{SeedableRng, rngs::StdRng};
//! use std::sync::Arc;
//!
//! let mut config = EnumeratorConfig::new(3);
//! config.species_names = vec!["S".into(), "I".into(), "R".into()];
//! let enumerator = Arc::new(ReactionEnumerator::new(config)?);
//!
//! let mut rng = StdRng::seed_from_u64(0);
//! let mut library = ReactionLibrary::random(enumerator, 4, vec![], &mut rng)?;
//! library.mutate(&mut rng)?;
//!
//! assert_eq!(library.mutable_reactions().len(), 4);
//! println!("{library}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::evolution::{EvolvingLibraries, optimize};
pub use compute::{ReactionEnumerator, ReactionLibrary};
pub use schema::{EvolutionConfig, Reaction};
