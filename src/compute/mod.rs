//! Compute module - Reaction enumeration, genome operators and library search.

mod dataset;
mod enumerator;
mod library;

pub mod evolution;

pub use dataset::*;
pub use enumerator::*;
pub use library::*;
