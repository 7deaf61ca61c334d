//! Schema module - Configuration and data types for reaction library search.

mod config;
mod library;
mod reaction;

pub use config::*;
pub use library::*;
pub use reaction::*;
