//! Species alphabet of a reference dataset.
//!
//! The dataset is a CSV file whose first column is time and whose remaining
//! columns are per-species trajectories. Only the header is read here.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Ordered species names; the alphabet size is their count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesAlphabet {
    names: Vec<String>,
}

impl SpeciesAlphabet {
    /// Alphabet from explicit names.
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Anonymous alphabet `S0..S{n-1}`.
    pub fn anonymous(num_species: usize) -> Self {
        Self {
            names: (0..num_species).map(|i| format!("S{i}")).collect(),
        }
    }

    /// Read the alphabet from the header of a reference CSV file.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(DatasetError::EmptyPath);
        }

        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?;
        if headers.len() < 2 {
            return Err(DatasetError::NoSpeciesColumns(path.display().to_string()));
        }

        Ok(Self {
            names: headers.iter().skip(1).map(|h| h.trim().to_string()).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}

/// Errors reading a reference dataset.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Reference data path is empty")]
    EmptyPath,
    #[error("Reference data {0} has no species columns")]
    NoSpeciesColumns(String),
    #[error("Failed to read reference data: {0}")]
    Csv(#[from] csv::Error),
}
