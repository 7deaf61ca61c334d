//! A single reaction term: reactand and product multisets with a rate.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of a species in the alphabet.
pub type SpeciesIndex = usize;

/// Allowed range for a fitted rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateBounds {
    /// Lower bound (inclusive).
    pub lo: f64,
    /// Upper bound (inclusive). `None` means unbounded.
    pub hi: Option<f64>,
}

impl Default for RateBounds {
    fn default() -> Self {
        Self { lo: 0.0, hi: None }
    }
}

impl RateBounds {
    /// Clamp a rate into the bounds.
    pub fn clamp(&self, rate: f64) -> f64 {
        let rate = rate.max(self.lo);
        match self.hi {
            Some(hi) => rate.min(hi),
            None => rate,
        }
    }
}

/// One candidate reaction `reactands -> products @ rate`.
///
/// The reactand multiplicity vector and the net-change vector are computed
/// once on construction. Reactands and products are fixed afterwards; only
/// the rate changes (when an oracle assigns fitted coefficients).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ReactionRecord", into = "ReactionRecord")]
pub struct Reaction {
    reactands: Vec<SpeciesIndex>,
    products: Vec<SpeciesIndex>,
    /// Rate constant of the reaction.
    pub rate: f64,
    num_species: usize,
    rate_bounds: RateBounds,
    mass_action: Vec<u32>,
    change: Vec<i32>,
}

impl Reaction {
    /// Create a reaction over an alphabet of `num_species` species.
    ///
    /// # Panics
    ///
    /// Panics if a species index is out of range. Use [`Reaction::try_new`]
    /// for unchecked input.
    pub fn new(
        reactands: Vec<SpeciesIndex>,
        products: Vec<SpeciesIndex>,
        rate: f64,
        num_species: usize,
    ) -> Self {
        match Self::try_new(reactands, products, rate, num_species) {
            Ok(reaction) => reaction,
            Err(err) => panic!("{err}"),
        }
    }

    /// Create a reaction, rejecting species indices outside the alphabet.
    pub fn try_new(
        reactands: Vec<SpeciesIndex>,
        products: Vec<SpeciesIndex>,
        rate: f64,
        num_species: usize,
    ) -> Result<Self, ReactionError> {
        if let Some(&species) = reactands
            .iter()
            .chain(products.iter())
            .find(|&&s| s >= num_species)
        {
            return Err(ReactionError::SpeciesOutOfRange {
                species,
                num_species,
            });
        }

        let mass_action = histogram(&reactands, num_species);
        let change = histogram(&products, num_species)
            .iter()
            .zip(&mass_action)
            .map(|(&p, &r)| p as i32 - r as i32)
            .collect();

        Ok(Self {
            reactands,
            products,
            rate,
            num_species,
            rate_bounds: RateBounds::default(),
            mass_action,
            change,
        })
    }

    /// Set the allowed rate range.
    pub fn with_rate_bounds(mut self, bounds: RateBounds) -> Self {
        self.rate_bounds = bounds;
        self
    }

    pub fn reactands(&self) -> &[SpeciesIndex] {
        &self.reactands
    }

    pub fn products(&self) -> &[SpeciesIndex] {
        &self.products
    }

    pub fn num_species(&self) -> usize {
        self.num_species
    }

    pub fn rate_bounds(&self) -> RateBounds {
        self.rate_bounds
    }

    /// Reactand multiplicity per species.
    pub fn mass_action(&self) -> &[u32] {
        &self.mass_action
    }

    /// Net change per species (`products - reactands`).
    pub fn change(&self) -> &[i32] {
        &self.change
    }

    /// Same reactand and product multisets, ignoring order, rate and names.
    pub fn equal_structure(&self, other: &Reaction) -> bool {
        self.mass_action == other.mass_action
            && histogram(&self.products, self.num_species)
                == histogram(&other.products, other.num_species)
    }

    /// Mass-action propensity without the rate, times the net change.
    ///
    /// Each species with reactand multiplicity `m > 0` contributes
    /// `x^m / m` to the propensity.
    pub fn rate_law(&self, state: &[f64]) -> Vec<f64> {
        let propensity: f64 = self
            .mass_action
            .iter()
            .zip(state)
            .filter(|(m, _)| **m > 0)
            .map(|(&m, &x)| x.powi(m as i32) / m as f64)
            .product();

        self.change.iter().map(|&c| propensity * c as f64).collect()
    }

    /// Contribution of this reaction to the time derivative at `state`.
    pub fn derivative(&self, state: &[f64]) -> Vec<f64> {
        let mut deriv = self.rate_law(state);
        for d in &mut deriv {
            *d *= self.rate;
        }
        deriv
    }

    /// Display with species names in place of `S<i>` placeholders.
    pub fn display_with<'a>(&'a self, names: &'a [String]) -> NamedReaction<'a> {
        NamedReaction {
            reaction: self,
            names,
        }
    }

    /// Canonical identity used for deduplication.
    pub(crate) fn key(&self) -> ReactionKey {
        let mut reactands = self.reactands.clone();
        let mut products = self.products.clone();
        reactands.sort_unstable();
        products.sort_unstable();
        ReactionKey {
            reactands,
            products,
            // +0.0 folds -0.0 into 0.0
            rate_bits: (self.rate + 0.0).to_bits(),
            num_species: self.num_species,
        }
    }

    fn write_side(
        f: &mut fmt::Formatter<'_>,
        side: &[SpeciesIndex],
        names: &[String],
    ) -> fmt::Result {
        // count multiplicities in first-occurrence order
        let mut counts: Vec<(SpeciesIndex, usize)> = Vec::new();
        for &s in side {
            match counts.iter_mut().find(|(species, _)| *species == s) {
                Some((_, n)) => *n += 1,
                None => counts.push((s, 1)),
            }
        }

        for (i, (species, n)) in counts.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            if *n > 1 {
                write!(f, "{n}")?;
            }
            match names.get(*species) {
                Some(name) => write!(f, "{name}")?,
                None => write!(f, "S{species}")?,
            }
        }
        Ok(())
    }

    fn write_named(&self, f: &mut fmt::Formatter<'_>, names: &[String]) -> fmt::Result {
        Self::write_side(f, &self.reactands, names)?;
        write!(f, " -> ")?;
        Self::write_side(f, &self.products, names)?;
        write!(f, " @ {}[Hz];", self.rate)
    }
}

/// Equal structure, equal rate and equal alphabet size.
impl PartialEq for Reaction {
    fn eq(&self, other: &Self) -> bool {
        self.equal_structure(other)
            && self.rate == other.rate
            && self.num_species == other.num_species
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_named(f, &[])
    }
}

/// A reaction paired with species names for display.
pub struct NamedReaction<'a> {
    reaction: &'a Reaction,
    names: &'a [String],
}

impl fmt::Display for NamedReaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.reaction.write_named(f, self.names)
    }
}

/// Hashable identity of a reaction (sorted sides, rate bits, alphabet size).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ReactionKey {
    reactands: Vec<SpeciesIndex>,
    products: Vec<SpeciesIndex>,
    rate_bits: u64,
    num_species: usize,
}

/// Histogram of species indices over `0..num_species`.
pub fn histogram(side: &[SpeciesIndex], num_species: usize) -> Vec<u32> {
    let mut hist = vec![0u32; num_species];
    for &s in side {
        if let Some(slot) = hist.get_mut(s) {
            *slot += 1;
        }
    }
    hist
}

/// Serialized form of a reaction; cached vectors are rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReactionRecord {
    reactands: Vec<SpeciesIndex>,
    products: Vec<SpeciesIndex>,
    rate: f64,
    num_species: usize,
    #[serde(default)]
    rate_bounds: RateBounds,
}

impl TryFrom<ReactionRecord> for Reaction {
    type Error = ReactionError;

    fn try_from(record: ReactionRecord) -> Result<Self, Self::Error> {
        Ok(
            Reaction::try_new(record.reactands, record.products, record.rate, record.num_species)?
                .with_rate_bounds(record.rate_bounds),
        )
    }
}

impl From<Reaction> for ReactionRecord {
    fn from(reaction: Reaction) -> Self {
        Self {
            reactands: reaction.reactands,
            products: reaction.products,
            rate: reaction.rate,
            num_species: reaction.num_species,
            rate_bounds: reaction.rate_bounds,
        }
    }
}

/// Reaction construction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReactionError {
    #[error("Species index {species} out of range for {num_species} species")]
    SpeciesOutOfRange { species: usize, num_species: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_vectors() {
        let r = Reaction::new(vec![0, 1], vec![1, 1], 0.02, 3);
        assert_eq!(r.mass_action(), &[1, 1, 0]);
        assert_eq!(r.change(), &[-1, 1, 0]);
    }

    #[test]
    fn test_equality() {
        let base = Reaction::new(vec![0, 1], vec![1, 1], 1.0, 3);
        let different_rate = Reaction::new(vec![0, 1], vec![1, 1], 0.0, 3);
        let different_reactands = Reaction::new(vec![0, 1, 1], vec![1, 1], 1.0, 3);
        let different_products = Reaction::new(vec![0, 1], vec![0, 1], 1.0, 3);
        let different_num_species = Reaction::new(vec![0, 1], vec![1, 1], 1.0, 2);
        let reordered = Reaction::new(vec![1, 0], vec![1, 1], 1.0, 3);

        assert_ne!(base, different_rate);
        assert!(base.equal_structure(&different_rate));
        assert_ne!(base, different_reactands);
        assert_ne!(base, different_products);
        assert_ne!(base, different_num_species);
        assert_eq!(base, reordered);
        assert_eq!(base.key(), reordered.key());
    }

    #[test]
    fn test_negative_zero_rate_same_key() {
        let a = Reaction::new(vec![0], vec![], 0.0, 2);
        let b = Reaction::new(vec![0], vec![], -0.0, 2);
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_out_of_range_species() {
        let err = Reaction::try_new(vec![0], vec![3], 0.0, 3).unwrap_err();
        assert_eq!(
            err,
            ReactionError::SpeciesOutOfRange {
                species: 3,
                num_species: 3
            }
        );
    }

    #[test]
    fn test_display() {
        let r = Reaction::new(vec![0, 1], vec![1, 1], 0.02, 3);
        assert_eq!(r.to_string(), "S0 + S1 -> 2S1 @ 0.02[Hz];");

        let names: Vec<String> = ["S", "I", "R"].iter().map(|s| s.to_string()).collect();
        assert_eq!(r.display_with(&names).to_string(), "S + I -> 2I @ 0.02[Hz];");

        let decay = Reaction::new(vec![1], vec![], 8.0, 2);
        assert_eq!(decay.to_string(), "S1 ->  @ 8[Hz];");
    }

    #[test]
    fn test_rate_law() {
        // S + I -> 2I with rate 0.5 at S=2, I=3: propensity 6, change (-1, +1, 0)
        let mut r = Reaction::new(vec![0, 1], vec![1, 1], 0.0, 3);
        r.rate = 0.5;
        let deriv = r.derivative(&[2.0, 3.0, 1.0]);
        assert_eq!(deriv, vec![-3.0, 3.0, 0.0]);

        // 2A -> 0: propensity A^2 / 2
        let dimer = Reaction::new(vec![0, 0], vec![], 1.0, 1);
        assert_eq!(dimer.rate_law(&[4.0]), vec![-16.0]);
    }

    #[test]
    fn test_serde_roundtrip_rebuilds_cache() {
        let r = Reaction::new(vec![0, 1], vec![1, 1], 0.02, 3);
        let json = serde_json::to_string(&r).unwrap();
        let parsed: Reaction = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, r);
        assert_eq!(parsed.change(), r.change());
    }

    #[test]
    fn test_serde_rejects_bad_species() {
        let json = r#"{"reactands":[5],"products":[],"rate":0.0,"num_species":2}"#;
        assert!(serde_json::from_str::<Reaction>(json).is_err());
    }

    #[test]
    fn test_rate_bounds_clamp() {
        let bounds = RateBounds {
            lo: 0.0,
            hi: Some(2.0),
        };
        assert_eq!(bounds.clamp(-1.0), 0.0);
        assert_eq!(bounds.clamp(3.0), 2.0);
        assert_eq!(RateBounds::default().clamp(1e9), 1e9);
    }
}
