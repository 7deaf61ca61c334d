//! Enumeration and sampling of admissible reactions.
//!
//! A side of a reaction with arity bound `k` is any multiset of at most `k`
//! species (including the empty one). The reaction space is the product of
//! the left and right candidate lists, filtered by:
//!
//! 1. no-op: left and right are the same multiset
//! 2. blacklist: the structure is explicitly excluded
//! 3. stoichiometry: some species changes by more than `max_stoichiometry`
//! 4. subgroups: a side mixes species from different subgroups
//! 5. constraints: any configured [`Constraint`] rejects the pair
//!
//! Candidate lists are computed once per distinct arity bound and reused.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::prelude::*;

use crate::schema::{ConfigError, Constraint, EnumeratorConfig, Reaction, SpeciesIndex};

/// One side of a reaction, as a sorted multiset of species.
pub type Side = Vec<SpeciesIndex>;

/// Enumerates and samples reactions for a fixed species alphabet.
#[derive(Debug)]
pub struct ReactionEnumerator {
    num_species: usize,
    max_num_left: usize,
    max_num_right: usize,
    max_stoichiometry: u32,
    constraints: Vec<Constraint>,
    shuffle: bool,
    species_names: Vec<String>,
    blacklist: HashMap<Side, HashSet<Side>>,
    blacklist_len: usize,
    subgroup_of: Option<Vec<Option<usize>>>,
    cache: HashMap<usize, Arc<Vec<Side>>>,
    admissible: usize,
}

impl ReactionEnumerator {
    /// Build an enumerator and its candidate lists.
    ///
    /// Fails if the configuration is invalid or no reaction passes the filters.
    pub fn new(config: EnumeratorConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let subgroup_of = if config.subgroups.is_empty() {
            None
        } else {
            let mut owner = vec![None; config.num_species];
            for (group, members) in config.subgroups.iter().enumerate() {
                for &species in members {
                    owner[species] = Some(group);
                }
            }
            Some(owner)
        };

        let mut blacklist: HashMap<Side, HashSet<Side>> = HashMap::new();
        for (left, right) in config.blacklist {
            blacklist
                .entry(canonical(left))
                .or_default()
                .insert(canonical(right));
        }
        let blacklist_len = blacklist.values().map(HashSet::len).sum();

        let mut enumerator = Self {
            num_species: config.num_species,
            max_num_left: config.max_num_left,
            max_num_right: config.max_num_right,
            max_stoichiometry: config.max_stoichiometry,
            constraints: config.constraints,
            shuffle: config.shuffle,
            species_names: config.species_names,
            blacklist,
            blacklist_len,
            subgroup_of,
            cache: HashMap::new(),
            admissible: 0,
        };

        for bound in [enumerator.max_num_left, enumerator.max_num_right] {
            if !enumerator.cache.contains_key(&bound) {
                let side = Arc::new(one_side(enumerator.num_species, bound));
                enumerator.cache.insert(bound, side);
            }
        }

        enumerator.admissible = enumerator.admissible_pairs().count();
        if enumerator.admissible == 0 {
            return Err(ConfigError::EmptyReactionSpace);
        }

        log::debug!(
            "Reaction space: {} admissible of at most {} ({} x {} sides)",
            enumerator.admissible,
            enumerator.get_number(false),
            enumerator.lhs_count(),
            enumerator.rhs_count()
        );

        Ok(enumerator)
    }

    pub fn num_species(&self) -> usize {
        self.num_species
    }

    pub fn species_names(&self) -> &[String] {
        &self.species_names
    }

    fn left(&self) -> &[Side] {
        &self.cache[&self.max_num_left]
    }

    fn right(&self) -> &[Side] {
        &self.cache[&self.max_num_right]
    }

    /// All admissible reactions with zero rate, shuffled if configured.
    pub fn generator<R: Rng + ?Sized>(&self, rng: &mut R) -> impl Iterator<Item = Reaction> + '_ {
        let mut pairs: Vec<(&Side, &Side)> = self.admissible_pairs().collect();
        if self.shuffle {
            pairs.shuffle(rng);
        }
        pairs
            .into_iter()
            .map(move |(left, right)| self.to_reaction(left, right))
    }

    /// All admissible reactions in generation order, without shuffling.
    pub fn iter(&self) -> impl Iterator<Item = Reaction> + '_ {
        self.admissible_pairs()
            .map(move |(left, right)| self.to_reaction(left, right))
    }

    fn admissible_pairs(&self) -> impl Iterator<Item = (&Side, &Side)> + '_ {
        self.left().iter().flat_map(move |left| {
            self.right()
                .iter()
                .map(move |right| (left, right))
                .filter(move |(left, right)| self.admits(left, right))
        })
    }

    /// Draw one admissible reaction uniformly by rejection sampling.
    ///
    /// Terminates because construction guarantees a non-empty space.
    pub fn get_random<R: Rng + ?Sized>(&self, rng: &mut R) -> Reaction {
        let left = self.left();
        let right = self.right();
        loop {
            let l = &left[rng.gen_range(0..left.len())];
            let r = &right[rng.gen_range(0..right.len())];
            if self.admits(l, r) {
                return self.to_reaction(l, r);
            }
        }
    }

    /// Approximate number of reactions: `|left| * |right| - |left|`.
    ///
    /// Subtracts `|left|` for the no-op diagonal (and the blacklist, if
    /// asked); stoichiometry, subgroup and constraint filters are not
    /// subtracted. The real diagonal has `min(|left|, |right|)` pairs, so
    /// this is an upper bound only when `max_num_left <= max_num_right`.
    /// Use [`admissible_count`](Self::admissible_count) for the exact number.
    pub fn get_number(&self, consider_blacklisted: bool) -> usize {
        let left = self.lhs_count();
        let right = self.rhs_count();
        let total = left * right - left;
        if consider_blacklisted {
            total.saturating_sub(self.blacklist_len)
        } else {
            total
        }
    }

    /// Number of candidate reactand sides (including the empty side).
    pub fn lhs_count(&self) -> usize {
        self.left().len()
    }

    /// Number of candidate product sides (including the empty side).
    pub fn rhs_count(&self) -> usize {
        self.right().len()
    }

    /// Exact number of reactions passing every filter.
    pub fn admissible_count(&self) -> usize {
        self.admissible
    }

    fn admits(&self, left: &[SpeciesIndex], right: &[SpeciesIndex]) -> bool {
        self.filter_nochange(left, right)
            && self.filter_blacklisted(left, right)
            && self.filter_stoichiometry(left, right)
            && self.filter_subgroups(left, right)
            && self.constraints.iter().all(|c| c.admits(left, right))
    }

    fn filter_nochange(&self, left: &[SpeciesIndex], right: &[SpeciesIndex]) -> bool {
        // candidate sides are sorted, so multiset equality is slice equality
        left != right
    }

    fn filter_blacklisted(&self, left: &[SpeciesIndex], right: &[SpeciesIndex]) -> bool {
        self.blacklist
            .get(left)
            .is_none_or(|rights| !rights.contains(right))
    }

    fn filter_stoichiometry(&self, left: &[SpeciesIndex], right: &[SpeciesIndex]) -> bool {
        let mut change = vec![0i64; self.num_species];
        for &s in left {
            change[s] -= 1;
        }
        for &s in right {
            change[s] += 1;
        }
        change
            .iter()
            .all(|c| c.unsigned_abs() <= u64::from(self.max_stoichiometry))
    }

    fn filter_subgroups(&self, left: &[SpeciesIndex], right: &[SpeciesIndex]) -> bool {
        let Some(owner) = &self.subgroup_of else {
            return true;
        };
        let uniform = |side: &[SpeciesIndex]| side.windows(2).all(|w| owner[w[0]] == owner[w[1]]);
        uniform(left) && uniform(right)
    }

    fn to_reaction(&self, left: &[SpeciesIndex], right: &[SpeciesIndex]) -> Reaction {
        Reaction::new(left.to_vec(), right.to_vec(), 0.0, self.num_species)
    }
}

/// All multisets of size `0..=max_order` over `num_species` species.
///
/// Sizes `1..=max_order` in lexicographic order, then the empty side.
fn one_side(num_species: usize, max_order: usize) -> Vec<Side> {
    let mut sides = Vec::new();
    for n in 1..=max_order {
        combinations_with_replacement(num_species, n, &mut sides);
    }
    sides.push(Vec::new());
    sides
}

/// Push every non-decreasing sequence of length `n` over `0..num_species`.
fn combinations_with_replacement(num_species: usize, n: usize, out: &mut Vec<Side>) {
    if num_species == 0 {
        return;
    }
    let mut current = vec![0; n];
    loop {
        out.push(current.clone());

        // rightmost position that can still be incremented
        let Some(pos) = (0..n).rev().find(|&i| current[i] + 1 < num_species) else {
            return;
        };
        let next = current[pos] + 1;
        for slot in &mut current[pos..] {
            *slot = next;
        }
    }
}

fn canonical(mut side: Side) -> Side {
    side.sort_unstable();
    side
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn enumerator(num_species: usize, left: usize, right: usize) -> ReactionEnumerator {
        ReactionEnumerator::new(EnumeratorConfig {
            max_num_left: left,
            max_num_right: right,
            shuffle: false,
            ..EnumeratorConfig::new(num_species)
        })
        .unwrap()
    }

    /// Number of multisets of size at most k over n species, plus one.
    fn side_count(n: usize, k: usize) -> usize {
        let binom = |a: usize, b: usize| -> usize {
            (0..b).fold(1usize, |acc, i| acc * (a - i) / (i + 1))
        };
        (1..=k).map(|m| binom(n + m - 1, m)).sum::<usize>() + 1
    }

    #[test]
    fn test_one_side() {
        let sides = one_side(2, 2);
        assert_eq!(
            sides,
            vec![vec![0], vec![1], vec![0, 0], vec![0, 1], vec![1, 1], vec![]]
        );
    }

    #[test]
    fn test_get_number_two_species() {
        let e = enumerator(2, 2, 2);
        assert_eq!(e.lhs_count(), 6);
        assert_eq!(e.rhs_count(), 6);
        assert_eq!(e.get_number(false), 6 * 6 - 6);
        // max_stoichiometry 99 filters nothing besides the diagonal
        assert_eq!(e.admissible_count(), 30);
    }

    #[test]
    fn test_get_number_wider_left() {
        // diagonal is min(|L|, |R|) = 1 pair, formula subtracts |L| = 3
        let e = enumerator(1, 2, 0);
        assert_eq!(e.get_number(false), 0);
        assert_eq!(e.admissible_count(), 2);
    }

    #[test]
    fn test_side_count_formula() {
        for (n, k) in [(1, 1), (2, 2), (3, 2), (4, 3), (5, 1)] {
            let e = enumerator(n, k, k);
            assert_eq!(e.lhs_count(), side_count(n, k));
        }
    }

    #[test]
    fn test_cache_shared_between_sides() {
        let e = enumerator(3, 2, 2);
        assert_eq!(e.cache.len(), 1);
        let e = enumerator(3, 2, 3);
        assert_eq!(e.cache.len(), 2);
    }

    #[test]
    fn test_generator_no_noop() {
        let e = enumerator(2, 2, 2);
        let mut rng = StdRng::seed_from_u64(1);
        let reactions: Vec<_> = e.generator(&mut rng).collect();
        assert_eq!(reactions.len(), 30);
        for r in &reactions {
            assert_ne!(r.reactands(), r.products());
            assert_eq!(r.rate, 0.0);
        }
    }

    #[test]
    fn test_blacklist() {
        let e = ReactionEnumerator::new(EnumeratorConfig {
            shuffle: false,
            blacklist: vec![(vec![1, 0], vec![1, 1])],
            ..EnumeratorConfig::new(2)
        })
        .unwrap();
        assert_eq!(e.admissible_count(), 29);
        assert_eq!(e.get_number(true), 29);
        assert!(!e.filter_blacklisted(&[0, 1], &[1, 1]));
        assert!(e.filter_blacklisted(&[0, 1], &[1]));
        assert!(
            e.iter()
                .all(|r| !(r.reactands() == [0, 1] && r.products() == [1, 1]))
        );
    }

    #[test]
    fn test_stoichiometry() {
        let e = ReactionEnumerator::new(EnumeratorConfig {
            max_stoichiometry: 1,
            ..EnumeratorConfig::new(2)
        })
        .unwrap();
        for r in e.iter() {
            assert!(r.change().iter().all(|c| c.abs() <= 1), "{r}");
        }
        // {} -> {0,0} changes S0 by 2
        assert!(e.admissible_count() < e.get_number(false));
    }

    #[test]
    fn test_subgroups() {
        let e = ReactionEnumerator::new(EnumeratorConfig {
            subgroups: vec![vec![0, 1], vec![2]],
            ..EnumeratorConfig::new(3)
        })
        .unwrap();
        for r in e.iter() {
            for side in [r.reactands(), r.products()] {
                let mixed = side.contains(&2) && side.iter().any(|&s| s != 2);
                assert!(!mixed, "{r}");
            }
        }
    }

    #[test]
    fn test_constraints() {
        let e = ReactionEnumerator::new(EnumeratorConfig {
            constraints: vec![Constraint::ExcludeSpecies { species: 1 }],
            ..EnumeratorConfig::new(2)
        })
        .unwrap();
        assert!(e.iter().all(|r| !r.reactands().contains(&1) && !r.products().contains(&1)));
    }

    #[test]
    fn test_empty_space_rejected() {
        // with zero arity on both sides only the no-op {} -> {} exists
        let result = ReactionEnumerator::new(EnumeratorConfig {
            max_num_left: 0,
            max_num_right: 0,
            ..EnumeratorConfig::new(2)
        });
        assert_eq!(result.unwrap_err(), ConfigError::EmptyReactionSpace);
    }

    #[test]
    fn test_get_random_admissible() {
        let e = ReactionEnumerator::new(EnumeratorConfig {
            max_stoichiometry: 1,
            subgroups: vec![vec![0], vec![1, 2]],
            ..EnumeratorConfig::new(3)
        })
        .unwrap();
        let all: Vec<_> = e.iter().collect();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let r = e.get_random(&mut rng);
            assert!(all.contains(&r), "{r}");
        }
    }

    proptest! {
        #[test]
        fn prop_no_noop(n in 1usize..4, left in 0usize..3, right in 1usize..3, seed in any::<u64>()) {
            let e = enumerator(n, left, right);
            let mut rng = StdRng::seed_from_u64(seed);
            for r in e.generator(&mut rng) {
                prop_assert_ne!(r.reactands(), r.products());
            }
            for _ in 0..20 {
                let r = e.get_random(&mut rng);
                prop_assert_ne!(r.reactands(), r.products());
            }
        }

        #[test]
        fn prop_get_number_formula(n in 1usize..5, left in 0usize..4, right in 0usize..4) {
            prop_assume!(left + right > 0);
            let e = enumerator(n, left, right);
            let l = side_count(n, left);
            let r = side_count(n, right);
            prop_assert_eq!(e.get_number(false), l * r - l);
            if left <= right {
                prop_assert!(e.admissible_count() <= e.get_number(false));
            }
        }
    }
}
