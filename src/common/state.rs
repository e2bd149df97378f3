use super::{BitSet, Operator, Task};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hash::{Hash, Hasher};

/// One random 64-bit key per fact id (Zobrist table).
///
/// Only meaningful for the fact-id space it was built for: a re-translated
/// task needs a fresh table.
#[derive(Debug, Clone)]
pub struct FactHashes {
    keys: Vec<u64>,
}

impl FactHashes {
    pub fn new(fact_count: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        FactHashes {
            keys: (0..fact_count).map(|_| rng.gen()).collect(),
        }
    }

    #[inline]
    pub fn key(&self, fact: usize) -> u64 {
        self.keys[fact]
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Full XOR hash of a fact set, from scratch.
    pub fn hash_bits(&self, bits: &BitSet) -> u64 {
        bits.iter().fold(0, |hash, fact| hash ^ self.keys[fact])
    }
}

/// A world state: the set of true facts plus a cached XOR hash and
/// true-fact count, both maintained incrementally by `apply`.
///
/// Equality is bit-for-bit equality of the fact sets. Equal hashes do not
/// imply equal states.
#[derive(Debug, Clone)]
pub struct State {
    bits: BitSet,
    hash: u64,
    true_count: usize,
}

impl State {
    pub fn from_bits(bits: BitSet, hashes: &FactHashes) -> Self {
        let hash = hashes.hash_bits(&bits);
        let true_count = bits.count_ones();
        State {
            bits,
            hash,
            true_count,
        }
    }

    pub fn initial(task: &Task, hashes: &FactHashes) -> Self {
        State::from_bits(task.init_mask().clone(), hashes)
    }

    pub fn bits(&self) -> &BitSet {
        &self.bits
    }

    pub fn hash_value(&self) -> u64 {
        self.hash
    }

    pub fn true_count(&self) -> usize {
        self.true_count
    }

    pub fn false_count(&self) -> usize {
        self.bits.len() - self.true_count
    }

    pub fn is_applicable(&self, operator: &Operator) -> bool {
        operator.is_applicable(&self.bits)
    }

    pub fn satisfies(&self, goal_mask: &BitSet) -> bool {
        goal_mask.is_subset_of(&self.bits)
    }

    /// Successor state: delete effects cleared first, then add effects set.
    /// Only facts whose truth value flips touch the hash.
    pub fn apply(&self, operator: &Operator, hashes: &FactHashes) -> State {
        let mut hash = self.hash;
        let mut true_count = self.true_count;

        for &fact in &operator.del {
            if self.bits.get(fact) && !operator.add_mask.get(fact) {
                hash ^= hashes.key(fact);
                true_count -= 1;
            }
        }
        for &fact in &operator.add {
            if !self.bits.get(fact) {
                hash ^= hashes.key(fact);
                true_count += 1;
            }
        }

        let mut bits = self.bits.clone();
        bits.and_not(&operator.del_mask);
        bits.or(&operator.add_mask);

        State {
            bits,
            hash,
            true_count,
        }
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.bits == other.bits
    }
}

impl Eq for State {}

impl Hash for State {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}
