use std::fmt;
use std::hash::{Hash, Hasher};

const WORD_BITS: usize = 64;

/// Fixed-length bit vector over `u64` words.
///
/// Every mask in the planner (states, operator pre/add/del masks, goal mask,
/// applicability rows) is one of these, sized exactly to its id space.
#[derive(Clone)]
pub struct BitSet {
    words: Vec<u64>,
    len: usize,
    // Iteration window in words, narrowed by `compute_bounds`.
    first_word: usize,
    end_word: usize,
}

impl BitSet {
    pub fn new(len: usize) -> Self {
        let num_words = len.div_ceil(WORD_BITS);
        BitSet {
            words: vec![0; num_words],
            len,
            first_word: 0,
            end_word: num_words,
        }
    }

    pub fn from_indices<I: IntoIterator<Item = usize>>(len: usize, indices: I) -> Self {
        let mut bits = BitSet::new(len);
        for index in indices {
            bits.set(index, true);
        }
        bits
    }

    /// Every bit in `0..len` set.
    pub fn full(len: usize) -> Self {
        let mut bits = BitSet::new(len);
        for word in bits.words.iter_mut() {
            *word = u64::MAX;
        }
        bits.clear_tail();
        bits
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn get(&self, index: usize) -> bool {
        assert!(index < self.len, "bit {index} out of range {}", self.len);
        self.words[index / WORD_BITS] & (1u64 << (index % WORD_BITS)) != 0
    }

    #[inline]
    pub fn set(&mut self, index: usize, value: bool) {
        assert!(index < self.len, "bit {index} out of range {}", self.len);
        let mask = 1u64 << (index % WORD_BITS);
        if value {
            self.words[index / WORD_BITS] |= mask;
        } else {
            self.words[index / WORD_BITS] &= !mask;
        }
    }

    /// Number of true bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    pub fn count_zeros(&self) -> usize {
        self.len - self.count_ones()
    }

    pub fn any(&self) -> bool {
        self.words.iter().any(|&word| word != 0)
    }

    /// Every true bit of `self` is also true in `other`.
    #[inline]
    pub fn is_subset_of(&self, other: &BitSet) -> bool {
        debug_assert_eq!(self.len, other.len);
        self.words
            .iter()
            .zip(&other.words)
            .all(|(a, b)| a & !b == 0)
    }

    pub fn intersects(&self, other: &BitSet) -> bool {
        debug_assert_eq!(self.len, other.len);
        self.words.iter().zip(&other.words).any(|(a, b)| a & b != 0)
    }

    /// `|self ∩ other|`
    pub fn intersection_count(&self, other: &BitSet) -> usize {
        debug_assert_eq!(self.len, other.len);
        self.words
            .iter()
            .zip(&other.words)
            .map(|(a, b)| (a & b).count_ones() as usize)
            .sum()
    }

    /// `|self Δ other|`
    pub fn difference_count(&self, other: &BitSet) -> usize {
        debug_assert_eq!(self.len, other.len);
        self.words
            .iter()
            .zip(&other.words)
            .map(|(a, b)| (a ^ b).count_ones() as usize)
            .sum()
    }

    /// In-place union.
    #[inline]
    pub fn or(&mut self, other: &BitSet) {
        debug_assert_eq!(self.len, other.len);
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a |= b;
        }
    }

    /// Clears every bit that is set in `other`.
    #[inline]
    pub fn and_not(&mut self, other: &BitSet) {
        debug_assert_eq!(self.len, other.len);
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a &= !b;
        }
    }

    /// Narrows the iteration window to the words holding the first and last
    /// true bits.
    ///
    /// This is a one-shot optimisation for masks that never change again
    /// (goal masks, applicability rows). The window is NOT maintained by
    /// `set`/`or`/`and_not`: bits set outside it afterwards are skipped by
    /// `iter()`. Call `reset_bounds` before mutating a bounded set.
    pub fn compute_bounds(&mut self) {
        match self.words.iter().position(|&word| word != 0) {
            Some(first) => {
                let last = self
                    .words
                    .iter()
                    .rposition(|&word| word != 0)
                    .unwrap_or(first);
                self.first_word = first;
                self.end_word = last + 1;
            }
            None => {
                self.first_word = 0;
                self.end_word = 0;
            }
        }
    }

    pub fn reset_bounds(&mut self) {
        self.first_word = 0;
        self.end_word = self.words.len();
    }

    /// Indices of true bits inside the iteration window, ascending.
    pub fn iter(&self) -> Ones<'_> {
        Ones {
            words: &self.words,
            word_index: self.first_word,
            end_word: self.end_word,
            current: self.words.get(self.first_word).copied().unwrap_or(0),
        }
    }

    fn clear_tail(&mut self) {
        let tail = self.len % WORD_BITS;
        if tail != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << tail) - 1;
            }
        }
    }
}

impl PartialEq for BitSet {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.words == other.words
    }
}

impl Eq for BitSet {}

impl Hash for BitSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len.hash(state);
        self.words.hash(state);
    }
}

impl fmt::Debug for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

pub struct Ones<'a> {
    words: &'a [u64],
    word_index: usize,
    end_word: usize,
    current: u64,
}

impl Iterator for Ones<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while self.word_index < self.end_word {
            if self.current != 0 {
                let bit = self.current.trailing_zeros() as usize;
                // Clear lowest set bit.
                self.current &= self.current - 1;
                return Some(self.word_index * WORD_BITS + bit);
            }
            self.word_index += 1;
            self.current = self.words.get(self.word_index).copied().unwrap_or(0);
        }
        None
    }
}

impl<'a> IntoIterator for &'a BitSet {
    type Item = usize;
    type IntoIter = Ones<'a>;

    fn into_iter(self) -> Ones<'a> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_and_counts() {
        let mut bits = BitSet::new(130);
        bits.set(0, true);
        bits.set(64, true);
        bits.set(129, true);
        assert!(bits.get(64));
        assert!(!bits.get(65));
        assert_eq!(bits.count_ones(), 3);
        assert_eq!(bits.count_zeros(), 127);

        bits.set(64, false);
        assert_eq!(bits.count_ones(), 2);
    }

    #[test]
    #[should_panic]
    fn test_get_out_of_range() {
        let bits = BitSet::new(10);
        bits.get(10);
    }

    #[test]
    fn test_full_respects_length() {
        let bits = BitSet::full(70);
        assert_eq!(bits.count_ones(), 70);
        assert_eq!(bits.count_zeros(), 0);
    }

    #[test]
    fn test_subset_union_and_not() {
        let goal = BitSet::from_indices(100, [3, 70]);
        let mut state = BitSet::from_indices(100, [1, 3, 70, 99]);
        assert!(goal.is_subset_of(&state));
        assert!(!state.is_subset_of(&goal));

        state.and_not(&BitSet::from_indices(100, [70]));
        assert!(!goal.is_subset_of(&state));

        state.or(&BitSet::from_indices(100, [70, 71]));
        assert!(goal.is_subset_of(&state));
        assert_eq!(state.iter().collect::<Vec<_>>(), vec![1, 3, 70, 71, 99]);
    }

    #[test]
    fn test_intersection_and_difference_counts() {
        let a = BitSet::from_indices(10, [1, 2, 3]);
        let b = BitSet::from_indices(10, [2, 3, 4, 5]);
        assert_eq!(a.intersection_count(&b), 2);
        assert_eq!(a.difference_count(&b), 3);
        assert!(a.intersects(&b));
    }

    #[test]
    fn test_equality_ignores_bounds() {
        let mut a = BitSet::from_indices(300, [150, 200]);
        let b = BitSet::from_indices(300, [150, 200]);
        a.compute_bounds();
        assert_eq!(a, b);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![150, 200]);
    }

    #[test]
    fn test_bounds_are_stale_after_mutation() {
        let mut bits = BitSet::from_indices(300, [150]);
        bits.compute_bounds();
        bits.set(5, true);
        // Word 0 lies outside the window computed above.
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![150]);
        bits.reset_bounds();
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![5, 150]);
    }

    #[test]
    fn test_empty_bounds() {
        let mut bits = BitSet::new(64);
        bits.compute_bounds();
        assert_eq!(bits.iter().count(), 0);
    }
}
