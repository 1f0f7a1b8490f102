//! Ordered secondary index.

use std::collections::BTreeSet;
use std::ops::Bound;

/// BTree-based secondary index of `(index_key, primary_key)` pairs.
///
/// Pairs are unique, so several records may share an index key (two history
/// entries watched in the same second) without colliding. Ties are ordered by
/// primary key.
///
/// `BTreeIndex` supports:
/// - Descending walks below an exclusive bound (history pagination)
/// - Equality lookups (resources of a folder, folders of an account)
///
/// # Example
///
/// ```rust
/// use bilisync_core::BTreeIndex;
///
/// let mut index: BTreeIndex<i64> = BTreeIndex::new();
/// index.insert(100, 1);
/// index.insert(200, 2);
/// index.insert(300, 3);
///
/// let below: Vec<_> = index.iter_desc_below(Some(300)).collect();
/// assert_eq!(below, vec![(200, 2), (100, 1)]);
/// ```
#[derive(Debug, Clone)]
pub struct BTreeIndex<K: Ord + Copy> {
    entries: BTreeSet<(K, u64)>,
}

impl<K: Ord + Copy> Default for BTreeIndex<K> {
    fn default() -> Self {
        Self {
            entries: BTreeSet::new(),
        }
    }
}

impl<K: Ord + Copy> BTreeIndex<K> {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pair. Returns false if it was already present.
    pub fn insert(&mut self, key: K, primary: u64) -> bool {
        self.entries.insert((key, primary))
    }

    /// Removes a pair. Returns false if it was not present.
    pub fn remove(&mut self, key: K, primary: u64) -> bool {
        self.entries.remove(&(key, primary))
    }

    /// Primary keys stored under exactly `key`, ascending.
    pub fn lookup(&self, key: K) -> impl Iterator<Item = u64> + '_ {
        self.entries
            .range((key, u64::MIN)..=(key, u64::MAX))
            .map(|&(_, primary)| primary)
    }

    /// Walks pairs in descending order, starting strictly below `upper`
    /// (every pair whose index key is `< upper`), or from the top.
    pub fn iter_desc_below(&self, upper: Option<K>) -> impl Iterator<Item = (K, u64)> + '_ {
        let end = match upper {
            Some(key) => Bound::Excluded((key, u64::MIN)),
            None => Bound::Unbounded,
        };
        self.entries.range((Bound::Unbounded, end)).rev().copied()
    }

    /// The greatest pair strictly below `after`, or the greatest pair overall.
    ///
    /// Lets a caller resume a descending walk without holding a borrow.
    #[must_use]
    pub fn prev_before(&self, after: Option<(K, u64)>) -> Option<(K, u64)> {
        match after {
            Some(pair) => self.entries.range(..pair).next_back().copied(),
            None => self.entries.iter().next_back().copied(),
        }
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every pair.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
