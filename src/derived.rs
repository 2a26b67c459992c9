//! Dependency-tracked derived values.
//!
//! A [`Memo`] stores a value together with the key it was computed from. The
//! key is built from the revisions and flags the value reads, so a value is
//! recomputed exactly when one of its inputs changed.

#[derive(Debug)]
pub struct Memo<K, V> {
    key: Option<K>,
    value: Option<V>,
    recomputations: usize,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self {
            key: None,
            value: None,
            recomputations: 0,
        }
    }
}

impl<K: PartialEq, V> Memo<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fresh(&self, key: &K) -> bool {
        self.value.is_some() && self.key.as_ref() == Some(key)
    }

    /// Returns the cached value for `key`, calling `compute` first if it is stale.
    pub fn get_or_compute(&mut self, key: K, compute: impl FnOnce() -> V) -> &V {
        if !self.is_fresh(&key) {
            self.value = None;
            self.key = Some(key);
            self.recomputations += 1;
        }
        self.value.get_or_insert_with(compute)
    }

    /// Last computed value, regardless of freshness.
    pub fn cached(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub fn recomputations(&self) -> usize {
        self.recomputations
    }
}
