use std::collections::HashMap;
use std::hash::Hash;

/// Caller-owned memo of computed totals, keyed by entity.
///
/// The calculators never read it. Callers that write totals back onto their
/// entities decide here whether to recompute, and serialize access themselves
/// when several threads share one cache.
#[derive(Clone, Debug)]
pub struct TotalsCache<K, T> {
    entries: HashMap<K, T>,
}

impl<K, T> Default for TotalsCache<K, T> {
    fn default() -> Self {
        Self { entries: HashMap::new() }
    }
}

impl<K, T> TotalsCache<K, T>
where
    K: Eq + Hash,
    T: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<T> {
        self.entries.get(key).cloned()
    }

    /// Returns the cached value, computing and storing it only when absent.
    /// A failed computation leaves the cache untouched.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: K,
        compute: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        if let Some(value) = self.entries.get(&key) {
            return Ok(value.clone());
        }

        let value = compute()?;
        self.entries.insert(key, value.clone());
        Ok(value)
    }

    pub fn invalidate(&mut self, key: &K) -> Option<T> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
