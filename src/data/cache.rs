//! Expiring memo cache for presenter loads.
//!
//! Entries are keyed by `(dataset, date range)` and live for a fixed TTL. There is no
//! per-key eviction: a stale entry is recomputed on the next lookup, and `clear` drops
//! everything (the dashboard's manual refresh).

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::domain::{Dataset, DateRange};

/// Explicit cache key for a data-loading call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadKey {
    pub dataset: Dataset,
    pub range: DateRange,
}

#[derive(Debug)]
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, (Instant, V)>,
}

impl<K: Eq + Hash, V> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Fresh value for `key`, if one exists at `now`.
    pub fn get(&self, key: &K, now: Instant) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|(stored, _)| now.saturating_duration_since(*stored) < self.ttl)
            .map(|(_, v)| v)
    }

    /// Return the cached value or compute, store and return a new one.
    ///
    /// Errors from `load` are not cached.
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: K,
        now: Instant,
        load: impl FnOnce() -> Result<V, E>,
    ) -> Result<&V, E> {
        let ttl = self.ttl;
        match self.entries.entry(key) {
            Entry::Occupied(mut entry) => {
                if now.saturating_duration_since(entry.get().0) >= ttl {
                    let value = load()?;
                    entry.insert((now, value));
                }
                Ok(&entry.into_mut().1)
            }
            Entry::Vacant(entry) => {
                let value = load()?;
                Ok(&entry.insert((now, value)).1)
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn key(dataset: Dataset) -> LoadKey {
        let d = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        LoadKey {
            dataset,
            range: DateRange::new(d, d).unwrap(),
        }
    }

    #[test]
    fn value_is_reused_until_it_expires() {
        let mut cache: TtlCache<LoadKey, u32> = TtlCache::new(Duration::from_secs(60));
        let t0 = Instant::now();
        let mut calls = 0;

        let v = *cache
            .get_or_try_insert_with(key(Dataset::Online), t0, || {
                calls += 1;
                Ok::<_, ()>(1)
            })
            .unwrap();
        assert_eq!(v, 1);

        let v = *cache
            .get_or_try_insert_with(key(Dataset::Online), t0 + Duration::from_secs(59), || {
                calls += 1;
                Ok::<_, ()>(2)
            })
            .unwrap();
        assert_eq!(v, 1);

        let v = *cache
            .get_or_try_insert_with(key(Dataset::Online), t0 + Duration::from_secs(60), || {
                calls += 1;
                Ok::<_, ()>(3)
            })
            .unwrap();
        assert_eq!(v, 3);
        assert_eq!(calls, 2);
    }

    #[test]
    fn keys_are_independent_and_clear_drops_all() {
        let mut cache: TtlCache<LoadKey, &str> = TtlCache::new(Duration::from_secs(60));
        let now = Instant::now();
        cache.get_or_try_insert_with(key(Dataset::Online), now, || Ok::<_, ()>("online")).unwrap();
        cache.get_or_try_insert_with(key(Dataset::Programmed), now, || Ok::<_, ()>("programmed")).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&key(Dataset::Programmed), now), Some(&"programmed"));

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get(&key(Dataset::Online), now), None);
    }

    #[test]
    fn errors_are_not_cached() {
        let mut cache: TtlCache<LoadKey, u32> = TtlCache::new(Duration::from_secs(60));
        let now = Instant::now();
        let err = cache.get_or_try_insert_with(key(Dataset::Online), now, || Err("boom"));
        assert_eq!(err, Err("boom"));
        assert!(cache.is_empty());
    }
}
