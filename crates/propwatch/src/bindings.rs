#![forbid(unsafe_code)]

//! Record identity table.
//!
//! [`Bindings::wrap`] is idempotent: wrapping any handle of the same
//! [`Record`] again returns a store sharing the registry created the first
//! time. The table holds records weakly and registries strongly; entries of
//! dropped records are pruned lazily when a `wrap` misses, which ends the
//! registry's life together with its record.

use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::config::{ConfigError, StoreConfig};
use crate::record::{Record, WeakRecord};
use crate::registry::Registry;
use crate::store::ReactiveStore;

struct Binding<V> {
    record: WeakRecord<V>,
    registry: Registry<V>,
}

/// Hands out one [`ReactiveStore`] per record.
pub struct Bindings<V> {
    entries: FxHashMap<usize, Binding<V>>,
    config: Rc<StoreConfig>,
}

impl<V> std::fmt::Debug for Bindings<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bindings")
            .field("entries", &self.entries.len())
            .field("config", &self.config)
            .finish()
    }
}

impl<V: Clone + 'static> Default for Bindings<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + 'static> Bindings<V> {
    /// Empty table with the default [`StoreConfig`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
            config: Rc::new(StoreConfig::default()),
        }
    }

    /// Empty table handing out stores with `config`.
    pub fn with_config(config: StoreConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            entries: FxHashMap::default(),
            config: Rc::new(config),
        })
    }

    /// The reactive store for `record`, creating its registry on first use.
    ///
    /// Dead entries are pruned only when the lookup misses.
    pub fn wrap(&mut self, record: &Record<V>) -> ReactiveStore<V> {
        let key = record.identity();
        let registry = match self.lookup(record) {
            Some(registry) => {
                debug!(record = key, "reusing binding");
                registry
            }
            None => {
                self.prune();
                let registry = Registry::new();
                self.entries.insert(
                    key,
                    Binding {
                        record: record.downgrade(),
                        registry: registry.clone(),
                    },
                );
                debug!(record = key, bindings = self.entries.len(), "new binding");
                registry
            }
        };
        ReactiveStore::from_parts(record.clone(), registry, Rc::clone(&self.config))
    }

    /// The store for `record` if it has been wrapped, without creating one.
    #[must_use]
    pub fn get(&self, record: &Record<V>) -> Option<ReactiveStore<V>> {
        self.lookup(record).map(|registry| {
            ReactiveStore::from_parts(record.clone(), registry, Rc::clone(&self.config))
        })
    }

    /// Whether `record` has been wrapped.
    #[must_use]
    pub fn is_wrapped(&self, record: &Record<V>) -> bool {
        self.lookup(record).is_some()
    }

    /// Drop entries whose record no longer exists. Returns how many went.
    pub fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, binding| binding.record.is_alive());
        let pruned = before - self.entries.len();
        if pruned > 0 {
            debug!(pruned, remaining = self.entries.len(), "pruned bindings");
        }
        pruned
    }

    /// Number of entries, including not yet pruned dead ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configuration handed to every store.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn lookup(&self, record: &Record<V>) -> Option<Registry<V>> {
        let binding = self.entries.get(&record.identity())?;
        // A dead entry can share the address of a newer allocation.
        let live = binding.record.upgrade()?;
        Record::ptr_eq(&live, record).then(|| binding.registry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Callback;
    use std::cell::Cell;
    use tracing_test::traced_test;

    #[test]
    fn wrap_twice_is_idempotent() {
        let record: Record<i32> = [("a", 1)].into_iter().collect();
        let mut bindings = Bindings::new();
        let first = bindings.wrap(&record);
        let second = bindings.wrap(&record);

        assert!(ReactiveStore::ptr_eq(&first, &second));
        assert!(Registry::ptr_eq(first.registry(), second.registry()));
        assert!(Record::ptr_eq(first.record(), &record));
        assert_eq!(bindings.len(), 1);
    }

    #[test]
    fn wrap_through_store_record_is_idempotent() {
        let record: Record<i32> = Record::new();
        let mut bindings = Bindings::new();
        let store = bindings.wrap(&record);
        let again = bindings.wrap(store.record());
        assert!(ReactiveStore::ptr_eq(&store, &again));
    }

    #[test]
    fn subscriptions_survive_rewrap() {
        let record: Record<i32> = [("a", 1)].into_iter().collect();
        let mut bindings = Bindings::new();
        let count = Rc::new(Cell::new(0u32));
        let count_clone = Rc::clone(&count);
        bindings
            .wrap(&record)
            .on("a", Callback::new(move |_: &i32, _| count_clone.set(count_clone.get() + 1)));

        bindings.wrap(&record).set("a", 2);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn distinct_records_get_distinct_registries() {
        let a: Record<i32> = Record::new();
        let b: Record<i32> = Record::new();
        let mut bindings = Bindings::new();
        let sa = bindings.wrap(&a);
        let sb = bindings.wrap(&b);
        assert!(!Registry::ptr_eq(sa.registry(), sb.registry()));
        assert_eq!(bindings.len(), 2);
    }

    #[test]
    fn get_does_not_create() {
        let record: Record<i32> = Record::new();
        let mut bindings = Bindings::new();
        assert!(bindings.get(&record).is_none());
        assert!(!bindings.is_wrapped(&record));

        let store = bindings.wrap(&record);
        let found = bindings.get(&record).unwrap();
        assert!(ReactiveStore::ptr_eq(&store, &found));
        assert!(bindings.is_wrapped(&record));
    }

    #[test]
    fn dropped_records_are_pruned() {
        let mut bindings: Bindings<i32> = Bindings::new();
        {
            let record = Record::new();
            let store = bindings.wrap(&record);
            store.set("x", 1);
        }
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings.prune(), 1);
        assert!(bindings.is_empty());
    }

    #[test]
    fn write_back_does_not_keep_record_alive() {
        let mut bindings: Bindings<i32> = Bindings::new();
        let record = Record::new();
        let weak = record.downgrade();
        bindings.wrap(&record).set("x", 1);
        drop(record);
        assert!(!weak.is_alive());

        let other = Record::new();
        bindings.wrap(&other);
        assert_eq!(bindings.len(), 1);
    }

    #[test]
    fn only_missed_lookups_prune() {
        let mut bindings: Bindings<i32> = Bindings::new();
        let live = Record::new();
        bindings.wrap(&live);
        bindings.wrap(&Record::new());
        assert_eq!(bindings.len(), 2);

        // Hit: the dead entry stays.
        bindings.wrap(&live);
        assert_eq!(bindings.len(), 2);

        // Miss: the dead entry goes before the new one is added.
        let fresh = Record::new();
        bindings.wrap(&fresh);
        assert_eq!(bindings.len(), 2);
        assert!(bindings.is_wrapped(&live));
        assert!(bindings.is_wrapped(&fresh));
    }

    #[test]
    fn invalid_config_rejected() {
        let config = StoreConfig::default().with_subscribe_accessor("off");
        let err = Bindings::<i32>::with_config(config).unwrap_err();
        assert_eq!(err, ConfigError::AccessorCollision("off".to_string()));
    }

    #[traced_test]
    #[test]
    fn binding_lifecycle_is_logged() {
        let record: Record<i32> = Record::new();
        let mut bindings = Bindings::new();
        bindings.wrap(&record);
        bindings.wrap(&record);
        assert!(logs_contain("new binding"));
        assert!(logs_contain("reusing binding"));
    }
}
