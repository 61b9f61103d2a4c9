#![forbid(unsafe_code)]

//! Reactive view over a [`Record`].
//!
//! A [`ReactiveStore<V>`] pairs one record with its [`Registry`] and routes
//! reads and writes between them. Stores are obtained from
//! [`Bindings::wrap`](crate::Bindings::wrap), which guarantees one registry
//! per record.
//!
//! # Write routing
//!
//! | Condition on name `P`            | Route                  | Effect |
//! |----------------------------------|------------------------|--------|
//! | `P` has subscribers              | [`WriteRoute::Notified`] | `change(P, v)`; the field is only updated by the write-back subscriber, if any |
//! | `P` is a field, no subscribers   | [`WriteRoute::Plain`]    | field written, nobody notified |
//! | otherwise                        | [`WriteRoute::Armed`]    | write-back subscriber registered, then `change(P, v)` creates the field |
//!
//! # Property lifecycle
//!
//! ```text
//! Unknown ──plain write──▶ PlainField ──on()──▶ Observed
//!    └──────── on() / first write through the store ────────▶ Observed
//! ```
//!
//! Observation is permanent: the write-back subscriber installed on entry to
//! `Observed` is never removed, so `has(P)` stays true.

use std::rc::Rc;

use tracing::debug;

use crate::config::StoreConfig;
use crate::record::Record;
use crate::registry::{Callback, Registry};

/// Lifecycle state of one property name on one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyState {
    /// Neither a field nor subscribed to.
    Unknown,
    /// A field with no subscribers; writes go straight to the record.
    PlainField,
    /// Has subscribers; writes are routed through the registry.
    Observed,
}

/// Path a [`ReactiveStore::set`] call took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteRoute {
    /// The name had subscribers; the registry was notified.
    Notified,
    /// Plain field write without notification.
    Plain,
    /// New name: write-back subscriber installed and notified.
    Armed,
}

/// Result of a full three-path read, see [`ReactiveStore::access`].
#[derive(Debug)]
pub enum Access<V> {
    /// The name is a field; its current value.
    Field(V),
    /// The name is the subscribe accessor.
    Subscribe(Subscribe<V>),
    /// The name is the unsubscribe accessor.
    Unsubscribe(Unsubscribe<V>),
    /// Nothing by that name.
    Absent,
}

impl<V> Access<V> {
    /// The field value, if this read hit a field.
    #[must_use]
    pub fn into_field(self) -> Option<V> {
        match self {
            Self::Field(value) => Some(value),
            _ => None,
        }
    }

    /// Whether the read found nothing.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// Subscribe handle bound to a store.
#[derive(Debug)]
pub struct Subscribe<V> {
    store: ReactiveStore<V>,
}

impl<V: Clone + 'static> Subscribe<V> {
    /// Same as [`ReactiveStore::on`].
    pub fn call(&self, name: &str, callback: Callback<V>) {
        self.store.on(name, callback);
    }
}

/// Unsubscribe handle bound to a store's registry.
#[derive(Debug)]
pub struct Unsubscribe<V> {
    registry: Registry<V>,
}

impl<V: Clone + 'static> Unsubscribe<V> {
    /// Same as [`ReactiveStore::off`].
    pub fn call(&self, callback: &Callback<V>) -> bool {
        self.registry.off(callback)
    }
}

/// The reactive view of a record.
///
/// Cloning a store yields another handle to the same record and registry.
pub struct ReactiveStore<V> {
    record: Record<V>,
    registry: Registry<V>,
    config: Rc<StoreConfig>,
}

impl<V> Clone for ReactiveStore<V> {
    fn clone(&self) -> Self {
        Self {
            record: self.record.clone(),
            registry: self.registry.clone(),
            config: Rc::clone(&self.config),
        }
    }
}

impl<V: std::fmt::Debug> std::fmt::Debug for ReactiveStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactiveStore")
            .field("record", &self.record)
            .field("registry", &self.registry)
            .finish()
    }
}

impl<V: Clone + 'static> ReactiveStore<V> {
    pub(crate) fn from_parts(
        record: Record<V>,
        registry: Registry<V>,
        config: Rc<StoreConfig>,
    ) -> Self {
        Self {
            record,
            registry,
            config,
        }
    }

    /// Current value of field `name`. Plain read, nobody is notified.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<V> {
        self.record.get(name)
    }

    /// Resolve `name` the way a property read on the wrapped object does:
    /// field first, then the reserved accessors, then nothing.
    ///
    /// A field named like an accessor shadows it.
    #[must_use]
    pub fn access(&self, name: &str) -> Access<V> {
        if let Some(value) = self.record.get(name) {
            return Access::Field(value);
        }
        if name == self.config.subscribe_accessor {
            Access::Subscribe(Subscribe {
                store: self.clone(),
            })
        } else if name == self.config.unsubscribe_accessor {
            Access::Unsubscribe(Unsubscribe {
                registry: self.registry.clone(),
            })
        } else {
            Access::Absent
        }
    }

    /// Write `value` to `name`. Always succeeds; see the module docs for the
    /// routing rules.
    pub fn set(&self, name: &str, value: V) -> WriteRoute {
        let route = if self.registry.has(name) {
            self.registry.change(name, value);
            WriteRoute::Notified
        } else if self.record.contains(name) {
            self.record.set(name, value);
            WriteRoute::Plain
        } else {
            self.registry.on(name, self.write_back(name));
            self.registry.change(name, value);
            WriteRoute::Armed
        };
        debug!(property = name, ?route, "write");
        route
    }

    /// Subscribe `callback` to `name`.
    ///
    /// If `name` is a field, a synthetic change carrying its current value is
    /// emitted first: existing subscribers hear it, and the registry stores
    /// the value so `callback` later receives it as `previous`.
    pub fn on(&self, name: &str, callback: Callback<V>) -> &Self {
        if !self.registry.has(name) {
            debug!(property = name, "observing");
            self.registry.on(name, self.write_back(name));
        }
        if let Some(current) = self.record.get(name) {
            self.registry.change(name, current);
        }
        self.registry.on(name, callback);
        self
    }

    /// Subscribe a closure to `name` and return its handle.
    pub fn subscribe(&self, name: &str, f: impl Fn(&V, Option<&V>) + 'static) -> Callback<V> {
        let callback = Callback::new(f);
        self.on(name, callback.clone());
        callback
    }

    /// Remove the first registration of `callback`.
    pub fn off(&self, callback: &Callback<V>) -> bool {
        self.registry.off(callback)
    }

    /// Where `name` is in its lifecycle.
    #[must_use]
    pub fn state(&self, name: &str) -> PropertyState {
        if self.registry.has(name) {
            PropertyState::Observed
        } else if self.record.contains(name) {
            PropertyState::PlainField
        } else {
            PropertyState::Unknown
        }
    }

    /// Subscriber that copies notified values into the record field.
    fn write_back(&self, name: &str) -> Callback<V> {
        let record = self.record.downgrade();
        let field = name.to_string();
        Callback::new(move |value: &V, _previous: Option<&V>| {
            if let Some(record) = record.upgrade() {
                record.set(field.as_str(), value.clone());
            }
        })
    }
}

impl<V> ReactiveStore<V> {
    /// The wrapped record (same identity as the one passed to `wrap`).
    #[must_use]
    pub fn record(&self) -> &Record<V> {
        &self.record
    }

    /// The record's registry.
    #[must_use]
    pub fn registry(&self) -> &Registry<V> {
        &self.registry
    }

    /// Configuration this store was created with.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Whether both handles view the same record through the same registry.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Record::ptr_eq(&a.record, &b.record) && Registry::ptr_eq(&a.registry, &b.registry)
    }
}
