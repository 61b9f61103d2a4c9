#![forbid(unsafe_code)]

//! Per-property subscription registry.
//!
//! # Design
//!
//! [`Registry<V>`] keeps, for every property name that has ever been
//! subscribed to, an ordered list of [`Callback`]s plus the last value passed
//! through [`Registry::change`]. State lives in shared, reference-counted
//! storage (`Rc<RefCell<..>>`); cloning a `Registry` yields another handle to
//! the same subscriptions.
//!
//! Subscribers are invoked with `(new, previous)` where `previous` is the
//! value stored by the prior `change` for that property (`None` if there was
//! none).
//!
//! # Performance
//!
//! | Operation     | Complexity                               |
//! |---------------|------------------------------------------|
//! | `has()`       | O(1)                                     |
//! | `on()`        | O(1) amortized                           |
//! | `change()`    | O(S) where S = subscribers of the property |
//! | `off()`       | O(P + S) worst case, P = properties      |
//!
//! # Re-entrancy
//!
//! `change()` snapshots the subscriber list before invoking anything and
//! holds no borrow while subscribers run. Subscribers may therefore call
//! `on`, `off`, `once` or `change` on the same registry. A subscriber added
//! during a pass is first invoked by the next `change`; a subscriber removed
//! during a pass still receives the current one if it was in the snapshot.

use std::cell::{Cell, OnceCell, RefCell};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use rustc_hash::{FxBuildHasher, FxHashMap};
use smallvec::SmallVec;
use tracing::trace;

type Subscriber<V> = dyn Fn(&V, Option<&V>);

/// A subscriber callback with reference identity.
///
/// Cloning a `Callback` yields another handle to the same subscriber; two
/// handles are the same subscriber iff [`Callback::ptr_eq`] holds. Keep a
/// clone around to [`off`](Registry::off) it later.
pub struct Callback<V> {
    inner: Rc<Subscriber<V>>,
}

impl<V> Clone for Callback<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V> std::fmt::Debug for Callback<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Callback")
            .field(&Rc::as_ptr(&self.inner).cast::<()>())
            .finish()
    }
}

impl<V: 'static> Callback<V> {
    /// Wrap a closure receiving `(new, previous)`.
    pub fn new(f: impl Fn(&V, Option<&V>) + 'static) -> Self {
        Self { inner: Rc::new(f) }
    }

    /// Invoke the subscriber.
    pub fn call(&self, value: &V, previous: Option<&V>) {
        (self.inner)(value, previous);
    }

    /// Whether both handles refer to the same subscriber.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    fn downgrade(&self) -> WeakCallback<V> {
        WeakCallback {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

struct WeakCallback<V> {
    inner: Weak<Subscriber<V>>,
}

impl<V> WeakCallback<V> {
    fn upgrade(&self) -> Option<Callback<V>> {
        self.inner.upgrade().map(|inner| Callback { inner })
    }
}

/// Shared interior for [`Registry<V>`].
struct RegistryInner<V> {
    /// Subscribers per property, in property-registration order. A key stays
    /// once created, even when its list becomes empty.
    callbacks: IndexMap<String, Vec<Callback<V>>, FxBuildHasher>,
    /// Last value passed through `change`, per property.
    values: FxHashMap<String, V>,
}

/// Subscriber lists and last-seen values, keyed by property name.
///
/// # Invariants
///
/// 1. A property is a key of the subscriber table iff it has ever had a
///    subscriber added.
/// 2. Subscribers are notified in registration order.
/// 3. `change` on a never-subscribed property stores nothing.
pub struct Registry<V> {
    inner: Rc<RefCell<RegistryInner<V>>>,
}

// Manual Clone: shares the same Rc.
impl<V> Clone for Registry<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<V> Default for Registry<V> {
    fn default() -> Self {
        Self {
            inner: Rc::new(RefCell::new(RegistryInner {
                callbacks: IndexMap::default(),
                values: FxHashMap::default(),
            })),
        }
    }
}

impl<V: std::fmt::Debug> std::fmt::Debug for Registry<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        let subscribers: Vec<(&str, usize)> = inner
            .callbacks
            .iter()
            .map(|(property, list)| (property.as_str(), list.len()))
            .collect();
        f.debug_struct("Registry")
            .field("subscribers", &subscribers)
            .field("values", &inner.values)
            .finish()
    }
}

impl<V: Clone + 'static> Registry<V> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `property` currently has at least one subscriber.
    #[must_use]
    pub fn has(&self, property: &str) -> bool {
        self.inner
            .borrow()
            .callbacks
            .get(property)
            .is_some_and(|list| !list.is_empty())
    }

    /// Append `callback` to the subscribers of `property`.
    ///
    /// The same callback may be registered repeatedly; it is then invoked
    /// once per registration.
    pub fn on(&self, property: &str, callback: Callback<V>) -> &Self {
        let count = {
            let mut inner = self.inner.borrow_mut();
            match inner.callbacks.get_mut(property) {
                Some(list) => {
                    list.push(callback);
                    list.len()
                }
                None => {
                    inner.callbacks.insert(property.to_string(), vec![callback]);
                    1
                }
            }
        };
        trace!(property, subscribers = count, "subscribed");
        self
    }

    /// Register a closure for `property` and return its handle.
    pub fn subscribe(
        &self,
        property: &str,
        f: impl Fn(&V, Option<&V>) + 'static,
    ) -> Callback<V> {
        let callback = Callback::new(f);
        self.on(property, callback.clone());
        callback
    }

    /// Store `value` for `property` and notify its subscribers with
    /// `(value, previous)`.
    ///
    /// Returns `false` without storing anything if `property` was never
    /// subscribed to. A property whose subscribers were all removed still
    /// records the value and returns `true`.
    pub fn change(&self, property: &str, value: V) -> bool {
        let (snapshot, previous) = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            let Some(list) = inner.callbacks.get(property) else {
                trace!(property, "change ignored: never subscribed");
                return false;
            };
            let snapshot: SmallVec<[Callback<V>; 4]> = list.iter().cloned().collect();
            let previous = inner.values.insert(property.to_string(), value.clone());
            (snapshot, previous)
        };

        trace!(property, subscribers = snapshot.len(), "change");
        for callback in &snapshot {
            callback.call(&value, previous.as_ref());
        }
        true
    }

    /// Remove the first registration of `callback`.
    ///
    /// Properties are scanned in the order they first received a subscriber;
    /// within a property, the earliest registration goes first. Only one
    /// registration is removed per call.
    pub fn off(&self, callback: &Callback<V>) -> bool {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            inner.callbacks.iter_mut().find_map(|(property, list)| {
                let index = list.iter().position(|c| Callback::ptr_eq(c, callback))?;
                Some((property.clone(), list.remove(index)))
            })
        };
        // The removed handle drops here, outside the borrow.
        match removed {
            Some((property, _callback)) => {
                trace!(property = property.as_str(), "unsubscribed");
                true
            }
            None => false,
        }
    }

    /// Subscribe `callback` to the next change of `property` only.
    ///
    /// The callback receives `(value, stored)` where `stored` is the value
    /// held for `property` when it runs; since `change` records the new value
    /// before notifying, that is the new value itself. The internal
    /// subscriber removes itself afterwards and never fires twice, even if
    /// `callback` triggers another `change` of the same property.
    pub fn once(&self, property: &str, callback: Callback<V>) {
        let registry = Rc::downgrade(&self.inner);
        let this: Rc<OnceCell<WeakCallback<V>>> = Rc::new(OnceCell::new());
        let this_inner = Rc::clone(&this);
        let fired = Cell::new(false);
        let name = property.to_string();

        let wrapper = Callback::new(move |value: &V, _previous: Option<&V>| {
            if fired.replace(true) {
                return;
            }
            let Some(inner) = registry.upgrade() else {
                return;
            };
            let registry = Registry { inner };
            let stored = registry.value(&name);
            callback.call(value, stored.as_ref());
            if let Some(me) = this_inner.get().and_then(WeakCallback::upgrade) {
                registry.off(&me);
            }
        });
        // Fresh cell: always initialized here.
        this.get_or_init(|| wrapper.downgrade());
        trace!(property, "once");
        self.on(property, wrapper);
    }

    /// Clone of the value last passed through `change` for `property`.
    #[must_use]
    pub fn value(&self, property: &str) -> Option<V> {
        self.inner.borrow().values.get(property).cloned()
    }

    /// Number of registrations for `property`.
    #[must_use]
    pub fn subscriber_count(&self, property: &str) -> usize {
        self.inner
            .borrow()
            .callbacks
            .get(property)
            .map_or(0, Vec::len)
    }

    /// Properties that ever had a subscriber, in registration order.
    #[must_use]
    pub fn properties(&self) -> Vec<String> {
        self.inner.borrow().callbacks.keys().cloned().collect()
    }
}

impl<V> Registry<V> {
    /// Whether both handles refer to the same registry.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
