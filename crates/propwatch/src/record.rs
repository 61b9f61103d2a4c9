#![forbid(unsafe_code)]

//! The plain data object wrapped by a [`ReactiveStore`](crate::ReactiveStore).
//!
//! A [`Record<V>`] is a shared, identity-bearing map from field name to
//! value. Cloning a `Record` creates a new handle to the **same** fields, so
//! the caller's handle and the store's handle always agree.
//!
//! Fields are created by writes and never removed.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

type Fields<V> = FxHashMap<String, V>;

/// A shared map of named fields with reference identity.
pub struct Record<V> {
    fields: Rc<RefCell<Fields<V>>>,
}

// Manual Clone: shares the same Rc.
impl<V> Clone for Record<V> {
    fn clone(&self) -> Self {
        Self {
            fields: Rc::clone(&self.fields),
        }
    }
}

impl<V> Default for Record<V> {
    fn default() -> Self {
        Self {
            fields: Rc::new(RefCell::new(Fields::default())),
        }
    }
}

impl<V: std::fmt::Debug> std::fmt::Debug for Record<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.fields.borrow().iter()).finish()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for Record<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let fields = iter.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self {
            fields: Rc::new(RefCell::new(fields)),
        }
    }
}

impl<V: Clone> Record<V> {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone of the field's current value, if the field exists.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<V> {
        self.fields.borrow().get(name).cloned()
    }

    /// Write a field directly, creating it if needed. No notification.
    pub fn set(&self, name: impl Into<String>, value: V) {
        self.fields.borrow_mut().insert(name.into(), value);
    }

    /// Whether `name` is an own field.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.borrow().contains_key(name)
    }

    /// Field names, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.fields.borrow().keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.borrow().len()
    }

    /// Whether the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.borrow().is_empty()
    }
}

impl<V> Record<V> {
    /// Whether both handles refer to the same record.
    #[must_use]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Rc::ptr_eq(&a.fields, &b.fields)
    }

    /// Address used as the identity key in [`Bindings`](crate::Bindings).
    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.fields) as *const () as usize
    }

    pub(crate) fn downgrade(&self) -> WeakRecord<V> {
        WeakRecord {
            fields: Rc::downgrade(&self.fields),
        }
    }
}

/// Non-owning handle to a [`Record`].
pub(crate) struct WeakRecord<V> {
    fields: Weak<RefCell<Fields<V>>>,
}

impl<V> Clone for WeakRecord<V> {
    fn clone(&self) -> Self {
        Self {
            fields: Weak::clone(&self.fields),
        }
    }
}

impl<V> WeakRecord<V> {
    pub(crate) fn upgrade(&self) -> Option<Record<V>> {
        self.fields.upgrade().map(|fields| Record { fields })
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.fields.strong_count() > 0
    }
}
