#![forbid(unsafe_code)]

//! Reactive properties over plain data records.
//!
//! This crate lets callers observe reads and writes on a named-field data
//! object and declare new properties reactively by subscribing to them:
//!
//! - [`Registry`]: per-property subscriber lists plus the last value seen by
//!   [`Registry::change`]; the publish/subscribe core.
//! - [`Record`]: the plain data object, a shared map of named fields.
//! - [`ReactiveStore`]: routes `get`/`set` on a record through its registry
//!   and exposes `on`/`off`.
//! - [`Bindings`]: the wrap operation; one registry per record, looked up by
//!   record identity.
//! - [`StoreConfig`]: reserved accessor names, from code, env, or JSON.
//!
//! # Architecture
//!
//! Everything is single-threaded: shared state uses `Rc<RefCell<..>>`, and
//! notification is synchronous and nested. No borrow is held while a
//! subscriber runs, so subscribers may freely call back into the registry or
//! store.
//!
//! # Usage
//!
//! ```ignore
//! use propwatch::{Bindings, Record};
//!
//! let record: Record<i64> = [("count", 0)].into_iter().collect();
//! let mut bindings = Bindings::new();
//! let store = bindings.wrap(&record);
//!
//! store.subscribe("count", |now, before| println!("{before:?} -> {now}"));
//! store.set("count", 1);
//! assert_eq!(record.get("count"), Some(1));
//! ```
//!
//! # Invariants
//!
//! 1. Subscribers are notified in registration order.
//! 2. `change` on a never-subscribed property stores nothing and returns
//!    `false`.
//! 3. `off` removes at most one registration per call.
//! 4. Wrapping the same record twice yields the same registry.
//! 5. Once a name is observed through a store, it stays observed.

pub mod bindings;
pub mod config;
pub mod record;
pub mod registry;
pub mod store;

pub use bindings::Bindings;
pub use config::{ConfigError, StoreConfig};
pub use record::Record;
pub use registry::{Callback, Registry};
pub use store::{Access, PropertyState, ReactiveStore, Subscribe, Unsubscribe, WriteRoute};
