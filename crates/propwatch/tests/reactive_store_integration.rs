//! End-to-end scenarios for wrapping records and observing their properties.

use std::cell::RefCell;
use std::rc::Rc;

use propwatch::{Access, Bindings, Callback, PropertyState, Record, StoreConfig, WriteRoute};

type Seen = Rc<RefCell<Vec<(i64, Option<i64>)>>>;

fn recorder(seen: &Seen) -> Callback<i64> {
    let seen = Rc::clone(seen);
    Callback::new(move |now: &i64, before: Option<&i64>| {
        seen.borrow_mut().push((*now, before.copied()));
    })
}

#[test]
fn counter_reflects_writes_into_record() {
    let record: Record<i64> = [("count", 0)].into_iter().collect();
    let mut bindings = Bindings::new();
    let store = bindings.wrap(&record);
    let seen = Seen::default();

    store.on("count", recorder(&seen));
    store.set("count", 1);
    assert_eq!(record.get("count"), Some(1));
    store.set("count", 2);
    assert_eq!(record.get("count"), Some(2));

    assert_eq!(*seen.borrow(), vec![(1, Some(0)), (2, Some(1))]);
}

#[test]
fn dynamic_property_is_created_and_observed() {
    let record: Record<i64> = Record::new();
    let mut bindings = Bindings::new();
    let store = bindings.wrap(&record);

    assert_eq!(store.set("x", 5), WriteRoute::Armed);
    assert_eq!(record.get("x"), Some(5));
    assert!(store.registry().has("x"));

    let seen = Seen::default();
    store.on("x", recorder(&seen));
    store.set("x", 6);
    assert_eq!(*seen.borrow(), vec![(6, Some(5))]);
}

#[test]
fn rewrapping_sees_earlier_subscriptions() {
    let record: Record<i64> = [("level", 1)].into_iter().collect();
    let mut bindings = Bindings::new();
    let seen = Seen::default();
    bindings.wrap(&record).on("level", recorder(&seen));

    let again = bindings.wrap(&record.clone());
    assert_eq!(again.state("level"), PropertyState::Observed);
    again.set("level", 2);
    assert_eq!(*seen.borrow(), vec![(2, Some(1))]);
}

#[test]
fn registry_once_through_store() {
    let record: Record<i64> = Record::new();
    let mut bindings = Bindings::new();
    let store = bindings.wrap(&record);
    let seen = Seen::default();

    store.set("ticks", 0);
    store.registry().once("ticks", recorder(&seen));
    store.set("ticks", 1);
    store.set("ticks", 2);

    assert_eq!(*seen.borrow(), vec![(1, Some(1))]);
    assert_eq!(record.get("ticks"), Some(2));
}

#[test]
fn accessor_names_from_environment() {
    let config = StoreConfig::from_env_with(|key| match key {
        "PROPWATCH_SUBSCRIBE_ACCESSOR" => Some("watch".to_string()),
        _ => None,
    });
    let mut bindings: Bindings<i64> = Bindings::with_config(config).unwrap();
    let store = bindings.wrap(&Record::new());

    assert!(matches!(store.access("watch"), Access::Subscribe(_)));
    assert!(matches!(store.access("off"), Access::Unsubscribe(_)));
    assert!(store.access("on").is_absent());
}

#[test]
fn subscriber_cascade_across_properties() {
    let record: Record<i64> = [("width", 2), ("height", 3)].into_iter().collect();
    let mut bindings = Bindings::new();
    let store = bindings.wrap(&record);

    for side in ["width", "height"] {
        let inner = store.clone();
        store.subscribe(side, move |_, _| {
            let area = inner.get("width").unwrap_or(0) * inner.get("height").unwrap_or(0);
            inner.set("area", area);
        });
    }
    // Subscribing only records the current sides; nobody computed an area yet.
    assert_eq!(record.get("area"), None);

    store.set("width", 10);
    assert_eq!(record.get("area"), Some(30));
    assert_eq!(store.state("area"), PropertyState::Observed);
    store.set("height", 4);
    assert_eq!(record.get("area"), Some(40));
}

#[cfg(feature = "serde")]
#[test]
fn accessor_names_from_json() {
    let config = StoreConfig::from_json(r#"{"unsubscribe_accessor": "unwatch"}"#).unwrap();
    let mut bindings: Bindings<i64> = Bindings::with_config(config).unwrap();
    let store = bindings.wrap(&Record::new());
    assert!(matches!(store.access("unwatch"), Access::Unsubscribe(_)));
}
