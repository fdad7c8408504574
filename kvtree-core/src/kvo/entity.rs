//! Entity
//!
//! An in-memory observable object: a bag of named properties that notifies
//! its observers synchronously whenever a property is written.
//!
//! Entities can be marked as not loaded to model lazily materialized data.
//! Writes still notify while unloaded; readers are expected to check
//! [`KeyValueObject::is_fully_loaded`] first.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexMap;

use super::object::{Change, ChangeHandler, KeyValueObject, ObservationToken, Value};

/// A handler registered on one key.
struct Registration {
    token: ObservationToken,
    key: String,
    handler: ChangeHandler,
}

/// An observable property bag.
///
/// # Example
///
/// ```rust,ignore
/// let item = Entity::new();
/// item.set("name", "first");
///
/// let list = Entity::with_properties([("items", Value::list([item]))]);
/// ```
pub struct Entity {
    properties: RefCell<IndexMap<String, Value>>,
    observers: RefCell<Vec<Registration>>,
    next_token: Cell<u64>,
    loaded: Cell<bool>,
}

impl Entity {
    /// Create an empty, loaded entity.
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            properties: RefCell::new(IndexMap::new()),
            observers: RefCell::new(Vec::new()),
            next_token: Cell::new(0),
            loaded: Cell::new(true),
        })
    }

    /// Create an entity with initial properties. No notifications are sent.
    pub fn with_properties<I, K, V>(properties: I) -> Rc<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let entity = Self::new();
        entity.properties.borrow_mut().extend(
            properties
                .into_iter()
                .map(|(key, value)| (key.into(), value.into())),
        );
        entity
    }

    /// Read a property. Missing properties read as [`Value::Null`].
    pub fn get(&self, key: &str) -> Value {
        self.properties.borrow().get(key).cloned().unwrap_or_default()
    }

    /// Write a property and notify its observers.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let new = value.into();
        let old = self
            .properties
            .borrow_mut()
            .insert(key.clone(), new.clone())
            .unwrap_or_default();

        self.notify(&Change { key, old, new });
    }

    /// Modify a property in place and notify its observers.
    ///
    /// A missing property starts as [`Value::Null`]. The closure must not
    /// access this entity.
    pub fn update<F>(&self, key: &str, f: F)
    where
        F: FnOnce(&mut Value),
    {
        let change = {
            let mut properties = self.properties.borrow_mut();
            let slot = properties.entry(key.to_owned()).or_default();
            let old = slot.clone();
            f(slot);
            Change {
                key: key.to_owned(),
                old,
                new: slot.clone(),
            }
        };

        self.notify(&change);
    }

    /// Remove a property and notify its observers. Returns the old value.
    pub fn remove(&self, key: &str) -> Value {
        let old = self
            .properties
            .borrow_mut()
            .shift_remove(key)
            .unwrap_or_default();

        self.notify(&Change {
            key: key.to_owned(),
            old: old.clone(),
            new: Value::Null,
        });
        old
    }

    pub fn keys(&self) -> Vec<String> {
        self.properties.borrow().keys().cloned().collect()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get()
    }

    /// Mark the entity as loaded or unloaded. Does not notify.
    pub fn set_loaded(&self, loaded: bool) {
        self.loaded.set(loaded);
    }

    /// Number of registered handlers across all keys.
    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    /// Number of registered handlers for one key.
    pub fn observer_count_for(&self, key: &str) -> usize {
        self.observers
            .borrow()
            .iter()
            .filter(|registration| registration.key == key)
            .count()
    }

    fn is_registered(&self, token: ObservationToken) -> bool {
        self.observers
            .borrow()
            .iter()
            .any(|registration| registration.token == token)
    }

    /// Deliver a change to the handlers registered for its key.
    ///
    /// Handlers run against a snapshot so they can add or remove observers.
    /// A handler removed by an earlier one in the same delivery is skipped.
    fn notify(&self, change: &Change) {
        let handlers: Vec<(ObservationToken, ChangeHandler)> = self
            .observers
            .borrow()
            .iter()
            .filter(|registration| registration.key == change.key)
            .map(|registration| (registration.token, Rc::clone(&registration.handler)))
            .collect();

        for (token, handler) in handlers {
            if self.is_registered(token) {
                handler(Some(change));
            }
        }
    }
}

impl KeyValueObject for Entity {
    fn value_for_key(&self, key: &str) -> Value {
        self.get(key)
    }

    fn add_observer(&self, key: &str, handler: ChangeHandler) -> ObservationToken {
        let token = ObservationToken::new(self.next_token.get());
        self.next_token.set(token.raw() + 1);

        self.observers.borrow_mut().push(Registration {
            token,
            key: key.to_owned(),
            handler,
        });
        token
    }

    fn remove_observer(&self, token: ObservationToken) {
        self.observers
            .borrow_mut()
            .retain(|registration| registration.token != token);
    }

    fn is_fully_loaded(&self) -> bool {
        self.loaded.get()
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("properties", &self.properties.borrow())
            .field("observer_count", &self.observer_count())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(entity: &Entity, key: &str) -> Rc<RefCell<Vec<Change>>> {
        let changes = Rc::new(RefCell::new(Vec::new()));
        let changes_clone = changes.clone();
        entity.add_observer(
            key,
            Rc::new(move |change: Option<&Change>| {
                if let Some(change) = change {
                    changes_clone.borrow_mut().push(change.clone());
                }
            }),
        );
        changes
    }

    #[test]
    fn entity_get_and_set() {
        let entity = Entity::new();
        assert!(entity.get("name").is_null());

        entity.set("name", "first");
        assert_eq!(entity.get("name"), Value::from("first"));
        assert_eq!(entity.keys(), vec!["name".to_string()]);
    }

    #[test]
    fn set_notifies_with_old_and_new() {
        let entity = Entity::with_properties([("count", 1_i64)]);
        let changes = recorder(&entity, "count");

        entity.set("count", 2_i64);
        entity.set("unrelated", 3_i64);

        let changes = changes.borrow();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].key, "count");
        assert_eq!(changes[0].old, Value::from(1_i64));
        assert_eq!(changes[0].new, Value::from(2_i64));
    }

    #[test]
    fn update_mutates_in_place() {
        let entity = Entity::new();
        let child = Entity::new();
        let changes = recorder(&entity, "items");

        entity.update("items", |items| {
            *items = Value::list([child.clone()]);
        });
        entity.update("items", |items| {
            if let Value::List(members) = items {
                members.push(Value::object(&child));
            }
        });

        let changes = changes.borrow();
        assert_eq!(changes.len(), 2);
        assert!(changes[0].old.is_null());
        assert!(matches!(&changes[1].new, Value::List(members) if members.len() == 2));
    }

    #[test]
    fn remove_notifies_and_returns_old_value() {
        let entity = Entity::with_properties([("name", "x")]);
        let changes = recorder(&entity, "name");

        assert_eq!(entity.remove("name"), Value::from("x"));
        assert!(entity.get("name").is_null());
        assert!(changes.borrow()[0].new.is_null());
    }

    #[test]
    fn handler_removed_during_delivery_is_skipped() {
        let entity = Entity::new();
        let second_calls = Rc::new(Cell::new(0));

        let second_token = Rc::new(Cell::new(None));
        let weak = Rc::downgrade(&entity);
        let token_for_first = second_token.clone();
        entity.add_observer(
            "key",
            Rc::new(move |_: Option<&Change>| {
                if let (Some(entity), Some(token)) = (weak.upgrade(), token_for_first.get()) {
                    entity.remove_observer(token);
                }
            }),
        );

        let calls = second_calls.clone();
        let token = entity.add_observer(
            "key",
            Rc::new(move |_: Option<&Change>| calls.set(calls.get() + 1)),
        );
        second_token.set(Some(token));

        entity.set("key", 1_i64);
        assert_eq!(second_calls.get(), 0);
        assert_eq!(entity.observer_count_for("key"), 1);
    }

    #[test]
    fn handler_may_write_during_delivery() {
        let entity = Entity::new();
        let weak = Rc::downgrade(&entity);
        entity.add_observer(
            "source",
            Rc::new(move |_: Option<&Change>| {
                if let Some(entity) = weak.upgrade() {
                    entity.set("mirror", entity.get("source"));
                }
            }),
        );

        entity.set("source", "value");
        assert_eq!(entity.get("mirror"), Value::from("value"));
    }

    #[test]
    fn loaded_state_toggles() {
        let entity = Entity::new();
        assert!(entity.is_fully_loaded());

        entity.set_loaded(false);
        assert!(!entity.is_fully_loaded());
        assert!(!entity.is_loaded());
    }
}
