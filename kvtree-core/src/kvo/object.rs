//! The observable object capability and the values objects hold.

use std::fmt;
use std::rc::{Rc, Weak};

/// Shared, type-erased reference to an observable object.
pub type ObjectRef = Rc<dyn KeyValueObject>;

/// Non-owning counterpart of [`ObjectRef`].
pub type WeakObjectRef = Weak<dyn KeyValueObject>;

/// Callback invoked when an observed key changes.
///
/// The change is `None` for the immediate delivery requested with
/// `include_initial`.
pub type ChangeHandler = Rc<dyn Fn(Option<&Change>)>;

/// Identifies one handler registered directly on an object.
///
/// Tokens are only meaningful to the object that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObservationToken(u64);

impl ObservationToken {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// An object whose properties can be read and observed by name.
///
/// Implementations must invoke registered handlers synchronously every time
/// the key changes, and must tolerate handlers that add or remove observers
/// while being invoked.
pub trait KeyValueObject {
    /// Read the current value of a property. Unknown keys read as
    /// [`Value::Null`].
    fn value_for_key(&self, key: &str) -> Value;

    /// Register a handler for changes to `key`.
    fn add_observer(&self, key: &str, handler: ChangeHandler) -> ObservationToken;

    /// Remove a handler. Unknown tokens are ignored.
    fn remove_observer(&self, token: ObservationToken);

    /// Whether the object's data is materialized.
    ///
    /// Lazily loaded objects return `false` until loaded; their properties
    /// must not be read in that state.
    fn is_fully_loaded(&self) -> bool {
        true
    }
}

impl fmt::Debug for dyn KeyValueObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyValueObject({:p})", self)
    }
}

/// Whether two references point at the same object.
///
/// Compares addresses only, so it works across differently typed handles to
/// one allocation.
pub fn same_object<A: ?Sized, B: ?Sized>(a: &Rc<A>, b: &Rc<B>) -> bool {
    Rc::as_ptr(a) as *const () == Rc::as_ptr(b) as *const ()
}

/// The value of a property.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// No value.
    #[default]
    Null,

    /// Plain data with no observable properties.
    Data(serde_json::Value),

    /// A single observable object.
    Object(ObjectRef),

    /// An ordinary sequence. Members that are not objects are never
    /// observed.
    List(Vec<Value>),

    /// Objects in a significant order, without duplicates.
    OrderedSet(Vec<ObjectRef>),

    /// Objects without a significant order, without duplicates.
    Set(Vec<ObjectRef>),
}

impl Value {
    /// Wrap a concrete object.
    pub fn object<T: KeyValueObject + 'static>(object: &Rc<T>) -> Self {
        Value::Object(object.clone())
    }

    /// Build a list from anything convertible to values.
    pub fn list<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// Build an ordered set, dropping repeated objects.
    pub fn ordered_set<I>(objects: I) -> Self
    where
        I: IntoIterator<Item = ObjectRef>,
    {
        Value::OrderedSet(dedup(objects))
    }

    /// Build an unordered set, dropping repeated objects.
    pub fn set<I>(objects: I) -> Self
    where
        I: IntoIterator<Item = ObjectRef>,
    {
        Value::Set(dedup(objects))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_data(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Data(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }
}

fn dedup<I>(objects: I) -> Vec<ObjectRef>
where
    I: IntoIterator<Item = ObjectRef>,
{
    let mut unique: Vec<ObjectRef> = Vec::new();
    for object in objects {
        if !unique.iter().any(|seen| same_object(seen, &object)) {
            unique.push(object);
        }
    }
    unique
}

/// Objects compare by identity, data by value.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        fn same_members(a: &[ObjectRef], b: &[ObjectRef]) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| same_object(x, y))
        }

        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Data(a), Value::Data(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => same_object(a, b),
            (Value::List(a), Value::List(b)) => a == b,
            (Value::OrderedSet(a), Value::OrderedSet(b)) => same_members(a, b),
            (Value::Set(a), Value::Set(b)) => {
                a.len() == b.len() && a.iter().all(|x| b.iter().any(|y| same_object(x, y)))
            }
            _ => false,
        }
    }
}

impl<T: KeyValueObject + 'static> From<Rc<T>> for Value {
    fn from(object: Rc<T>) -> Self {
        Value::Object(object)
    }
}

impl From<serde_json::Value> for Value {
    fn from(data: serde_json::Value) -> Self {
        match data {
            serde_json::Value::Null => Value::Null,
            data => Value::Data(data),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Data(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Data(s.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Data(n.into())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Data(b.into())
    }
}

/// A change to one key, as delivered to handlers.
#[derive(Debug, Clone)]
pub struct Change {
    pub key: String,
    pub old: Value,
    pub new: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvo::Entity;

    #[test]
    fn sets_drop_repeated_objects() {
        let a: ObjectRef = Entity::new();
        let b: ObjectRef = Entity::new();

        let value = Value::ordered_set([a.clone(), b.clone(), a.clone()]);
        match value {
            Value::OrderedSet(members) => {
                assert_eq!(members.len(), 2);
                assert!(same_object(&members[0], &a));
                assert!(same_object(&members[1], &b));
            }
            other => panic!("unexpected value {:?}", other),
        }

        let value = Value::set([b.clone(), b.clone()]);
        assert!(matches!(value, Value::Set(ref members) if members.len() == 1));
    }

    #[test]
    fn objects_compare_by_identity() {
        let a = Entity::new();
        let b = Entity::new();

        assert_eq!(Value::object(&a), Value::object(&a));
        assert_ne!(Value::object(&a), Value::object(&b));
        assert_eq!(Value::from("x"), Value::from("x"));
        assert_ne!(Value::from(1_i64), Value::Null);
    }

    #[test]
    fn unordered_sets_ignore_order() {
        let a: ObjectRef = Entity::new();
        let b: ObjectRef = Entity::new();

        assert_eq!(
            Value::set([a.clone(), b.clone()]),
            Value::set([b.clone(), a.clone()])
        );
        assert_ne!(
            Value::ordered_set([a.clone(), b.clone()]),
            Value::ordered_set([b, a])
        );
    }

    #[test]
    fn json_null_becomes_null() {
        assert!(Value::from(serde_json::Value::Null).is_null());
        assert_eq!(
            Value::from(serde_json::json!({"k": 1})).as_data(),
            Some(&serde_json::json!({"k": 1}))
        );
    }

    #[test]
    fn same_object_across_handle_types() {
        let entity = Entity::new();
        let erased: ObjectRef = entity.clone();
        assert!(same_object(&entity, &erased));
    }
}
