//! Collection Shape Resolution
//!
//! When the tree descends into a property it needs the objects to observe
//! next. A collection fans out into its members; a single object is a
//! one-element list; anything without observable properties yields nothing.

use tracing::trace;

use super::object::{ObjectRef, Value};

/// How a property value is enumerated.
#[derive(Debug, Clone)]
pub enum Shape {
    /// Ordered collection, members in collection order.
    OrderedSequence(Vec<ObjectRef>),

    /// Membership set. The order is stable for one resolution only.
    UniqueSet(Vec<ObjectRef>),

    /// Any other sequence, object members in iteration order.
    PlainSequence(Vec<ObjectRef>),

    /// Not a collection. `None` when the value has nothing to observe.
    Scalar(Option<ObjectRef>),
}

impl Shape {
    /// Classify a value.
    pub fn resolve(value: &Value) -> Self {
        match value {
            Value::OrderedSet(members) => Shape::OrderedSequence(members.clone()),
            Value::Set(members) => Shape::UniqueSet(members.clone()),
            Value::List(items) => Shape::PlainSequence(
                items
                    .iter()
                    .filter_map(|item| match item {
                        Value::Object(object) => Some(object.clone()),
                        other => {
                            trace!(value = ?other, "skipping unobservable list member");
                            None
                        }
                    })
                    .collect(),
            ),
            Value::Object(object) => Shape::Scalar(Some(object.clone())),
            Value::Null | Value::Data(_) => Shape::Scalar(None),
        }
    }

    /// Number of elements to observe.
    pub fn len(&self) -> usize {
        match self {
            Shape::OrderedSequence(members)
            | Shape::UniqueSet(members)
            | Shape::PlainSequence(members) => members.len(),
            Shape::Scalar(object) => usize::from(object.is_some()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The elements to observe, in enumeration order.
    pub fn into_elements(self) -> Vec<ObjectRef> {
        match self {
            Shape::OrderedSequence(members)
            | Shape::UniqueSet(members)
            | Shape::PlainSequence(members) => members,
            Shape::Scalar(object) => object.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvo::{same_object, Entity};

    fn objects(n: usize) -> Vec<ObjectRef> {
        (0..n).map(|_| Entity::new() as ObjectRef).collect()
    }

    #[test]
    fn ordered_set_keeps_order() {
        let members = objects(3);
        let shape = Shape::resolve(&Value::ordered_set(members.clone()));

        assert!(matches!(shape, Shape::OrderedSequence(_)));
        let elements = shape.into_elements();
        assert_eq!(elements.len(), 3);
        for (element, member) in elements.iter().zip(&members) {
            assert!(same_object(element, member));
        }
    }

    #[test]
    fn set_resolves_to_unique_set() {
        let shape = Shape::resolve(&Value::set(objects(2)));
        assert!(matches!(shape, Shape::UniqueSet(_)));
        assert_eq!(shape.len(), 2);
    }

    #[test]
    fn list_skips_plain_data() {
        let members = objects(2);
        let value = Value::List(vec![
            Value::Object(members[0].clone()),
            Value::from("not observable"),
            Value::Null,
            Value::Object(members[1].clone()),
        ]);

        let shape = Shape::resolve(&value);
        assert!(matches!(shape, Shape::PlainSequence(_)));
        let elements = shape.into_elements();
        assert_eq!(elements.len(), 2);
        assert!(same_object(&elements[1], &members[1]));
    }

    #[test]
    fn single_object_is_one_element() {
        let entity = Entity::new();
        let shape = Shape::resolve(&Value::object(&entity));

        assert!(matches!(shape, Shape::Scalar(Some(_))));
        assert_eq!(shape.len(), 1);
        assert!(same_object(&shape.into_elements()[0], &entity));
    }

    #[test]
    fn absent_and_data_values_are_empty() {
        assert!(Shape::resolve(&Value::Null).is_empty());
        assert!(Shape::resolve(&Value::from(42_i64)).into_elements().is_empty());
        assert!(Shape::resolve(&Value::List(Vec::new())).is_empty());
    }
}
