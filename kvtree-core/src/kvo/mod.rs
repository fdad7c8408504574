//! Key-Value Observation
//!
//! This module implements the single-key observation layer the observer
//! tree is built on: the object capability, the values objects hold, and
//! the registry that tracks individual key subscriptions.
//!
//! # Concepts
//!
//! ## Objects
//!
//! Anything implementing [`KeyValueObject`] can be observed. An object
//! exposes its properties by name, lets observers register a handler for one
//! key, and reports whether its data is loaded. Objects are handled through
//! the type-erased [`ObjectRef`] so a tree can descend into heterogeneous
//! graphs.
//!
//! ## Registry
//!
//! An [`ObservationRegistry`] subscribes a handler to one key of one object
//! and hands back an [`ObservationId`]. Cancelling is done purely by id: the
//! registry holds weak references only and never needs the observed object
//! to still be alive.
//!
//! ## Shapes
//!
//! When the tree descends into a property, the value is resolved into a
//! [`Shape`] that lists the objects to observe next.
//!
//! # Delivery Model
//!
//! Delivery is synchronous and direct. A handler runs inline on the call
//! stack that changed the property, with no queueing or coalescing. Handlers
//! may change other properties, subscribe, or cancel while they run.
//!
//! Everything here is single-threaded (`Rc`/`RefCell`).

mod object;
mod registry;
mod shape;
mod entity;

pub use object::{
    same_object, Change, ChangeHandler, KeyValueObject, ObjectRef, ObservationToken, Value,
    WeakObjectRef,
};
pub use registry::{KeyValueObserver, ObservationId, ObservationRegistry};
pub use shape::Shape;
pub use entity::Entity;
