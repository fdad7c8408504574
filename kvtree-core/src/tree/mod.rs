//! Observer Tree
//!
//! This module implements recursive observation of dotted key paths.
//!
//! # How It Works
//!
//! 1. The caller's key paths are grouped into a [`PathIndex`] for the root
//!    level.
//!
//! 2. Starting the root node subscribes to every first-level key of the
//!    root object, always requesting the initial value.
//!
//! 3. Each delivery for a key reports to the caller (unless it is the
//!    initial delivery and the caller did not ask for it), stops the child
//!    nodes previously built for that key, and, if paths continue past the
//!    key, builds one child node per element of the key's new value.
//!
//! 4. Child nodes repeat the process one level down. Their callbacks are
//!    re-routed so the caller always hears about the root object, never the
//!    element that changed.
//!
//! ```text
//! paths: {"title", "items.name"}
//!
//! root (document)
//! ├── title                 leaf
//! └── items                 node
//!     ├── child (item 0)
//!     │   └── name          leaf
//!     └── child (item 1)
//!         └── name          leaf
//! ```
//!
//! # Lifetimes
//!
//! Nodes hold only weak references to the objects they observe. Objects
//! should outlive the [`TreeObserver::stop_observing`] call that covers them;
//! an object released earlier simply stops producing notifications, and its
//! subscriptions are still cancelled by id.
//!
//! # Reentrancy
//!
//! Dispatch is synchronous and may be re-entered: caller callbacks and child
//! construction can trigger further notifications, or stop the tree. Nodes
//! never hold a borrow of their own state across a callback, subscription,
//! or child start, and every node carries an epoch so work started before a
//! stop is abandoned instead of resurrecting the subtree.
//!
//! [`PathIndex`]: crate::path::PathIndex

mod node;
mod observer;

pub use observer::TreeObserver;
