//! kvtree Core
//!
//! This crate observes sets of dotted key paths over a graph of objects.
//! It implements:
//!
//! - Key path parsing and per-level path indexes
//! - A single-key observation layer with synchronous delivery
//! - Recursive observer trees that follow collections as they change
//! - An in-memory observable object for building graphs to observe
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `path`: Key paths and the index that groups them per level
//! - `kvo`: The object capability, values, shapes, and the observation registry
//! - `tree`: Observer nodes and the public tree observer handle
//! - `config`: Observation options and loadable configs
//!
//! Everything is single-threaded. Notifications are delivered inline, on the
//! call stack of the write that caused them.
//!
//! # Example
//!
//! ```rust,ignore
//! use kvtree_core::kvo::{Entity, Value};
//! use kvtree_core::tree::TreeObserver;
//! use kvtree_core::ObserveOptions;
//!
//! let item = Entity::with_properties([("name", "first")]);
//! let document = Entity::with_properties([("items", Value::list([item.clone()]))]);
//!
//! let observer = TreeObserver::new(["items.name"]);
//! observer.start_observing_if_needed(
//!     &document,
//!     ObserveOptions::default(),
//!     |_| println!("items replaced"),
//!     |_| println!("an item was renamed"),
//! );
//!
//! item.set("name", "renamed");
//! // Prints: "an item was renamed"
//!
//! observer.stop_observing();
//! ```

pub mod config;
pub mod error;
pub mod kvo;
pub mod path;
pub mod tree;

pub use config::{ObservationConfig, ObserveOptions};
pub use error::{Error, Result};
pub use tree::TreeObserver;
