//! Key Paths
//!
//! This module turns the flat set of dotted key paths a caller asks to
//! observe into the per-level index that drives the observer tree.
//!
//! # Overview
//!
//! A key path such as `"items.name"` is split into segments. The index for
//! one level of the tree maps each first segment to the set of remaining
//! segment sequences:
//!
//! ```text
//! {"title", "items.name", "items.owner.email", "items"}
//!
//! title -> { [] }
//! items -> { [name], [owner, email], [] }
//! ```
//!
//! An empty remainder marks the segment as a *leaf* target (the caller wants
//! to hear about the property itself). A non-empty remainder marks it as a
//! *node* target (the observer must descend into the property's value). A
//! segment can be both at once.
//!
//! Path strings are never validated. Empty segments are kept as literal
//! empty names, so `""` observes the property with the empty name and
//! `"a..b"` has an empty middle segment.

mod key_path;
mod index;

pub use key_path::{KeyPath, KeyPathSet};
pub use index::{KeyPlan, PathIndex};
