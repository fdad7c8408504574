//! Observation Configuration
//!
//! Options controlling how a tree observer reports changes, and a
//! serializable bundle of paths plus options that can be loaded from JSON.
//!
//! ```rust,ignore
//! let config = ObservationConfig::from_json(r#"{
//!     "paths": ["title", "items.name"],
//!     "options": { "initial": true }
//! }"#)?;
//! let observer = TreeObserver::<Entity>::from_config(&config);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::path::KeyPathSet;

/// Options passed when starting an observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserveOptions {
    /// Also invoke the callbacks once immediately with the current values.
    pub initial: bool,
}

impl ObserveOptions {
    /// Options requesting an immediate callback for every matching key.
    pub fn initial() -> Self {
        Self { initial: true }
    }
}

/// A set of key paths to observe together with the options to use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationConfig {
    /// Dotted key paths, relative to the root object.
    pub paths: KeyPathSet,

    #[serde(default)]
    pub options: ObserveOptions,
}

impl ObservationConfig {
    /// Parse a config from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
