//! Key path segments and sets of dotted key paths.

use std::fmt;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Separator between the segments of a dotted key path.
pub const SEPARATOR: char = '.';

/// An ordered sequence of property-name segments.
///
/// The empty path means "this property itself, no further descent".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyPath(SmallVec<[String; 4]>);

impl KeyPath {
    /// The empty path.
    pub fn empty() -> Self {
        Self(SmallVec::new())
    }

    /// Split a dotted string into segments, keeping empty segments.
    pub fn parse(dotted: &str) -> Self {
        Self(dotted.split(SEPARATOR).map(str::to_owned).collect())
    }

    /// Build a path from already split segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Split off the first segment, returning it with the remainder.
    ///
    /// Returns `None` for the empty path.
    pub fn split_first(&self) -> Option<(&str, KeyPath)> {
        let (first, rest) = self.0.split_first()?;
        Some((first.as_str(), Self(rest.iter().cloned().collect())))
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", SEPARATOR)?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl From<&str> for KeyPath {
    fn from(dotted: &str) -> Self {
        Self::parse(dotted)
    }
}

/// A de-duplicated set of dotted key paths, kept in insertion order.
///
/// This is the builder callers use to assemble the paths for a
/// [`TreeObserver`](crate::tree::TreeObserver). It serializes as a plain
/// JSON array of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyPathSet(IndexSet<String>);

impl KeyPathSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path, returning `self` for chaining.
    pub fn with(mut self, path: impl Into<String>) -> Self {
        self.insert(path);
        self
    }

    /// Add a path. Returns `false` if it was already present.
    pub fn insert(&mut self, path: impl Into<String>) -> bool {
        self.0.insert(path.into())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Split every path into segments.
    pub fn key_paths(&self) -> impl Iterator<Item = KeyPath> + '_ {
        self.iter().map(KeyPath::parse)
    }
}

impl<S: Into<String>> FromIterator<S> for KeyPathSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> Extend<S> for KeyPathSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}
