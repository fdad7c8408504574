//! Path Index
//!
//! The index for one level of the observer tree, and the per-key plan each
//! observer node derives from it.

use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use super::key_path::KeyPath;

/// Mapping from a first segment to the set of remaining segment sequences.
///
/// Every key maps to a non-empty set. An empty member marks the key as a
/// leaf target, a non-empty member marks it as a node target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathIndex {
    entries: IndexMap<String, IndexSet<KeyPath>>,
}

impl PathIndex {
    /// Build an index from dotted key path strings.
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_key_paths(paths.into_iter().map(|path| KeyPath::parse(path.as_ref())))
    }

    /// Build an index from split key paths, grouping them by first segment.
    ///
    /// Empty paths have no first segment and are ignored.
    pub fn from_key_paths<I>(paths: I) -> Self
    where
        I: IntoIterator<Item = KeyPath>,
    {
        let mut entries: IndexMap<String, IndexSet<KeyPath>> = IndexMap::new();
        for path in paths {
            if let Some((first, rest)) = path.split_first() {
                entries.entry(first.to_owned()).or_default().insert(rest);
            }
        }
        entries.retain(|_, suffixes| !suffixes.is_empty());

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The first-level keys, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The remaining segment sequences registered under `key`.
    pub fn suffixes(&self, key: &str) -> Option<&IndexSet<KeyPath>> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexSet<KeyPath>)> {
        self.entries.iter().map(|(key, suffixes)| (key.as_str(), suffixes))
    }

    /// Classify every key of this level.
    pub fn plans(&self) -> Vec<Rc<KeyPlan>> {
        self.entries
            .iter()
            .map(|(key, suffixes)| Rc::new(KeyPlan::new(key, suffixes)))
            .collect()
    }
}

/// How one key of a level is observed.
///
/// The child index is grouped once here and shared by every child node
/// created for the key's elements.
#[derive(Debug, Clone)]
pub struct KeyPlan {
    key: String,
    sub_paths: Vec<KeyPath>,
    children: Rc<PathIndex>,
    is_leaf: bool,
}

impl KeyPlan {
    fn new(key: &str, suffixes: &IndexSet<KeyPath>) -> Self {
        let sub_paths: Vec<KeyPath> = suffixes
            .iter()
            .filter(|suffix| !suffix.is_empty())
            .cloned()
            .collect();
        let is_leaf = sub_paths.len() < suffixes.len();
        let children = Rc::new(PathIndex::from_key_paths(sub_paths.iter().cloned()));

        Self {
            key: key.to_owned(),
            sub_paths,
            children,
            is_leaf,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The path itself ends at this key.
    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    /// At least one path continues past this key.
    pub fn is_node(&self) -> bool {
        !self.sub_paths.is_empty()
    }

    /// The non-empty remainders below this key.
    pub fn sub_paths(&self) -> &[KeyPath] {
        &self.sub_paths
    }

    /// Index for the nodes observing this key's elements.
    pub fn children(&self) -> &Rc<PathIndex> {
        &self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suffix_strings(index: &PathIndex, key: &str) -> Vec<String> {
        let mut suffixes: Vec<String> = index
            .suffixes(key)
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        suffixes.sort();
        suffixes
    }

    #[test]
    fn groups_by_first_segment() {
        let index = PathIndex::new(["a.b.c", "a.d", "e"]);

        assert_eq!(index.len(), 2);
        assert_eq!(suffix_strings(&index, "a"), vec!["b.c", "d"]);
        assert_eq!(suffix_strings(&index, "e"), vec![""]);
    }

    #[test]
    fn duplicate_paths_collapse() {
        let index = PathIndex::new(["a.b", "a.b", "a"]);
        assert_eq!(index.suffixes("a").unwrap().len(), 2);
    }

    #[test]
    fn empty_string_is_a_single_empty_segment() {
        let index = PathIndex::new([""]);
        assert_eq!(index.keys().collect::<Vec<_>>(), vec![""]);
        assert!(index.suffixes("").unwrap().contains(&KeyPath::empty()));
    }

    #[test]
    fn empty_input_gives_empty_index() {
        let index = PathIndex::new(Vec::<String>::new());
        assert!(index.is_empty());
        assert!(index.plans().is_empty());
    }

    #[test]
    fn plan_classifies_leaf_and_node() {
        let index = PathIndex::new(["leaf", "node.x", "both", "both.y.z"]);
        let plans = index.plans();

        let leaf = plans.iter().find(|p| p.key() == "leaf").unwrap();
        assert!(leaf.is_leaf());
        assert!(!leaf.is_node());
        assert!(leaf.children().is_empty());

        let node = plans.iter().find(|p| p.key() == "node").unwrap();
        assert!(!node.is_leaf());
        assert!(node.is_node());
        assert_eq!(node.children().keys().collect::<Vec<_>>(), vec!["x"]);

        let both = plans.iter().find(|p| p.key() == "both").unwrap();
        assert!(both.is_leaf());
        assert!(both.is_node());
        assert_eq!(both.sub_paths().len(), 1);
        assert_eq!(suffix_strings(both.children(), "y"), vec!["z"]);
    }

    #[test]
    fn child_index_regroups_recursively() {
        let index = PathIndex::new(["items.name", "items.owner.email", "items.owner"]);
        let plans = index.plans();
        let items = &plans[0];

        let children = items.children();
        assert_eq!(suffix_strings(children, "name"), vec![""]);
        assert_eq!(suffix_strings(children, "owner"), vec!["", "email"]);
    }
}
