//! Tree Observer
//!
//! The public handle over a root [`ObserverNode`], typed by the root
//! object's concrete type.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use tracing::{debug, warn};

use super::node::{NodeAction, ObserverNode, Reporter};
use crate::config::{ObservationConfig, ObserveOptions};
use crate::error::{Error, Result};
use crate::kvo::{KeyValueObject, KeyValueObserver, ObjectRef, ObservationRegistry};
use crate::path::PathIndex;

/// Observes a set of dotted key paths on a root object.
///
/// `on_node` is called with the root object when a key that paths continue
/// past changes; `on_leaf` when a key a path ends at changes. Both report the
/// root object no matter how deep the change happened.
///
/// Dropping the observer stops it.
///
/// # Example
///
/// ```rust,ignore
/// let document = Entity::new();
/// let observer = TreeObserver::new(["title", "items.name"]);
///
/// observer.start_observing_if_needed(
///     &document,
///     ObserveOptions::default(),
///     |_| println!("structure changed"),
///     |_| println!("value changed"),
/// );
///
/// document.set("title", "Draft");  // prints "value changed"
/// observer.stop_observing();
/// ```
pub struct TreeObserver<T: KeyValueObject + 'static> {
    root: Rc<ObserverNode>,
    index: Rc<PathIndex>,
    options: ObserveOptions,
    _object: PhantomData<fn(&Rc<T>)>,
}

impl<T: KeyValueObject + 'static> TreeObserver<T> {
    /// Create an observer for dotted key paths, with its own registry.
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::with_registry(paths, KeyValueObserver::shared())
    }

    /// Create an observer that subscribes through `registry`.
    pub fn with_registry<I, S>(paths: I, registry: Rc<dyn ObservationRegistry>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let index = Rc::new(PathIndex::new(paths));
        Self {
            root: ObserverNode::new(Rc::clone(&index), 0, registry),
            index,
            options: ObserveOptions::default(),
            _object: PhantomData,
        }
    }

    /// Create an observer for the paths of a config.
    ///
    /// The config's options become the observer's defaults, used by
    /// [`start_observing_configured`](Self::start_observing_configured).
    pub fn from_config(config: &ObservationConfig) -> Self {
        let mut observer = Self::new(config.paths.iter());
        observer.options = config.options;
        observer
    }

    /// Default options for [`start_observing_configured`](Self::start_observing_configured).
    pub fn options(&self) -> ObserveOptions {
        self.options
    }

    /// The root level of the path index.
    pub fn path_index(&self) -> &PathIndex {
        &self.index
    }

    /// Start observing `object`.
    ///
    /// Fails with [`Error::AlreadyObserving`] or [`Error::ObjectMismatch`]
    /// when the observer is already started, leaving it untouched. Fails
    /// with [`Error::StoppedWhileStarting`] when a callback stopped the
    /// observer during the initial deliveries; the observer is then stopped.
    pub fn try_start_observing<N, L>(
        &self,
        object: &Rc<T>,
        options: ObserveOptions,
        on_node: N,
        on_leaf: L,
    ) -> Result<()>
    where
        N: Fn(&Rc<T>) + 'static,
        L: Fn(&Rc<T>) + 'static,
    {
        let erased: ObjectRef = object.clone();
        let reporter = Reporter::new(
            options,
            typed_action(object, on_node),
            typed_action(object, on_leaf),
        );

        self.root.start(&erased, reporter).map_err(|err| {
            match err {
                Error::ObjectMismatch => warn!(%err, "refusing to observe a second object"),
                Error::StoppedWhileStarting => debug!(%err, "observer stopped during bootstrap"),
                _ => debug!(%err, "observer already started"),
            }
            err
        })
    }

    /// Start observing `object` unless already started.
    ///
    /// Returns `false`, and does nothing, if the observer is already bound
    /// to this or any other object. Also returns `false` if a callback
    /// stopped the observer before the start completed.
    pub fn start_observing_if_needed<N, L>(
        &self,
        object: &Rc<T>,
        options: ObserveOptions,
        on_node: N,
        on_leaf: L,
    ) -> bool
    where
        N: Fn(&Rc<T>) + 'static,
        L: Fn(&Rc<T>) + 'static,
    {
        self.try_start_observing(object, options, on_node, on_leaf)
            .is_ok()
    }

    /// Like [`start_observing_if_needed`](Self::start_observing_if_needed)
    /// with this observer's default options.
    pub fn start_observing_configured<N, L>(&self, object: &Rc<T>, on_node: N, on_leaf: L) -> bool
    where
        N: Fn(&Rc<T>) + 'static,
        L: Fn(&Rc<T>) + 'static,
    {
        self.start_observing_if_needed(object, self.options, on_node, on_leaf)
    }

    /// Like [`start_observing_if_needed`](Self::start_observing_if_needed)
    /// with no node callback.
    pub fn start_observing_leaves_if_needed<L>(
        &self,
        object: &Rc<T>,
        options: ObserveOptions,
        on_leaf: L,
    ) -> bool
    where
        L: Fn(&Rc<T>) + 'static,
    {
        self.start_observing_if_needed(object, options, |_: &Rc<T>| {}, on_leaf)
    }

    /// Stop observing and cancel every subscription of the tree.
    ///
    /// Safe to call repeatedly or before any start.
    pub fn stop_observing(&self) {
        self.root.stop();
    }

    pub fn is_observing(&self) -> bool {
        self.root.is_bound()
    }

    /// Number of live nodes, root included. Zero when stopped.
    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    /// Number of live subscriptions held by the whole tree.
    pub fn subscription_count(&self) -> usize {
        self.root.subscription_count()
    }

    /// Number of child nodes built for a root-level key.
    pub fn child_count(&self, key: &str) -> usize {
        self.root.child_count(key)
    }
}

/// Adapt a typed callback to the root's type-erased action.
fn typed_action<T, F>(object: &Rc<T>, action: F) -> NodeAction
where
    T: KeyValueObject + 'static,
    F: Fn(&Rc<T>) + 'static,
{
    let target = Rc::downgrade(object);
    Rc::new(move |_: &ObjectRef| {
        if let Some(object) = target.upgrade() {
            action(&object);
        }
    })
}

impl<T: KeyValueObject + 'static> Drop for TreeObserver<T> {
    fn drop(&mut self) {
        self.stop_observing();
    }
}

impl<T: KeyValueObject + 'static> fmt::Debug for TreeObserver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeObserver")
            .field("keys", &self.index.keys().collect::<Vec<_>>())
            .field("observing", &self.is_observing())
            .field("node_count", &self.node_count())
            .field("subscription_count", &self.subscription_count())
            .finish()
    }
}
