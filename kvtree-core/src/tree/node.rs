//! Observer Node
//!
//! One node observes one object along one level of the path index. It owns
//! the subscriptions for that object's keys and the child nodes built for
//! each key's current value.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::config::ObserveOptions;
use crate::error::{Error, Result};
use crate::kvo::{
    same_object, Change, ChangeHandler, ObjectRef, ObservationId, ObservationRegistry, Shape,
    WeakObjectRef,
};
use crate::path::{KeyPlan, PathIndex};

/// Callback receiving the object a change is reported for.
pub(crate) type NodeAction = Rc<dyn Fn(&ObjectRef)>;

/// What a start request reports, and how.
#[derive(Clone)]
pub(crate) struct Reporter {
    options: ObserveOptions,
    on_node: NodeAction,
    on_leaf: NodeAction,
}

impl Reporter {
    pub(crate) fn new(options: ObserveOptions, on_node: NodeAction, on_leaf: NodeAction) -> Self {
        Self {
            options,
            on_node,
            on_leaf,
        }
    }

    /// Callbacks for a child observing an element of `object`.
    ///
    /// The child reports `object`, not the element.
    fn rerouted_to(&self, object: &ObjectRef) -> Self {
        Self {
            options: self.options,
            on_node: reroute(object, &self.on_node),
            on_leaf: reroute(object, &self.on_leaf),
        }
    }
}

fn reroute(object: &ObjectRef, action: &NodeAction) -> NodeAction {
    let target = Rc::downgrade(object);
    let action = Rc::clone(action);
    Rc::new(move |_: &ObjectRef| {
        if let Some(target) = target.upgrade() {
            action(&target);
        }
    })
}

/// Mutable part of a node.
#[derive(Default)]
struct NodeState {
    /// The bound object. Never owned.
    observed: Option<WeakObjectRef>,

    /// Bumped on every start and stop; handlers from an older epoch are stale.
    epoch: u64,

    observation_ids: Vec<ObservationId>,

    /// Child nodes per key, one per element of the key's value.
    children: HashMap<String, Vec<Rc<ObserverNode>>>,

    /// Rebuild counter per key. A rebuild that finds its counter moved was
    /// overtaken by a nested one holding a fresher value.
    generations: HashMap<String, u64>,
}

/// A recursive observer bound to one object.
pub(crate) struct ObserverNode {
    index: Rc<PathIndex>,
    plans: Vec<Rc<KeyPlan>>,

    /// Depth in the tree, for diagnostics.
    level: usize,

    registry: Rc<dyn ObservationRegistry>,
    state: RefCell<NodeState>,
}

impl ObserverNode {
    pub(crate) fn new(
        index: Rc<PathIndex>,
        level: usize,
        registry: Rc<dyn ObservationRegistry>,
    ) -> Rc<Self> {
        Rc::new(Self {
            plans: index.plans(),
            index,
            level,
            registry,
            state: RefCell::new(NodeState::default()),
        })
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.state.borrow().observed.is_some()
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.state.borrow().epoch == epoch
    }

    /// Bind to `object` and observe every key of this level.
    ///
    /// Fails without side effects if the node is already bound, whether to
    /// `object` or to another object. Fails with [`Error::StoppedWhileStarting`]
    /// if a callback run by an initial delivery stopped the node.
    pub(crate) fn start(self: &Rc<Self>, object: &ObjectRef, reporter: Reporter) -> Result<()> {
        let epoch = {
            let mut state = self.state.borrow_mut();
            if let Some(bound) = &state.observed {
                return Err(match bound.upgrade() {
                    Some(bound) if same_object(&bound, object) => Error::AlreadyObserving,
                    _ => Error::ObjectMismatch,
                });
            }
            debug_assert!(state.observation_ids.is_empty());
            debug_assert!(state.children.is_empty());

            state.observed = Some(Rc::downgrade(object));
            state.epoch += 1;
            state.epoch
        };

        for plan in &self.plans {
            debug!(
                key = plan.key(),
                sub_keys = ?plan.sub_paths(),
                level = self.level,
                "starting observation of key"
            );

            // The initial value is always requested: the subtree is built from it.
            let handler = self.change_handler(plan, object, &reporter, epoch);
            let id = self.registry.observe(object, plan.key(), true, handler);

            let mut state = self.state.borrow_mut();
            if state.epoch == epoch {
                state.observation_ids.push(id);
            } else {
                // Stopped by a callback while starting.
                drop(state);
                self.registry.stop_observing(&[id]);
                break;
            }
        }

        if self.is_current(epoch) {
            Ok(())
        } else {
            Err(Error::StoppedWhileStarting)
        }
    }

    /// Stop all children, cancel this node's subscriptions, and unbind.
    ///
    /// Does nothing on an unbound node.
    pub(crate) fn stop(&self) {
        let children = {
            let mut state = self.state.borrow_mut();
            if state.observed.is_none()
                && state.observation_ids.is_empty()
                && state.children.is_empty()
            {
                return;
            }
            state.epoch += 1;
            std::mem::take(&mut state.children)
        };
        stop_all(children.into_values().flatten());

        // Cancelled by id only: the observed object may already be going away.
        let ids = std::mem::take(&mut self.state.borrow_mut().observation_ids);
        debug!(
            keys = ?self.index.keys().collect::<Vec<_>>(),
            level = self.level,
            subscriptions = ids.len(),
            "stopping observation"
        );
        self.registry.stop_observing(&ids);

        self.state.borrow_mut().observed = None;
    }

    fn change_handler(
        self: &Rc<Self>,
        plan: &Rc<KeyPlan>,
        object: &ObjectRef,
        reporter: &Reporter,
        epoch: u64,
    ) -> ChangeHandler {
        let node = Rc::downgrade(self);
        let observed = Rc::downgrade(object);
        let plan = Rc::clone(plan);
        let reporter = reporter.clone();
        let initial = Cell::new(true);

        Rc::new(move |_: Option<&Change>| {
            let is_initial = initial.replace(false);
            let (Some(node), Some(observed)) = (node.upgrade(), observed.upgrade()) else {
                return;
            };
            node.dispatch(&plan, &observed, is_initial, &reporter, epoch);
        })
    }

    /// Handle one delivery for `plan`'s key.
    fn dispatch(
        &self,
        plan: &KeyPlan,
        observed: &ObjectRef,
        is_initial: bool,
        reporter: &Reporter,
        epoch: u64,
    ) {
        if !self.is_current(epoch) {
            return;
        }
        if !observed.is_fully_loaded() {
            debug!(
                key = plan.key(),
                level = self.level,
                "skipped change because the object is not loaded"
            );
            return;
        }
        trace!(
            key = plan.key(),
            sub_keys = ?plan.sub_paths(),
            level = self.level,
            initial = is_initial,
            "dispatching change"
        );

        if !is_initial || reporter.options.initial {
            if plan.is_node() {
                (reporter.on_node)(observed);
                if !self.is_current(epoch) {
                    return;
                }
            }
            if plan.is_leaf() {
                (reporter.on_leaf)(observed);
                if !self.is_current(epoch) {
                    return;
                }
            }
        }

        let previous = self.state.borrow_mut().children.remove(plan.key());
        stop_all(previous.into_iter().flatten());

        if plan.is_node() {
            self.rebuild(plan, observed, reporter, epoch);
        }
    }

    /// Build one child per element of the key's current value.
    fn rebuild(&self, plan: &KeyPlan, observed: &ObjectRef, reporter: &Reporter, epoch: u64) {
        let generation = {
            let mut state = self.state.borrow_mut();
            let generation = state.generations.entry(plan.key().to_owned()).or_default();
            *generation += 1;
            *generation
        };

        let elements = Shape::resolve(&observed.value_for_key(plan.key())).into_elements();
        let child_reporter = reporter.rerouted_to(observed);

        let children: Vec<Rc<ObserverNode>> = elements
            .iter()
            .map(|element| {
                let child = ObserverNode::new(
                    Rc::clone(plan.children()),
                    self.level + 1,
                    Rc::clone(&self.registry),
                );
                let started = child.start(element, child_reporter.clone());
                debug_assert!(
                    !matches!(started, Err(Error::AlreadyObserving | Error::ObjectMismatch)),
                    "a new child is never bound"
                );
                child
            })
            .collect();

        // Starting children may have re-entered this key or stopped this node.
        let displaced = {
            let mut state = self.state.borrow_mut();
            let overtaken = state.generations.get(plan.key()) != Some(&generation);
            if state.epoch == epoch && !overtaken {
                state.children.insert(plan.key().to_owned(), children)
            } else {
                Some(children)
            }
        };
        stop_all(displaced.into_iter().flatten());
    }

    /// Number of bound nodes in this subtree.
    pub(crate) fn node_count(&self) -> usize {
        if !self.is_bound() {
            return 0;
        }
        1 + self
            .children_snapshot()
            .iter()
            .map(|child| child.node_count())
            .sum::<usize>()
    }

    /// Number of live subscriptions in this subtree.
    pub(crate) fn subscription_count(&self) -> usize {
        let own = self.state.borrow().observation_ids.len();
        own + self
            .children_snapshot()
            .iter()
            .map(|child| child.subscription_count())
            .sum::<usize>()
    }

    /// Number of children currently built for `key`.
    pub(crate) fn child_count(&self, key: &str) -> usize {
        self.state.borrow().children.get(key).map_or(0, Vec::len)
    }

    fn children_snapshot(&self) -> Vec<Rc<ObserverNode>> {
        self.state
            .borrow()
            .children
            .values()
            .flatten()
            .cloned()
            .collect()
    }
}

impl Drop for ObserverNode {
    fn drop(&mut self) {
        self.stop();
    }
}

fn stop_all<I>(children: I)
where
    I: IntoIterator<Item = Rc<ObserverNode>>,
{
    for child in children {
        child.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kvo::{Entity, KeyValueObserver, Value};

    fn noop() -> NodeAction {
        Rc::new(|_: &ObjectRef| {})
    }

    fn reporter() -> Reporter {
        Reporter::new(ObserveOptions::default(), noop(), noop())
    }

    fn node(paths: &[&str], registry: &Rc<KeyValueObserver>) -> Rc<ObserverNode> {
        ObserverNode::new(Rc::new(PathIndex::new(paths)), 0, registry.clone())
    }

    #[test]
    fn new_node_is_unbound() {
        let registry = KeyValueObserver::shared();
        let node = node(&["a"], &registry);

        assert!(!node.is_bound());
        assert_eq!(node.node_count(), 0);
        assert_eq!(node.subscription_count(), 0);
    }

    #[test]
    fn start_subscribes_each_key() {
        let registry = KeyValueObserver::shared();
        let node = node(&["a", "b.c", "b"], &registry);
        let entity = Entity::new();
        let object: ObjectRef = entity.clone();

        node.start(&object, reporter()).unwrap();

        assert!(node.is_bound());
        assert_eq!(node.subscription_count(), 2);
        assert_eq!(registry.active_count(), 2);
        assert_eq!(entity.observer_count(), 2);
    }

    #[test]
    fn second_start_reports_why() {
        let registry = KeyValueObserver::shared();
        let node = node(&["a"], &registry);
        let first: ObjectRef = Entity::new();
        let second: ObjectRef = Entity::new();

        node.start(&first, reporter()).unwrap();

        assert!(matches!(node.start(&first, reporter()), Err(Error::AlreadyObserving)));
        assert!(matches!(node.start(&second, reporter()), Err(Error::ObjectMismatch)));
        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn stop_is_idempotent() {
        let registry = KeyValueObserver::shared();
        let node = node(&["a"], &registry);
        node.stop();

        let object: ObjectRef = Entity::new();
        node.start(&object, reporter()).unwrap();
        node.stop();
        node.stop();

        assert!(!node.is_bound());
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn restart_after_stop() {
        let registry = KeyValueObserver::shared();
        let node = node(&["a"], &registry);
        let first: ObjectRef = Entity::new();
        let second: ObjectRef = Entity::new();

        node.start(&first, reporter()).unwrap();
        node.stop();
        node.start(&second, reporter()).unwrap();

        assert_eq!(registry.active_count(), 1);
    }

    #[test]
    fn builds_children_for_node_keys() {
        let registry = KeyValueObserver::shared();
        let node = node(&["owner.name"], &registry);
        let owner = Entity::new();
        let entity = Entity::with_properties([("owner", Value::object(&owner))]);
        let object: ObjectRef = entity.clone();

        node.start(&object, reporter()).unwrap();

        assert_eq!(node.child_count("owner"), 1);
        assert_eq!(node.node_count(), 2);
        assert_eq!(owner.observer_count_for("name"), 1);

        node.stop();
        assert_eq!(owner.observer_count(), 0);
        assert_eq!(entity.observer_count(), 0);
    }

    #[test]
    fn dropping_a_bound_node_cancels_subscriptions() {
        let registry = KeyValueObserver::shared();
        let entity = Entity::new();
        let object: ObjectRef = entity.clone();

        {
            let node = node(&["a", "b"], &registry);
            node.start(&object, reporter()).unwrap();
            assert_eq!(entity.observer_count(), 2);
        }

        assert_eq!(entity.observer_count(), 0);
        assert_eq!(registry.active_count(), 0);
    }

    #[test]
    fn reroute_reports_the_parent() {
        let parent: ObjectRef = Entity::new();
        let element: ObjectRef = Entity::new();
        let reported = Rc::new(RefCell::new(Vec::<ObjectRef>::new()));
        let reported_clone = reported.clone();

        let action: NodeAction = Rc::new(move |object: &ObjectRef| {
            reported_clone.borrow_mut().push(object.clone());
        });
        let rerouted = reroute(&parent, &action);
        rerouted(&element);

        let reported = reported.borrow();
        assert_eq!(reported.len(), 1);
        assert!(same_object(&reported[0], &parent));
    }
}
