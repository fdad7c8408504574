//! Observation Registry
//!
//! The registry turns "observe key K of object O" into an
//! [`ObservationId`] that can later be cancelled without touching O.
//!
//! # How Cancellation Works
//!
//! Each observation remembers a weak reference to its object and the token
//! the object issued. Cancelling removes the entry first, then upgrades the
//! weak reference. If the object is already gone its handlers went with it
//! and there is nothing left to remove.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use super::object::{ChangeHandler, ObjectRef, ObservationToken, WeakObjectRef};

/// Unique identifier for one key observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservationId(u64);

impl ObservationId {
    /// Generate a new unique observation ID.
    ///
    /// IDs are unique across registries so a stray ID can never cancel
    /// someone else's observation.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ObservationId {
    fn default() -> Self {
        Self::new()
    }
}

/// Registers and cancels single-key observations.
///
/// Implementations must deliver synchronously. When `include_initial` is
/// set, the handler must be invoked once with `None` before `observe`
/// returns.
pub trait ObservationRegistry {
    /// Observe `key` on `object`.
    fn observe(
        &self,
        object: &ObjectRef,
        key: &str,
        include_initial: bool,
        handler: ChangeHandler,
    ) -> ObservationId;

    /// Cancel observations. Unknown or already cancelled IDs are ignored.
    fn stop_observing(&self, ids: &[ObservationId]);
}

/// A live registration.
struct Observation {
    object: WeakObjectRef,
    key: String,
    token: ObservationToken,
}

/// The default registry, backed by [`KeyValueObject::add_observer`].
///
/// [`KeyValueObject::add_observer`]: super::KeyValueObject::add_observer
#[derive(Default)]
pub struct KeyValueObserver {
    observations: RefCell<HashMap<ObservationId, Observation>>,
}

impl KeyValueObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry behind a shared handle.
    pub fn shared() -> Rc<Self> {
        Rc::new(Self::new())
    }

    /// Number of observations not yet cancelled.
    pub fn active_count(&self) -> usize {
        self.observations.borrow().len()
    }

    pub fn is_active(&self, id: ObservationId) -> bool {
        self.observations.borrow().contains_key(&id)
    }
}

impl ObservationRegistry for KeyValueObserver {
    fn observe(
        &self,
        object: &ObjectRef,
        key: &str,
        include_initial: bool,
        handler: ChangeHandler,
    ) -> ObservationId {
        let token = object.add_observer(key, Rc::clone(&handler));
        let id = ObservationId::new();

        // Registered before the initial delivery so the handler may cancel.
        self.observations.borrow_mut().insert(
            id,
            Observation {
                object: Rc::downgrade(object),
                key: key.to_owned(),
                token,
            },
        );

        if include_initial {
            handler(None);
        }

        id
    }

    fn stop_observing(&self, ids: &[ObservationId]) {
        for id in ids {
            let Some(observation) = self.observations.borrow_mut().remove(id) else {
                continue;
            };

            match observation.object.upgrade() {
                Some(object) => object.remove_observer(observation.token),
                None => trace!(key = %observation.key, "observed object already released"),
            }
        }
    }
}

impl Drop for KeyValueObserver {
    fn drop(&mut self) {
        let ids: Vec<ObservationId> = self.observations.get_mut().keys().copied().collect();
        self.stop_observing(&ids);
    }
}
