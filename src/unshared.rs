// sharectx/src/unshared.rs
//
//! Tracking of GPU objects that are only valid in the context that created them.
//!
//! Framebuffer and vertex array objects, among others, are not part of the shared namespace.
//! They are registered against the context current when they were created, and whatever is left
//! of them is released, with that context current, before the context itself is destroyed.

use crate::registry::{self, BoundContext};
use crate::ContextID;

use fnv::FnvHashMap;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;

type UnsharedObject = Arc<dyn Any + Send + Sync>;

pub(crate) struct UnsharedResourceRegistry {
    objects: Mutex<FnvHashMap<ContextID, Vec<UnsharedObject>>>,
}

fn same_object(a: &UnsharedObject, b: *const ()) -> bool {
    Arc::as_ptr(a) as *const () == b
}

impl UnsharedResourceRegistry {
    pub(crate) fn new() -> UnsharedResourceRegistry {
        UnsharedResourceRegistry { objects: Mutex::new(FnvHashMap::default()) }
    }

    /// Registers `object` against the context current on the calling thread.
    ///
    /// Panics if no context is current.
    pub(crate) fn register(&self, object: UnsharedObject) {
        let id = registry::active_context_id();
        assert!(!id.is_none(), "Unshared objects can only be registered while a context is active");
        self.objects.lock().entry(id).or_default().push(object);
    }

    /// Drops the registry's reference to `object` if it was registered against the context
    /// current on the calling thread. Returns whether it was found.
    ///
    /// Panics if no context is current.
    pub(crate) fn unregister<T>(&self, object: &Arc<T>) -> bool
    where
        T: Any + Send + Sync,
    {
        let id = registry::active_context_id();
        assert!(!id.is_none(), "Unshared objects can only be unregistered while a context is active");

        let target = Arc::as_ptr(object) as *const ();
        let removed = {
            let mut objects = self.objects.lock();
            let Some(list) = objects.get_mut(&id) else { return false };
            let removed = list
                .iter()
                .position(|entry| same_object(entry, target))
                .map(|index| list.swap_remove(index));
            if list.is_empty() {
                objects.remove(&id);
            }
            removed
        };

        // Released outside the lock; the object's destructor may issue GL calls.
        removed.is_some()
    }

    /// Returns how many objects are registered against `id`.
    pub(crate) fn count(&self, id: ContextID) -> usize {
        self.objects.lock().get(&id).map_or(0, Vec::len)
    }

    /// Returns how many objects are registered in total.
    pub(crate) fn len(&self) -> usize {
        self.objects.lock().values().map(Vec::len).sum()
    }

    /// Releases every object registered against `context`, with `context` current.
    ///
    /// Whatever was current on the calling thread beforehand is current again afterwards. This
    /// must run before the native context is destroyed.
    pub(crate) fn cleanup(&self, context: &Arc<dyn BoundContext>) {
        let id = context.id();
        if self.count(id) == 0 {
            return;
        }

        let previous = registry::bound_context();
        let was_current = previous.as_ref().map_or(false, |previous| previous.id() == id);

        if registry::set_active_thread_local_context(context, true).is_err() {
            warn!("Releasing unshared objects of context {} without it being active", id);
        }

        let objects = self.objects.lock().remove(&id).unwrap_or_default();
        debug!("releasing {} unshared object(s) of context {}", objects.len(), id);
        drop(objects);

        if was_current {
            return;
        }
        let restored = match previous {
            Some(previous) => registry::set_active_thread_local_context(&previous, true),
            None => registry::set_active_thread_local_context(context, false),
        };
        if restored.is_err() {
            warn!("Could not restore the active context after releasing the objects of {}", id);
        }
    }
}
