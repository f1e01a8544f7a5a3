// sharectx/src/registry.rs
//
//! Which context is current on which thread.
//!
//! Every OS thread has its own binding, created lazily on first use and dropped with the thread.
//! Reads never look at other threads: a context made current on one thread is invisible from all
//! the others, matching the thread affinity of the native APIs.

use crate::{ContextID, Error};

use std::cell::{Cell, RefCell};
use std::os::raw::c_void;
use std::sync::{Arc, Weak};

/// A context that can be observed as the current one on a thread.
pub trait ActiveContext: Send + Sync {
    /// The process-unique identifier of the context.
    fn id(&self) -> ContextID;

    /// Fetches the address of an OpenGL entry point through this context.
    fn get_function(&self, name: &str) -> *const c_void;
}

/// A context the registry can bind and unbind natively.
pub(crate) trait BoundContext: ActiveContext {
    fn make_current(&self, current: bool) -> Result<(), Error>;

    fn into_active(self: Arc<Self>) -> Arc<dyn ActiveContext>;
}

struct CurrentContext {
    id: Cell<ContextID>,
    context: RefCell<Option<Weak<dyn BoundContext>>>,
    transient_count: Cell<u32>,
}

thread_local! {
    static CURRENT_CONTEXT: CurrentContext = const {
        CurrentContext {
            id: Cell::new(ContextID::NONE),
            context: RefCell::new(None),
            transient_count: Cell::new(0),
        }
    };
}

impl CurrentContext {
    fn bind(&self, id: ContextID, context: Option<Weak<dyn BoundContext>>) {
        debug_assert_eq!(id.is_none(), context.is_none());
        self.id.set(id);
        *self.context.borrow_mut() = context;
    }
}

/// Returns the context current on the calling thread, if any.
pub fn active_context() -> Option<Arc<dyn ActiveContext>> {
    bound_context().map(|context| context.into_active())
}

/// Returns the identifier of the context current on the calling thread, or `ContextID::NONE`.
pub fn active_context_id() -> ContextID {
    CURRENT_CONTEXT.with(|current| current.id.get())
}

/// Returns true if some context is current on the calling thread.
pub fn has_active_context() -> bool {
    !active_context_id().is_none()
}

pub(crate) fn bound_context() -> Option<Arc<dyn BoundContext>> {
    CURRENT_CONTEXT.with(|current| current.context.borrow().as_ref().and_then(Weak::upgrade))
}

/// Activates or deactivates `context` on the calling thread.
///
/// Activating the context that is already current, or deactivating one that isn't, does nothing.
/// Activating while a different context is current deactivates that one first. If a native call
/// fails, the failure is logged and the binding reflects whatever the native state now is.
pub(crate) fn set_active_thread_local_context(
    context: &Arc<dyn BoundContext>,
    active: bool,
) -> Result<(), Error> {
    let id = context.id();
    let current_id = active_context_id();
    if active == (current_id == id) {
        return Ok(());
    }

    if active && !current_id.is_none() {
        if let Some(previous) = bound_context() {
            if let Err(err) = previous.make_current(false) {
                error!("Failed to deactivate context {} before activating {}: {:?}", current_id, id, err);
                return Err(err);
            }
        }
        CURRENT_CONTEXT.with(|current| current.bind(ContextID::NONE, None));
    }

    match context.make_current(active) {
        Ok(()) => {
            CURRENT_CONTEXT.with(|current| {
                if active {
                    current.bind(id, Some(Arc::downgrade(context)));
                } else {
                    current.bind(ContextID::NONE, None);
                }
            });
            trace!("context {} {}", id, if active { "activated" } else { "deactivated" });
            Ok(())
        }
        Err(err) => {
            error!(
                "Failed to {} context {}: {:?}",
                if active { "activate" } else { "deactivate" },
                id,
                err
            );
            Err(err)
        }
    }
}

/// Called on the destroying thread while `destroyed` is still alive.
///
/// If `destroyed` is current here, the thread is rebound to `root` so that it never points at a
/// dead context.
pub(crate) fn on_context_destroyed(destroyed: ContextID, root: &Arc<dyn BoundContext>) {
    if active_context_id() != destroyed {
        return;
    }
    if set_active_thread_local_context(root, true).is_err() {
        error!("Could not rebind the shared context after destroying context {}", destroyed);
        CURRENT_CONTEXT.with(|current| current.bind(ContextID::NONE, None));
    }
}

/// Forgets the binding of `id` on the calling thread without any native call.
pub(crate) fn forget_context(id: ContextID) {
    let _ = CURRENT_CONTEXT.try_with(|current| {
        if current.id.get() == id {
            current.bind(ContextID::NONE, None);
        }
    });
}

pub(crate) fn transient_count() -> u32 {
    CURRENT_CONTEXT.with(|current| current.transient_count.get())
}

pub(crate) fn increment_transient_count() {
    CURRENT_CONTEXT.with(|current| current.transient_count.set(current.transient_count.get() + 1));
}

pub(crate) fn decrement_transient_count() {
    CURRENT_CONTEXT.with(|current| {
        let count = current.transient_count.get();
        assert!(count > 0, "Transient count cannot go below zero");
        current.transient_count.set(count - 1);
    });
}
