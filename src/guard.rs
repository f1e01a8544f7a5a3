// sharectx/src/guard.rs
//
//! Scoped activation for code that needs some context current.

use crate::graphics_context::GraphicsContext;
use crate::platform::PlatformContext;
use crate::registry;

use parking_lot::ReentrantMutexGuard;

/// Guarantees that a context is current on the calling thread for as long as it lives.
///
/// If some context is already current, the guard only bumps a per-thread nesting count and makes
/// no native call. Otherwise it takes the manager lock, makes the shared root current, and undoes
/// both when dropped. Nested guards are therefore free; only the outermost one pays for a
/// make-current.
///
/// ```ignore
/// let _lock = TransientContextLock::new(&graphics);
/// // GL calls here
/// ```
#[must_use]
pub struct TransientContextLock<'g, P>
where
    P: PlatformContext,
{
    graphics: &'g GraphicsContext<P>,
    // Held only by the guard that activated the root.
    lock: Option<ReentrantMutexGuard<'g, ()>>,
}

impl<'g, P> TransientContextLock<'g, P>
where
    P: PlatformContext,
{
    pub fn new(graphics: &'g GraphicsContext<P>) -> TransientContextLock<'g, P> {
        if registry::has_active_context() {
            registry::increment_transient_count();
            return TransientContextLock { graphics, lock: None };
        }

        let lock = graphics.creation_lock();
        let root = graphics.root_bound();
        if registry::set_active_thread_local_context(&root, true).is_err() {
            error!("Failed to activate the shared context {}", graphics.shared_context_id());
        }
        debug_assert!(registry::has_active_context(), "No context is active after a transient lock");

        TransientContextLock { graphics, lock: Some(lock) }
    }

    /// Returns true if this guard activated the shared root and will deactivate it.
    #[inline]
    pub fn is_outermost(&self) -> bool {
        self.lock.is_some()
    }
}

impl<'g, P> Drop for TransientContextLock<'g, P>
where
    P: PlatformContext,
{
    fn drop(&mut self) {
        if self.lock.is_none() {
            registry::decrement_transient_count();
            return;
        }

        let root = self.graphics.root_bound();
        if registry::set_active_thread_local_context(&root, false).is_err() {
            error!("Failed to deactivate the shared context {}", self.graphics.shared_context_id());
        }
        self.lock = None;
    }
}

/// Returns how many transient locks are nested inside the outermost one on the calling thread.
pub fn transient_lock_depth() -> u32 {
    registry::transient_count()
}
