// sharectx/src/gl_context.rs
//
//! Contexts created as siblings of the shared root.

use crate::graphics_context::GraphicsContext;
use crate::registry::{self, ActiveContext, BoundContext};
use crate::{ContextID, ContextSettings, Error, PlatformContext};

use euclid::default::Size2D;
use std::os::raw::c_void;
use std::sync::Arc;

#[cfg(feature = "sm-raw-window-handle-06")]
use rwh_06::RawWindowHandle;

/// The bookkeeping record behind every context, including the shared root.
pub(crate) struct ContextRecord<P> {
    pub(crate) id: ContextID,
    pub(crate) platform: P,
}

impl<P> ContextRecord<P>
where
    P: PlatformContext,
{
    pub(crate) fn new(platform: P) -> Arc<ContextRecord<P>> {
        Arc::new(ContextRecord { id: crate::allocate_context_id(), platform })
    }
}

impl<P> ActiveContext for ContextRecord<P>
where
    P: PlatformContext,
{
    #[inline]
    fn id(&self) -> ContextID {
        self.id
    }

    #[inline]
    fn get_function(&self, name: &str) -> *const c_void {
        self.platform.get_function(name)
    }
}

impl<P> BoundContext for ContextRecord<P>
where
    P: PlatformContext,
{
    #[inline]
    fn make_current(&self, current: bool) -> Result<(), Error> {
        self.platform.make_current(current)
    }

    fn into_active(self: Arc<Self>) -> Arc<dyn ActiveContext> {
        self
    }
}

/// What a context was created for.
#[derive(Clone, Copy, Debug)]
pub enum ContextOwner {
    /// A context with no surface of its own.
    Headless,
    /// A context rendering to a window owned by the windowing layer.
    #[cfg(feature = "sm-raw-window-handle-06")]
    Window { handle: RawWindowHandle, bits_per_pixel: u32 },
    /// A context rendering to an off-screen buffer.
    Offscreen { size: Size2D<u32> },
}

/// An OpenGL context sharing its object namespace with the shared root of a [`GraphicsContext`].
///
/// A context is created inactive. It is bound to at most one thread at a time with
/// [`GlContext::set_active`]. Dropping it releases the unshared objects registered against it and,
/// if it was current on the dropping thread, leaves the shared root current there instead. Drop a
/// context on the thread it was last current on.
pub struct GlContext<'g, P>
where
    P: PlatformContext,
{
    graphics: &'g GraphicsContext<P>,
    pub(crate) record: Arc<ContextRecord<P>>,
    settings: ContextSettings,
    owner: ContextOwner,
}

impl<'g, P> Drop for GlContext<'g, P>
where
    P: PlatformContext,
{
    fn drop(&mut self) {
        let _lock = self.graphics.creation_lock();
        let id = self.record.id;
        debug!("destroying context {}", id);

        let record = self.bound();
        self.graphics.unshared().cleanup(&record);
        registry::on_context_destroyed(id, &self.graphics.root_bound());

        self.graphics.sibling_destroyed();
    }
}

impl<'g, P> GlContext<'g, P>
where
    P: PlatformContext,
{
    pub(crate) fn new(
        graphics: &'g GraphicsContext<P>,
        record: Arc<ContextRecord<P>>,
        settings: ContextSettings,
        owner: ContextOwner,
    ) -> GlContext<'g, P> {
        graphics.sibling_created();
        GlContext { graphics, record, settings, owner }
    }

    #[inline]
    pub(crate) fn bound(&self) -> Arc<dyn BoundContext> {
        self.record.clone()
    }

    /// Returns the process-unique identifier of this context.
    #[inline]
    pub fn id(&self) -> ContextID {
        self.record.id
    }

    /// Returns the settings this context actually got, which may differ from the requested ones.
    #[inline]
    pub fn settings(&self) -> &ContextSettings {
        &self.settings
    }

    #[inline]
    pub fn owner(&self) -> &ContextOwner {
        &self.owner
    }

    /// Returns the graphics context this context shares its namespace with.
    #[inline]
    pub fn graphics_context(&self) -> &'g GraphicsContext<P> {
        self.graphics
    }

    /// Returns the native context.
    #[inline]
    pub fn platform_context(&self) -> &P {
        &self.record.platform
    }

    /// Makes this context current on the calling thread, or stops it being current.
    ///
    /// Activating while another context is current deactivates that one first. Activating the
    /// current context and deactivating a context that isn't current both do nothing.
    pub fn set_active(&self, active: bool) -> Result<(), Error> {
        // Switching away from the root deactivates it, so this serializes with every other
        // make-current of the root.
        let _lock = self.graphics.creation_lock();
        registry::set_active_thread_local_context(&self.bound(), active)
    }

    /// Returns true if this context is current on the calling thread.
    #[inline]
    pub fn is_active(&self) -> bool {
        registry::active_context_id() == self.record.id
    }

    /// Fetches the address of an OpenGL function through this context.
    #[inline]
    pub fn get_function(&self, name: &str) -> *const c_void {
        self.record.platform.get_function(name)
    }
}
