// sharectx/src/graphics_context.rs
//
//! The owner of the shared root context.

use crate::gl_context::{ContextOwner, ContextRecord, GlContext};
use crate::platform::{self, PlatformContext, SurfaceRequest};
use crate::registry::{self, BoundContext};
use crate::unshared::UnsharedResourceRegistry;
use crate::{ContextID, ContextSettings, Error, GLApi};

use euclid::default::Size2D;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::any::Any;
use std::os::raw::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[cfg(feature = "sm-raw-window-handle-06")]
use rwh_06::HasWindowHandle;

/// Owns the hidden shared root context and creates every other context as a sibling of it.
///
/// There is normally one of these per process. Its type parameter defaults to the backend chosen
/// at build time, so `let graphics: GraphicsContext = GraphicsContext::new()?;` is all most callers
/// need.
///
/// Contexts borrow the graphics context they were created from, so it can only be dropped once
/// all of them are gone.
pub struct GraphicsContext<P = platform::default::Context>
where
    P: PlatformContext,
{
    // Guards creation and destruction of contexts and every make-current of the root. Recursive
    // because creation can be reached from code that already holds it.
    mutex: ReentrantMutex<()>,
    root: Arc<ContextRecord<P>>,
    extensions: Vec<String>,
    unshared: UnsharedResourceRegistry,
    live: AtomicUsize,
}

impl<P> Drop for GraphicsContext<P>
where
    P: PlatformContext,
{
    fn drop(&mut self) {
        let _lock = self.mutex.lock();
        debug_assert_eq!(self.live.load(Ordering::SeqCst), 0);

        let current = registry::active_context_id();
        assert!(
            current.is_none() || current == self.root.id,
            "The shared context was destroyed while context {} is still active",
            current
        );

        let root = self.root_bound();
        self.unshared.cleanup(&root);
        let leftover = self.unshared.len();
        if leftover != 0 {
            warn!("{} unshared object(s) outlived the context they were registered against", leftover);
        }

        if registry::set_active_thread_local_context(&root, false).is_err() {
            warn!("Destroying shared context {} while it is still current", self.root.id);
        }
        registry::forget_context(self.root.id);
        debug!("destroying shared context {}", self.root.id);
    }
}

impl<P> GraphicsContext<P>
where
    P: PlatformContext,
{
    /// Creates the shared root context and records the extensions it supports.
    ///
    /// The root is left inactive. Whatever was current on the calling thread beforehand is
    /// current again when this returns.
    pub fn new() -> Result<GraphicsContext<P>, Error> {
        let previous = registry::bound_context();

        let settings = ContextSettings::default();
        let platform = P::new(None, &SurfaceRequest::Headless, &settings).map_err(|err| {
            error!("Failed to create the shared context: {:?}", err);
            err
        })?;

        let root = ContextRecord::new(platform);
        let bound: Arc<dyn BoundContext> = root.clone();
        let setup = registry::set_active_thread_local_context(&bound, true).and_then(|()| {
            root.platform.initialize(&settings)?;
            Ok(root.platform.extensions())
        });
        restore_binding(previous, Some(&bound));

        let extensions = match setup {
            Ok(extensions) => extensions,
            Err(err) => {
                error!("Failed to initialize the shared context: {:?}", err);
                registry::forget_context(root.id);
                return Err(err);
            }
        };

        debug!("created shared context {} with {} extension(s)", root.id, extensions.len());
        Ok(GraphicsContext {
            mutex: ReentrantMutex::new(()),
            root,
            extensions,
            unshared: UnsharedResourceRegistry::new(),
            live: AtomicUsize::new(0),
        })
    }

    /// Makes the shared root current on the calling thread, or stops it being current.
    pub fn set_active(&self, active: bool) -> Result<(), Error> {
        let _lock = self.mutex.lock();
        registry::set_active_thread_local_context(&self.root_bound(), active)
    }

    /// Holds the manager lock and keeps the shared root current until the guard is dropped.
    ///
    /// Unlike [`crate::TransientContextLock`], this always activates the root, even if another
    /// context was current, and leaves no context current when dropped.
    pub fn lock(&self) -> SharedContextGuard<'_, P> {
        SharedContextGuard::new(self)
    }

    /// Creates a context with no surface of its own.
    pub fn create_context(&self) -> Result<GlContext<'_, P>, Error> {
        self.create_context_with(
            SurfaceRequest::Headless,
            &ContextSettings::default(),
            ContextOwner::Headless,
        )
    }

    /// Creates a context rendering to `window`.
    ///
    /// `bits_per_pixel` is the color depth of the window's pixel format.
    #[cfg(feature = "sm-raw-window-handle-06")]
    pub fn create_window_context<W>(
        &self,
        settings: &ContextSettings,
        window: &W,
        bits_per_pixel: u32,
    ) -> Result<GlContext<'_, P>, Error>
    where
        W: HasWindowHandle,
    {
        let handle = window.window_handle().map_err(|_| Error::InvalidNativeWidget)?.as_raw();
        self.create_context_with(
            SurfaceRequest::Window { window: handle, bits_per_pixel },
            settings,
            ContextOwner::Window { handle, bits_per_pixel },
        )
    }

    /// Creates a context rendering to an off-screen buffer of the given size.
    pub fn create_offscreen_context(
        &self,
        settings: &ContextSettings,
        size: Size2D<u32>,
    ) -> Result<GlContext<'_, P>, Error> {
        self.create_context_with(
            SurfaceRequest::Offscreen { size },
            settings,
            ContextOwner::Offscreen { size },
        )
    }

    fn create_context_with(
        &self,
        surface: SurfaceRequest,
        settings: &ContextSettings,
        owner: ContextOwner,
    ) -> Result<GlContext<'_, P>, Error> {
        let _lock = self.mutex.lock();
        let previous = registry::bound_context();
        let root = self.root_bound();

        // Native sharing doesn't strictly need the root current, so a failure here only costs
        // drivers that want it.
        let root_was_current = registry::active_context_id() == self.root.id;
        let root_activated = !root_was_current
            && registry::set_active_thread_local_context(&root, true).is_ok();
        if !root_was_current && !root_activated {
            warn!("Creating a context without the shared context {} active", self.root.id);
        }

        let platform = P::new(Some(&self.root.platform), &surface, settings);
        if root_activated {
            let _ = registry::set_active_thread_local_context(&root, false);
        }
        let platform = match platform {
            Ok(platform) => platform,
            Err(err) => {
                error!("Failed to create a context: {:?}", err);
                restore_binding(previous, None);
                return Err(err);
            }
        };

        let record = ContextRecord::new(platform);
        let bound: Arc<dyn BoundContext> = record.clone();
        let achieved = registry::set_active_thread_local_context(&bound, true)
            .and_then(|()| record.platform.initialize(settings));
        let achieved = match achieved {
            Ok(achieved) => achieved,
            Err(err) => {
                error!("Failed to initialize context {}: {:?}", record.id, err);
                restore_binding(previous, Some(&bound));
                registry::forget_context(record.id);
                return Err(err);
            }
        };
        achieved.check(settings);
        restore_binding(previous, Some(&bound));

        debug!("created context {} ({:?}) with settings {}", record.id, owner, achieved);
        Ok(GlContext::new(self, record, achieved, owner))
    }

    /// Returns the flavor of OpenGL every context of this graphics context speaks.
    #[inline]
    pub fn gl_api(&self) -> GLApi {
        P::GL_API
    }

    /// Returns the identifier of the shared root context.
    #[inline]
    pub fn shared_context_id(&self) -> ContextID {
        self.root.id
    }

    /// The extensions supported by the shared root, and so by every sibling.
    #[inline]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn is_extension_available(&self, name: &str) -> bool {
        self.extensions.iter().any(|extension| extension == name)
    }

    /// Fetches the address of an OpenGL function through the shared root.
    #[inline]
    pub fn get_function(&self, name: &str) -> *const c_void {
        self.root.platform.get_function(name)
    }

    /// Returns the number of sibling contexts that are still alive.
    #[inline]
    pub fn live_context_count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Registers an object that is only valid in the context current on the calling thread.
    ///
    /// The registry keeps a reference to `object` until it is unregistered or until that context
    /// is destroyed, at which point the reference is dropped with the context current.
    ///
    /// Panics if no context is current on the calling thread.
    pub fn register_unshared_object<T>(&self, object: Arc<T>)
    where
        T: Any + Send + Sync,
    {
        self.unshared.register(object)
    }

    /// Drops the registry's reference to `object`. Returns false if it wasn't registered against
    /// the context current on the calling thread.
    ///
    /// Panics if no context is current on the calling thread.
    pub fn unregister_unshared_object<T>(&self, object: &Arc<T>) -> bool
    where
        T: Any + Send + Sync,
    {
        self.unshared.unregister(object)
    }

    /// Returns how many unshared objects are registered against the context `id`.
    pub fn unshared_object_count(&self, id: ContextID) -> usize {
        self.unshared.count(id)
    }

    #[inline]
    pub(crate) fn creation_lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.mutex.lock()
    }

    #[inline]
    pub(crate) fn unshared(&self) -> &UnsharedResourceRegistry {
        &self.unshared
    }

    #[inline]
    pub(crate) fn root_bound(&self) -> Arc<dyn BoundContext> {
        self.root.clone()
    }

    #[inline]
    pub(crate) fn root_platform(&self) -> &P {
        &self.root.platform
    }

    pub(crate) fn sibling_created(&self) {
        self.live.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn sibling_destroyed(&self) {
        let previous = self.live.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0);
    }
}

// Puts the calling thread back the way it was before `created` was made current.
fn restore_binding(previous: Option<Arc<dyn BoundContext>>, created: Option<&Arc<dyn BoundContext>>) {
    let restored = match (previous, created) {
        (Some(previous), _) => registry::set_active_thread_local_context(&previous, true),
        (None, Some(created)) => registry::set_active_thread_local_context(created, false),
        (None, None) => Ok(()),
    };
    if restored.is_err() {
        warn!("Could not restore the context that was active before context creation");
    }
}

/// Keeps the shared root current on the calling thread while holding the manager lock.
///
/// Created by [`GraphicsContext::lock`].
pub struct SharedContextGuard<'g, P>
where
    P: PlatformContext,
{
    graphics: &'g GraphicsContext<P>,
    _lock: ReentrantMutexGuard<'g, ()>,
}

impl<'g, P> SharedContextGuard<'g, P>
where
    P: PlatformContext,
{
    fn new(graphics: &'g GraphicsContext<P>) -> SharedContextGuard<'g, P> {
        let lock = graphics.creation_lock();
        if registry::set_active_thread_local_context(&graphics.root_bound(), true).is_err() {
            error!("Failed to activate the shared context {}", graphics.root.id);
        }
        SharedContextGuard { graphics, _lock: lock }
    }

    /// Returns the native shared root context.
    #[inline]
    pub fn platform_context(&self) -> &P {
        self.graphics.root_platform()
    }
}

impl<'g, P> Drop for SharedContextGuard<'g, P>
where
    P: PlatformContext,
{
    fn drop(&mut self) {
        if registry::set_active_thread_local_context(&self.graphics.root_bound(), false).is_err() {
            error!("Failed to deactivate the shared context {}", self.graphics.root.id);
        }
    }
}
