// sharectx/src/platform/mod.rs
//
//! Platform-specific backends.
//!
//! Exactly one backend is the `default` for a given build. It is chosen at compile time from the
//! target OS and the `sm-headless-default` feature; no runtime dispatch happens between backends.

use crate::{ContextSettings, Error, GLApi};

use euclid::default::Size2D;
use std::os::raw::c_void;

#[cfg(feature = "sm-raw-window-handle-06")]
use rwh_06::RawWindowHandle;

pub mod headless;

#[cfg(egl_backend)]
pub mod egl;

#[cfg(egl_default)]
pub use self::egl as default;
#[cfg(not(egl_default))]
pub use self::headless as default;

/// What a new native context should render to.
#[derive(Clone, Copy, Debug)]
pub enum SurfaceRequest {
    /// No visible surface. The shared root and plain off-screen contexts use this.
    Headless,
    /// An existing window owned by the windowing layer.
    #[cfg(feature = "sm-raw-window-handle-06")]
    Window { window: RawWindowHandle, bits_per_pixel: u32 },
    /// An off-screen buffer of the given size.
    Offscreen { size: Size2D<u32> },
}

/// A native OpenGL context, as exposed by a windowing API such as EGL.
///
/// Implementations only wrap native calls. Which context is current on which thread is tracked by
/// [`crate::registry`]; callers go through it rather than calling `make_current` directly.
pub trait PlatformContext: Send + Sync + Sized + 'static {
    /// The flavor of OpenGL this backend's contexts speak.
    const GL_API: GLApi;

    /// Creates a native context, sharing its object namespace with `shared` if one is given.
    ///
    /// If `shared` is given, it is current on the calling thread for the duration of this call.
    fn new(
        shared: Option<&Self>,
        surface: &SurfaceRequest,
        settings: &ContextSettings,
    ) -> Result<Self, Error>;

    /// Finishes setting up a freshly created context and reports the settings it actually got.
    ///
    /// The context is current on the calling thread when this is called.
    fn initialize(&self, requested: &ContextSettings) -> Result<ContextSettings, Error>;

    /// Binds this context to the calling thread, or unbinds it.
    fn make_current(&self, current: bool) -> Result<(), Error>;

    /// Fetches the address of an OpenGL entry point, or null if it isn't available.
    fn get_function(&self, name: &str) -> *const c_void;

    /// Enumerates the OpenGL extensions this context supports.
    ///
    /// The context is current on the calling thread when this is called.
    fn extensions(&self) -> Vec<String>;
}
