// sharectx/src/lib.rs
//
//! OpenGL context lifecycle management around a single hidden shared context.
//!
//! A [`GraphicsContext`] owns one hidden "shared root" context. Every other context, whether it
//! renders to a window, an off-screen buffer or nothing at all, is created as a sibling of that
//! root so that textures, shader programs and buffers live in one namespace. Each OS thread has
//! at most one current context; this crate tracks that binding per thread, restores it across
//! scoped activations, and frees GPU objects that cannot be shared before the context that owns
//! them goes away.
//!
//! Rendering code that needs *some* context to be current wraps its native calls in a
//! [`TransientContextLock`]. Nested locks are free; only the outermost one pays for a native
//! make-current.

#[macro_use]
extern crate log;

pub mod platform;
pub use platform::{PlatformContext, SurfaceRequest};

pub mod error;
pub use crate::error::{Error, WindowingApiError};

mod context;
pub use crate::context::{allocate_context_id, ContextAttributeFlags, ContextID, ContextSettings};

mod info;
pub use crate::info::{GLApi, GLVersion};

pub mod registry;
pub use crate::registry::{active_context, active_context_id, has_active_context, ActiveContext};

mod graphics_context;
pub use crate::graphics_context::{GraphicsContext, SharedContextGuard};

mod gl_context;
pub use crate::gl_context::{ContextOwner, GlContext};

mod guard;
pub use crate::guard::{transient_lock_depth, TransientContextLock};

mod unshared;

#[cfg(egl_backend)]
#[allow(non_camel_case_types)]
#[allow(dead_code)]
#[allow(clippy::all)]
mod egl {
    use std::os::raw::{c_long, c_void};
    pub type khronos_utime_nanoseconds_t = khronos_uint64_t;
    pub type khronos_uint64_t = u64;
    pub type khronos_ssize_t = c_long;
    pub type EGLint = i32;
    pub type EGLNativeDisplayType = *const c_void;
    pub type EGLNativePixmapType = *const c_void;
    pub type EGLNativeWindowType = *const c_void;
    pub type NativeDisplayType = EGLNativeDisplayType;
    pub type NativePixmapType = EGLNativePixmapType;
    pub type NativeWindowType = EGLNativeWindowType;
    include!(concat!(env!("OUT_DIR"), "/egl_bindings.rs"));
}

#[cfg(test)]
mod tests;
