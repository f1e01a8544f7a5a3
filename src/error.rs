// sharectx/src/error.rs
//
//! Various errors that methods can produce.

/// Various errors that methods can produce.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Error {
    /// The system OpenGL or EGL library couldn't be located.
    NoGLLibraryFound,
    /// The display connection couldn't be opened or initialized.
    DisplayInitializationFailed(WindowingApiError),
    /// Choosing an OpenGL pixel format failed.
    PixelFormatSelectionFailed(WindowingApiError),
    /// The system couldn't choose an OpenGL pixel format.
    NoPixelFormatFound,
    /// The system couldn't create an OpenGL context.
    ContextCreationFailed(WindowingApiError),
    /// The context was created but couldn't be made ready for rendering.
    ContextInitializationFailed,
    /// The system couldn't make the OpenGL context current or not current.
    MakeCurrentFailed(WindowingApiError),
    /// The system couldn't create the surface backing a context.
    SurfaceCreationFailed(WindowingApiError),
    /// Looking up an OpenGL function address failed.
    GLFunctionNotFound,
    /// The operation requires a current context on this thread and there is none.
    NoCurrentContext,
    /// The native widget is invalid.
    InvalidNativeWidget,
    /// The native widget type is not supported by this backend.
    IncompatibleNativeWidget,
    /// The shared context is not compatible for sharing.
    IncompatibleSharedContext,
}

/// Abstraction of the errors that EGL and the emulated backends return.
///
/// They all tend to follow similar patterns.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WindowingApiError {
    /// Miscellaneous error.
    Failed,
    /// EGL: An unrecognized attribute or attribute value was passed in the attribute list.
    BadAttribute,
    /// EGL: An EGLConfig argument does not name a valid EGL frame buffer configuration.
    BadConfig,
    /// EGL: An EGLContext argument does not name a valid EGL rendering context.
    BadContext,
    /// EGL: An EGLDisplay argument does not name a valid EGL display connection.
    BadDisplay,
    /// EGL: Arguments are inconsistent (for example, a valid context requires
    /// buffers not supplied by a valid surface).
    BadMatch,
    /// EGL: EGL failed to allocate resources for the requested operation.
    BadAlloc,
    /// EGL: EGL is not initialized, or could not be initialized, for the
    /// specified EGL display connection.
    NotInitialized,
    /// EGL: EGL cannot access a requested resource (for example a context is
    /// bound in another thread).
    BadAccess,
    /// EGL: The current surface of the calling thread is a window, pixel
    /// buffer or pixmap that is no longer valid.
    BadCurrentSurface,
    /// EGL: An EGLSurface argument does not name a valid surface (window,
    /// pixel buffer or pixmap) configured for GL rendering.
    BadSurface,
    /// EGL: One or more argument values are invalid.
    BadParameter,
    /// EGL: A NativePixmapType argument does not refer to a valid native
    /// pixmap.
    BadNativePixmap,
    /// EGL: A NativeWindowType argument does not refer to a valid native
    /// window.
    BadNativeWindow,
    /// EGL: A power management event has occurred. The application must
    /// destroy all contexts and reinitialise OpenGL ES state and objects to
    /// continue rendering.
    ContextLost,
}
