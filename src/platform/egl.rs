// sharectx/src/platform/egl.rs
//
//! The EGL backend, used on Linux, the BSDs and Android.
//!
//! `libEGL` is opened at runtime, so a missing driver surfaces as an error from
//! `GraphicsContext::new` rather than as a link failure.

use crate::egl::types::{EGLConfig, EGLContext, EGLDisplay, EGLSurface, EGLenum, EGLint};
use crate::egl::{self, Egl};
use crate::platform::{PlatformContext, SurfaceRequest};
use crate::{ContextAttributeFlags, ContextSettings, Error, GLApi, GLVersion, WindowingApiError};

use glow::HasContext;
use libc::{dlopen, dlsym, RTLD_LAZY};
use std::ffi::CString;
use std::os::raw::{c_char, c_void};
use std::ptr;
use std::sync::{LazyLock, OnceLock};

#[cfg(feature = "sm-raw-window-handle-06")]
use rwh_06::RawWindowHandle;

const HEADLESS_PBUFFER_SIZE: EGLint = 1;

#[cfg(not(android))]
const RENDERING_API: EGLenum = egl::OPENGL_API;
#[cfg(android)]
const RENDERING_API: EGLenum = egl::OPENGL_ES_API;

#[cfg(not(android))]
const RENDERABLE_TYPE: EGLint = egl::OPENGL_BIT as EGLint;
#[cfg(android)]
const RENDERABLE_TYPE: EGLint = egl::OPENGL_ES2_BIT as EGLint;

thread_local! {
    static EGL_FUNCTIONS: Egl = Egl::load_with(lookup_library_symbol);
}

static EGL_LIBRARY: LazyLock<Option<EGLLibraryWrapper>> = LazyLock::new(|| {
    for soname in [c"libEGL.so.1", c"libEGL.so"] {
        let handle = unsafe { dlopen(soname.as_ptr(), RTLD_LAZY) };
        if !handle.is_null() {
            return Some(EGLLibraryWrapper(handle));
        }
    }
    None
});

struct EGLLibraryWrapper(*mut c_void);

unsafe impl Send for EGLLibraryWrapper {}
unsafe impl Sync for EGLLibraryWrapper {}

fn lookup_library_symbol(symbol_name: &str) -> *const c_void {
    let (Some(library), Ok(symbol_name)) = (EGL_LIBRARY.as_ref(), CString::new(symbol_name)) else {
        return ptr::null();
    };
    unsafe { dlsym(library.0, symbol_name.as_ptr()).cast_const() }
}

// The process-wide display every context is created on.
struct SharedDisplay(EGLDisplay);

unsafe impl Send for SharedDisplay {}
unsafe impl Sync for SharedDisplay {}

fn shared_display() -> Result<EGLDisplay, Error> {
    static DISPLAY: OnceLock<Result<SharedDisplay, Error>> = OnceLock::new();
    match DISPLAY.get_or_init(open_display) {
        Ok(display) => Ok(display.0),
        Err(err) => Err(*err),
    }
}

fn open_display() -> Result<SharedDisplay, Error> {
    if EGL_LIBRARY.is_none() {
        error!("Unable to load the libEGL shared object");
        return Err(Error::NoGLLibraryFound);
    }

    EGL_FUNCTIONS.with(|egl| unsafe {
        let display = egl.GetDisplay(ptr::null());
        if display == egl::NO_DISPLAY {
            return Err(Error::DisplayInitializationFailed(WindowingApiError::BadDisplay));
        }

        let (mut major, mut minor) = (0, 0);
        if egl.Initialize(display, &mut major, &mut minor) == egl::FALSE {
            let err = egl.GetError().to_windowing_api_error();
            return Err(Error::DisplayInitializationFailed(err));
        }

        debug!("initialized EGL {}.{}", major, minor);
        Ok(SharedDisplay(display))
    })
}

pub(crate) trait ToWindowingApiError {
    fn to_windowing_api_error(self) -> WindowingApiError;
}

impl ToWindowingApiError for EGLint {
    fn to_windowing_api_error(self) -> WindowingApiError {
        match self as EGLenum {
            egl::NOT_INITIALIZED => WindowingApiError::NotInitialized,
            egl::BAD_ACCESS => WindowingApiError::BadAccess,
            egl::BAD_ALLOC => WindowingApiError::BadAlloc,
            egl::BAD_ATTRIBUTE => WindowingApiError::BadAttribute,
            egl::BAD_CONFIG => WindowingApiError::BadConfig,
            egl::BAD_CONTEXT => WindowingApiError::BadContext,
            egl::BAD_CURRENT_SURFACE => WindowingApiError::BadCurrentSurface,
            egl::BAD_DISPLAY => WindowingApiError::BadDisplay,
            egl::BAD_SURFACE => WindowingApiError::BadSurface,
            egl::BAD_MATCH => WindowingApiError::BadMatch,
            egl::BAD_PARAMETER => WindowingApiError::BadParameter,
            egl::BAD_NATIVE_PIXMAP => WindowingApiError::BadNativePixmap,
            egl::BAD_NATIVE_WINDOW => WindowingApiError::BadNativeWindow,
            egl::CONTEXT_LOST => WindowingApiError::ContextLost,
            _ => WindowingApiError::Failed,
        }
    }
}

/// An EGL context together with the surface it renders to.
pub struct Context {
    egl_display: EGLDisplay,
    egl_config: EGLConfig,
    egl_context: EGLContext,
    egl_surface: EGLSurface,
    srgb: bool,
}

// EGL handles may be used from any thread; binding is serialized by the callers.
unsafe impl Send for Context {}
unsafe impl Sync for Context {}

impl Drop for Context {
    fn drop(&mut self) {
        EGL_FUNCTIONS.with(|egl| unsafe {
            if egl.GetCurrentContext() == self.egl_context {
                egl.MakeCurrent(self.egl_display, egl::NO_SURFACE, egl::NO_SURFACE, egl::NO_CONTEXT);
            }
            if egl.DestroySurface(self.egl_display, self.egl_surface) == egl::FALSE {
                warn!("Failed to destroy an EGL surface: {:?}", egl.GetError().to_windowing_api_error());
            }
            if egl.DestroyContext(self.egl_display, self.egl_context) == egl::FALSE {
                warn!("Failed to destroy an EGL context: {:?}", egl.GetError().to_windowing_api_error());
            }
        })
    }
}

impl Context {
    #[inline]
    pub fn egl_context(&self) -> EGLContext {
        self.egl_context
    }

    #[inline]
    pub fn egl_surface(&self) -> EGLSurface {
        self.egl_surface
    }

    unsafe fn config_attr(&self, egl: &Egl, attr: EGLenum) -> u32 {
        let mut value = 0;
        if egl.GetConfigAttrib(self.egl_display, self.egl_config, attr as EGLint, &mut value)
            == egl::FALSE
        {
            return 0;
        }
        value.max(0) as u32
    }

    fn load_gl(&self) -> glow::Context {
        unsafe { glow::Context::from_loader_function(|name| self.get_function(name)) }
    }
}

impl PlatformContext for Context {
    #[cfg(not(android))]
    const GL_API: GLApi = GLApi::GL;
    #[cfg(android)]
    const GL_API: GLApi = GLApi::GLES;

    fn new(
        shared: Option<&Context>,
        surface: &SurfaceRequest,
        settings: &ContextSettings,
    ) -> Result<Context, Error> {
        let egl_display = shared_display()?;

        EGL_FUNCTIONS.with(|egl| unsafe {
            // The bound API is per-thread state.
            if egl.BindAPI(RENDERING_API) == egl::FALSE {
                let err = egl.GetError().to_windowing_api_error();
                return Err(Error::ContextCreationFailed(err));
            }

            let egl_config = choose_config(egl, egl_display, surface, settings)?;

            let share_context = shared.map_or(egl::NO_CONTEXT, |shared| shared.egl_context);
            let context_attributes = context_attributes(settings);
            let egl_context = egl.CreateContext(
                egl_display,
                egl_config,
                share_context,
                context_attributes.as_ptr(),
            );
            if egl_context == egl::NO_CONTEXT {
                let err = egl.GetError().to_windowing_api_error();
                return Err(Error::ContextCreationFailed(err));
            }

            match create_surface(egl, egl_display, egl_config, surface, settings.srgb_capable) {
                Ok(egl_surface) => Ok(Context {
                    egl_display,
                    egl_config,
                    egl_context,
                    egl_surface,
                    srgb: settings.srgb_capable,
                }),
                Err(err) => {
                    egl.DestroyContext(egl_display, egl_context);
                    Err(err)
                }
            }
        })
    }

    fn initialize(&self, requested: &ContextSettings) -> Result<ContextSettings, Error> {
        let is_current = EGL_FUNCTIONS.with(|egl| unsafe { egl.GetCurrentContext() == self.egl_context });
        if !is_current {
            return Err(Error::NoCurrentContext);
        }

        if self.get_function("glGetString").is_null() {
            return Err(Error::GLFunctionNotFound);
        }
        let gl = self.load_gl();
        let reported = gl.version();
        if reported.major == 0 {
            return Err(Error::ContextInitializationFailed);
        }
        let version = GLVersion::new(reported.major as u8, reported.minor as u8);

        let mut flags = ContextAttributeFlags::empty();
        unsafe {
            if !reported.is_embedded && version >= GLVersion::new(3, 2) {
                let profile = gl.get_parameter_i32(glow::CONTEXT_PROFILE_MASK) as u32;
                flags.set(ContextAttributeFlags::CORE, profile & glow::CONTEXT_CORE_PROFILE_BIT != 0);
            }
            if version >= GLVersion::new(3, 0) {
                let context_flags = gl.get_parameter_i32(glow::CONTEXT_FLAGS) as u32;
                flags.set(
                    ContextAttributeFlags::DEBUG,
                    context_flags & glow::CONTEXT_FLAG_DEBUG_BIT != 0,
                );
            }
        }

        let achieved = EGL_FUNCTIONS.with(|egl| unsafe {
            ContextSettings {
                depth_bits: self.config_attr(egl, egl::DEPTH_SIZE),
                stencil_bits: self.config_attr(egl, egl::STENCIL_SIZE),
                antialiasing_level: self.config_attr(egl, egl::SAMPLES),
                version,
                flags,
                srgb_capable: self.srgb,
            }
        });
        trace!("context initialized: requested {}, got {}", requested, achieved);
        Ok(achieved)
    }

    fn make_current(&self, current: bool) -> Result<(), Error> {
        EGL_FUNCTIONS.with(|egl| unsafe {
            let result = if current {
                egl.MakeCurrent(self.egl_display, self.egl_surface, self.egl_surface, self.egl_context)
            } else {
                egl.MakeCurrent(self.egl_display, egl::NO_SURFACE, egl::NO_SURFACE, egl::NO_CONTEXT)
            };
            if result == egl::FALSE {
                let err = egl.GetError().to_windowing_api_error();
                return Err(Error::MakeCurrentFailed(err));
            }
            Ok(())
        })
    }

    fn get_function(&self, name: &str) -> *const c_void {
        let Ok(name) = CString::new(name) else {
            return ptr::null();
        };
        EGL_FUNCTIONS.with(|egl| unsafe {
            egl.GetProcAddress(name.as_ptr() as *const c_char) as *const c_void
        })
    }

    fn extensions(&self) -> Vec<String> {
        let gl = self.load_gl();
        let mut extensions: Vec<String> = gl.supported_extensions().iter().cloned().collect();
        extensions.sort();
        extensions
    }
}

unsafe fn choose_config(
    egl: &Egl,
    egl_display: EGLDisplay,
    surface: &SurfaceRequest,
    settings: &ContextSettings,
) -> Result<EGLConfig, Error> {
    let (surface_type, (red, green, blue, alpha)) = match *surface {
        #[cfg(feature = "sm-raw-window-handle-06")]
        SurfaceRequest::Window { bits_per_pixel, .. } => {
            let channels = match bits_per_pixel {
                16 => (5, 6, 5, 0),
                24 => (8, 8, 8, 0),
                32 => (8, 8, 8, 8),
                _ => return Err(Error::NoPixelFormatFound),
            };
            (egl::WINDOW_BIT, channels)
        }
        _ => (egl::PBUFFER_BIT, (8, 8, 8, 8)),
    };

    let mut attributes = vec![
        egl::SURFACE_TYPE as EGLint,    surface_type as EGLint,
        egl::RENDERABLE_TYPE as EGLint, RENDERABLE_TYPE,
        egl::RED_SIZE as EGLint,        red,
        egl::GREEN_SIZE as EGLint,      green,
        egl::BLUE_SIZE as EGLint,       blue,
        egl::ALPHA_SIZE as EGLint,      alpha,
        egl::DEPTH_SIZE as EGLint,      settings.depth_bits as EGLint,
        egl::STENCIL_SIZE as EGLint,    settings.stencil_bits as EGLint,
    ];
    if settings.antialiasing_level > 0 {
        attributes.extend_from_slice(&[
            egl::SAMPLE_BUFFERS as EGLint,  1,
            egl::SAMPLES as EGLint,         settings.antialiasing_level as EGLint,
        ]);
    }
    attributes.extend_from_slice(&[egl::NONE as EGLint, 0]);

    let (mut egl_config, mut config_count) = (ptr::null(), 0);
    let result = egl.ChooseConfig(egl_display, attributes.as_ptr(), &mut egl_config, 1, &mut config_count);
    if result == egl::FALSE {
        let err = egl.GetError().to_windowing_api_error();
        return Err(Error::PixelFormatSelectionFailed(err));
    }
    if config_count == 0 {
        return Err(Error::NoPixelFormatFound);
    }
    Ok(egl_config)
}

fn context_attributes(settings: &ContextSettings) -> Vec<EGLint> {
    let mut attributes = vec![];

    if cfg!(android) {
        let major = if settings.version.major >= 3 { 3 } else { 2 };
        attributes.extend_from_slice(&[egl::CONTEXT_MAJOR_VERSION as EGLint, major]);
    } else {
        attributes.extend_from_slice(&[
            egl::CONTEXT_MAJOR_VERSION as EGLint, settings.version.major as EGLint,
            egl::CONTEXT_MINOR_VERSION as EGLint, settings.version.minor as EGLint,
        ]);
        // Profiles only exist from 3.2 onwards.
        if settings.version >= GLVersion::new(3, 2) {
            let profile = if settings.flags.contains(ContextAttributeFlags::CORE) {
                egl::CONTEXT_OPENGL_CORE_PROFILE_BIT
            } else {
                egl::CONTEXT_OPENGL_COMPATIBILITY_PROFILE_BIT
            };
            attributes.extend_from_slice(&[egl::CONTEXT_OPENGL_PROFILE_MASK as EGLint, profile as EGLint]);
        }
    }

    if settings.flags.contains(ContextAttributeFlags::DEBUG) {
        attributes.extend_from_slice(&[egl::CONTEXT_OPENGL_DEBUG as EGLint, egl::TRUE as EGLint]);
    }

    attributes.extend_from_slice(&[egl::NONE as EGLint, 0]);
    attributes
}

unsafe fn create_surface(
    egl: &Egl,
    egl_display: EGLDisplay,
    egl_config: EGLConfig,
    surface: &SurfaceRequest,
    srgb: bool,
) -> Result<EGLSurface, Error> {
    let mut attributes = vec![];
    let mut pbuffer_size = (HEADLESS_PBUFFER_SIZE, HEADLESS_PBUFFER_SIZE);
    match *surface {
        SurfaceRequest::Headless => {}
        SurfaceRequest::Offscreen { size } => {
            if size.width == 0 || size.height == 0 {
                return Err(Error::SurfaceCreationFailed(WindowingApiError::BadParameter));
            }
            pbuffer_size = (size.width as EGLint, size.height as EGLint);
        }
        #[cfg(feature = "sm-raw-window-handle-06")]
        SurfaceRequest::Window { .. } => {}
    }
    if srgb {
        attributes.extend_from_slice(&[egl::GL_COLORSPACE as EGLint, egl::GL_COLORSPACE_SRGB as EGLint]);
    }

    let egl_surface = match *surface {
        #[cfg(feature = "sm-raw-window-handle-06")]
        SurfaceRequest::Window { window, .. } => {
            attributes.extend_from_slice(&[egl::NONE as EGLint, 0]);
            let native_window = native_window(window)?;
            egl.CreateWindowSurface(egl_display, egl_config, native_window, attributes.as_ptr())
        }
        _ => {
            attributes.extend_from_slice(&[
                egl::WIDTH as EGLint,   pbuffer_size.0,
                egl::HEIGHT as EGLint,  pbuffer_size.1,
                egl::NONE as EGLint,    0,
            ]);
            egl.CreatePbufferSurface(egl_display, egl_config, attributes.as_ptr())
        }
    };

    if egl_surface == egl::NO_SURFACE {
        let err = egl.GetError().to_windowing_api_error();
        return Err(Error::SurfaceCreationFailed(err));
    }
    Ok(egl_surface)
}

#[cfg(feature = "sm-raw-window-handle-06")]
fn native_window(window: RawWindowHandle) -> Result<egl::EGLNativeWindowType, Error> {
    match window {
        RawWindowHandle::Xlib(handle) if handle.window != 0 => {
            Ok(handle.window as usize as egl::EGLNativeWindowType)
        }
        RawWindowHandle::Xcb(handle) => Ok(handle.window.get() as usize as egl::EGLNativeWindowType),
        RawWindowHandle::AndroidNdk(handle) => Ok(handle.a_native_window.as_ptr().cast_const()),
        RawWindowHandle::Xlib(_) => Err(Error::InvalidNativeWidget),
        _ => Err(Error::IncompatibleNativeWidget),
    }
}
