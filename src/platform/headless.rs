// sharectx/src/platform/headless.rs
//
//! A software backend that emulates a native windowing API without touching the GPU.
//!
//! It follows the EGL make-current contract: a context may be current on at most one thread,
//! each thread has at most one current context, and binding a different context replaces the
//! old binding directly. Contexts created with a share context join its object namespace, which
//! carries the extension list and the emulated entry points.
//!
//! This is the default backend on targets without EGL and the one the test suite runs against.

use crate::platform::{PlatformContext, SurfaceRequest};
use crate::{ContextAttributeFlags, ContextSettings, Error, GLApi, GLVersion, WindowingApiError};

use euclid::default::Size2D;
use fnv::FnvHashMap;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::ffi::{c_char, CStr, CString};
use std::mem;
use std::os::raw::{c_int, c_uint, c_void};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock};
use std::thread::{self, ThreadId};

const HIGHEST_VERSION: GLVersion = GLVersion::new(4, 6);
const CORE_PROFILE_MIN_VERSION: GLVersion = GLVersion::new(3, 2);
// Versions below this have no indexed extension queries.
const INDEXED_QUERY_MIN_VERSION: GLVersion = GLVersion::new(3, 0);
const MAX_DEPTH_BITS: u32 = 24;
const MAX_STENCIL_BITS: u32 = 8;
const MAX_ANTIALIASING_LEVEL: u32 = 8;

static DEFAULT_EXTENSIONS: [&str; 6] = [
    "GL_ARB_framebuffer_object",
    "GL_ARB_texture_non_power_of_two",
    "GL_EXT_blend_minmax",
    "GL_EXT_framebuffer_blit",
    "GL_EXT_texture_sRGB",
    "GL_KHR_debug",
];

const GL_NO_ERROR: c_uint = 0;
const GL_INVALID_ENUM: c_uint = 0x0500;
const GL_INVALID_VALUE: c_uint = 0x0501;
const GL_INVALID_OPERATION: c_uint = 0x0502;
const GL_VENDOR: c_uint = 0x1f00;
const GL_RENDERER: c_uint = 0x1f01;
const GL_VERSION: c_uint = 0x1f02;
const GL_EXTENSIONS: c_uint = 0x1f03;
const GL_MAJOR_VERSION: c_uint = 0x821b;
const GL_MINOR_VERSION: c_uint = 0x821c;
const GL_NUM_EXTENSIONS: c_uint = 0x821d;

static NEXT_NATIVE_HANDLE: AtomicUsize = AtomicUsize::new(1);

thread_local! {
    static CURRENT_NATIVE_CONTEXT: RefCell<Option<Arc<NativeState>>> = const { RefCell::new(None) };
}

/// The state shared by every context of one object namespace.
struct Namespace {
    extensions: Vec<CString>,
    vendor: CString,
    renderer: CString,
    version_string: CString,
    extension_string: CString,
    last_error: Mutex<c_uint>,
}

impl Namespace {
    fn new() -> Namespace {
        Namespace {
            vendor: CString::new("sharectx").unwrap(),
            renderer: CString::new("sharectx headless").unwrap(),
            version_string: CString::new(format!("{} sharectx", HIGHEST_VERSION)).unwrap(),
            extension_string: CString::new(DEFAULT_EXTENSIONS.join(" ")).unwrap(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|name| CString::new(*name).unwrap()).collect(),
            last_error: Mutex::new(GL_NO_ERROR),
        }
    }

    fn set_error(&self, error: c_uint) {
        let mut last_error = self.last_error.lock();
        if *last_error == GL_NO_ERROR {
            *last_error = error;
        }
    }
}

/// Per-native-context state, shared with the thread it is current on.
struct NativeState {
    handle: usize,
    namespace: Arc<Namespace>,
    current_thread: Mutex<Option<ThreadId>>,
    // What the emulated driver reports through `glGetIntegerv`.
    version: Mutex<GLVersion>,
    destroyed: AtomicBool,
    fail_make_current: AtomicBool,
    activations: AtomicUsize,
    deactivations: AtomicUsize,
}

/// What an emulated context renders to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Drawable {
    None,
    Window { bits_per_pixel: u32 },
    Pbuffer { size: Size2D<u32> },
}

/// An emulated native context.
pub struct Context {
    state: Arc<NativeState>,
    drawable: Drawable,
}

impl Drop for Context {
    fn drop(&mut self) {
        self.state.destroyed.store(true, Ordering::SeqCst);
        let _ = CURRENT_NATIVE_CONTEXT.try_with(|current| {
            let mut current = current.borrow_mut();
            if current.as_ref().map_or(false, |state| state.handle == self.state.handle) {
                *current = None;
            }
        });
        trace!("destroyed headless native context {}", self.state.handle);
    }
}

impl Context {
    /// Returns the native handle of this context. Handles are unique within the process.
    #[inline]
    pub fn native_handle(&self) -> usize {
        self.state.handle
    }

    #[inline]
    pub fn drawable(&self) -> Drawable {
        self.drawable
    }

    /// Returns true if this context and `other` share one object namespace.
    pub fn shares_namespace_with(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.state.namespace, &other.state.namespace)
    }

    /// Returns true if this context is natively current on the calling thread.
    pub fn is_current(&self) -> bool {
        CURRENT_NATIVE_CONTEXT.with(|current| {
            current.borrow().as_ref().map_or(false, |state| state.handle == self.state.handle)
        })
    }

    /// Makes every subsequent native make-current on this context fail (or succeed again).
    pub fn set_make_current_failure(&self, fail: bool) {
        self.state.fail_make_current.store(fail, Ordering::SeqCst);
    }

    /// Makes the emulated driver report `version` for this context from now on.
    pub fn set_reported_version(&self, version: GLVersion) {
        *self.state.version.lock() = version;
    }

    /// The number of successful native bind calls issued on this context.
    pub fn activation_count(&self) -> usize {
        self.state.activations.load(Ordering::SeqCst)
    }

    /// The number of successful native unbind calls issued on this context.
    pub fn deactivation_count(&self) -> usize {
        self.state.deactivations.load(Ordering::SeqCst)
    }

    fn bind(&self) -> Result<(), Error> {
        let this_thread = thread::current().id();
        {
            let mut owner = self.state.current_thread.lock();
            match *owner {
                Some(thread) if thread != this_thread => {
                    return Err(Error::MakeCurrentFailed(WindowingApiError::BadAccess));
                }
                _ => *owner = Some(this_thread),
            }
        }

        let previous = CURRENT_NATIVE_CONTEXT.with(|current| current.replace(Some(self.state.clone())));
        if let Some(previous) = previous {
            if previous.handle != self.state.handle {
                *previous.current_thread.lock() = None;
            }
        }

        self.state.activations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn unbind(&self) -> Result<(), Error> {
        // Like `eglMakeCurrent(EGL_NO_CONTEXT)`, this releases whatever is current on this thread.
        if let Some(previous) = CURRENT_NATIVE_CONTEXT.with(|current| current.take()) {
            *previous.current_thread.lock() = None;
        }
        self.state.deactivations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl PlatformContext for Context {
    const GL_API: GLApi = GLApi::GL;

    fn new(
        shared: Option<&Context>,
        surface: &SurfaceRequest,
        settings: &ContextSettings,
    ) -> Result<Context, Error> {
        if settings.version > HIGHEST_VERSION {
            return Err(Error::ContextCreationFailed(WindowingApiError::BadMatch));
        }

        let namespace = match shared {
            Some(shared) if shared.state.destroyed.load(Ordering::SeqCst) => {
                return Err(Error::IncompatibleSharedContext)
            }
            Some(shared) => shared.state.namespace.clone(),
            None => Arc::new(Namespace::new()),
        };

        let drawable = match *surface {
            SurfaceRequest::Headless => Drawable::None,
            #[cfg(feature = "sm-raw-window-handle-06")]
            SurfaceRequest::Window { bits_per_pixel, .. } => match bits_per_pixel {
                16 | 24 | 32 => Drawable::Window { bits_per_pixel },
                _ => return Err(Error::NoPixelFormatFound),
            },
            SurfaceRequest::Offscreen { size } => {
                if size.width == 0 || size.height == 0 {
                    return Err(Error::SurfaceCreationFailed(WindowingApiError::BadParameter));
                }
                Drawable::Pbuffer { size }
            }
        };

        let handle = NEXT_NATIVE_HANDLE.fetch_add(1, Ordering::Relaxed);
        trace!("created headless native context {} ({:?})", handle, drawable);

        Ok(Context {
            state: Arc::new(NativeState {
                handle,
                namespace,
                current_thread: Mutex::new(None),
                version: Mutex::new(HIGHEST_VERSION),
                destroyed: AtomicBool::new(false),
                fail_make_current: AtomicBool::new(false),
                activations: AtomicUsize::new(0),
                deactivations: AtomicUsize::new(0),
            }),
            drawable,
        })
    }

    fn initialize(&self, requested: &ContextSettings) -> Result<ContextSettings, Error> {
        if !self.is_current() {
            return Err(Error::NoCurrentContext);
        }

        // Emulates a driver that hands out its highest compatibility version unless a core
        // profile is asked for, and rounds buffer sizes down to what it supports.
        let mut flags = requested.flags;
        let version = if flags.contains(ContextAttributeFlags::CORE) {
            if requested.version >= CORE_PROFILE_MIN_VERSION {
                requested.version
            } else {
                flags.remove(ContextAttributeFlags::CORE);
                HIGHEST_VERSION
            }
        } else {
            HIGHEST_VERSION
        };

        *self.state.version.lock() = version;
        Ok(ContextSettings {
            depth_bits: requested.depth_bits.min(MAX_DEPTH_BITS),
            stencil_bits: requested.stencil_bits.min(MAX_STENCIL_BITS),
            antialiasing_level: requested.antialiasing_level.min(MAX_ANTIALIASING_LEVEL),
            version,
            flags,
            srgb_capable: requested.srgb_capable,
        })
    }

    fn make_current(&self, current: bool) -> Result<(), Error> {
        if self.state.destroyed.load(Ordering::SeqCst) {
            return Err(Error::MakeCurrentFailed(WindowingApiError::BadContext));
        }
        if self.state.fail_make_current.load(Ordering::SeqCst) {
            return Err(Error::MakeCurrentFailed(WindowingApiError::Failed));
        }
        if current {
            self.bind()
        } else {
            self.unbind()
        }
    }

    fn get_function(&self, name: &str) -> *const c_void {
        ENTRY_POINTS.get(name).map_or(ptr::null(), |&address| address as *const c_void)
    }

    fn extensions(&self) -> Vec<String> {
        let get_error = self.get_function("glGetError");
        let get_integerv = self.get_function("glGetIntegerv");
        let get_string = self.get_function("glGetString");
        if get_error.is_null() || get_integerv.is_null() || get_string.is_null() {
            return vec![];
        }

        unsafe {
            let get_error: GetErrorFn = mem::transmute(get_error);
            let get_integerv: GetIntegervFn = mem::transmute(get_integerv);
            let get_string: GetStringFn = mem::transmute(get_string);

            let mut major_version = 0;
            get_integerv(GL_MAJOR_VERSION, &mut major_version);
            let get_stringi = self.get_function("glGetStringi");

            if get_error() == GL_INVALID_ENUM || major_version == 0 || get_stringi.is_null() {
                // Pre-3.0 contexts only have the space-separated string.
                let extension_string = get_string(GL_EXTENSIONS);
                if extension_string.is_null() {
                    return vec![];
                }
                return CStr::from_ptr(extension_string)
                    .to_string_lossy()
                    .split(' ')
                    .filter(|name| !name.is_empty())
                    .map(str::to_owned)
                    .collect();
            }

            let get_stringi: GetStringiFn = mem::transmute(get_stringi);
            let mut count = 0;
            get_integerv(GL_NUM_EXTENSIONS, &mut count);
            (0..count.max(0) as c_uint)
                .filter_map(|index| {
                    let name = get_stringi(GL_EXTENSIONS, index);
                    (!name.is_null()).then(|| CStr::from_ptr(name).to_string_lossy().into_owned())
                })
                .collect()
        }
    }
}

// Emulated entry points. Like real GL functions they act on whatever is current on the calling
// thread.

type GetErrorFn = extern "C" fn() -> c_uint;
type GetIntegervFn = extern "C" fn(c_uint, *mut c_int);
type GetStringFn = extern "C" fn(c_uint) -> *const c_char;
type GetStringiFn = extern "C" fn(c_uint, c_uint) -> *const c_char;

static ENTRY_POINTS: LazyLock<FnvHashMap<&'static str, usize>> = LazyLock::new(|| {
    let mut entry_points = FnvHashMap::default();
    entry_points.insert("glGetError", gl_get_error as *const () as usize);
    entry_points.insert("glGetString", gl_get_string as *const () as usize);
    entry_points.insert("glGetStringi", gl_get_stringi as *const () as usize);
    entry_points.insert("glGetIntegerv", gl_get_integerv as *const () as usize);
    entry_points.insert("glFlush", gl_flush as *const () as usize);
    entry_points.insert("glFinish", gl_flush as *const () as usize);
    entry_points
});

fn with_current_state<R>(f: impl FnOnce(&NativeState) -> R) -> Option<R> {
    CURRENT_NATIVE_CONTEXT.with(|current| current.borrow().as_deref().map(f))
}

extern "C" fn gl_get_error() -> c_uint {
    with_current_state(|state| mem::replace(&mut *state.namespace.last_error.lock(), GL_NO_ERROR))
        .unwrap_or(GL_INVALID_OPERATION)
}

extern "C" fn gl_get_string(name: c_uint) -> *const c_char {
    with_current_state(|state| {
        let namespace = &state.namespace;
        match name {
            GL_VENDOR => namespace.vendor.as_ptr(),
            GL_RENDERER => namespace.renderer.as_ptr(),
            GL_VERSION => namespace.version_string.as_ptr(),
            GL_EXTENSIONS => namespace.extension_string.as_ptr(),
            _ => {
                namespace.set_error(GL_INVALID_ENUM);
                ptr::null()
            }
        }
    })
    .unwrap_or(ptr::null())
}

extern "C" fn gl_get_stringi(name: c_uint, index: c_uint) -> *const c_char {
    with_current_state(|state| {
        let namespace = &state.namespace;
        if *state.version.lock() < INDEXED_QUERY_MIN_VERSION {
            namespace.set_error(GL_INVALID_OPERATION);
            return ptr::null();
        }
        if name != GL_EXTENSIONS {
            namespace.set_error(GL_INVALID_ENUM);
            return ptr::null();
        }
        match namespace.extensions.get(index as usize) {
            Some(extension) => extension.as_ptr(),
            None => {
                namespace.set_error(GL_INVALID_VALUE);
                ptr::null()
            }
        }
    })
    .unwrap_or(ptr::null())
}

extern "C" fn gl_get_integerv(name: c_uint, data: *mut c_int) {
    if data.is_null() {
        return;
    }
    let value = with_current_state(|state| {
        let namespace = &state.namespace;
        let version = *state.version.lock();
        match name {
            GL_MAJOR_VERSION | GL_MINOR_VERSION | GL_NUM_EXTENSIONS
                if version < INDEXED_QUERY_MIN_VERSION =>
            {
                namespace.set_error(GL_INVALID_ENUM);
                None
            }
            GL_MAJOR_VERSION => Some(version.major as c_int),
            GL_MINOR_VERSION => Some(version.minor as c_int),
            GL_NUM_EXTENSIONS => Some(namespace.extensions.len() as c_int),
            _ => {
                namespace.set_error(GL_INVALID_ENUM);
                None
            }
        }
    });
    if let Some(Some(value)) = value {
        unsafe { *data = value }
    }
}

extern "C" fn gl_flush() {}
