// sharectx/src/tests.rs
//
//! Unit tests.

use crate::platform::headless::{self, Drawable};
use crate::{active_context, active_context_id, has_active_context, transient_lock_depth};
use crate::{ContextAttributeFlags, ContextID, ContextOwner, ContextSettings, Error, GLApi, GLVersion};
use crate::{GraphicsContext, PlatformContext, TransientContextLock, WindowingApiError};

use euclid::default::Size2D;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

type Graphics = GraphicsContext<headless::Context>;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn new_graphics() -> Graphics {
    init_logging();
    Graphics::new().unwrap()
}

// Records which context was current when it was released.
struct Tracker {
    releases: Arc<AtomicUsize>,
    released_in: Arc<Mutex<Vec<ContextID>>>,
}

impl Tracker {
    fn new(releases: &Arc<AtomicUsize>, released_in: &Arc<Mutex<Vec<ContextID>>>) -> Arc<Tracker> {
        Arc::new(Tracker { releases: releases.clone(), released_in: released_in.clone() })
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.released_in.lock().unwrap().push(active_context_id());
    }
}

#[test]
fn test_shared_context_starts_inactive() {
    let graphics = new_graphics();
    assert!(!has_active_context());
    assert!(!graphics.shared_context_id().is_none());
    assert!(!graphics.extensions().is_empty());
    assert!(graphics.is_extension_available("GL_KHR_debug"));
    assert!(!graphics.is_extension_available("EXT_foo"));
    assert_eq!(graphics.live_context_count(), 0);
    assert_eq!(graphics.gl_api(), GLApi::GL);
}

#[test]
fn test_nested_transient_locks_make_one_native_call() {
    let graphics = new_graphics();
    let root = graphics.root_platform();
    let (activations, deactivations) = (root.activation_count(), root.deactivation_count());

    {
        let outer = TransientContextLock::new(&graphics);
        assert!(outer.is_outermost());
        assert_eq!(active_context_id(), graphics.shared_context_id());
        let _a = TransientContextLock::new(&graphics);
        let _b = TransientContextLock::new(&graphics);
        let _c = TransientContextLock::new(&graphics);
        let inner = TransientContextLock::new(&graphics);
        assert!(!inner.is_outermost());
        assert_eq!(transient_lock_depth(), 4);
    }

    assert_eq!(transient_lock_depth(), 0);
    assert!(!has_active_context());
    assert_eq!(root.activation_count(), activations + 1);
    assert_eq!(root.deactivation_count(), deactivations + 1);
}

#[test]
fn test_transient_lock_keeps_the_current_context() {
    let graphics = new_graphics();
    let context = graphics.create_context().unwrap();
    context.set_active(true).unwrap();
    let root_activations = graphics.root_platform().activation_count();

    {
        let lock = TransientContextLock::new(&graphics);
        assert!(!lock.is_outermost());
        assert_eq!(active_context_id(), context.id());
    }

    assert_eq!(active_context_id(), context.id());
    assert_eq!(graphics.root_platform().activation_count(), root_activations);
    context.set_active(false).unwrap();
}

#[test]
fn test_destroying_the_active_context_rebinds_the_shared_context() {
    let graphics = new_graphics();
    let context = graphics.create_context().unwrap();
    let id = context.id();
    assert!(id > graphics.shared_context_id());
    assert_eq!(graphics.live_context_count(), 1);

    context.set_active(true).unwrap();
    assert!(context.is_active());
    drop(context);

    assert_eq!(active_context_id(), graphics.shared_context_id());
    assert_ne!(active_context_id(), id);
    assert_eq!(graphics.live_context_count(), 0);
    graphics.set_active(false).unwrap();
}

#[test]
fn test_destroying_an_inactive_context_leaves_the_binding_alone() {
    let graphics = new_graphics();
    let first = graphics.create_context().unwrap();
    let second = graphics.create_context().unwrap();
    first.set_active(true).unwrap();
    drop(second);
    assert_eq!(active_context_id(), first.id());
    first.set_active(false).unwrap();
}

#[test]
fn test_siblings_share_the_namespace_of_the_shared_context() {
    let graphics = new_graphics();
    let context = graphics
        .create_offscreen_context(&ContextSettings::default(), Size2D::new(64, 64))
        .unwrap();
    context.set_active(true).unwrap();

    assert!(context.platform_context().shares_namespace_with(graphics.root_platform()));
    assert_eq!(context.platform_context().extensions(), graphics.extensions());
    assert_eq!(
        graphics.is_extension_available("EXT_foo"),
        context.platform_context().extensions().iter().any(|name| name == "EXT_foo")
    );
    context.set_active(false).unwrap();
}

#[test]
fn test_context_creation_restores_the_previous_binding() {
    let graphics = new_graphics();

    let first = graphics.create_context().unwrap();
    assert!(!has_active_context());
    assert!(!first.is_active());

    first.set_active(true).unwrap();
    let second = graphics.create_context().unwrap();
    assert_eq!(active_context_id(), first.id());
    assert!(!second.is_active());

    graphics.set_active(true).unwrap();
    let third = graphics.create_context().unwrap();
    assert_eq!(active_context_id(), graphics.shared_context_id());
    assert!(!third.platform_context().is_current());
    graphics.set_active(false).unwrap();
}

#[test]
fn test_switching_contexts_goes_through_deactivation() {
    let graphics = new_graphics();
    let first = graphics.create_context().unwrap();
    let second = graphics.create_context().unwrap();

    first.set_active(true).unwrap();
    let deactivations = first.platform_context().deactivation_count();
    second.set_active(true).unwrap();

    assert_eq!(active_context_id(), second.id());
    assert!(!first.is_active());
    assert_eq!(first.platform_context().deactivation_count(), deactivations + 1);
    second.set_active(false).unwrap();
}

#[test]
fn test_unshared_objects_are_released_with_their_context() {
    let graphics = new_graphics();
    let releases = Arc::new(AtomicUsize::new(0));
    let released_in = Arc::new(Mutex::new(vec![]));

    let context = graphics.create_context().unwrap();
    let id = context.id();
    context.set_active(true).unwrap();
    graphics.register_unshared_object(Tracker::new(&releases, &released_in));
    graphics.register_unshared_object(Tracker::new(&releases, &released_in));
    assert_eq!(graphics.unshared_object_count(id), 2);
    context.set_active(false).unwrap();

    drop(context);

    assert_eq!(releases.load(Ordering::SeqCst), 2);
    assert_eq!(graphics.unshared_object_count(id), 0);
    assert_eq!(*released_in.lock().unwrap(), vec![id, id]);
    assert!(!has_active_context());
}

#[test]
fn test_cleanup_restores_the_context_that_was_active() {
    let graphics = new_graphics();
    let releases = Arc::new(AtomicUsize::new(0));
    let released_in = Arc::new(Mutex::new(vec![]));

    let doomed = graphics.create_context().unwrap();
    let survivor = graphics.create_context().unwrap();
    doomed.set_active(true).unwrap();
    graphics.register_unshared_object(Tracker::new(&releases, &released_in));

    survivor.set_active(true).unwrap();
    let doomed_id = doomed.id();
    drop(doomed);

    assert_eq!(releases.load(Ordering::SeqCst), 1);
    assert_eq!(*released_in.lock().unwrap(), vec![doomed_id]);
    assert_eq!(active_context_id(), survivor.id());
    survivor.set_active(false).unwrap();
}

#[test]
fn test_destroying_the_active_context_with_unshared_objects() {
    let graphics = new_graphics();
    let releases = Arc::new(AtomicUsize::new(0));
    let released_in = Arc::new(Mutex::new(vec![]));

    let context = graphics.create_context().unwrap();
    let id = context.id();
    context.set_active(true).unwrap();
    graphics.register_unshared_object(Tracker::new(&releases, &released_in));
    drop(context);

    assert_eq!(*released_in.lock().unwrap(), vec![id]);
    assert_eq!(active_context_id(), graphics.shared_context_id());
    graphics.set_active(false).unwrap();
}

#[test]
fn test_unregistering_releases_the_object() {
    let graphics = new_graphics();
    let releases = Arc::new(AtomicUsize::new(0));
    let released_in = Arc::new(Mutex::new(vec![]));

    let context = graphics.create_context().unwrap();
    let other = graphics.create_context().unwrap();
    context.set_active(true).unwrap();

    let kept = Tracker::new(&releases, &released_in);
    let dropped = Tracker::new(&releases, &released_in);
    graphics.register_unshared_object(kept.clone());
    graphics.register_unshared_object(dropped.clone());

    // Only objects registered against the current context can be unregistered.
    other.set_active(true).unwrap();
    assert!(!graphics.unregister_unshared_object(&dropped));
    context.set_active(true).unwrap();

    assert!(graphics.unregister_unshared_object(&dropped));
    assert!(!graphics.unregister_unshared_object(&dropped));
    drop(dropped);
    assert_eq!(releases.load(Ordering::SeqCst), 1);
    assert_eq!(graphics.unshared_object_count(context.id()), 1);

    context.set_active(false).unwrap();
    drop(context);
    drop(kept);
    assert_eq!(releases.load(Ordering::SeqCst), 2);
}

#[test]
#[should_panic]
fn test_registering_without_an_active_context_panics() {
    let graphics = new_graphics();
    graphics.register_unshared_object(Arc::new(0u32));
}

#[test]
#[should_panic]
fn test_dropping_the_shared_context_while_a_sibling_is_active_panics() {
    let graphics = new_graphics();
    let context = graphics.create_context().unwrap();
    context.set_active(true).unwrap();
    std::mem::forget(context);
    drop(graphics);
}

#[test]
fn test_threads_have_independent_bindings() {
    let graphics = new_graphics();
    let barrier = Barrier::new(2);

    let ids: Vec<ContextID> = thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                scope.spawn(|| {
                    let context = graphics
                        .create_offscreen_context(&ContextSettings::default(), Size2D::new(16, 16))
                        .unwrap();
                    context.set_active(true).unwrap();
                    barrier.wait();
                    assert_eq!(active_context_id(), context.id());
                    barrier.wait();
                    context.set_active(false).unwrap();
                    context.id()
                })
            })
            .collect();
        handles.into_iter().map(|handle| handle.join().unwrap()).collect()
    });

    assert_ne!(ids[0], ids[1]);
    assert!(!has_active_context());
    assert_eq!(graphics.live_context_count(), 0);
}

#[test]
fn test_settings_shortfall_still_creates_the_context() {
    let graphics = new_graphics();
    let requested = ContextSettings {
        depth_bits: 32,
        stencil_bits: 16,
        antialiasing_level: 16,
        version: GLVersion::new(3, 0),
        flags: ContextAttributeFlags::CORE,
        srgb_capable: true,
    };
    let context = graphics.create_offscreen_context(&requested, Size2D::new(8, 8)).unwrap();

    let achieved = context.settings();
    assert_eq!(achieved.depth_bits, 24);
    assert_eq!(achieved.stencil_bits, 8);
    assert_eq!(achieved.antialiasing_level, 8);
    assert!(!achieved.flags.contains(ContextAttributeFlags::CORE));
    assert!(achieved.srgb_capable);
    assert!(!achieved.satisfies(&requested));
}

#[test]
fn test_context_creation_failures() {
    let graphics = new_graphics();

    let too_new = ContextSettings { version: GLVersion::new(5, 0), ..Default::default() };
    match graphics.create_offscreen_context(&too_new, Size2D::new(8, 8)) {
        Err(Error::ContextCreationFailed(WindowingApiError::BadMatch)) => {}
        _ => panic!(),
    }

    match graphics.create_offscreen_context(&ContextSettings::default(), Size2D::new(0, 8)) {
        Err(Error::SurfaceCreationFailed(WindowingApiError::BadParameter)) => {}
        _ => panic!(),
    }

    assert_eq!(graphics.live_context_count(), 0);
    assert!(!has_active_context());
}

#[cfg(feature = "sm-raw-window-handle-06")]
#[test]
fn test_window_contexts() {
    use rwh_06::{HandleError, HasWindowHandle, RawWindowHandle, WindowHandle, XlibWindowHandle};

    struct FakeWindow(RawWindowHandle);

    impl HasWindowHandle for FakeWindow {
        fn window_handle(&self) -> Result<WindowHandle<'_>, HandleError> {
            Ok(unsafe { WindowHandle::borrow_raw(self.0) })
        }
    }

    let graphics = new_graphics();
    let window = FakeWindow(RawWindowHandle::Xlib(XlibWindowHandle::new(42)));
    let settings = ContextSettings::default();

    let context = graphics.create_window_context(&settings, &window, 32).unwrap();
    assert_eq!(context.platform_context().drawable(), Drawable::Window { bits_per_pixel: 32 });
    match *context.owner() {
        ContextOwner::Window { bits_per_pixel: 32, .. } => {}
        _ => panic!(),
    }

    match graphics.create_window_context(&settings, &window, 12) {
        Err(Error::NoPixelFormatFound) => {}
        _ => panic!(),
    };
}

#[test]
fn test_offscreen_and_headless_contexts() {
    let graphics = new_graphics();
    let size = Size2D::new(64, 32);
    let offscreen = graphics.create_offscreen_context(&ContextSettings::default(), size).unwrap();
    assert_eq!(offscreen.platform_context().drawable(), Drawable::Pbuffer { size });
    match *offscreen.owner() {
        ContextOwner::Offscreen { size: owner_size } => assert_eq!(owner_size, size),
        _ => panic!(),
    }

    let headless = graphics.create_context().unwrap();
    assert_eq!(headless.platform_context().drawable(), Drawable::None);
    match *headless.owner() {
        ContextOwner::Headless => {}
        _ => panic!(),
    };
}

#[test]
fn test_failed_activation_is_reported() {
    let graphics = new_graphics();
    let context = graphics.create_context().unwrap();

    context.platform_context().set_make_current_failure(true);
    assert_eq!(
        context.set_active(true),
        Err(Error::MakeCurrentFailed(WindowingApiError::Failed))
    );
    assert!(!context.is_active());
    assert!(!has_active_context());

    context.platform_context().set_make_current_failure(false);
    context.set_active(true).unwrap();
    assert!(context.is_active());
    context.set_active(false).unwrap();
}

// Switching from the root to a sibling deactivates the root, so it has to wait for whoever holds
// the manager lock.
#[test]
fn test_sibling_activation_waits_for_the_manager_lock() {
    let graphics = new_graphics();
    let doomed = graphics.create_context().unwrap();
    let other = graphics.create_context().unwrap();

    doomed.set_active(true).unwrap();
    drop(doomed);
    assert_eq!(active_context_id(), graphics.shared_context_id());

    let before = graphics.root_platform().deactivation_count();
    let barrier = Barrier::new(2);
    thread::scope(|scope| {
        let holder = scope.spawn(|| {
            let _lock = graphics.creation_lock();
            barrier.wait();
            thread::sleep(Duration::from_millis(50));
            graphics.root_platform().deactivation_count()
        });

        barrier.wait();
        other.set_active(true).unwrap();
        assert_eq!(holder.join().unwrap(), before);
    });

    assert_eq!(graphics.root_platform().deactivation_count(), before + 1);
    assert!(other.is_active());
    other.set_active(false).unwrap();
}

#[test]
fn test_shared_context_guard() {
    let graphics = new_graphics();
    {
        let guard = graphics.lock();
        assert_eq!(active_context_id(), graphics.shared_context_id());
        assert!(guard.platform_context().is_current());
    }
    assert!(!has_active_context());
}

#[test]
fn test_function_lookup() {
    let graphics = new_graphics();
    assert!(!graphics.get_function("glGetString").is_null());
    assert!(graphics.get_function("glNotAFunction").is_null());

    let context = graphics.create_context().unwrap();
    assert_eq!(context.get_function("glGetString"), graphics.get_function("glGetString"));

    context.set_active(true).unwrap();
    let active = active_context().unwrap();
    assert_eq!(active.id(), context.id());
    assert!(!active.get_function("glFlush").is_null());
    drop(active);
    context.set_active(false).unwrap();
    assert!(active_context().is_none());
}

// Needs a working EGL driver with pbuffer support.
#[cfg(egl_backend)]
#[test]
#[ignore]
#[serial_test::serial]
fn test_egl_context_lifecycle() {
    use crate::platform::egl;

    init_logging();
    let graphics = GraphicsContext::<egl::Context>::new().unwrap();
    assert!(!graphics.get_function("glGetString").is_null());

    let context = graphics
        .create_offscreen_context(&ContextSettings::default(), Size2D::new(16, 16))
        .unwrap();
    context.set_active(true).unwrap();
    assert_eq!(active_context_id(), context.id());
    drop(context);
    assert_eq!(active_context_id(), graphics.shared_context_id());
    graphics.set_active(false).unwrap();
}
