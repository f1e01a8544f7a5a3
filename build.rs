// sharectx/build.rs
//
//! The `sharectx` build script.

use cfg_aliases::cfg_aliases;
use gl_generator::{Api, Fallbacks, Profile, Registry, StructGenerator};
use std::env;
use std::fs::File;
use std::path::PathBuf;

fn main() {
    // Setup aliases for #[cfg] checks
    cfg_aliases! {
        // Platforms
        android: { target_os = "android" },
        linux: { all(unix, not(any(target_os = "macos", target_os = "ios", android))) },

        // Backends
        egl_backend: { any(android, linux) },
        egl_default: { all(egl_backend, not(feature = "sm-headless-default")) },
    }

    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap();
    let target_family = env::var("CARGO_CFG_TARGET_FAMILY").ok();
    let dest = PathBuf::from(&env::var("OUT_DIR").unwrap());

    // Generate EGL bindings.
    let apple = target_os == "macos" || target_os == "ios";
    if target_os == "android" || (!apple && target_family.as_deref() == Some("unix")) {
        let mut file = File::create(dest.join("egl_bindings.rs")).unwrap();
        let registry = Registry::new(Api::Egl, (1, 5), Profile::Core, Fallbacks::All, []);
        registry.write_bindings(StructGenerator, &mut file).unwrap();
    }
}
