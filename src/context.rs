// sharectx/src/context.rs
//
//! Declarations common to all contexts: identifiers and creation settings.

use crate::info::GLVersion;

use bitflags::bitflags;
use std::fmt::{self, Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

/// A process-unique identifier for a context.
///
/// Identifiers are handed out in strictly increasing order starting at 1 and are never reused.
/// The value 0 is reserved to mean "no context".
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextID(pub u64);

impl ContextID {
    /// The identifier reported when no context is active.
    pub const NONE: ContextID = ContextID(0);

    #[inline]
    pub fn is_none(self) -> bool {
        self == ContextID::NONE
    }
}

impl Display for ContextID {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Returns the next unused context identifier.
///
/// This is a single atomic increment; it never blocks and never hands out the same value twice.
pub fn allocate_context_id() -> ContextID {
    ContextID(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed))
}

bitflags! {
    /// Profile and debug flags requested for a context.
    ///
    /// No flags selects the default (compatibility) profile.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ContextAttributeFlags: u32 {
        const CORE  = 0x01;
        const DEBUG = 0x04;
    }
}

/// The attributes requested when creating a context, or achieved once it is initialized.
///
/// Drivers negotiate these on a best-effort basis, so the achieved settings of a context may
/// differ from the requested ones.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContextSettings {
    pub depth_bits: u32,
    pub stencil_bits: u32,
    pub antialiasing_level: u32,
    pub version: GLVersion,
    pub flags: ContextAttributeFlags,
    pub srgb_capable: bool,
}

impl Default for ContextSettings {
    fn default() -> ContextSettings {
        ContextSettings {
            depth_bits: 0,
            stencil_bits: 0,
            antialiasing_level: 0,
            version: GLVersion::new(1, 1),
            flags: ContextAttributeFlags::empty(),
            srgb_capable: false,
        }
    }
}

impl ContextSettings {
    /// Returns true if these (achieved) settings fully meet the `requested` ones.
    pub fn satisfies(&self, requested: &ContextSettings) -> bool {
        self.flags == requested.flags
            && self.version >= requested.version
            && self.depth_bits >= requested.depth_bits
            && self.stencil_bits >= requested.stencil_bits
            && self.antialiasing_level >= requested.antialiasing_level
            && (self.srgb_capable || !requested.srgb_capable)
    }

    /// Logs a warning if these achieved settings fall short of `requested`.
    ///
    /// Returns whether the request was fully met.
    pub(crate) fn check(&self, requested: &ContextSettings) -> bool {
        if self.satisfies(requested) {
            return true;
        }
        warn!(
            "The created OpenGL context does not fully meet the settings that were requested: \
             requested {}, returned {}",
            requested, self
        );
        false
    }
}

impl Display for ContextSettings {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "version = {}, depth bits = {}, stencil bits = {}, antialiasing level = {}, \
             core = {}, debug = {}, sRGB = {}",
            self.version,
            self.depth_bits,
            self.stencil_bits,
            self.antialiasing_level,
            self.flags.contains(ContextAttributeFlags::CORE),
            self.flags.contains(ContextAttributeFlags::DEBUG),
            self.srgb_capable
        )
    }
}
