//! # Identifiers
//!
//! Non-owning handles into the registry. A surface refers to the instances it
//! draws through an `InstanceId`, never through a pointer, so there are no
//! reference cycles between instances and surfaces.

use std::fmt;

/// Identifier of a simulation instance.
///
/// Equal to the instance's position in the registry; the registry is
/// append-only, so an id stays valid for the whole run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct InstanceId(pub u32);

impl InstanceId {
    /// Returns the registry index of this instance.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance#{}", self.0)
    }
}

/// Identifier of a window surface in the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct SurfaceId(pub u32);

impl SurfaceId {
    /// Returns the registry index of this surface.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}
