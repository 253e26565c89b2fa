//! Typed, copyable references into a region's registry.

use crate::builder::RegionIndex;
use std::fmt;
use std::marker::PhantomData;

/// Points at one registry entry of type `T`.
///
/// A handle stays valid for as long as the entry lives; once the entry is
/// released every access through the handle fails with `NotFound`, so a
/// state never observes a resource that no longer exists.
pub struct Handle<T> {
    region: RegionIndex,
    serial: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(region: RegionIndex, serial: u64) -> Self {
        Self {
            region,
            serial,
            _marker: PhantomData,
        }
    }

    /// Region owning the entry.
    pub fn region(&self) -> RegionIndex {
        self.region
    }

    pub(crate) fn serial(&self) -> u64 {
        self.serial
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.region == other.region && self.serial == other.serial
    }
}

impl<T> Eq for Handle<T> {}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("type", &std::any::type_name::<T>())
            .field("region", &self.region)
            .field("serial", &self.serial)
            .finish()
    }
}
