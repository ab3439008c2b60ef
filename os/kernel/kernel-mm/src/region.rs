//! Byte ranges inside a VMA and the per-VMA free-region list.

use alloc::collections::VecDeque;
use core::fmt;
use kernel_memory_addresses::VirtualAddress;

/// A half-open byte range `[start, end)`.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Region {
    pub start: VirtualAddress,
    pub end: VirtualAddress,
}

impl Region {
    #[inline]
    #[must_use]
    pub const fn new(start: VirtualAddress, end: VirtualAddress) -> Self {
        debug_assert!(start.as_u64() <= end.as_u64());
        Self { start, end }
    }

    /// Length in bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.end.as_u64() - self.start.as_u64()
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}, {:#x})", self.start.as_u64(), self.end.as_u64())
    }
}

/// Free regions of one VMA, most recently released first.
///
/// Adjacent regions are never merged.
#[derive(Clone, Debug, Default)]
pub struct FreeList {
    regions: VecDeque<Region>,
}

impl FreeList {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            regions: VecDeque::new(),
        }
    }

    /// Put a released region at the head of the list.
    pub fn push(&mut self, region: Region) {
        if !region.is_empty() {
            self.regions.push_front(region);
        }
    }

    /// Carve `size` bytes from the head of the first region that can hold them.
    ///
    /// An exact fit removes the region from the list; otherwise the region
    /// shrinks from the front.
    pub fn take_first_fit(&mut self, size: u64) -> Option<Region> {
        let index = self.regions.iter().position(|r| r.len() >= size)?;
        let region = &mut self.regions[index];
        let carved = Region::new(region.start, region.start + size);
        if region.len() == size {
            self.regions.remove(index);
        } else {
            region.start = carved.end;
        }
        Some(carved)
    }

    /// Sum of all free bytes.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.regions.iter().map(Region::len).sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }
}
