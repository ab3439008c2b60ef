//! Virtual memory areas.

use crate::region::{FreeList, Region};
use kernel_memory_addresses::VirtualAddress;

/// A contiguous, growable range of reserved virtual address space.
///
/// ### Invariants
/// - `start <= brk <= end`.
/// - `[start, brk)` is exactly covered by live regions plus the free list.
/// - `[brk, end)` has never been handed out.
#[derive(Clone, Debug)]
pub struct Vma {
    pub(crate) id: usize,
    pub(crate) start: VirtualAddress,
    pub(crate) end: VirtualAddress,
    pub(crate) brk: VirtualAddress,
    pub(crate) free: FreeList,
}

/// Byte accounting of one VMA, as returned by
/// [`AddressSpace::usage`](crate::AddressSpace::usage).
///
/// `live + free + unused == reserved` at all times.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct VmaUsage {
    /// `end - start`.
    pub reserved: u64,
    /// Bytes in live regions.
    pub live: u64,
    /// Bytes on the free-region list.
    pub free: u64,
    /// Bytes between the break and the end.
    pub unused: u64,
}

impl Vma {
    pub(crate) const fn new(id: usize, start: VirtualAddress) -> Self {
        Self {
            id,
            start,
            end: start,
            brk: start,
            free: FreeList::new(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }

    #[inline]
    #[must_use]
    pub const fn start(&self) -> VirtualAddress {
        self.start
    }

    #[inline]
    #[must_use]
    pub const fn end(&self) -> VirtualAddress {
        self.end
    }

    /// Current allocation frontier.
    #[inline]
    #[must_use]
    pub const fn brk(&self) -> VirtualAddress {
        self.brk
    }

    #[must_use]
    pub const fn free_regions(&self) -> &FreeList {
        &self.free
    }

    /// Whether `[start, end)` lies inside this VMA.
    #[must_use]
    pub const fn contains(&self, start: VirtualAddress, end: VirtualAddress) -> bool {
        self.start.as_u64() <= start.as_u64() && end.as_u64() <= self.end.as_u64()
    }

    /// Whether `[start, end)` intersects the space this VMA claims.
    ///
    /// An empty VMA still claims its start address, so nothing may be placed
    /// on top of it and it keeps room to grow.
    #[must_use]
    pub const fn overlaps(&self, start: VirtualAddress, end: VirtualAddress) -> bool {
        let claimed_end = if self.end.as_u64() > self.start.as_u64() {
            self.end.as_u64()
        } else {
            self.start.as_u64() + 1
        };
        start.as_u64() < claimed_end && self.start.as_u64() < end.as_u64()
    }

    /// Carve `size` bytes from `[brk, end)` if they fit.
    pub(crate) fn take_from_break(&mut self, size: u64) -> Option<Region> {
        let end = self.brk.checked_add(size)?;
        if end.as_u64() > self.end.as_u64() {
            return None;
        }
        let region = Region::new(self.brk, end);
        self.brk = end;
        Some(region)
    }
}
