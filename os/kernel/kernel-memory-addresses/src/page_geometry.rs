use crate::{FrameNumber, PageNumber, PhysicalAddress, VirtualAddress, checked_align_up};
use kernel_info::memory::PAGE_SHIFT;

/// Page geometry: how addresses split into a page/frame number and an offset.
///
/// ### Invariants
/// - `shift` is in `1..32`, so the page size is a power of two between 2 B and 2 GiB.
///
/// The default geometry follows the build-time addressing mode
/// ([`PAGE_SHIFT`]).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PageGeometry {
    shift: u32,
}

impl PageGeometry {
    /// Build a geometry with `1 << shift` byte pages.
    ///
    /// ### Debug assertions
    /// - Asserts `0 < shift < 32` in debug builds.
    #[inline]
    #[must_use]
    pub const fn new(shift: u32) -> Self {
        debug_assert!(shift > 0 && shift < 32);
        Self { shift }
    }

    /// Build a geometry with `1 << shift` byte pages, or `None` if `shift` is
    /// outside `1..32`.
    #[inline]
    #[must_use]
    pub const fn try_new(shift: u32) -> Option<Self> {
        if shift > 0 && shift < 32 {
            Some(Self { shift })
        } else {
            None
        }
    }

    /// Number of offset bits.
    #[inline]
    #[must_use]
    pub const fn shift(self) -> u32 {
        self.shift
    }

    /// Page (and frame) size in bytes.
    #[inline]
    #[must_use]
    pub const fn page_size(self) -> u64 {
        1 << self.shift
    }

    /// Page that contains `va`.
    #[inline]
    #[must_use]
    pub const fn page_of(self, va: VirtualAddress) -> PageNumber {
        PageNumber::new(va.as_u64() >> self.shift)
    }

    /// Offset of `va` inside its page.
    #[inline]
    #[must_use]
    pub const fn offset_of(self, va: VirtualAddress) -> u64 {
        va.as_u64() & (self.page_size() - 1)
    }

    /// Split `va` into (page number, in-page offset).
    #[inline]
    #[must_use]
    pub const fn split(self, va: VirtualAddress) -> (PageNumber, u64) {
        (self.page_of(va), self.offset_of(va))
    }

    /// Recombine a page number and an in-page offset.
    #[inline]
    #[must_use]
    pub const fn join(self, page: PageNumber, offset: u64) -> VirtualAddress {
        debug_assert!(offset < self.page_size());
        VirtualAddress::new((page.as_u64() << self.shift) | offset)
    }

    /// First virtual address of `page`.
    #[inline]
    #[must_use]
    pub const fn page_base(self, page: PageNumber) -> VirtualAddress {
        VirtualAddress::new(page.as_u64() << self.shift)
    }

    /// First physical address of `frame`.
    #[inline]
    #[must_use]
    pub const fn frame_base(self, frame: FrameNumber) -> PhysicalAddress {
        PhysicalAddress::new(frame.as_u64() << self.shift)
    }

    /// Physical address of byte `offset` inside `frame`.
    #[inline]
    #[must_use]
    pub const fn physical(self, frame: FrameNumber, offset: u64) -> PhysicalAddress {
        debug_assert!(offset < self.page_size());
        PhysicalAddress::new((frame.as_u64() << self.shift) | offset)
    }

    /// Round `bytes` up to a whole number of pages, `None` on overflow.
    #[inline]
    #[must_use]
    pub const fn align_up(self, bytes: u64) -> Option<u64> {
        checked_align_up(bytes, self.page_size())
    }

    /// Whether `value` is a multiple of the page size.
    #[inline]
    #[must_use]
    pub const fn is_aligned(self, value: u64) -> bool {
        value & (self.page_size() - 1) == 0
    }

    /// Number of whole pages covering `bytes`, `None` on overflow.
    #[inline]
    #[must_use]
    pub const fn pages_for(self, bytes: u64) -> Option<u64> {
        match self.align_up(bytes) {
            Some(aligned) => Some(aligned >> self.shift),
            None => None,
        }
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::new(PAGE_SHIFT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_and_join_roundtrip_256() {
        let g = PageGeometry::new(8);
        let va = VirtualAddress::new(550);
        let (page, off) = g.split(va);
        assert_eq!(page, PageNumber::new(2));
        assert_eq!(off, 38);
        assert_eq!(g.join(page, off), va);
    }

    #[test]
    fn page_counts() {
        let g = PageGeometry::new(8);
        assert_eq!(g.pages_for(600), Some(3));
        assert_eq!(g.pages_for(256), Some(1));
        assert_eq!(g.pages_for(0), Some(0));
        assert_eq!(g.align_up(600), Some(768));
        assert!(g.is_aligned(512));
        assert!(!g.is_aligned(513));
    }

    #[test]
    fn shift_is_range_checked() {
        assert_eq!(PageGeometry::try_new(8), Some(PageGeometry::new(8)));
        assert_eq!(PageGeometry::try_new(0), None);
        assert_eq!(PageGeometry::try_new(32), None);
    }

    #[test]
    fn physical_address_of_frame() {
        let g = PageGeometry::new(12);
        assert_eq!(g.frame_base(FrameNumber::new(3)).as_u64(), 3 * 4096);
        assert_eq!(g.physical(FrameNumber::new(3), 7).as_u64(), 3 * 4096 + 7);
    }
}
