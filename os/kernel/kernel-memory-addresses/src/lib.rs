//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for the raw numbers the paging core juggles.
//!
//! ## Overview
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`VirtualAddress`] | A byte address inside a process's virtual address space. |
//! | [`PhysicalAddress`] | A byte address on a physical memory device (RAM or swap). |
//! | [`PageNumber`] | The page-granular index of a virtual address (PGN). |
//! | [`FrameNumber`] | The frame-granular index of a physical slot (FPN). |
//! | [`PageGeometry`] | The page size, i.e. how addresses split into number and offset. |
//!
//! Page size is a **runtime** value carried by [`PageGeometry`] rather than a
//! type parameter: the simulated devices are sized at start-up and the same
//! binary must serve both 256-byte and 4 KiB pages in tests.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let geometry = PageGeometry::new(8); // 256-byte pages
//! let va = VirtualAddress::new(0x0000_0312);
//!
//! let (page, offset) = geometry.split(va);
//! assert_eq!(page, PageNumber::new(3));
//! assert_eq!(offset, 0x12);
//! assert_eq!(geometry.join(page, offset), va);
//!
//! let pa = geometry.physical(FrameNumber::new(5), offset);
//! assert_eq!(pa.as_u64(), 5 * 256 + 0x12);
//! ```
//!
//! ## Design Notes
//!
//! - All types are `#[repr(transparent)]` and implement `Copy`, `Eq`, `Ord`,
//!   and `Hash`, making them suitable as map keys.
//! - Virtual and physical addresses cannot be mixed without an explicit
//!   translation through a [`FrameNumber`].

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod frame_number;
mod page_geometry;
mod page_number;
mod physical_address;
mod virtual_address;

pub use crate::frame_number::FrameNumber;
pub use crate::page_geometry::PageGeometry;
pub use crate::page_number::PageNumber;
pub use crate::physical_address::PhysicalAddress;
pub use crate::virtual_address::VirtualAddress;

/// Align `x` up to the nearest multiple of `a`, or `None` on overflow.
///
/// `a` must be a non-zero power of two.
///
/// ```rust
/// # use kernel_memory_addresses::checked_align_up;
/// assert_eq!(checked_align_up(0, 256), Some(0));
/// assert_eq!(checked_align_up(1, 256), Some(256));
/// assert_eq!(checked_align_up(600, 256), Some(768));
/// assert_eq!(checked_align_up(u64::MAX, 256), None);
/// ```
#[inline(always)]
#[must_use]
pub const fn checked_align_up(x: u64, a: u64) -> Option<u64> {
    debug_assert!(a.is_power_of_two());
    match x.checked_add(a - 1) {
        Some(v) => Some(v & !(a - 1)),
        None => None,
    }
}

/// Align `x` down to the nearest multiple of `a` (a power of two).
#[inline(always)]
#[must_use]
pub const fn align_down(x: u64, a: u64) -> u64 {
    x & !(a - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_helpers() {
        assert_eq!(align_down(0x1FF, 0x100), 0x100);
        assert_eq!(align_down(0x100, 0x100), 0x100);
        assert_eq!(checked_align_up(0x101, 0x100), Some(0x200));
        assert_eq!(checked_align_up(0x100, 0x100), Some(0x100));
    }
}
