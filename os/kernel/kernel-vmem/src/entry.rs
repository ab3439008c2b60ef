//! # Page-Table Entry
//!
//! [`PtEntry`] wraps the raw [`PageEntryBits`] and only hands out its state
//! through [`PtEntry::kind`], which decodes it into exactly one of three cases.

use crate::PageEntryBits;
use crate::page_entry_bits::{MAX_ENTRY_FRAME, MAX_SWAP_TYPE};
use core::fmt;
use kernel_memory_addresses::FrameNumber;

/// A single page-table entry (PTE).
#[doc(alias = "PTE")]
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq)]
pub struct PtEntry(PageEntryBits);

/// Decoded state of a [`PtEntry`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PteState {
    /// No mapping. Touching the page faults in a fresh frame.
    Absent,
    /// Resident in RAM.
    Present { frame: FrameNumber, dirty: bool },
    /// Evicted to swap device `swap_type`, slot `offset`.
    Swapped { swap_type: u8, offset: FrameNumber },
}

impl PtEntry {
    /// The absent entry.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(PageEntryBits::new())
    }

    /// A present, clean entry mapping `frame`.
    ///
    /// ### Debug assertions
    /// - Asserts the frame number fits the 40-bit field.
    #[inline]
    #[must_use]
    pub const fn present(frame: FrameNumber) -> Self {
        debug_assert!(frame.as_u64() <= MAX_ENTRY_FRAME);
        Self(
            PageEntryBits::new()
                .with_present(true)
                .with_frame_or_offset(frame.as_u64()),
        )
    }

    /// A swapped entry pointing at slot `offset` of swap device `swap_type`.
    #[inline]
    #[must_use]
    pub const fn swapped(swap_type: u8, offset: FrameNumber) -> Self {
        debug_assert!(swap_type <= MAX_SWAP_TYPE);
        debug_assert!(offset.as_u64() <= MAX_ENTRY_FRAME);
        Self(
            PageEntryBits::new()
                .with_present(true)
                .with_swapped(true)
                .with_swap_type(swap_type)
                .with_frame_or_offset(offset.as_u64()),
        )
    }

    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(PageEntryBits::from_bits(raw))
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0.into_bits()
    }

    /// Expose the underlying bitfield.
    #[inline]
    #[must_use]
    pub const fn flags(self) -> PageEntryBits {
        self.0
    }

    /// `true` for the all-zero entry.
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.raw() == 0
    }

    /// Decode the entry. `swapped` wins over `present`.
    #[inline]
    #[must_use]
    pub const fn kind(self) -> PteState {
        if self.0.swapped() {
            PteState::Swapped {
                swap_type: self.0.swap_type(),
                offset: FrameNumber::new(self.0.frame_or_offset()),
            }
        } else if self.0.present() {
            PteState::Present {
                frame: FrameNumber::new(self.0.frame_or_offset()),
                dirty: self.0.dirty(),
            }
        } else {
            PteState::Absent
        }
    }

    /// The RAM frame if the page is resident.
    #[inline]
    #[must_use]
    pub const fn frame(self) -> Option<FrameNumber> {
        match self.kind() {
            PteState::Present { frame, .. } => Some(frame),
            _ => None,
        }
    }

    /// The same entry with the dirty bit set. No-op unless present.
    #[inline]
    #[must_use]
    pub const fn with_dirty(self) -> Self {
        match self.kind() {
            PteState::Present { .. } => Self(self.0.with_dirty(true)),
            _ => self,
        }
    }
}

impl From<PageEntryBits> for PtEntry {
    fn from(bits: PageEntryBits) -> Self {
        Self(bits)
    }
}

impl fmt::Debug for PtEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            PteState::Absent if self.is_zero() => f.write_str("PTE(absent)"),
            PteState::Absent => write!(f, "PTE(absent, raw={:#x})", self.raw()),
            PteState::Present { frame, dirty } => {
                write!(f, "PTE(present {frame:?}{})", if dirty { ", dirty" } else { "" })
            }
            PteState::Swapped { swap_type, offset } => {
                write!(f, "PTE(swapped dev={swap_type} off={offset:?})")
            }
        }
    }
}
