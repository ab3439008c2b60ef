//! # Page Tables
//!
//! Per-address-space translation from virtual page number to page-table entry.
//!
//! ## What you get
//! - [`PageEntryBits`]: the raw 64-bit entry layout.
//! - [`PtEntry`] and [`PteState`]: an entry and its decoded state
//!   (absent, present, or swapped).
//! - The [`PageTable`] trait: `translate`, `install`, `mark_swapped`, and friends.
//! - Two implementations, selected at build time through [`DefaultPageTable`]:
//!
//! | Mode | Type | Page size | Reach |
//! |------|------|-----------|-------|
//! | flat (default) | [`FlatPageTable`] | 256 B | 2¹⁴ pages (22-bit addresses) |
//! | `mm64` feature | [`RadixPageTable`] | 4 KiB | 2⁴⁵ pages |
//!
//! ## Entry states
//!
//! ```text
//!            install                  mark_swapped
//!  Absent ───────────► Present ──────────────────► Swapped
//!                         ▲                           │
//!                         └───────── install ─────────┘
//! ```
//!
//! A swapped entry never yields a frame number: [`PtEntry::kind`] checks the
//! swapped bit first, so callers cannot mistake a swap offset for a RAM frame.
//!
//! ## Example
//!
//! ```rust
//! use kernel_memory_addresses::{FrameNumber, PageNumber};
//! use kernel_vmem::{PageTable, PteState, RadixPageTable};
//!
//! let mut table = RadixPageTable::new();
//! let page = PageNumber::new(0x1_0000);
//! assert_eq!(table.translate(page).kind(), PteState::Absent);
//!
//! table.install(page, FrameNumber::new(3)).unwrap();
//! assert_eq!(table.translate(page).frame(), Some(FrameNumber::new(3)));
//!
//! table.mark_swapped(page, 0, FrameNumber::new(17)).unwrap();
//! assert_eq!(table.translate(page).frame(), None);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod entry;
pub mod flat;
mod page_entry_bits;
mod page_table;
pub mod radix;

pub use crate::entry::{PtEntry, PteState};
pub use crate::flat::FlatPageTable;
pub use crate::page_entry_bits::{MAX_ENTRY_FRAME, MAX_SWAP_TYPE, PageEntryBits};
pub use crate::page_table::{PageTable, PageTableError};
pub use crate::radix::RadixPageTable;

/// The page table used when the address space does not name one.
#[cfg(not(feature = "mm64"))]
pub type DefaultPageTable = FlatPageTable;

/// The page table used when the address space does not name one.
#[cfg(feature = "mm64")]
pub type DefaultPageTable = RadixPageTable;
