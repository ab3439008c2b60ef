//! # Flat (single-level) page table
//!
//! One entry per page of the [`FLAT_ADDRESS_BITS`]-bit address space, indexed
//! directly by page number. All entries start absent.
//!
//! [`FLAT_ADDRESS_BITS`]: kernel_info::memory::FLAT_ADDRESS_BITS

use crate::{PageTable, PageTableError, PtEntry};
use alloc::vec;
use alloc::vec::Vec;
use kernel_info::memory::FLAT_MAX_PAGES;
use kernel_memory_addresses::PageNumber;

pub struct FlatPageTable {
    entries: Vec<PtEntry>,
}

impl FlatPageTable {
    /// A table covering [`FLAT_MAX_PAGES`] pages.
    #[must_use]
    pub fn new() -> Self {
        Self::with_pages(FLAT_MAX_PAGES)
    }

    /// A table covering `pages` pages.
    #[must_use]
    pub fn with_pages(pages: u64) -> Self {
        let len = usize::try_from(pages).unwrap_or(usize::MAX);
        Self {
            entries: vec![PtEntry::zero(); len],
        }
    }
}

impl Default for FlatPageTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PageTable for FlatPageTable {
    fn max_pages(&self) -> u64 {
        self.entries.len() as u64
    }

    fn translate(&self, page: PageNumber) -> PtEntry {
        usize::try_from(page.as_u64())
            .ok()
            .and_then(|i| self.entries.get(i))
            .copied()
            .unwrap_or_default()
    }

    fn set_entry(&mut self, page: PageNumber, entry: PtEntry) -> Result<(), PageTableError> {
        let limit = self.max_pages();
        let slot = usize::try_from(page.as_u64())
            .ok()
            .and_then(|i| self.entries.get_mut(i))
            .ok_or(PageTableError::OutOfRange { page, limit })?;
        *slot = entry;
        Ok(())
    }

    fn mapped_entries(&self) -> Vec<(PageNumber, PtEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.is_zero())
            .map(|(i, e)| (PageNumber::new(i as u64), *e))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PteState;
    use kernel_memory_addresses::FrameNumber;

    #[test]
    fn starts_absent() {
        let t = FlatPageTable::new();
        assert_eq!(t.max_pages(), FLAT_MAX_PAGES);
        assert_eq!(t.translate(PageNumber::new(0)).kind(), PteState::Absent);
        assert!(t.mapped_entries().is_empty());
    }

    #[test]
    fn out_of_range_is_rejected_on_write_and_absent_on_read() {
        let mut t = FlatPageTable::with_pages(4);
        let p = PageNumber::new(4);
        assert_eq!(
            t.install(p, FrameNumber::new(0)),
            Err(PageTableError::OutOfRange { page: p, limit: 4 })
        );
        assert_eq!(t.translate(p), PtEntry::zero());
    }

    #[test]
    fn install_swap_and_clear() {
        let mut t = FlatPageTable::with_pages(8);
        let p = PageNumber::new(5);
        t.install(p, FrameNumber::new(2)).unwrap();
        t.mark_dirty(p).unwrap();
        assert_eq!(
            t.translate(p).kind(),
            PteState::Present {
                frame: FrameNumber::new(2),
                dirty: true
            }
        );

        t.mark_swapped(p, 1, FrameNumber::new(30)).unwrap();
        assert_eq!(t.translate(p).frame(), None);

        t.install(p, FrameNumber::new(3)).unwrap();
        assert_eq!(
            t.translate(p).kind(),
            PteState::Present {
                frame: FrameNumber::new(3),
                dirty: false
            }
        );
        assert_eq!(t.mapped_entries().len(), 1);

        t.clear(p).unwrap();
        assert!(t.mapped_entries().is_empty());
    }
}
