//! The translation contract shared by both addressing modes.

use crate::PtEntry;
use alloc::vec::Vec;
use kernel_memory_addresses::{FrameNumber, PageNumber};

/// Errors reported by a [`PageTable`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum PageTableError {
    #[error("page {page} outside the table (limit {limit} pages)")]
    OutOfRange { page: PageNumber, limit: u64 },
}

/// Per-address-space map from virtual page number to [`PtEntry`].
///
/// Writers allocate whatever internal structure they need. [`translate`]
/// never does: a page whose path has not been built is simply absent.
///
/// [`translate`]: PageTable::translate
pub trait PageTable {
    /// Number of addressable pages; valid page numbers are `0..max_pages()`.
    fn max_pages(&self) -> u64;

    /// Entry for `page`, or the absent entry if nothing was ever written there
    /// (including pages beyond [`max_pages`](Self::max_pages)).
    fn translate(&self, page: PageNumber) -> PtEntry;

    /// Overwrite the entry for `page`.
    ///
    /// # Errors
    /// [`PageTableError::OutOfRange`] if `page` is not addressable.
    fn set_entry(&mut self, page: PageNumber, entry: PtEntry) -> Result<(), PageTableError>;

    /// Every entry that is not all-zero, in ascending page order.
    fn mapped_entries(&self) -> Vec<(PageNumber, PtEntry)>;

    /// Map `page` to RAM `frame`, clearing the swapped and dirty bits.
    ///
    /// # Errors
    /// [`PageTableError::OutOfRange`] if `page` is not addressable.
    fn install(&mut self, page: PageNumber, frame: FrameNumber) -> Result<(), PageTableError> {
        self.set_entry(page, PtEntry::present(frame))
    }

    /// Record that `page` now lives at slot `offset` of swap device `swap_type`.
    ///
    /// # Errors
    /// [`PageTableError::OutOfRange`] if `page` is not addressable.
    fn mark_swapped(
        &mut self,
        page: PageNumber,
        swap_type: u8,
        offset: FrameNumber,
    ) -> Result<(), PageTableError> {
        self.set_entry(page, PtEntry::swapped(swap_type, offset))
    }

    /// Set the dirty bit of a present entry. Other entries are left untouched.
    ///
    /// # Errors
    /// [`PageTableError::OutOfRange`] if `page` is not addressable.
    fn mark_dirty(&mut self, page: PageNumber) -> Result<(), PageTableError> {
        let entry = self.translate(page);
        if entry.frame().is_some() {
            self.set_entry(page, entry.with_dirty())?;
        }
        Ok(())
    }

    /// Reset `page` to the absent entry.
    ///
    /// # Errors
    /// [`PageTableError::OutOfRange`] if `page` is not addressable.
    fn clear(&mut self, page: PageNumber) -> Result<(), PageTableError> {
        self.set_entry(page, PtEntry::zero())
    }
}

#[inline]
pub(crate) const fn check_range(page: PageNumber, limit: u64) -> Result<(), PageTableError> {
    if page.as_u64() < limit {
        Ok(())
    } else {
        Err(PageTableError::OutOfRange { page, limit })
    }
}
