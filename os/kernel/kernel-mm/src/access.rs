//! Byte access through regions, plus the raw page-table helpers used by the
//! syscall front.

use crate::{AddressSpace, MmError};
use alloc::vec::Vec;
use kernel_info::memory::PTE_POISON_PATTERN;
use kernel_memory_addresses::{PageNumber, PhysicalAddress, VirtualAddress};
use kernel_vmem::{PageTable, PtEntry, PteState};

impl<T: PageTable> AddressSpace<T> {
    /// Read the byte at `offset` inside region `region_id`, faulting its page in.
    ///
    /// # Errors
    /// - [`MmError::InvalidRegionId`], [`MmError::RegionNotLive`].
    /// - [`MmError::OffsetOutOfRange`] if `offset` is past the region.
    /// - Any error of [`resolve`](Self::resolve).
    pub fn read_byte(&mut self, region_id: usize, offset: u64) -> Result<u8, MmError> {
        let (_, address) = self.locate(region_id, offset)?;
        let value = self.devices.ram().read(address)?;
        log::trace!("read region {region_id}+{offset} ({address}) = {value:#04x}");
        Ok(value)
    }

    /// Write `value` at `offset` inside region `region_id`, faulting its page
    /// in and marking it dirty.
    ///
    /// # Errors
    /// See [`read_byte`](Self::read_byte).
    pub fn write_byte(&mut self, region_id: usize, offset: u64, value: u8) -> Result<(), MmError> {
        let (page, address) = self.locate(region_id, offset)?;
        self.devices.ram().write(address, value)?;
        self.table.mark_dirty(page)?;
        log::trace!("write region {region_id}+{offset} ({address}) = {value:#04x}");
        Ok(())
    }

    fn locate(
        &mut self,
        region_id: usize,
        offset: u64,
    ) -> Result<(PageNumber, PhysicalAddress), MmError> {
        let region = self.region(region_id)?;
        if offset >= region.len() {
            return Err(MmError::OffsetOutOfRange {
                offset,
                len: region.len(),
            });
        }
        let geometry = self.geometry();
        let (page, in_page) = geometry.split(region.start + offset);
        let frame = self.resolve(page)?;
        Ok((page, geometry.physical(frame, in_page)))
    }

    /// Stamp the raw poison pattern into every absent entry of the
    /// `pages`-page range at `start`. Returns the number of entries written.
    ///
    /// Stamped entries stay absent: no frame is attached and the next access
    /// faults a fresh page in as usual.
    ///
    /// # Errors
    /// [`MmError::Misaligned`] or [`MmError::Unmapped`] for a bad range.
    pub fn install_pattern(&mut self, start: VirtualAddress, pages: u64) -> Result<usize, MmError> {
        let (first, _) = self.checked_page_range(start, pages)?;
        let poison = PtEntry::from_raw(PTE_POISON_PATTERN);
        let mut stamped = 0;
        for page in (0..pages).map(|i| first + i) {
            if self.table.translate(page).kind() == PteState::Absent {
                self.table.set_entry(page, poison)?;
                stamped += 1;
            }
        }
        log::debug!("stamped {stamped} entr(ies) from {first:?} with {PTE_POISON_PATTERN:#x}");
        Ok(stamped)
    }

    /// Log and return every non-zero entry whose page lies in `[start, end)`.
    #[must_use]
    pub fn page_table_dump(
        &self,
        start: VirtualAddress,
        end: VirtualAddress,
    ) -> Vec<(PageNumber, PtEntry)> {
        let geometry = self.geometry();
        let (first, last) = (geometry.page_of(start), geometry.page_of(end));
        let entries: Vec<_> = self
            .table
            .mapped_entries()
            .into_iter()
            .filter(|(page, _)| *page >= first && *page < last)
            .collect();
        log::debug!("page table [{start:?}..{end:?}): {} entr(ies)", entries.len());
        for (page, entry) in &entries {
            log::debug!("  {page:?} -> {entry:?}");
        }
        entries
    }
}
