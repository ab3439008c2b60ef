//! # Page faults and swapping
//!
//! ```text
//!                 resolve (fault)
//!   NotResident ──────────────────► Resident
//!        ▲                              │
//!        └──── evict (FIFO / explicit) ─┘
//! ```
//!
//! A fault takes a free RAM frame if one exists. Otherwise the oldest resident
//! page is written to the active swap device and its frame is reused. A page
//! coming back from swap has its content copied in and its slot released.
//!
//! Every step that can fail is undone before the error is returned: the
//! victim keeps its frame and its place at the head of the FIFO, and no swap
//! slot or RAM frame is leaked.

use crate::{AddressSpace, MmError};
use alloc::sync::Arc;
use alloc::vec::Vec;
use kernel_alloc::{DeviceError, FrameAlloc, copy_frame};
use kernel_memory_addresses::{FrameNumber, PageNumber, VirtualAddress};
use kernel_vmem::{PageTable, PageTableError, PtEntry, PteState};

/// A completed eviction that can still be undone.
struct Eviction {
    victim: PageNumber,
    entry: PtEntry,
    frame: FrameNumber,
    swap_type: usize,
    slot: FrameNumber,
}

impl<T: PageTable> AddressSpace<T> {
    /// Make `page` resident and return its RAM frame.
    ///
    /// Idempotent while the page stays resident.
    ///
    /// # Errors
    /// - [`MmError::NoVictim`] if RAM is full and nothing of this address
    ///   space is resident.
    /// - [`MmError::SwapExhausted`] if the victim cannot be written out.
    /// - [`MmError::PageTable`] if `page` is beyond the page table.
    /// - [`MmError::Device`] if a device rejects the copy.
    pub fn resolve(&mut self, page: PageNumber) -> Result<FrameNumber, MmError> {
        let source = match self.table.translate(page).kind() {
            PteState::Present { frame, .. } => {
                log::trace!("{page:?} resident in {frame:?}");
                return Ok(frame);
            }
            PteState::Absent => None,
            PteState::Swapped { swap_type, offset } => Some((usize::from(swap_type), offset)),
        };

        let limit = self.table.max_pages();
        if page.as_u64() >= limit {
            return Err(PageTableError::OutOfRange { page, limit }.into());
        }

        let devices = Arc::clone(&self.devices);
        let (frame, eviction) = match devices.ram().acquire() {
            Some(frame) => (frame, None),
            None => {
                let eviction = self.evict_oldest()?;
                (eviction.frame, Some(eviction))
            }
        };

        let filled = match source {
            None => self.zero_frame(frame),
            Some((swap_type, slot)) => devices
                .swap(swap_type)
                .and_then(|swap| copy_frame(swap, slot, devices.ram(), frame))
                .map_err(MmError::from),
        };
        if let Err(e) = filled.and_then(|()| self.table.install(page, frame).map_err(MmError::from))
        {
            log::warn!("fault on {page:?} failed: {e}");
            self.undo_fault(frame, eviction);
            return Err(e);
        }

        if let Some((swap_type, slot)) = source {
            if let Err(e) = devices.swap(swap_type).and_then(|swap| swap.release(slot)) {
                log::warn!("swap slot {slot:?} of device {swap_type} not released: {e}");
            }
            log::debug!("{page:?} swapped in from device {swap_type} slot {slot:?} to {frame:?}");
        } else {
            log::debug!("{page:?} faulted into {frame:?}");
        }

        self.fifo.push_back(page);
        Ok(frame)
    }

    /// Write the resident pages of the `pages`-page range at `start` to the
    /// active swap device and return their RAM frames to the free list.
    ///
    /// Returns the number of pages evicted. Pages that are not resident are
    /// skipped. Swap slots for every page are reserved before the first one is
    /// written, and a failure part-way restores the pages already written, so
    /// the call evicts all of them or none.
    ///
    /// # Errors
    /// - [`MmError::Misaligned`] or [`MmError::Unmapped`] for a bad range.
    /// - [`MmError::SwapExhausted`] if the active swap device is too full.
    pub fn evict_pages(&mut self, start: VirtualAddress, pages: u64) -> Result<usize, MmError> {
        let (first, _) = self.checked_page_range(start, pages)?;
        let resident: Vec<(PageNumber, PtEntry)> = (0..pages)
            .map(|i| first + i)
            .map(|page| (page, self.table.translate(page)))
            .filter(|(_, entry)| entry.frame().is_some())
            .collect();
        if resident.is_empty() {
            return Ok(0);
        }

        let devices = Arc::clone(&self.devices);
        let (swap_type, swap) = devices.active_swap()?;
        let slots = swap
            .acquire_n(resident.len())
            .map_err(|_| MmError::SwapExhausted(swap_type))?;

        for (done, (&(page, entry), &slot)) in resident.iter().zip(&slots).enumerate() {
            let Some(frame) = entry.frame() else { continue };
            if let Err(e) = self.write_out(page, frame, swap_type, slot) {
                log::warn!("eviction of {page:?} failed: {e}");
                for &(page, entry) in &resident[..done] {
                    if let Err(e) = self.table.set_entry(page, entry) {
                        log::error!("{page:?} not restored: {e}");
                    }
                }
                for &slot in &slots {
                    if let Err(e) = swap.release(slot) {
                        log::error!("swap slot {slot:?} leaked: {e}");
                    }
                }
                return Err(e);
            }
        }

        for (&(page, entry), slot) in resident.iter().zip(slots) {
            self.fifo.retain(|&p| p != page);
            if let Some(frame) = entry.frame()
                && let Err(e) = devices.ram().release(frame)
            {
                log::warn!("{frame:?} of evicted {page:?} not released: {e}");
            }
            log::debug!("{page:?} evicted to device {swap_type} slot {slot:?}");
        }
        Ok(resident.len())
    }

    /// Pop the oldest resident page and write it to swap.
    fn evict_oldest(&mut self) -> Result<Eviction, MmError> {
        let victim = self.fifo.pop_front().ok_or(MmError::NoVictim)?;
        let entry = self.table.translate(victim);
        let Some(frame) = entry.frame() else {
            log::warn!("FIFO victim {victim:?} is not resident: {entry:?}");
            return Err(MmError::StaleVictim(victim));
        };

        match self.swap_out(victim, frame) {
            Ok((swap_type, slot)) => {
                log::debug!("evicted {victim:?} from {frame:?} to device {swap_type} slot {slot:?}");
                Ok(Eviction {
                    victim,
                    entry,
                    frame,
                    swap_type,
                    slot,
                })
            }
            Err(e) => {
                self.fifo.push_front(victim);
                Err(e)
            }
        }
    }

    /// Copy `frame` to a fresh slot of the active swap device and mark `page`
    /// swapped. On failure the slot is released and the entry is unchanged.
    fn swap_out(
        &mut self,
        page: PageNumber,
        frame: FrameNumber,
    ) -> Result<(usize, FrameNumber), MmError> {
        let devices = Arc::clone(&self.devices);
        let (swap_type, swap) = devices.active_swap()?;
        let slot = swap.acquire().ok_or(MmError::SwapExhausted(swap_type))?;

        if let Err(e) = self.write_out(page, frame, swap_type, slot) {
            if let Err(re) = swap.release(slot) {
                log::error!("swap slot {slot:?} leaked: {re}");
            }
            return Err(e);
        }
        Ok((swap_type, slot))
    }

    /// Copy `frame` into the already acquired `slot` of swap device
    /// `swap_type` and mark `page` swapped. The entry is unchanged on failure.
    fn write_out(
        &mut self,
        page: PageNumber,
        frame: FrameNumber,
        swap_type: usize,
        slot: FrameNumber,
    ) -> Result<(), MmError> {
        let tag = u8::try_from(swap_type).map_err(|_| DeviceError::NoSuchSwapDevice(swap_type))?;
        let devices = Arc::clone(&self.devices);
        let swap = devices.swap(swap_type)?;
        copy_frame(devices.ram(), frame, swap, slot)?;
        self.table.mark_swapped(page, tag, slot)?;
        Ok(())
    }

    /// Give back the frame of a failed fault, restoring the victim if one was evicted.
    fn undo_fault(&mut self, frame: FrameNumber, eviction: Option<Eviction>) {
        let devices = Arc::clone(&self.devices);
        let Some(ev) = eviction else {
            if let Err(e) = devices.ram().release(frame) {
                log::error!("{frame:?} leaked: {e}");
            }
            return;
        };

        // The frame may already hold the faulting page; the swap copy is the
        // victim's only intact content.
        let restored = devices
            .swap(ev.swap_type)
            .and_then(|swap| copy_frame(swap, ev.slot, devices.ram(), ev.frame).map(|()| swap));
        match restored {
            Ok(swap) => {
                if let Err(e) = self.table.set_entry(ev.victim, ev.entry) {
                    log::error!("victim {:?} not restored: {e}", ev.victim);
                }
                if let Err(e) = swap.release(ev.slot) {
                    log::error!("swap slot {:?} leaked: {e}", ev.slot);
                }
            }
            Err(e) => {
                // Leave the victim swapped; its content survives in the slot.
                log::error!("victim {:?} stays in swap: {e}", ev.victim);
                if let Err(e) = devices.ram().release(frame) {
                    log::error!("{frame:?} leaked: {e}");
                }
                return;
            }
        }
        self.fifo.push_front(ev.victim);
        debug_assert_eq!(ev.frame, frame);
    }
}

#[cfg(test)]
mod tests {
    use crate::{AddressSpace, MmError, Populate};
    use alloc::sync::Arc;
    use kernel_alloc::{FrameAlloc, MemoryDevices};
    use kernel_memory_addresses::{FrameNumber, PageGeometry, PageNumber, VirtualAddress};
    use kernel_vmem::{FlatPageTable, PageTable, PageTableError, PtEntry, PteState};

    fn space(ram: usize, swap: usize) -> AddressSpace<FlatPageTable> {
        let d = MemoryDevices::new(PageGeometry::new(8), ram * 256, &[swap * 256]).unwrap();
        AddressSpace::new(Arc::new(d), Populate::OnDemand)
    }

    #[test]
    fn free_frames_are_used_before_evicting() {
        let mut s = space(2, 4);
        assert_eq!(s.resolve(PageNumber::new(0)), Ok(FrameNumber::new(0)));
        assert_eq!(s.resolve(PageNumber::new(1)), Ok(FrameNumber::new(1)));
        assert_eq!(s.devices().swap(0).unwrap().free_frames(), 4);
    }

    #[test]
    fn fifo_victim_gives_up_its_frame() {
        let mut s = space(2, 4);
        let f0 = s.resolve(PageNumber::new(0)).unwrap();
        s.resolve(PageNumber::new(1)).unwrap();
        let f2 = s.resolve(PageNumber::new(2)).unwrap();
        assert_eq!(f0, f2);
        assert!(matches!(
            s.table().translate(PageNumber::new(0)).kind(),
            PteState::Swapped { swap_type: 0, .. }
        ));
        assert_eq!(
            s.resident_pages().collect::<alloc::vec::Vec<_>>(),
            [PageNumber::new(1), PageNumber::new(2)]
        );
    }

    #[test]
    fn swap_exhaustion_keeps_the_victim() {
        let mut s = space(1, 0);
        s.resolve(PageNumber::new(0)).unwrap();
        assert_eq!(s.resolve(PageNumber::new(1)), Err(MmError::SwapExhausted(0)));
        assert_eq!(s.resident_pages().next(), Some(PageNumber::new(0)));
        assert_eq!(
            s.table().translate(PageNumber::new(0)).frame(),
            Some(FrameNumber::new(0))
        );
        assert_eq!(s.table().translate(PageNumber::new(1)).kind(), PteState::Absent);
    }

    /// Flat table that rejects the writes `refuse` picks.
    struct Refusing {
        inner: FlatPageTable,
        refuse: fn(PageNumber, PtEntry) -> bool,
    }

    fn refusing(ram: usize, refuse: fn(PageNumber, PtEntry) -> bool) -> AddressSpace<Refusing> {
        let d = MemoryDevices::new(PageGeometry::new(8), ram * 256, &[4 * 256]).unwrap();
        let table = Refusing {
            inner: FlatPageTable::new(),
            refuse,
        };
        AddressSpace::with_table(Arc::new(d), table, Populate::OnDemand)
    }

    impl PageTable for Refusing {
        fn max_pages(&self) -> u64 {
            self.inner.max_pages()
        }

        fn translate(&self, page: PageNumber) -> PtEntry {
            self.inner.translate(page)
        }

        fn set_entry(&mut self, page: PageNumber, entry: PtEntry) -> Result<(), PageTableError> {
            if (self.refuse)(page, entry) {
                return Err(PageTableError::OutOfRange {
                    page,
                    limit: page.as_u64(),
                });
            }
            self.inner.set_entry(page, entry)
        }

        fn mapped_entries(&self) -> alloc::vec::Vec<(PageNumber, PtEntry)> {
            self.inner.mapped_entries()
        }
    }

    #[test]
    fn failed_install_restores_victim_content() {
        let mut s = refusing(1, |page, entry| {
            page == PageNumber::new(5) && entry.frame().is_some()
        });
        s.allocate(0, 0, 10).unwrap();
        s.write_byte(0, 9, 0xAB).unwrap();

        assert!(matches!(
            s.resolve(PageNumber::new(5)),
            Err(MmError::PageTable(_))
        ));
        assert_eq!(s.read_byte(0, 9), Ok(0xAB));
        assert!(matches!(
            s.table().translate(PageNumber::new(0)).kind(),
            PteState::Present { dirty: true, .. }
        ));
        assert_eq!(s.table().translate(PageNumber::new(5)).kind(), PteState::Absent);
        assert_eq!(s.resident_pages().collect::<alloc::vec::Vec<_>>(), [PageNumber::new(0)]);
        assert_eq!(s.devices().swap(0).unwrap().free_frames(), 4);
        assert_eq!(s.devices().ram().free_frames(), 0);
    }

    #[test]
    fn failed_range_eviction_evicts_nothing() {
        let mut s = refusing(4, |page, entry| {
            page == PageNumber::new(2) && matches!(entry.kind(), PteState::Swapped { .. })
        });
        s.grow(0, 4 * 256).unwrap();
        for p in 0..4 {
            s.resolve(PageNumber::new(p)).unwrap();
        }
        let before: alloc::vec::Vec<_> = (0..4).map(|p| s.table().translate(PageNumber::new(p))).collect();

        assert!(matches!(
            s.evict_pages(VirtualAddress::zero(), 4),
            Err(MmError::PageTable(_))
        ));
        let after: alloc::vec::Vec<_> = (0..4).map(|p| s.table().translate(PageNumber::new(p))).collect();
        assert_eq!(after, before);
        assert_eq!(s.resident_count(), 4);
        assert_eq!(s.devices().swap(0).unwrap().free_frames(), 4);
        assert_eq!(s.devices().ram().free_frames(), 0);
    }

    #[test]
    fn range_eviction_reserves_all_slots_first() {
        let mut s = space(4, 2);
        s.grow(0, 3 * 256).unwrap();
        for p in 0..3 {
            s.resolve(PageNumber::new(p)).unwrap();
        }
        assert_eq!(
            s.evict_pages(VirtualAddress::zero(), 3),
            Err(MmError::SwapExhausted(0))
        );
        assert_eq!(s.resident_count(), 3);
        assert_eq!(s.devices().swap(0).unwrap().free_frames(), 2);
    }

    #[test]
    fn out_of_range_fault_takes_nothing() {
        let mut s = space(1, 1);
        let beyond = PageNumber::new(s.table().max_pages());
        assert!(matches!(s.resolve(beyond), Err(MmError::PageTable(_))));
        assert_eq!(s.devices().ram().free_frames(), 1);
    }

    #[test]
    fn explicit_eviction_frees_ram() {
        let mut s = space(4, 4);
        s.grow(0, 4 * 256).unwrap();
        for p in 0..3 {
            s.resolve(PageNumber::new(p)).unwrap();
        }
        assert_eq!(s.evict_pages(VirtualAddress::new(256), 3), Ok(2));
        assert_eq!(s.devices().ram().free_frames(), 3);
        assert_eq!(s.devices().swap(0).unwrap().free_frames(), 2);
        assert_eq!(s.resident_count(), 1);
        assert_eq!(
            s.evict_pages(VirtualAddress::new(10), 1),
            Err(MmError::Misaligned(VirtualAddress::new(10)))
        );
        assert!(matches!(
            s.evict_pages(VirtualAddress::new(0), 5),
            Err(MmError::Unmapped { .. })
        ));
    }
}
