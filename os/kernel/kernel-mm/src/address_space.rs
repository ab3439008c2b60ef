//! # Address Space
//!
//! Everything one process owns: its VMAs, the symbol table of live regions,
//! the resident-page FIFO, and the page table. Physical devices are shared
//! with every other address space through an [`Arc`].
//!
//! ## Allocation path
//!
//! ```text
//! allocate(vma, id, size)
//!   ├─ first fit on the VMA's free list      → carve from that region
//!   ├─ else [brk, end) holds `size` bytes    → carve at brk
//!   └─ else grow(vma, size)                  → carve at brk
//! ```
//!
//! Growth reserves whole pages. With [`Populate::Eager`] it also acquires and
//! maps a frame per page, all or nothing.

use crate::region::Region;
use crate::vma::{Vma, VmaUsage};
use crate::{MmError, Populate};
use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;
use kernel_alloc::{FrameAlloc, MemoryDevices};
use kernel_info::memory::MAX_SYMBOLS;
use kernel_memory_addresses::{FrameNumber, PageGeometry, PageNumber, VirtualAddress};
use kernel_vmem::{DefaultPageTable, PageTable, PteState, PtEntry};

/// A live region and the VMA it was carved from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct LiveRegion {
    pub(crate) vma: usize,
    pub(crate) region: Region,
}

/// The virtual memory of one process.
pub struct AddressSpace<T: PageTable = DefaultPageTable> {
    pub(crate) devices: Arc<MemoryDevices>,
    pub(crate) populate: Populate,
    pub(crate) vmas: Vec<Vma>,
    pub(crate) symbols: [Option<LiveRegion>; MAX_SYMBOLS],
    pub(crate) fifo: VecDeque<PageNumber>,
    pub(crate) table: T,
    /// First virtual address the page table cannot map.
    pub(crate) limit: u64,
}

impl<T: PageTable + Default> AddressSpace<T> {
    /// An address space over `devices` with an empty page table.
    #[must_use]
    pub fn new(devices: Arc<MemoryDevices>, populate: Populate) -> Self {
        Self::with_table(devices, T::default(), populate)
    }
}

impl<T: PageTable> AddressSpace<T> {
    /// An address space using the given (normally empty) page table.
    ///
    /// VMA 0 starts at address zero with nothing reserved.
    #[must_use]
    pub fn with_table(devices: Arc<MemoryDevices>, table: T, populate: Populate) -> Self {
        let limit = table
            .max_pages()
            .checked_mul(devices.geometry().page_size())
            .unwrap_or(u64::MAX);
        Self {
            devices,
            populate,
            vmas: alloc::vec![Vma::new(0, VirtualAddress::zero())],
            symbols: [None; MAX_SYMBOLS],
            fifo: VecDeque::new(),
            table,
            limit,
        }
    }

    #[inline]
    #[must_use]
    pub fn geometry(&self) -> PageGeometry {
        self.devices.geometry()
    }

    #[inline]
    #[must_use]
    pub fn devices(&self) -> &Arc<MemoryDevices> {
        &self.devices
    }

    #[inline]
    #[must_use]
    pub const fn populate(&self) -> Populate {
        self.populate
    }

    #[inline]
    #[must_use]
    pub const fn table(&self) -> &T {
        &self.table
    }

    #[must_use]
    pub fn vmas(&self) -> &[Vma] {
        &self.vmas
    }

    /// # Errors
    /// [`MmError::NoSuchVma`] if `id` is unknown.
    pub fn vma(&self, id: usize) -> Result<&Vma, MmError> {
        self.vmas.get(id).ok_or(MmError::NoSuchVma(id))
    }

    /// Resident pages, oldest first.
    pub fn resident_pages(&self) -> impl Iterator<Item = PageNumber> + '_ {
        self.fifo.iter().copied()
    }

    /// Number of resident pages.
    #[must_use]
    pub fn resident_count(&self) -> usize {
        self.fifo.len()
    }

    /// The live region stored under `id`.
    ///
    /// # Errors
    /// [`MmError::InvalidRegionId`] or [`MmError::RegionNotLive`].
    pub fn region(&self, id: usize) -> Result<Region, MmError> {
        self.symbols
            .get(id)
            .ok_or(MmError::InvalidRegionId(id))?
            .map(|live| live.region)
            .ok_or(MmError::RegionNotLive(id))
    }

    /// Append a new, empty VMA at `start` and return its id.
    ///
    /// # Errors
    /// - [`MmError::Misaligned`] if `start` is not page aligned.
    /// - [`MmError::VirtualSpaceExhausted`] if the page table cannot map `start`.
    /// - [`MmError::Overlap`] if `start` lies inside (or at the start of) a sibling.
    pub fn create_vma(&mut self, start: VirtualAddress) -> Result<usize, MmError> {
        if !self.geometry().is_aligned(start.as_u64()) {
            return Err(MmError::Misaligned(start));
        }
        if start.as_u64() >= self.limit {
            return Err(MmError::VirtualSpaceExhausted {
                end: start,
                requested: 0,
            });
        }
        let id = self.vmas.len();
        self.check_overlap(id, start, start + 1)?;
        self.vmas.push(Vma::new(id, start));
        log::debug!("created VMA {id} at {start}");
        Ok(id)
    }

    /// Extend VMA `vma_id` by `size` bytes rounded up to whole pages.
    ///
    /// Returns the first address of the new space (the old end).
    ///
    /// # Errors
    /// - [`MmError::ZeroSize`], [`MmError::NoSuchVma`].
    /// - [`MmError::VirtualSpaceExhausted`] past the reach of the page table.
    /// - [`MmError::Overlap`] if the new space intersects a sibling VMA.
    /// - [`MmError::Frames`] when eager population finds too few free frames.
    pub fn grow(&mut self, vma_id: usize, size: u64) -> Result<VirtualAddress, MmError> {
        if size == 0 {
            return Err(MmError::ZeroSize);
        }
        let old_end = self.vma(vma_id)?.end;
        let exhausted = MmError::VirtualSpaceExhausted {
            end: old_end,
            requested: size,
        };
        let aligned = self.geometry().align_up(size).ok_or(exhausted)?;
        let new_end = old_end
            .checked_add(aligned)
            .filter(|end| end.as_u64() <= self.limit)
            .ok_or(exhausted)?;

        self.check_overlap(vma_id, old_end, new_end)?;
        if self.populate == Populate::Eager {
            self.map_range(old_end, new_end)?;
        }

        self.vmas[vma_id].end = new_end;
        log::debug!("VMA {vma_id}: grew by {aligned} bytes to [{old_end:?}..{new_end:?})");
        Ok(old_end)
    }

    /// Carve `size` bytes from VMA `vma_id` and store the region under `region_id`.
    ///
    /// Returns the base address of the region.
    ///
    /// # Errors
    /// - [`MmError::InvalidRegionId`] or [`MmError::RegionInUse`] for a bad id.
    /// - [`MmError::ZeroSize`], [`MmError::NoSuchVma`].
    /// - Any error of [`grow`](Self::grow) if the VMA has to grow.
    pub fn allocate(
        &mut self,
        vma_id: usize,
        region_id: usize,
        size: u64,
    ) -> Result<VirtualAddress, MmError> {
        match self.symbols.get(region_id) {
            None => return Err(MmError::InvalidRegionId(region_id)),
            Some(Some(_)) => return Err(MmError::RegionInUse(region_id)),
            Some(None) => {}
        }
        if size == 0 {
            return Err(MmError::ZeroSize);
        }
        self.vma(vma_id)?;

        let vma = &mut self.vmas[vma_id];
        let region = match vma.free.take_first_fit(size) {
            Some(region) => region,
            None => match vma.take_from_break(size) {
                Some(region) => region,
                None => {
                    self.grow(vma_id, size)?;
                    self.vmas[vma_id]
                        .take_from_break(size)
                        .ok_or(MmError::VirtualSpaceExhausted {
                            end: self.vmas[vma_id].end,
                            requested: size,
                        })?
                }
            },
        };

        self.symbols[region_id] = Some(LiveRegion {
            vma: vma_id,
            region,
        });
        log::debug!("region {region_id}: allocated {region:?} in VMA {vma_id}");
        Ok(region.start)
    }

    /// Release the live region stored under `region_id` to its VMA's free list.
    ///
    /// Pages backing the region stay mapped; the space is reused by later
    /// allocations from the same VMA.
    ///
    /// # Errors
    /// [`MmError::InvalidRegionId`] or [`MmError::RegionNotLive`].
    pub fn release(&mut self, region_id: usize) -> Result<Region, MmError> {
        let live = self
            .symbols
            .get_mut(region_id)
            .ok_or(MmError::InvalidRegionId(region_id))?
            .take()
            .ok_or(MmError::RegionNotLive(region_id))?;
        self.vmas[live.vma].free.push(live.region);
        log::debug!("region {region_id}: released {:?}", live.region);
        Ok(live.region)
    }

    /// Byte accounting of VMA `vma_id`.
    ///
    /// # Errors
    /// [`MmError::NoSuchVma`] if `vma_id` is unknown.
    pub fn usage(&self, vma_id: usize) -> Result<VmaUsage, MmError> {
        let vma = self.vma(vma_id)?;
        let live = self
            .symbols
            .iter()
            .flatten()
            .filter(|live| live.vma == vma_id)
            .map(|live| live.region.len())
            .sum();
        Ok(VmaUsage {
            reserved: vma.end.distance_from(vma.start),
            live,
            free: vma.free.total(),
            unused: vma.end.distance_from(vma.brk),
        })
    }

    /// The VMA covering all of `[start, end)`.
    pub(crate) fn containing_vma(
        &self,
        start: VirtualAddress,
        end: VirtualAddress,
    ) -> Result<&Vma, MmError> {
        self.vmas
            .iter()
            .find(|vma| vma.contains(start, end))
            .ok_or(MmError::Unmapped { start, end })
    }

    /// Page-aligned `pages`-page range starting at `start`, inside one VMA.
    pub(crate) fn checked_page_range(
        &self,
        start: VirtualAddress,
        pages: u64,
    ) -> Result<(PageNumber, VirtualAddress), MmError> {
        let geometry = self.geometry();
        if !geometry.is_aligned(start.as_u64()) {
            return Err(MmError::Misaligned(start));
        }
        let end = pages
            .checked_mul(geometry.page_size())
            .and_then(|len| start.checked_add(len))
            .ok_or(MmError::Unmapped {
                start,
                end: VirtualAddress::new(u64::MAX),
            })?;
        self.containing_vma(start, end)?;
        Ok((geometry.page_of(start), end))
    }

    fn check_overlap(
        &self,
        vma_id: usize,
        start: VirtualAddress,
        end: VirtualAddress,
    ) -> Result<(), MmError> {
        match self
            .vmas
            .iter()
            .find(|vma| vma.id != vma_id && vma.overlaps(start, end))
        {
            Some(vma) => {
                log::warn!("[{start:?}..{end:?}) overlaps VMA {}", vma.id);
                Err(MmError::Overlap {
                    vma: vma.id,
                    start,
                    end,
                })
            }
            None => Ok(()),
        }
    }

    /// Acquire and map a zeroed frame for every page of `[start, end)`.
    ///
    /// All frames are acquired up front; on any failure every frame is
    /// returned and every entry written so far is cleared.
    fn map_range(&mut self, start: VirtualAddress, end: VirtualAddress) -> Result<(), MmError> {
        let geometry = self.geometry();
        let first = geometry.page_of(start);
        let count = end.distance_from(start) >> geometry.shift();
        let devices = Arc::clone(&self.devices);
        let ram = devices.ram();

        let wanted = usize::try_from(count).map_err(|_| MmError::VirtualSpaceExhausted {
            end: start,
            requested: end.distance_from(start),
        })?;
        let frames = ram.acquire_n(wanted).inspect_err(|e| {
            log::debug!("eager mapping of [{start:?}..{end:?}) refused: {e}");
        })?;

        let mut installed = 0u64;
        let mut result = Ok(());
        for (page, &frame) in (0..).map(|i| first + i).zip(&frames) {
            result = self
                .zero_frame(frame)
                .and_then(|()| self.table.install(page, frame).map_err(MmError::from));
            if result.is_err() {
                break;
            }
            installed += 1;
        }

        if let Err(e) = result {
            for page in (0..installed).map(|i| first + i) {
                if let Err(ce) = self.table.clear(page) {
                    log::error!("rollback of {page:?} failed: {ce}");
                }
            }
            for frame in frames {
                if let Err(re) = ram.release(frame) {
                    log::error!("rollback of {frame:?} failed: {re}");
                }
            }
            return Err(e);
        }

        self.fifo.extend((0..count).map(|i| first + i));
        log::debug!("mapped {count} page(s) from {first:?}");
        Ok(())
    }

    /// Fill a RAM frame with zeros.
    pub(crate) fn zero_frame(&self, frame: FrameNumber) -> Result<(), MmError> {
        let ram = self.devices.ram();
        let len = usize::try_from(ram.geometry().page_size()).unwrap_or(0);
        ram.write_frame(frame, &alloc::vec![0u8; len])?;
        Ok(())
    }

    /// Return every RAM frame and swap slot this address space still owns.
    fn release_all(&mut self) {
        let devices = Arc::clone(&self.devices);
        let (mut ram_frames, mut swap_slots) = (0usize, 0usize);
        for (page, entry) in self.table.mapped_entries() {
            let result = match entry.kind() {
                PteState::Absent => continue,
                PteState::Present { frame, .. } => {
                    ram_frames += 1;
                    devices.ram().release(frame)
                }
                PteState::Swapped { swap_type, offset } => {
                    swap_slots += 1;
                    devices
                        .swap(usize::from(swap_type))
                        .and_then(|swap| swap.release(offset))
                }
            };
            if let Err(e) = result {
                log::warn!("teardown of {page:?} ({entry:?}) failed: {e}");
            }
            if let Err(e) = self.table.set_entry(page, PtEntry::zero()) {
                log::warn!("teardown of {page:?} failed: {e}");
            }
        }
        self.fifo.clear();
        log::debug!(
            "address space released {ram_frames} RAM frame(s) and {swap_slots} swap slot(s)"
        );
    }
}

impl<T: PageTable> Drop for AddressSpace<T> {
    fn drop(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_vmem::FlatPageTable;

    fn space(ram_frames: usize, populate: Populate) -> AddressSpace<FlatPageTable> {
        let devices =
            MemoryDevices::new(PageGeometry::new(8), ram_frames * 256, &[16 * 256]).unwrap();
        AddressSpace::new(Arc::new(devices), populate)
    }

    #[test]
    fn starts_with_one_empty_vma() {
        let s = space(2, Populate::OnDemand);
        assert_eq!(s.vmas().len(), 1);
        let vma = s.vma(0).unwrap();
        assert_eq!(vma.start(), vma.end());
        assert_eq!(s.usage(0).unwrap(), VmaUsage::default());
    }

    #[test]
    fn allocation_grows_by_whole_pages() {
        let mut s = space(2, Populate::OnDemand);
        let base = s.allocate(0, 0, 600).unwrap();
        assert_eq!(base, VirtualAddress::zero());
        assert_eq!(s.vma(0).unwrap().end().as_u64(), 768);
        assert_eq!(s.vma(0).unwrap().brk().as_u64(), 600);

        // The unused tail is carved before growing again.
        let next = s.allocate(0, 1, 100).unwrap();
        assert_eq!(next.as_u64(), 600);
        assert_eq!(s.vma(0).unwrap().end().as_u64(), 768);
        assert_eq!(
            s.usage(0).unwrap(),
            VmaUsage {
                reserved: 768,
                live: 700,
                free: 0,
                unused: 68
            }
        );
    }

    #[test]
    fn region_id_rules() {
        let mut s = space(2, Populate::OnDemand);
        assert_eq!(s.allocate(0, MAX_SYMBOLS, 8), Err(MmError::InvalidRegionId(MAX_SYMBOLS)));
        assert_eq!(s.allocate(0, 0, 0), Err(MmError::ZeroSize));
        assert_eq!(s.allocate(3, 0, 8), Err(MmError::NoSuchVma(3)));
        s.allocate(0, 0, 8).unwrap();
        assert_eq!(s.allocate(0, 0, 8), Err(MmError::RegionInUse(0)));
        s.release(0).unwrap();
        assert_eq!(s.release(0), Err(MmError::RegionNotLive(0)));
        assert_eq!(s.release(99), Err(MmError::InvalidRegionId(99)));
    }

    #[test]
    fn released_space_is_reused_first_fit() {
        let mut s = space(2, Populate::OnDemand);
        s.allocate(0, 0, 100).unwrap();
        s.allocate(0, 1, 50).unwrap();
        s.release(0).unwrap();
        let end_before = s.vma(0).unwrap().end();
        assert_eq!(s.allocate(0, 2, 80).unwrap(), VirtualAddress::zero());
        assert_eq!(s.allocate(0, 3, 20).unwrap().as_u64(), 80);
        assert_eq!(s.vma(0).unwrap().end(), end_before);
        assert!(s.vma(0).unwrap().free_regions().is_empty());
    }

    #[test]
    fn vmas_do_not_overlap() {
        let mut s = space(2, Populate::OnDemand);
        let id = s.create_vma(VirtualAddress::new(512)).unwrap();
        assert_eq!(id, 1);
        s.grow(0, 512).unwrap();
        let err = s.grow(0, 1).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Overlap);
        assert_eq!(s.vma(0).unwrap().end().as_u64(), 512);

        assert!(matches!(
            s.create_vma(VirtualAddress::new(512)),
            Err(MmError::Overlap { vma: 1, .. })
        ));
        assert_eq!(
            s.create_vma(VirtualAddress::new(300)),
            Err(MmError::Misaligned(VirtualAddress::new(300)))
        );
    }

    #[test]
    fn eager_growth_is_all_or_nothing() {
        let mut s = space(2, Populate::Eager);
        let err = s.allocate(0, 0, 3 * 256).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ResourceExhausted);
        assert_eq!(s.vma(0).unwrap().end().as_u64(), 0);
        assert_eq!(s.devices().ram().free_frames(), 2);
        assert_eq!(s.resident_count(), 0);
        assert!(s.table().mapped_entries().is_empty());

        s.allocate(0, 0, 2 * 256).unwrap();
        assert_eq!(s.devices().ram().free_frames(), 0);
        assert_eq!(s.resident_count(), 2);
    }

    #[test]
    fn drop_returns_frames() {
        let devices = Arc::new(
            MemoryDevices::new(PageGeometry::new(8), 4 * 256, &[4 * 256]).unwrap(),
        );
        {
            let mut s: AddressSpace<FlatPageTable> =
                AddressSpace::new(Arc::clone(&devices), Populate::Eager);
            s.allocate(0, 0, 3 * 256).unwrap();
            assert_eq!(devices.ram().free_frames(), 1);
        }
        assert_eq!(devices.ram().free_frames(), 4);
    }
}
