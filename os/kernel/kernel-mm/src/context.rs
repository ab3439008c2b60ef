//! Lock-protected address space, shareable between threads.

use crate::region::Region;
use crate::vma::VmaUsage;
use crate::{AddressSpace, MmError, Populate};
use alloc::sync::Arc;
use kernel_alloc::MemoryDevices;
use kernel_memory_addresses::{FrameNumber, PageNumber, VirtualAddress};
use kernel_sync::{SpinLock, SpinLockGuard};
use kernel_vmem::{DefaultPageTable, PageTable};

/// The memory context of one process: an [`AddressSpace`] behind its own lock.
///
/// Each entry point holds the lock for the whole call, including every error
/// path. Contexts of different processes never contend with each other; they
/// meet only on the device locks inside [`MemoryDevices`].
pub struct MemoryContext<T: PageTable = DefaultPageTable> {
    inner: SpinLock<AddressSpace<T>>,
}

impl<T: PageTable + Default> MemoryContext<T> {
    #[must_use]
    pub fn new(devices: Arc<MemoryDevices>, populate: Populate) -> Self {
        Self::from_space(AddressSpace::new(devices, populate))
    }
}

impl<T: PageTable> MemoryContext<T> {
    #[must_use]
    pub const fn from_space(space: AddressSpace<T>) -> Self {
        Self {
            inner: SpinLock::new(space),
        }
    }

    /// Lock the address space for a sequence of operations.
    pub fn lock(&self) -> SpinLockGuard<'_, AddressSpace<T>> {
        self.inner.lock()
    }

    /// Run `f` with the address space locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut AddressSpace<T>) -> R) -> R {
        self.inner.with_lock(f)
    }

    /// See [`AddressSpace::allocate`].
    ///
    /// # Errors
    /// As for [`AddressSpace::allocate`].
    pub fn allocate(
        &self,
        vma_id: usize,
        region_id: usize,
        size: u64,
    ) -> Result<VirtualAddress, MmError> {
        self.with(|s| s.allocate(vma_id, region_id, size))
    }

    /// See [`AddressSpace::release`].
    ///
    /// # Errors
    /// As for [`AddressSpace::release`].
    pub fn release(&self, region_id: usize) -> Result<Region, MmError> {
        self.with(|s| s.release(region_id))
    }

    /// See [`AddressSpace::grow`].
    ///
    /// # Errors
    /// As for [`AddressSpace::grow`].
    pub fn grow(&self, vma_id: usize, size: u64) -> Result<VirtualAddress, MmError> {
        self.with(|s| s.grow(vma_id, size))
    }

    /// See [`AddressSpace::create_vma`].
    ///
    /// # Errors
    /// As for [`AddressSpace::create_vma`].
    pub fn create_vma(&self, start: VirtualAddress) -> Result<usize, MmError> {
        self.with(|s| s.create_vma(start))
    }

    /// See [`AddressSpace::resolve`].
    ///
    /// # Errors
    /// As for [`AddressSpace::resolve`].
    pub fn resolve(&self, page: PageNumber) -> Result<FrameNumber, MmError> {
        self.with(|s| s.resolve(page))
    }

    /// See [`AddressSpace::read_byte`].
    ///
    /// # Errors
    /// As for [`AddressSpace::read_byte`].
    pub fn read_byte(&self, region_id: usize, offset: u64) -> Result<u8, MmError> {
        self.with(|s| s.read_byte(region_id, offset))
    }

    /// See [`AddressSpace::write_byte`].
    ///
    /// # Errors
    /// As for [`AddressSpace::write_byte`].
    pub fn write_byte(&self, region_id: usize, offset: u64, value: u8) -> Result<(), MmError> {
        self.with(|s| s.write_byte(region_id, offset, value))
    }

    /// See [`AddressSpace::evict_pages`].
    ///
    /// # Errors
    /// As for [`AddressSpace::evict_pages`].
    pub fn evict_pages(&self, start: VirtualAddress, pages: u64) -> Result<usize, MmError> {
        self.with(|s| s.evict_pages(start, pages))
    }

    /// See [`AddressSpace::install_pattern`].
    ///
    /// # Errors
    /// As for [`AddressSpace::install_pattern`].
    pub fn install_pattern(&self, start: VirtualAddress, pages: u64) -> Result<usize, MmError> {
        self.with(|s| s.install_pattern(start, pages))
    }

    /// See [`AddressSpace::usage`].
    ///
    /// # Errors
    /// As for [`AddressSpace::usage`].
    pub fn usage(&self, vma_id: usize) -> Result<VmaUsage, MmError> {
        self.with(|s| s.usage(vma_id))
    }

    /// Shared device set.
    #[must_use]
    pub fn devices(&self) -> Arc<MemoryDevices> {
        self.with(|s| Arc::clone(s.devices()))
    }

    #[must_use]
    pub fn into_inner(self) -> AddressSpace<T> {
        self.inner.into_inner()
    }
}
