//! The set of physical devices shared by every address space of a kernel.

use crate::phys_mem::{DeviceError, DeviceKind, PhysicalMemory};
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use kernel_info::memory::MAX_SWAP_DEVICES;
use kernel_memory_addresses::PageGeometry;

/// One RAM device plus up to [`MAX_SWAP_DEVICES`] swap devices.
///
/// Evictions go to the *active* swap device. The index of a swap device is
/// the swap type stored in a swapped page-table entry.
#[derive(Debug)]
pub struct MemoryDevices {
    geometry: PageGeometry,
    ram: PhysicalMemory,
    swap: Vec<PhysicalMemory>,
    active_swap: AtomicUsize,
}

impl MemoryDevices {
    /// Create a RAM device of `ram_size` bytes and one swap device per entry
    /// of `swap_sizes`. Swap device 0 starts out active.
    ///
    /// # Errors
    /// [`DeviceError::TooManySwapDevices`] if more than [`MAX_SWAP_DEVICES`]
    /// sizes are given.
    pub fn new(
        geometry: PageGeometry,
        ram_size: usize,
        swap_sizes: &[usize],
    ) -> Result<Self, DeviceError> {
        if swap_sizes.len() > MAX_SWAP_DEVICES {
            return Err(DeviceError::TooManySwapDevices {
                got: swap_sizes.len(),
                max: MAX_SWAP_DEVICES,
            });
        }

        let ram = PhysicalMemory::new(DeviceKind::Ram, geometry, ram_size);
        let swap = swap_sizes
            .iter()
            .map(|&size| PhysicalMemory::new(DeviceKind::Swap, geometry, size))
            .collect();

        Ok(Self {
            geometry,
            ram,
            swap,
            active_swap: AtomicUsize::new(0),
        })
    }

    #[inline]
    #[must_use]
    pub const fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    #[inline]
    #[must_use]
    pub const fn ram(&self) -> &PhysicalMemory {
        &self.ram
    }

    /// Swap device by index.
    ///
    /// # Errors
    /// [`DeviceError::NoSuchSwapDevice`] if `index` is not configured.
    pub fn swap(&self, index: usize) -> Result<&PhysicalMemory, DeviceError> {
        self.swap
            .get(index)
            .ok_or(DeviceError::NoSuchSwapDevice(index))
    }

    /// Number of configured swap devices.
    #[inline]
    #[must_use]
    pub fn swap_count(&self) -> usize {
        self.swap.len()
    }

    /// Index of the swap device receiving evictions.
    #[inline]
    #[must_use]
    pub fn active_swap_index(&self) -> usize {
        self.active_swap.load(Ordering::Acquire)
    }

    /// The swap device receiving evictions, with its index.
    ///
    /// # Errors
    /// [`DeviceError::NoSuchSwapDevice`] if no swap device is configured.
    pub fn active_swap(&self) -> Result<(usize, &PhysicalMemory), DeviceError> {
        let index = self.active_swap_index();
        self.swap(index).map(|dev| (index, dev))
    }

    /// Route future evictions to swap device `index`.
    ///
    /// Pages already swapped out stay on the device they were written to.
    ///
    /// # Errors
    /// [`DeviceError::NoSuchSwapDevice`] if `index` is not configured.
    pub fn set_active_swap(&self, index: usize) -> Result<(), DeviceError> {
        self.swap(index)?;
        self.active_swap.store(index, Ordering::Release);
        log::debug!("active swap device is now {index}");
        Ok(())
    }
}
