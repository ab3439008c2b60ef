//! Runtime configuration of the memory core.

use crate::MmError;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use kernel_alloc::MemoryDevices;
use kernel_info::memory::{DEFAULT_RAM_SIZE, DEFAULT_SWAP_SIZE, MAX_SWAP_DEVICES};
use kernel_memory_addresses::PageGeometry;
use kernel_vmem::MAX_ENTRY_FRAME;

/// When physical frames are attached to newly reserved virtual space.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Populate {
    /// VMA growth acquires and maps a frame for every new page, failing with
    /// a resource error if RAM cannot hold them all.
    Eager,
    /// VMA growth only reserves address space; the first access to each page
    /// faults a frame in.
    #[default]
    OnDemand,
}

/// Device sizes and paging policy.
///
/// ```rust
/// # use kernel_mm::{MemoryConfig, Populate};
/// # use kernel_memory_addresses::PageGeometry;
/// let config = MemoryConfig::default()
///     .with_geometry(PageGeometry::new(8))
///     .with_ram_size(2 * 256)
///     .with_swap_sizes(&[16 * 256])
///     .with_populate(Populate::OnDemand);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MemoryConfig {
    pub geometry: PageGeometry,
    pub ram_size: usize,
    pub swap_sizes: Vec<usize>,
    pub populate: Populate,
}

impl Default for MemoryConfig {
    #[allow(clippy::cast_possible_truncation)]
    fn default() -> Self {
        Self {
            geometry: PageGeometry::default(),
            ram_size: DEFAULT_RAM_SIZE as usize,
            swap_sizes: vec![DEFAULT_SWAP_SIZE as usize],
            populate: Populate::default(),
        }
    }
}

impl MemoryConfig {
    #[must_use]
    pub const fn with_geometry(mut self, geometry: PageGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    #[must_use]
    pub const fn with_ram_size(mut self, bytes: usize) -> Self {
        self.ram_size = bytes;
        self
    }

    #[must_use]
    pub fn with_swap_sizes(mut self, sizes: &[usize]) -> Self {
        self.swap_sizes = sizes.to_vec();
        self
    }

    #[must_use]
    pub const fn with_populate(mut self, populate: Populate) -> Self {
        self.populate = populate;
        self
    }

    /// Check that every device holds a whole, non-zero number of frames that
    /// a page-table entry can address.
    ///
    /// # Errors
    /// [`MmError::InvalidConfig`] naming the first violated rule.
    pub fn validate(&self) -> Result<(), MmError> {
        let shift = self.geometry.shift();
        if shift == 0 || shift >= 32 {
            return Err(MmError::InvalidConfig("page shift must be in 1..32"));
        }
        if self.swap_sizes.len() > MAX_SWAP_DEVICES {
            return Err(MmError::InvalidConfig("too many swap devices"));
        }
        for &size in core::iter::once(&self.ram_size).chain(&self.swap_sizes) {
            let size = size as u64;
            if size == 0 || !self.geometry.is_aligned(size) {
                return Err(MmError::InvalidConfig(
                    "device size must be a non-zero multiple of the page size",
                ));
            }
            if (size >> shift) > MAX_ENTRY_FRAME + 1 {
                return Err(MmError::InvalidConfig("device has more frames than a PTE can address"));
            }
        }
        Ok(())
    }

    /// Validate the configuration and create the shared device set.
    ///
    /// # Errors
    /// See [`validate`](Self::validate).
    pub fn build_devices(&self) -> Result<Arc<MemoryDevices>, MmError> {
        self.validate()?;
        let devices = MemoryDevices::new(self.geometry, self.ram_size, &self.swap_sizes)?;
        log::info!(
            "memory devices: RAM {} bytes, {} swap device(s), {}-byte pages, {:?} population",
            self.ram_size,
            self.swap_sizes.len(),
            self.geometry.page_size(),
            self.populate
        );
        Ok(Arc::new(devices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        MemoryConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_unaligned_and_empty_devices() {
        let g = PageGeometry::new(8);
        let c = MemoryConfig::default().with_geometry(g).with_ram_size(300);
        assert!(matches!(c.validate(), Err(MmError::InvalidConfig(_))));
        let c = MemoryConfig::default().with_geometry(g).with_swap_sizes(&[0]);
        assert!(c.validate().is_err());
        let c = MemoryConfig::default().with_geometry(g).with_swap_sizes(&[256; 5]);
        assert!(c.validate().is_err());
    }

    #[test]
    fn builds_devices() {
        let d = MemoryConfig::default()
            .with_geometry(PageGeometry::new(8))
            .with_ram_size(4 * 256)
            .with_swap_sizes(&[8 * 256, 2 * 256])
            .build_devices()
            .unwrap();
        assert_eq!(d.ram().frame_count(), 4);
        assert_eq!(d.swap_count(), 2);
    }
}
