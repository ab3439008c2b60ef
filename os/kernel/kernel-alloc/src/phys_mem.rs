//! # Physical Memory Device
//!
//! A fixed-size byte store with a free-frame list, used for both RAM and swap.
//!
//! The device is carved into `size / page_size` frames numbered from zero. The
//! free list starts ordered `0..frames` and behaves as a stack: [`acquire`]
//! pops the head, [`release`] pushes the head.
//!
//! Every method takes `&self`; the byte store and the free list sit behind one
//! [`SpinLock`] so that several address spaces can share the device.
//!
//! [`acquire`]: PhysicalMemory::acquire
//! [`release`]: PhysicalMemory::release

use crate::{FrameAlloc, FrameAllocError};
use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use kernel_memory_addresses::{FrameNumber, PageGeometry, PhysicalAddress};
use kernel_sync::SpinLock;

/// What a device is used for. Only affects diagnostics.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeviceKind {
    Ram,
    Swap,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ram => f.write_str("RAM"),
            Self::Swap => f.write_str("SWAP"),
        }
    }
}

/// Errors reported by a [`PhysicalMemory`] or [`MemoryDevices`](crate::MemoryDevices).
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum DeviceError {
    #[error("physical address {address} outside device of {size} bytes")]
    OutOfBounds { address: PhysicalAddress, size: u64 },
    #[error("frame {frame} outside device of {frames} frames")]
    InvalidFrame { frame: FrameNumber, frames: u64 },
    #[error("frame {0} is already free")]
    DoubleFree(FrameNumber),
    #[error("no swap device with index {0}")]
    NoSuchSwapDevice(usize),
    #[error("at most {max} swap devices are supported, got {got}")]
    TooManySwapDevices { got: usize, max: usize },
}

struct DeviceState {
    storage: Box<[u8]>,
    free: VecDeque<FrameNumber>,
    /// `true` while the frame is handed out.
    in_use: Box<[bool]>,
}

/// A byte-addressable memory device split into page-sized frames.
pub struct PhysicalMemory {
    kind: DeviceKind,
    geometry: PageGeometry,
    frames: u64,
    state: SpinLock<DeviceState>,
}

impl PhysicalMemory {
    /// Create a zero-filled device of `size` bytes with every frame free.
    ///
    /// Trailing bytes that do not fill a whole frame are addressable but never
    /// handed out as a frame.
    #[must_use]
    pub fn new(kind: DeviceKind, geometry: PageGeometry, size: usize) -> Self {
        let frames = (size as u64) >> geometry.shift();
        let free = (0..frames).map(FrameNumber::new).collect();
        log::debug!(
            "{kind} device: {size} bytes, {frames} frames of {} bytes",
            geometry.page_size()
        );
        Self {
            kind,
            geometry,
            frames,
            state: SpinLock::new(DeviceState {
                storage: vec![0u8; size].into_boxed_slice(),
                free,
                in_use: vec![false; usize::try_from(frames).unwrap_or(0)].into_boxed_slice(),
            }),
        }
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> DeviceKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub const fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    /// Total number of frames on the device.
    #[inline]
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Device size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.state.lock().storage.len() as u64
    }

    /// Read one byte.
    ///
    /// # Errors
    /// [`DeviceError::OutOfBounds`] if `address` lies past the end of the device.
    pub fn read(&self, address: PhysicalAddress) -> Result<u8, DeviceError> {
        let state = self.state.lock();
        let index = Self::index(&state, address)?;
        Ok(state.storage[index])
    }

    /// Write one byte.
    ///
    /// # Errors
    /// [`DeviceError::OutOfBounds`] if `address` lies past the end of the device.
    pub fn write(&self, address: PhysicalAddress, value: u8) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        let index = Self::index(&state, address)?;
        state.storage[index] = value;
        Ok(())
    }

    /// Copy the content of `frame` into `buf` (which must be one page long).
    ///
    /// # Errors
    /// [`DeviceError::InvalidFrame`] if `frame` is not on this device.
    pub fn read_frame(&self, frame: FrameNumber, buf: &mut [u8]) -> Result<(), DeviceError> {
        let range = self.frame_range(frame)?;
        debug_assert_eq!(buf.len(), range.len());
        let state = self.state.lock();
        buf.copy_from_slice(&state.storage[range]);
        Ok(())
    }

    /// Overwrite `frame` with `buf` (which must be one page long).
    ///
    /// # Errors
    /// [`DeviceError::InvalidFrame`] if `frame` is not on this device.
    pub fn write_frame(&self, frame: FrameNumber, buf: &[u8]) -> Result<(), DeviceError> {
        let range = self.frame_range(frame)?;
        debug_assert_eq!(buf.len(), range.len());
        let mut state = self.state.lock();
        state.storage[range].copy_from_slice(buf);
        Ok(())
    }

    /// Log every non-zero byte of the device at debug level.
    pub fn dump(&self) {
        let state = self.state.lock();
        log::debug!(
            "{} dump: {} of {} frames free",
            self.kind,
            state.free.len(),
            self.frames
        );
        for (address, byte) in state.storage.iter().enumerate().filter(|(_, b)| **b != 0) {
            log::debug!("  {address:#010x}: {byte:#04x}");
        }
    }

    fn index(state: &DeviceState, address: PhysicalAddress) -> Result<usize, DeviceError> {
        let size = state.storage.len() as u64;
        if address.as_u64() >= size {
            return Err(DeviceError::OutOfBounds { address, size });
        }
        usize::try_from(address.as_u64()).map_err(|_| DeviceError::OutOfBounds { address, size })
    }

    fn check_frame(&self, frame: FrameNumber) -> Result<usize, DeviceError> {
        let invalid = DeviceError::InvalidFrame {
            frame,
            frames: self.frames,
        };
        if frame.as_u64() >= self.frames {
            return Err(invalid);
        }
        usize::try_from(frame.as_u64()).map_err(|_| invalid)
    }

    fn frame_range(&self, frame: FrameNumber) -> Result<core::ops::Range<usize>, DeviceError> {
        let page = usize::try_from(self.geometry.page_size()).map_err(|_| {
            DeviceError::InvalidFrame {
                frame,
                frames: self.frames,
            }
        })?;
        let start = self.check_frame(frame)? * page;
        Ok(start..start + page)
    }
}

impl FrameAlloc for PhysicalMemory {
    fn acquire(&self) -> Option<FrameNumber> {
        let mut state = self.state.lock();
        let frame = state.free.pop_front()?;
        if let Ok(i) = usize::try_from(frame.as_u64()) {
            state.in_use[i] = true;
        }
        log::trace!("{} acquire {frame:?}", self.kind);
        Some(frame)
    }

    fn release(&self, frame: FrameNumber) -> Result<(), DeviceError> {
        let index = self.check_frame(frame)?;
        let mut state = self.state.lock();
        if !state.in_use[index] {
            return Err(DeviceError::DoubleFree(frame));
        }
        state.in_use[index] = false;
        state.free.push_front(frame);
        log::trace!("{} release {frame:?}", self.kind);
        Ok(())
    }

    fn free_frames(&self) -> usize {
        self.state.lock().free.len()
    }

    /// Check and take under one lock hold, so concurrent callers never see a
    /// shortage that was not there.
    fn acquire_n(&self, count: usize) -> Result<Vec<FrameNumber>, FrameAllocError> {
        let mut state = self.state.lock();
        let available = state.free.len();
        if available < count {
            return Err(FrameAllocError::Insufficient {
                requested: count,
                available,
            });
        }

        let frames: Vec<FrameNumber> = state.free.drain(..count).collect();
        for frame in &frames {
            if let Ok(i) = usize::try_from(frame.as_u64()) {
                state.in_use[i] = true;
            }
        }
        log::trace!("{} acquire {count} frames", self.kind);
        Ok(frames)
    }
}

impl fmt::Debug for PhysicalMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicalMemory")
            .field("kind", &self.kind)
            .field("geometry", &self.geometry)
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

/// Copy one whole frame from `src` to `dst`.
///
/// The two devices are locked one after the other, never together, so copying
/// between a RAM and a swap device cannot deadlock against a copy in the
/// opposite direction.
///
/// # Errors
/// Either frame is not on its device.
pub fn copy_frame(
    src: &PhysicalMemory,
    src_frame: FrameNumber,
    dst: &PhysicalMemory,
    dst_frame: FrameNumber,
) -> Result<(), DeviceError> {
    debug_assert_eq!(src.geometry, dst.geometry);
    let len = usize::try_from(src.geometry.page_size()).map_err(|_| DeviceError::InvalidFrame {
        frame: src_frame,
        frames: src.frames,
    })?;
    let mut buf = vec![0u8; len];
    src.read_frame(src_frame, &mut buf)?;
    dst.write_frame(dst_frame, &buf)
}
