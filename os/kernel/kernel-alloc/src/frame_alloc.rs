//! Frame allocator contract shared by RAM and swap devices.

use alloc::vec::Vec;
use kernel_memory_addresses::FrameNumber;

/// Error returned by [`FrameAlloc::acquire_n`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FrameAllocError {
    #[error("insufficient free frames: requested {requested}, available {available}")]
    Insufficient { requested: usize, available: usize },
}

/// Source of page-sized physical frames.
///
/// Implementations use interior locking so that one allocator can be shared
/// by every address space of a kernel.
pub trait FrameAlloc {
    /// Take one free frame, or `None` if the device is full.
    fn acquire(&self) -> Option<FrameNumber>;

    /// Return a frame previously obtained from [`acquire`](Self::acquire).
    ///
    /// # Errors
    /// Rejects frames outside the device and frames that are already free.
    fn release(&self, frame: FrameNumber) -> Result<(), crate::DeviceError>;

    /// Number of frames currently free.
    fn free_frames(&self) -> usize;

    /// Take `count` frames at once, or none at all.
    ///
    /// The request is refused up front if fewer than `count` frames are free.
    /// Frames popped before a late shortage are returned before the error
    /// propagates, so a failed call leaves the free list as it found it.
    ///
    /// # Errors
    /// [`FrameAllocError::Insufficient`] if the device cannot satisfy the request.
    fn acquire_n(&self, count: usize) -> Result<Vec<FrameNumber>, FrameAllocError> {
        let available = self.free_frames();
        if available < count {
            return Err(FrameAllocError::Insufficient {
                requested: count,
                available,
            });
        }

        let mut frames = Vec::with_capacity(count);
        for _ in 0..count {
            if let Some(frame) = self.acquire() {
                frames.push(frame);
                continue;
            }

            let got = frames.len();
            for frame in frames.drain(..) {
                if let Err(e) = self.release(frame) {
                    log::error!("rollback of {frame:?} failed: {e}");
                }
            }
            return Err(FrameAllocError::Insufficient {
                requested: count,
                available: got,
            });
        }
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DeviceError;
    use core::cell::RefCell;

    /// Hands out frames from a fixed pool but pretends to have more than it does,
    /// to force the late-shortage rollback path.
    struct LyingAlloc {
        free: RefCell<Vec<FrameNumber>>,
        claimed: usize,
    }

    impl FrameAlloc for LyingAlloc {
        fn acquire(&self) -> Option<FrameNumber> {
            self.free.borrow_mut().pop()
        }

        fn release(&self, frame: FrameNumber) -> Result<(), DeviceError> {
            self.free.borrow_mut().push(frame);
            Ok(())
        }

        fn free_frames(&self) -> usize {
            self.claimed
        }
    }

    #[test]
    fn late_shortage_rolls_back_every_popped_frame() {
        let a = LyingAlloc {
            free: RefCell::new((0..3).map(FrameNumber::new).collect()),
            claimed: 5,
        };
        let err = a.acquire_n(5).unwrap_err();
        assert_eq!(
            err,
            FrameAllocError::Insufficient {
                requested: 5,
                available: 3
            }
        );
        assert_eq!(a.free.borrow().len(), 3);
    }

    #[test]
    fn up_front_check_pops_nothing() {
        let a = LyingAlloc {
            free: RefCell::new((0..2).map(FrameNumber::new).collect()),
            claimed: 2,
        };
        assert!(a.acquire_n(3).is_err());
        assert_eq!(a.free.borrow().len(), 2);
        assert_eq!(a.acquire_n(2).unwrap().len(), 2);
    }
}
