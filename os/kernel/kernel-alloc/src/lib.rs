//! # Physical Memory Devices and Frame Allocation
//!
//! This crate models the physical side of the paging subsystem: byte-addressed
//! memory devices carved into page-sized frames, and the allocator contract the
//! rest of the kernel uses to obtain and return those frames.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   MemoryDevices                     │
//! │    • one RAM device                                 │
//! │    • up to MAX_SWAP_DEVICES swap devices            │
//! │    • one "active" swap device receiving evictions   │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │                 PhysicalMemory                      │
//! │    • byte store (read / write)                      │
//! │    • free-frame list (acquire / release)            │
//! │    • one SpinLock over both                         │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │                   FrameAlloc                        │
//! │    • single-frame acquire / release                 │
//! │    • fail-fast bulk acquire with rollback           │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! ### Physical Memory ([`phys_mem`])
//!
//! A fixed-size byte array with a free-frame list. Frames are handed out from
//! the head of the list and returned to the head, so a just-released frame is
//! the next one acquired. Releasing a frame twice or a frame outside the
//! device is rejected rather than corrupting the list.
//!
//! ### Frame Allocator ([`frame_alloc`])
//!
//! [`FrameAlloc::acquire_n`] is **fail-fast**: it compares the free-frame count
//! with the request before popping anything and refuses the whole request
//! with [`FrameAllocError::Insufficient`]. It never evicts to make room, since
//! eviction may itself need a frame. If frames vanish between the check and
//! the pops (another address space raced us), everything popped so far is
//! returned before the error propagates.
//!
//! ### Device Set ([`devices`])
//!
//! [`MemoryDevices`] is shared by every address space of a kernel through an
//! `Arc`. The page-table entry of a swapped page records the *index* of the
//! swap device holding it, so swap-in always reads from the right device even
//! after the active device changed.
//!
//! ## Usage Patterns
//!
//! ```rust
//! use kernel_alloc::{FrameAlloc, MemoryDevices};
//! use kernel_memory_addresses::PageGeometry;
//!
//! let devices = MemoryDevices::new(PageGeometry::new(8), 4 * 256, &[8 * 256]).unwrap();
//! let ram = devices.ram();
//!
//! let frames = ram.acquire_n(3).unwrap();
//! assert_eq!(ram.free_frames(), 1);
//! assert!(ram.acquire_n(2).is_err());
//!
//! for f in frames {
//!     ram.release(f).unwrap();
//! }
//! assert_eq!(ram.free_frames(), 4);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

pub mod devices;
pub mod frame_alloc;
pub mod phys_mem;

pub use crate::devices::MemoryDevices;
pub use crate::frame_alloc::{FrameAlloc, FrameAllocError};
pub use crate::phys_mem::{DeviceError, DeviceKind, PhysicalMemory, copy_frame};
