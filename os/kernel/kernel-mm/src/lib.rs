//! # Virtual Memory Core
//!
//! Per-process address spaces on top of shared physical devices: VMAs that
//! grow on demand, a first-fit region allocator, demand paging, and FIFO
//! eviction to swap.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  MemoryContext  (one SpinLock per process)               │
//! │  ┌────────────────────────────────────────────────────┐  │
//! │  │ AddressSpace                                       │  │
//! │  │   VMAs ─► free-region list + break                 │  │
//! │  │   symbol table: region id ─► live region           │  │
//! │  │   FIFO of resident pages                           │  │
//! │  │   PageTable (flat or 5-level)                      │  │
//! │  └──────────────────────┬─────────────────────────────┘  │
//! └─────────────────────────┼────────────────────────────────┘
//!                           │ Arc
//! ┌─────────────────────────▼────────────────────────────────┐
//! │  MemoryDevices: RAM + swap devices (locked per device)   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Lock order is always context, then device. Device locks are never held
//! across a call back into an address space.
//!
//! ## Example
//!
//! Two RAM frames, 256-byte pages: the third page touched evicts the first,
//! which is brought back transparently.
//!
//! ```rust
//! use kernel_memory_addresses::PageGeometry;
//! use kernel_mm::{MemoryConfig, MemoryContext, Populate};
//! use kernel_vmem::FlatPageTable;
//!
//! let config = MemoryConfig::default()
//!     .with_geometry(PageGeometry::new(8))
//!     .with_ram_size(2 * 256)
//!     .with_swap_sizes(&[16 * 256])
//!     .with_populate(Populate::OnDemand);
//! let ctx: MemoryContext<FlatPageTable> =
//!     MemoryContext::new(config.build_devices().unwrap(), config.populate);
//!
//! ctx.allocate(0, 0, 600).unwrap();
//! ctx.write_byte(0, 10, 0xAB).unwrap();
//! ctx.write_byte(0, 300, 0xCD).unwrap();
//! ctx.write_byte(0, 550, 0xEF).unwrap();
//! assert_eq!(ctx.read_byte(0, 10).unwrap(), 0xAB);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod access;
mod address_space;
mod config;
mod context;
mod error;
mod fault;
pub mod region;
pub mod vma;

pub use crate::address_space::AddressSpace;
pub use crate::config::{MemoryConfig, Populate};
pub use crate::context::MemoryContext;
pub use crate::error::{ErrorKind, MmError};
pub use crate::region::Region;
pub use crate::vma::{Vma, VmaUsage};
