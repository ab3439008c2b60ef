//! # Syscall Front
//!
//! Maps a raw syscall number and register triple onto one operation of the
//! memory core, for the process whose id the caller names.
//!
//! ```text
//! syscall(pid, 17, {a1, a2, a3})
//!    │
//!    ├─ find pid in running → ready → priority queues
//!    └─ match a1
//!         1 Map      install_pattern(a2, a3)
//!         2 Inc      grow(vma a2, a3 bytes)
//!         3 Swp      evict_pages(a2, a3)
//!         4 IoRead   a3 = RAM[a2]
//!         5 IoWrite  RAM[a2] = a3
//! ```
//!
//! The result is an instruction status: `0` on success, `-3000` when the
//! memory core ran out of frames, swap slots or address space, `-1` otherwise.
//!
//! ```rust
//! use std::sync::Arc;
//! use kernel_memory_addresses::PageGeometry;
//! use kernel_mm::{MemoryContext, MemoryConfig, Populate};
//! use kernel_syscall::{Kernel, MemOp, Pid, Process, SyscallRegs};
//! use kernel_vmem::FlatPageTable;
//!
//! let config = MemoryConfig::default()
//!     .with_geometry(PageGeometry::new(8))
//!     .with_ram_size(4 * 256)
//!     .with_swap_sizes(&[4 * 256]);
//! let devices = config.build_devices().unwrap();
//! let kernel: Kernel<FlatPageTable> = Kernel::new(Arc::clone(&devices));
//!
//! let mm = MemoryContext::new(Arc::clone(&devices), Populate::OnDemand);
//! kernel.scheduler().admit(Arc::new(Process::new(Pid::new(1), 0, mm)));
//!
//! let mut regs = SyscallRegs::memmap(MemOp::Inc, 0, 300);
//! assert_eq!(kernel.syscall(Pid::new(1), 17, &mut regs), 0);
//! assert_eq!(kernel.syscall(Pid::new(2), 17, &mut regs), -1);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod abi;
mod error;
mod kernel;
mod process;

pub use crate::abi::{MemOp, SyscallRegs, Sysno};
pub use crate::error::{SyscallError, status_of};
pub use crate::kernel::Kernel;
pub use crate::process::{Pid, Process, ProcessQueue, Scheduler};
