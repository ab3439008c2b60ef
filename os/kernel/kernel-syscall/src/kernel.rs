//! The kernel handle and the memory-map syscall.

use crate::abi::{MemOp, SyscallRegs, Sysno};
use crate::process::{Pid, Process, Scheduler};
use crate::{SyscallError, status_of};
use alloc::sync::Arc;
use kernel_alloc::MemoryDevices;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_mm::MmError;
use kernel_sync::{SpinLock, SpinLockGuard};
use kernel_vmem::{DefaultPageTable, PageTable};

/// Shared devices plus the scheduler queues.
pub struct Kernel<T: PageTable = DefaultPageTable> {
    devices: Arc<MemoryDevices>,
    scheduler: SpinLock<Scheduler<T>>,
}

impl<T: PageTable> Kernel<T> {
    #[must_use]
    pub fn new(devices: Arc<MemoryDevices>) -> Self {
        Self {
            devices,
            scheduler: SpinLock::new(Scheduler::new()),
        }
    }

    #[inline]
    #[must_use]
    pub const fn devices(&self) -> &Arc<MemoryDevices> {
        &self.devices
    }

    /// Lock the scheduler queues.
    pub fn scheduler(&self) -> SpinLockGuard<'_, Scheduler<T>> {
        self.scheduler.lock()
    }

    /// Find a process in any scheduler queue.
    #[must_use]
    pub fn find_process(&self, pid: Pid) -> Option<Arc<Process<T>>> {
        self.scheduler.lock().find(pid).cloned()
    }

    /// Dispatch syscall `sysno` for process `pid` and return the instruction status.
    pub fn syscall(&self, pid: Pid, sysno: u64, regs: &mut SyscallRegs) -> i64 {
        let result = match Sysno::try_from(sysno) {
            Ok(Sysno::Memmap) => self.sys_memmap(pid, regs),
            Err(nr) => Err(SyscallError::UnknownSyscall(nr)),
        };
        if let Err(e) = &result {
            log::warn!("syscall {sysno} from {pid:?} failed: {e}");
        }
        status_of(&result)
    }

    /// Memory-map syscall: run the operation selected by `regs.a1` against
    /// the address space of `pid`.
    ///
    /// [`MemOp::IoRead`] stores the byte read in `regs.a3`; other operations
    /// leave the registers untouched.
    ///
    /// # Errors
    /// - [`SyscallError::UnknownProcess`] if `pid` is in no queue.
    /// - [`SyscallError::UnknownOperation`] for an unknown selector.
    /// - [`SyscallError::InvalidOperand`] for an operand that does not fit.
    /// - [`SyscallError::Memory`] for anything the memory core rejects.
    pub fn sys_memmap(&self, pid: Pid, regs: &mut SyscallRegs) -> Result<(), SyscallError> {
        let op = MemOp::try_from(regs.a1).map_err(SyscallError::UnknownOperation)?;
        let process = self
            .find_process(pid)
            .ok_or(SyscallError::UnknownProcess(pid))?;
        let mm = process.mm();
        log::debug!("memmap {op:?} for {pid:?}: a2={:#x} a3={:#x}", regs.a2, regs.a3);

        match op {
            MemOp::Map => {
                mm.install_pattern(VirtualAddress::new(regs.a2), regs.a3)?;
            }
            MemOp::Inc => {
                let vma = usize::try_from(regs.a2).map_err(|_| SyscallError::InvalidOperand(regs.a2))?;
                mm.grow(vma, regs.a3)?;
            }
            MemOp::Swp => {
                mm.evict_pages(VirtualAddress::new(regs.a2), regs.a3)?;
            }
            MemOp::IoRead => {
                let value = self
                    .devices
                    .ram()
                    .read(PhysicalAddress::new(regs.a2))
                    .map_err(MmError::from)?;
                regs.a3 = u64::from(value);
            }
            MemOp::IoWrite => {
                let value = u8::try_from(regs.a3).map_err(|_| SyscallError::InvalidOperand(regs.a3))?;
                self.devices
                    .ram()
                    .write(PhysicalAddress::new(regs.a2), value)
                    .map_err(MmError::from)?;
            }
        }
        Ok(())
    }
}
