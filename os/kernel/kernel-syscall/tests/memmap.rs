use kernel_alloc::{FrameAlloc, MemoryDevices};
use kernel_memory_addresses::{PageGeometry, PageNumber};
use kernel_mm::{MemoryContext, Populate};
use kernel_syscall::{Kernel, MemOp, Pid, Process, SyscallError, SyscallRegs};
use kernel_vmem::{FlatPageTable, PageTable, PteState};
use std::sync::Arc;

const MEMMAP: u64 = 17;

fn kernel(ram_frames: usize) -> Kernel<FlatPageTable> {
    let devices = MemoryDevices::new(PageGeometry::new(8), ram_frames * 256, &[8 * 256]).unwrap();
    Kernel::new(Arc::new(devices))
}

fn spawn(kernel: &Kernel<FlatPageTable>, pid: u32, priority: u32, populate: Populate) -> Arc<Process<FlatPageTable>> {
    let mm = MemoryContext::new(Arc::clone(kernel.devices()), populate);
    let process = Arc::new(Process::new(Pid::new(pid), priority, mm));
    kernel.scheduler().admit(Arc::clone(&process));
    process
}

#[test]
fn processes_are_found_in_every_queue() {
    let k = kernel(2);
    spawn(&k, 1, 0, Populate::OnDemand);
    let mm = MemoryContext::new(Arc::clone(k.devices()), Populate::OnDemand);
    k.scheduler()
        .admit_by_priority(Arc::new(Process::new(Pid::new(2), 5, mm)));
    spawn(&k, 3, 0, Populate::OnDemand);
    assert!(k.scheduler().start(Pid::new(3)).is_some());

    for pid in [1, 2, 3] {
        let mut regs = SyscallRegs::memmap(MemOp::Inc, 0, 256);
        assert_eq!(k.syscall(Pid::new(pid), MEMMAP, &mut regs), 0, "pid {pid}");
    }

    let mut regs = SyscallRegs::memmap(MemOp::Inc, 0, 256);
    assert_eq!(
        k.sys_memmap(Pid::new(4), &mut regs),
        Err(SyscallError::UnknownProcess(Pid::new(4)))
    );
    assert!(k.scheduler().finish(Pid::new(3)).is_some());
    assert!(k.find_process(Pid::new(3)).is_none());
}

#[test]
fn unknown_numbers_fail_with_generic_status() {
    let k = kernel(2);
    spawn(&k, 1, 0, Populate::OnDemand);
    let mut regs = SyscallRegs::new(9, 0, 0);
    assert_eq!(k.syscall(Pid::new(1), MEMMAP, &mut regs), -1);
    assert_eq!(k.sys_memmap(Pid::new(1), &mut regs), Err(SyscallError::UnknownOperation(9)));
    let mut regs = SyscallRegs::memmap(MemOp::Inc, 0, 256);
    assert_eq!(k.syscall(Pid::new(1), 99, &mut regs), -1);
}

#[test]
fn growth_without_frames_reports_no_memory() {
    let k = kernel(2);
    let p = spawn(&k, 1, 0, Populate::Eager);
    let mut regs = SyscallRegs::memmap(MemOp::Inc, 0, 3 * 256);
    assert_eq!(k.syscall(Pid::new(1), MEMMAP, &mut regs), -3000);
    assert_eq!(p.mm().with(|s| s.vma(0).unwrap().end().as_u64()), 0);
    assert_eq!(k.devices().ram().free_frames(), 2);

    let mut regs = SyscallRegs::memmap(MemOp::Inc, 0, 2 * 256);
    assert_eq!(k.syscall(Pid::new(1), MEMMAP, &mut regs), 0);
    assert_eq!(k.devices().ram().free_frames(), 0);
}

#[test]
fn map_and_swap_operate_on_page_ranges() {
    let k = kernel(4);
    let p = spawn(&k, 1, 0, Populate::OnDemand);
    p.mm().allocate(0, 0, 4 * 256).unwrap();
    p.mm().write_byte(0, 256, 0x77).unwrap();

    let mut regs = SyscallRegs::memmap(MemOp::Map, 0, 4);
    assert_eq!(k.syscall(Pid::new(1), MEMMAP, &mut regs), 0);
    p.mm().with(|s| {
        assert_eq!(s.table().translate(PageNumber::new(0)).raw(), 0xDEAD_BEEF);
        assert!(s.table().translate(PageNumber::new(1)).frame().is_some());
    });

    let mut regs = SyscallRegs::memmap(MemOp::Swp, 256, 1);
    assert_eq!(k.syscall(Pid::new(1), MEMMAP, &mut regs), 0);
    p.mm().with(|s| {
        assert!(matches!(
            s.table().translate(PageNumber::new(1)).kind(),
            PteState::Swapped { .. }
        ));
    });
    assert_eq!(p.mm().read_byte(0, 256), Ok(0x77));

    // Misaligned and out-of-VMA ranges are rejected.
    let mut regs = SyscallRegs::memmap(MemOp::Swp, 10, 1);
    assert_eq!(k.syscall(Pid::new(1), MEMMAP, &mut regs), -1);
    let mut regs = SyscallRegs::memmap(MemOp::Map, 0, 5);
    assert_eq!(k.syscall(Pid::new(1), MEMMAP, &mut regs), -1);
}

#[test]
fn raw_physical_io() {
    let k = kernel(2);
    spawn(&k, 1, 0, Populate::OnDemand);

    let mut regs = SyscallRegs::memmap(MemOp::IoWrite, 300, 0x5A);
    assert_eq!(k.syscall(Pid::new(1), MEMMAP, &mut regs), 0);
    let mut regs = SyscallRegs::memmap(MemOp::IoRead, 300, 0);
    assert_eq!(k.syscall(Pid::new(1), MEMMAP, &mut regs), 0);
    assert_eq!(regs.a3, 0x5A);

    let mut regs = SyscallRegs::memmap(MemOp::IoRead, 512, 0);
    assert_eq!(k.syscall(Pid::new(1), MEMMAP, &mut regs), -1);
    let mut regs = SyscallRegs::memmap(MemOp::IoWrite, 0, 256);
    assert_eq!(
        k.sys_memmap(Pid::new(1), &mut regs),
        Err(SyscallError::InvalidOperand(256))
    );
}
