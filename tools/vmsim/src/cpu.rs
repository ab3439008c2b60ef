//! Instruction interpreter.

use crate::loader::{Instruction, Program};
use kernel_info::memory::STATUS_FAILURE;
use kernel_mm::MmError;
use kernel_syscall::{Kernel, Process, SyscallError, SyscallRegs};
use kernel_vmem::PageTable;

/// Number of general-purpose registers of a simulated CPU.
pub const REGISTERS: usize = 10;

/// Execution state of one process.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct Cpu {
    /// Region base addresses after `alloc`, bytes after `read`.
    pub regs: [u64; REGISTERS],
    pub pc: usize,
}

/// Outcome of a complete run.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct RunSummary {
    pub executed: usize,
    pub failed: usize,
}

impl Cpu {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute the instruction at `pc` and advance. Returns `None` once the
    /// program is exhausted, otherwise the instruction status (`0` on success).
    pub fn step<T: PageTable>(
        &mut self,
        kernel: &Kernel<T>,
        process: &Process<T>,
        program: &Program,
    ) -> Option<i64> {
        let instruction = *program.code.get(self.pc)?;
        self.pc += 1;
        let status = self.execute(kernel, process, instruction);
        if status != 0 {
            log::warn!(
                "{:?}: {instruction:?} at pc {} failed with {status}",
                process.pid(),
                self.pc - 1
            );
        }
        Some(status)
    }

    /// Run `program` to completion. A failed instruction does not stop the process.
    pub fn run<T: PageTable>(
        &mut self,
        kernel: &Kernel<T>,
        process: &Process<T>,
        program: &Program,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        while let Some(status) = self.step(kernel, process, program) {
            summary.executed += 1;
            if status != 0 {
                summary.failed += 1;
            }
        }
        summary
    }

    fn execute<T: PageTable>(
        &mut self,
        kernel: &Kernel<T>,
        process: &Process<T>,
        instruction: Instruction,
    ) -> i64 {
        let mm = process.mm();
        match instruction {
            Instruction::Calc => 0,
            Instruction::Alloc { size, region } => match mm.allocate(0, region, size) {
                Ok(start) => {
                    log::info!("{:?}: region {region} at {start:?} ({size} bytes)", process.pid());
                    self.set(region, start.as_u64());
                    0
                }
                Err(e) => status(e),
            },
            Instruction::Free { region } => match mm.release(region) {
                Ok(_) => {
                    self.set(region, 0);
                    0
                }
                Err(e) => status(e),
            },
            Instruction::Read {
                region,
                offset,
                register,
            } => match mm.read_byte(region, offset) {
                Ok(value) => {
                    log::info!(
                        "{:?}: read region {region}[{offset}] = {value:#04x}",
                        process.pid()
                    );
                    if self.set(register, u64::from(value)) {
                        0
                    } else {
                        STATUS_FAILURE
                    }
                }
                Err(e) => status(e),
            },
            Instruction::Write {
                value,
                region,
                offset,
            } => {
                let [byte, ..] = value.to_le_bytes();
                match mm.write_byte(region, offset, byte) {
                    Ok(()) => 0,
                    Err(e) => status(e),
                }
            }
            Instruction::Syscall { nr, a1, a2, a3 } => {
                let mut regs = SyscallRegs::new(a1, a2, a3);
                kernel.syscall(process.pid(), nr, &mut regs)
            }
        }
    }

    /// Store into register `index`; `false` if there is no such register.
    fn set(&mut self, index: usize, value: u64) -> bool {
        self.regs.get_mut(index).map(|r| *r = value).is_some()
    }
}

fn status(e: MmError) -> i64 {
    SyscallError::Memory(e).status()
}
