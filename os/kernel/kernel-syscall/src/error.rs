use crate::Pid;
use kernel_info::memory::{STATUS_FAILURE, STATUS_NO_MEMORY};
use kernel_mm::{ErrorKind, MmError};

/// Errors of the syscall front.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum SyscallError {
    #[error("no process with pid {0}")]
    UnknownProcess(Pid),
    #[error("unknown syscall number {0}")]
    UnknownSyscall(u64),
    #[error("unknown memory operation {0}")]
    UnknownOperation(u64),
    #[error("operand {0:#x} out of range")]
    InvalidOperand(u64),
    #[error(transparent)]
    Memory(#[from] MmError),
}

impl SyscallError {
    /// Instruction status reported to the caller.
    ///
    /// Resource exhaustion keeps its own code so that callers can tell an
    /// out-of-memory condition from a logic error.
    #[must_use]
    pub const fn status(&self) -> i64 {
        match self {
            Self::Memory(e) if matches!(e.kind(), ErrorKind::ResourceExhausted) => STATUS_NO_MEMORY,
            _ => STATUS_FAILURE,
        }
    }
}

/// Status of a syscall result: `0` on success, see [`SyscallError::status`] otherwise.
#[must_use]
pub const fn status_of(result: &Result<(), SyscallError>) -> i64 {
    match result {
        Ok(()) => 0,
        Err(e) => e.status(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_alloc::FrameAllocError;

    #[test]
    fn status_codes() {
        assert_eq!(status_of(&Ok(())), 0);
        let oom = SyscallError::from(MmError::from(FrameAllocError::Insufficient {
            requested: 2,
            available: 0,
        }));
        assert_eq!(oom.status(), -3000);
        assert_eq!(SyscallError::from(MmError::NoVictim).status(), -3000);
        assert_eq!(SyscallError::from(MmError::ZeroSize).status(), -1);
        assert_eq!(SyscallError::UnknownProcess(Pid::new(3)).status(), -1);
        assert_eq!(SyscallError::UnknownOperation(9).status(), -1);
    }
}
