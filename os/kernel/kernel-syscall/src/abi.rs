//! Syscall numbers, memory-operation selectors and the register triple.

use kernel_info::memory::SYS_MEMMAP;

/// Syscall numbers.
#[repr(u64)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Sysno {
    /// Memory-map family; the operation is selected by `a1`.
    Memmap = SYS_MEMMAP,
}

impl TryFrom<u64> for Sysno {
    type Error = u64;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            x if x == Self::Memmap as u64 => Ok(Self::Memmap),
            other => Err(other),
        }
    }
}

/// Operation selector of [`Sysno::Memmap`], passed in `a1`.
///
/// | Selector | `a2` | `a3` |
/// |----------|------|------|
/// | `Map` | range start | page count |
/// | `Inc` | VMA id | byte count |
/// | `Swp` | range start | page count |
/// | `IoRead` | physical address | receives the byte |
/// | `IoWrite` | physical address | byte to write |
#[repr(u64)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MemOp {
    /// Stamp the poison pattern into the absent entries of a range.
    Map = 1,
    /// Grow a VMA.
    Inc = 2,
    /// Evict the resident pages of a range to swap.
    Swp = 3,
    /// Read one byte of RAM by physical address.
    IoRead = 4,
    /// Write one byte of RAM by physical address.
    IoWrite = 5,
}

impl TryFrom<u64> for MemOp {
    type Error = u64;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Ok(match value {
            1 => Self::Map,
            2 => Self::Inc,
            3 => Self::Swp,
            4 => Self::IoRead,
            5 => Self::IoWrite,
            other => return Err(other),
        })
    }
}

/// Syscall argument registers. `a1` selects the operation.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct SyscallRegs {
    pub a1: u64,
    pub a2: u64,
    pub a3: u64,
}

impl SyscallRegs {
    #[must_use]
    pub const fn new(a1: u64, a2: u64, a3: u64) -> Self {
        Self { a1, a2, a3 }
    }

    /// Registers for a memory operation.
    #[must_use]
    pub const fn memmap(op: MemOp, a2: u64, a3: u64) -> Self {
        Self::new(op as u64, a2, a3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_round_trip_through_their_numbers() {
        for op in [MemOp::Map, MemOp::Inc, MemOp::Swp, MemOp::IoRead, MemOp::IoWrite] {
            assert_eq!(MemOp::try_from(op as u64), Ok(op));
        }
        assert_eq!(MemOp::try_from(0), Err(0));
        assert_eq!(MemOp::try_from(6), Err(6));
        assert_eq!(Sysno::try_from(17), Ok(Sysno::Memmap));
        assert_eq!(Sysno::try_from(1), Err(1));
    }
}
