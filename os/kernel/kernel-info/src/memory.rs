//! # Memory Layout

/// Number of bits of a virtual address that select the byte inside a page.
#[cfg(not(feature = "mm64"))]
pub const PAGE_SHIFT: u32 = 8;

/// Number of bits of a virtual address that select the byte inside a page.
#[cfg(feature = "mm64")]
pub const PAGE_SHIFT: u32 = 12;

/// Size of one virtual page and one physical frame, in bytes.
pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;

/// Width of the flat (single level) virtual address space in bits.
pub const FLAT_ADDRESS_BITS: u32 = 22;

/// Number of entries of the flat page table.
pub const FLAT_MAX_PAGES: u64 = 1 << (FLAT_ADDRESS_BITS - 8);

/// Number of levels of the multi-level page table (PGD, P4D, PUD, PMD, PT).
pub const PT_LEVELS: usize = 5;

/// Index bits consumed by each page-table level.
pub const PT_INDEX_BITS: u32 = 9;

/// Entries per page-table node.
pub const PT_ENTRIES: usize = 1 << PT_INDEX_BITS;

/// Highest page number (exclusive) reachable through the multi-level table.
pub const RADIX_MAX_PAGES: u64 = 1 << (PT_INDEX_BITS * PT_LEVELS as u32);

/// Capacity of the per-process symbol (region) table.
pub const MAX_SYMBOLS: usize = 30;

/// Maximum number of swap devices attached to a kernel.
pub const MAX_SWAP_DEVICES: usize = 4;

/// Number of priority buckets of the multi-level ready queue.
pub const MAX_PRIORITY: usize = 140;

/// Default size of the RAM device in bytes.
pub const DEFAULT_RAM_SIZE: u64 = 0x10_0000;

/// Default size of the (single) swap device in bytes.
pub const DEFAULT_SWAP_SIZE: u64 = 0x100_0000;

/// Raw PTE value stamped over a range by the pattern-install syscall.
pub const PTE_POISON_PATTERN: u64 = 0xDEAD_BEEF;

/// Syscall number of the memory-map syscall family.
pub const SYS_MEMMAP: u64 = 17;

/// Instruction status signalling "insufficient resources".
pub const STATUS_NO_MEMORY: i64 = -3000;

/// Instruction status for any other failure.
pub const STATUS_FAILURE: i64 = -1;

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(PAGE_SHIFT + PT_INDEX_BITS * (PT_LEVELS as u32) < 64);
    assert!(FLAT_MAX_PAGES > 0);
    assert!(DEFAULT_RAM_SIZE.is_multiple_of(PAGE_SIZE));
    assert!(DEFAULT_SWAP_SIZE.is_multiple_of(PAGE_SIZE));
};
