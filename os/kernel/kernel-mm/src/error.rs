use kernel_alloc::{DeviceError, FrameAllocError};
use kernel_memory_addresses::{PageNumber, VirtualAddress};
use kernel_vmem::PageTableError;

/// Coarse failure class of an [`MmError`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    /// Bad region id, zero size, misaligned or out-of-range argument.
    InvalidArgument,
    /// An id or address with no backing entry.
    NotFound,
    /// VMA growth or creation would intersect a sibling VMA.
    Overlap,
    /// Not enough physical frames, swap slots or virtual space.
    ResourceExhausted,
    /// A physical device rejected the access.
    IoFailure,
}

/// Errors of the memory-management core.
///
/// Every operation that returns one of these has left the address space as
/// it was before the call.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum MmError {
    #[error("region id {0} is outside the symbol table")]
    InvalidRegionId(usize),
    #[error("region id {0} is already in use")]
    RegionInUse(usize),
    #[error("region id {0} does not hold a live region")]
    RegionNotLive(usize),
    #[error("allocation size must be non-zero")]
    ZeroSize,
    #[error("no VMA with id {0}")]
    NoSuchVma(usize),
    #[error("offset {offset} outside region of {len} bytes")]
    OffsetOutOfRange { offset: u64, len: u64 },
    #[error("address {0} is not page aligned")]
    Misaligned(VirtualAddress),
    #[error("range {start}..{end} is not inside a VMA")]
    Unmapped {
        start: VirtualAddress,
        end: VirtualAddress,
    },
    #[error("range {start}..{end} overlaps VMA {vma}")]
    Overlap {
        vma: usize,
        start: VirtualAddress,
        end: VirtualAddress,
    },
    #[error("virtual address space exhausted: {requested} bytes past {end}")]
    VirtualSpaceExhausted { end: VirtualAddress, requested: u64 },
    #[error(transparent)]
    Frames(#[from] FrameAllocError),
    #[error("no resident page left to evict")]
    NoVictim,
    #[error("swap device {0} has no free slot")]
    SwapExhausted(usize),
    #[error("eviction victim {0:?} is not resident")]
    StaleVictim(PageNumber),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    PageTable(#[from] PageTableError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

impl MmError {
    /// Classify the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRegionId(_)
            | Self::RegionInUse(_)
            | Self::ZeroSize
            | Self::OffsetOutOfRange { .. }
            | Self::Misaligned(_)
            | Self::PageTable(_)
            | Self::InvalidConfig(_)
            | Self::Device(DeviceError::TooManySwapDevices { .. }) => ErrorKind::InvalidArgument,
            Self::RegionNotLive(_)
            | Self::NoSuchVma(_)
            | Self::Unmapped { .. }
            | Self::StaleVictim(_) => ErrorKind::NotFound,
            Self::Overlap { .. } => ErrorKind::Overlap,
            Self::VirtualSpaceExhausted { .. }
            | Self::Frames(_)
            | Self::NoVictim
            | Self::SwapExhausted(_) => ErrorKind::ResourceExhausted,
            Self::Device(_) => ErrorKind::IoFailure,
        }
    }
}
