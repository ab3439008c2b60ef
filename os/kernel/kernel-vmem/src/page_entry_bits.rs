use bitfield_struct::bitfield;

/// Raw 64-bit page-table entry.
///
/// One layout serves both the present and the swapped form; the low field is
/// a RAM frame number in the former and a swap-slot offset in the latter.
///
/// ### Bit layout
///
/// | Bits   | Name              | Meaning |
/// |--------|-------------------|---------|
/// | 0–39   | `frame_or_offset` | RAM frame number (present) or swap frame (swapped) |
/// | 40–44  | `swap_type`       | Index of the swap device holding the page |
/// | 45–60  | reserved          | Must be zero |
/// | 61     | `dirty`           | Page written since it was installed |
/// | 62     | `swapped`         | Content lives on a swap device |
/// | 63     | `present`         | Entry carries a valid mapping |
///
/// ### Notes
/// - A swapped entry keeps `present` set. Decode through
///   [`PtEntry::kind`](crate::PtEntry::kind), which gives `swapped` precedence,
///   rather than reading `present` directly.
/// - An entry with neither flag is absent; its payload bits carry no meaning.
///
/// ### Example
/// ```rust
/// # use kernel_vmem::PageEntryBits;
/// let e = PageEntryBits::new().with_present(true).with_frame_or_offset(7);
/// assert!(e.present());
/// assert_eq!(e.frame_or_offset(), 7);
/// assert_eq!(u64::from(e), (1 << 63) | 7);
/// ```
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PageEntryBits {
    /// RAM frame number or swap offset (bits 0..39).
    #[bits(40)]
    pub frame_or_offset: u64,

    /// Swap device index (bits 40..44).
    #[bits(5)]
    pub swap_type: u8,

    #[bits(16)]
    __reserved: u16,

    /// Dirty (bit 61).
    pub dirty: bool,
    /// Swapped (bit 62).
    pub swapped: bool,
    /// Present (bit 63).
    pub present: bool,
}

/// Largest frame number or swap offset an entry can hold.
pub const MAX_ENTRY_FRAME: u64 = (1 << 40) - 1;

/// Largest swap device index an entry can hold.
pub const MAX_SWAP_TYPE: u8 = (1 << 5) - 1;
