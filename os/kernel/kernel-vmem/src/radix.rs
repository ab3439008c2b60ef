//! # Five-level radix page table
//!
//! A page number is split into five 9-bit indices, outermost first:
//!
//! ```text
//! | 44‒36 | 35‒27 | 26‒18 | 17‒9 | 8‒0 |
//! |  PGD  |  P4D  |  PUD  |  PMD |  PT |
//! ```
//!
//! Each level is a node of 512 slots. Directory slots own their child node
//! (`Option<Box<_>>`) and are filled on the first write along a path; leaf
//! nodes hold [`PtEntry`] values. Reads walk the existing nodes only and
//! report an absent entry as soon as a slot on the path is empty.

use crate::page_table::check_range;
use crate::{PageTable, PageTableError, PtEntry};
use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use kernel_info::memory::{PT_ENTRIES, PT_INDEX_BITS, PT_LEVELS, RADIX_MAX_PAGES};
use kernel_memory_addresses::PageNumber;

const INDEX_MASK: u64 = (1 << PT_INDEX_BITS) - 1;

/// Split a page number into its five level indices, outermost first.
#[inline]
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub const fn level_indices(page: PageNumber) -> [usize; PT_LEVELS] {
    let p = page.as_u64();
    let mut out = [0usize; PT_LEVELS];
    let mut level = 0;
    while level < PT_LEVELS {
        let shift = PT_INDEX_BITS * (PT_LEVELS - 1 - level) as u32;
        out[level] = ((p >> shift) & INDEX_MASK) as usize;
        level += 1;
    }
    out
}

/// Lowest level: 512 entries.
struct Leaf {
    entries: Box<[PtEntry]>,
}

impl Default for Leaf {
    fn default() -> Self {
        Self {
            entries: vec![PtEntry::zero(); PT_ENTRIES].into_boxed_slice(),
        }
    }
}

/// Interior level: 512 lazily created children.
struct Directory<T> {
    slots: Box<[Option<Box<T>>]>,
}

impl<T> Default for Directory<T> {
    fn default() -> Self {
        Self {
            slots: (0..PT_ENTRIES).map(|_| None).collect(),
        }
    }
}

impl<T: Default> Directory<T> {
    #[inline]
    fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index)?.as_deref()
    }

    #[inline]
    fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index)?.as_deref_mut()
    }

    /// The child at `index`, creating an empty one first if needed.
    #[inline]
    fn get_or_insert(&mut self, index: usize, created: &mut usize) -> &mut T {
        let slot = &mut self.slots[index];
        if slot.is_none() {
            *created += 1;
        }
        slot.get_or_insert_with(Box::default)
    }

    fn children(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_deref().map(|c| (i, c)))
    }
}

type Pmd = Directory<Leaf>;
type Pud = Directory<Pmd>;
type P4d = Directory<Pud>;
type Pgd = Directory<P4d>;

/// Lazily populated 5-level page table.
///
/// A fresh table owns only the (empty) top-level directory.
#[derive(Default)]
pub struct RadixPageTable {
    pgd: Pgd,
    nodes: usize,
}

impl RadixPageTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes allocated below the top-level directory.
    #[must_use]
    pub const fn node_count(&self) -> usize {
        self.nodes
    }

    fn leaf(&self, idx: &[usize; PT_LEVELS]) -> Option<&Leaf> {
        self.pgd.get(idx[0])?.get(idx[1])?.get(idx[2])?.get(idx[3])
    }

    fn leaf_mut(&mut self, idx: &[usize; PT_LEVELS]) -> Option<&mut Leaf> {
        self.pgd
            .get_mut(idx[0])?
            .get_mut(idx[1])?
            .get_mut(idx[2])?
            .get_mut(idx[3])
    }

    fn leaf_or_insert(&mut self, idx: &[usize; PT_LEVELS]) -> &mut Leaf {
        let mut created = 0;
        let leaf = self
            .pgd
            .get_or_insert(idx[0], &mut created)
            .get_or_insert(idx[1], &mut created)
            .get_or_insert(idx[2], &mut created)
            .get_or_insert(idx[3], &mut created);

        if created > 0 {
            log::trace!("radix table: allocated {created} node(s) for path {idx:?}");
        }
        self.nodes += created;
        leaf
    }
}

impl PageTable for RadixPageTable {
    fn max_pages(&self) -> u64 {
        RADIX_MAX_PAGES
    }

    fn translate(&self, page: PageNumber) -> PtEntry {
        if check_range(page, RADIX_MAX_PAGES).is_err() {
            return PtEntry::zero();
        }
        let idx = level_indices(page);
        self.leaf(&idx)
            .map_or_else(PtEntry::zero, |leaf| leaf.entries[idx[4]])
    }

    fn set_entry(&mut self, page: PageNumber, entry: PtEntry) -> Result<(), PageTableError> {
        check_range(page, RADIX_MAX_PAGES)?;
        let idx = level_indices(page);

        // Clearing never builds a path.
        if entry.is_zero() {
            if let Some(leaf) = self.leaf_mut(&idx) {
                leaf.entries[idx[4]] = entry;
            }
            return Ok(());
        }

        self.leaf_or_insert(&idx).entries[idx[4]] = entry;
        Ok(())
    }

    fn mapped_entries(&self) -> Vec<(PageNumber, PtEntry)> {
        let mut out = Vec::new();
        for (i0, p4d) in self.pgd.children() {
            for (i1, pud) in p4d.children() {
                for (i2, pmd) in pud.children() {
                    for (i3, leaf) in pmd.children() {
                        let prefix = [i0, i1, i2, i3]
                            .iter()
                            .fold(0u64, |acc, &i| (acc << PT_INDEX_BITS) | i as u64);
                        for (i4, e) in leaf.entries.iter().enumerate() {
                            if !e.is_zero() {
                                let page = (prefix << PT_INDEX_BITS) | i4 as u64;
                                out.push((PageNumber::new(page), *e));
                            }
                        }
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PteState;
    use kernel_memory_addresses::FrameNumber;

    #[test]
    fn indices_split_outermost_first() {
        let page = PageNumber::new((3 << 36) | (4 << 27) | (5 << 18) | (6 << 9) | 7);
        assert_eq!(level_indices(page), [3, 4, 5, 6, 7]);
        assert_eq!(level_indices(PageNumber::new(0x1FF)), [0, 0, 0, 0, 511]);
    }

    #[test]
    fn translate_does_not_allocate() {
        let t = RadixPageTable::new();
        assert_eq!(t.translate(PageNumber::new(12345)).kind(), PteState::Absent);
        assert_eq!(t.node_count(), 0);
    }

    #[test]
    fn install_builds_one_path_and_shares_it() {
        let mut t = RadixPageTable::new();
        t.install(PageNumber::new(1), FrameNumber::new(10)).unwrap();
        assert_eq!(t.node_count(), 4);
        t.install(PageNumber::new(2), FrameNumber::new(11)).unwrap();
        assert_eq!(t.node_count(), 4);
        t.install(PageNumber::new(1 << 9), FrameNumber::new(12)).unwrap();
        assert_eq!(t.node_count(), 5);

        assert_eq!(t.translate(PageNumber::new(2)).frame(), Some(FrameNumber::new(11)));
        assert_eq!(
            t.translate(PageNumber::new(1 << 9)).frame(),
            Some(FrameNumber::new(12))
        );
        assert_eq!(t.translate(PageNumber::new(3)).kind(), PteState::Absent);
    }

    #[test]
    fn clearing_an_unbuilt_path_allocates_nothing() {
        let mut t = RadixPageTable::new();
        t.clear(PageNumber::new(999_999)).unwrap();
        assert_eq!(t.node_count(), 0);
    }

    #[test]
    fn mapped_entries_reconstructs_page_numbers() {
        let mut t = RadixPageTable::new();
        let far = PageNumber::new((1 << 36) | 42);
        t.install(PageNumber::new(7), FrameNumber::new(1)).unwrap();
        t.mark_swapped(far, 0, FrameNumber::new(5)).unwrap();

        let mapped = t.mapped_entries();
        assert_eq!(mapped.len(), 2);
        assert_eq!(mapped[0].0, PageNumber::new(7));
        assert_eq!(mapped[1].0, far);
        assert_eq!(
            mapped[1].1.kind(),
            PteState::Swapped {
                swap_type: 0,
                offset: FrameNumber::new(5)
            }
        );
    }

    #[test]
    fn beyond_the_tree_is_out_of_range() {
        let mut t = RadixPageTable::new();
        let p = PageNumber::new(RADIX_MAX_PAGES);
        assert!(t.install(p, FrameNumber::new(0)).is_err());
        assert_eq!(t.translate(p), PtEntry::zero());
    }
}
