//! Segregated free lists
//!
//! Each size class is a doubly linked list threaded through the free blocks'
//! payloads. The list heads are sentinels living in the prologue block and
//! share the `[prev | next]` layout of a free block, so unlinking never has
//! to special-case the head.
use crate::{codec, link::Links};

/// The number of size classes.
pub const NUM_CLASSES: usize = 14;

/// Exclusive upper bounds of all size classes but the last, which is
/// unbounded. A block of size `s` belongs to the first class whose limit is
/// greater than `s`.
pub const CLASS_LIMITS: [usize; NUM_CLASSES - 1] = [
    16, 32, 64, 128, 256, 512, 1024, 2048, 8192, 16384, 25000, 32784, 65536,
];

/// The size of a sentinel.
pub(crate) const SENTINEL_SIZE: usize = 2 * crate::link::LINK_SIZE;

/// Find the size class for a block of the specified size.
#[inline]
pub fn class_for(size: usize) -> usize {
    CLASS_LIMITS
        .iter()
        .position(|&limit| size < limit)
        .unwrap_or(NUM_CLASSES - 1)
}

/// The free list manager. It only records where the sentinels are; all list
/// state lives in the heap itself.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FreeLists {
    /// The address of the sentinel of class 0.
    root: usize,
    links: Links,
}

impl FreeLists {
    /// Clear `NUM_CLASSES` sentinels starting at `root`.
    pub fn init(mem: &mut [u8], root: usize, links: Links) -> Self {
        mem[root..root + NUM_CLASSES * SENTINEL_SIZE].fill(0);
        Self { root, links }
    }

    #[inline]
    pub fn links(&self) -> &Links {
        &self.links
    }

    #[inline]
    pub fn sentinel(&self, class: usize) -> usize {
        debug_assert!(class < NUM_CLASSES);
        self.root + class * SENTINEL_SIZE
    }

    /// The first block of `class`'s list.
    #[inline]
    pub fn first(&self, mem: &[u8], class: usize) -> Option<usize> {
        self.links.next(mem, self.sentinel(class))
    }

    /// Push the free block `bp` of the specified size to the front of its
    /// class's list.
    ///
    /// `bp` must not currently be in any list.
    pub fn insert(&self, mem: &mut [u8], bp: usize, size: usize) {
        let head = self.sentinel(class_for(size));
        let old_first = self.links.next(mem, head);

        self.links.set_next(mem, bp, old_first);
        self.links.set_prev(mem, bp, Some(head));
        if let Some(old_first) = old_first {
            self.links.set_prev(mem, old_first, Some(bp));
        }
        self.links.set_next(mem, head, Some(bp));
    }

    /// Unlink the free block `bp` from whichever list it is in.
    pub fn remove(&self, mem: &mut [u8], bp: usize) {
        let prev = self.links.prev(mem, bp);
        let next = self.links.next(mem, bp);

        // Every linked block has a predecessor, at least the sentinel
        debug_assert!(prev.is_some(), "0x{:x} is not linked", bp);

        if let Some(next) = next {
            self.links.set_prev(mem, next, prev);
        }
        if let Some(prev) = prev {
            self.links.set_next(mem, prev, next);
        }
    }

    /// First fit: scan the class of `size` front to back for a block at least
    /// `size` bytes long, then each larger class in turn.
    pub fn find_fit(&self, mem: &[u8], size: usize) -> Option<usize> {
        (class_for(size)..NUM_CLASSES).find_map(|class| {
            let mut cursor = self.first(mem, class);
            while let Some(bp) = cursor {
                if codec::block_size(mem, bp) >= size {
                    return Some(bp);
                }
                cursor = self.links.next(mem, bp);
            }
            None
        })
    }
}
