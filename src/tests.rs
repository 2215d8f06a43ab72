use std::{collections::BTreeMap, ops::Range};

use crate::HeapObserver;

/// Tracks which address ranges of a heap are handed out to clients and
/// panics on any overlap.
#[derive(Debug)]
pub struct ShadowAllocator {
    regions: BTreeMap<usize, SaRegion>,
}

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum SaRegion {
    Free,
    Used,
    Invalid,
}

impl Default for ShadowAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShadowAllocator {
    pub fn new() -> Self {
        Self {
            regions: Some((0, SaRegion::Invalid)).into_iter().collect(),
        }
    }

    pub fn convert_range(
        &mut self,
        range: Range<usize>,
        old_region: SaRegion,
        new_region: SaRegion,
    ) {
        if range.len() == 0 {
            return;
        }

        assert_ne!(old_region, new_region);
        log::trace!(
            "sa: converting {:?} from {:?} to {:?}",
            range,
            old_region,
            new_region
        );

        let (&addr, &region) = self.regions.range(0..range.end).rev().next().unwrap();
        if addr > range.start {
            panic!("there's a discontinuity in range {:?}", range);
        } else if region != old_region {
            panic!(
                "range {:?} is {:?} (expected {:?})",
                range, region, old_region
            );
        }

        // Insert an element at `range.start`
        if addr == range.start {
            *self.regions.get_mut(&addr).unwrap() = new_region;
        } else {
            self.regions.insert(range.start, new_region);
        }

        // Each element must represent a discontinuity. If it doesnt't represent
        // a discontinuity, it must be removed.
        if let Some((_, &region)) = self.regions.range(0..range.start).rev().next() {
            if region == new_region {
                self.regions.remove(&range.start);
            }
        }

        if let Some(&end_region) = self.regions.get(&range.end) {
            // Each element must represent a discontinuity. If it doesnt't
            // represent a discontinuity, it must be removed.
            if end_region == new_region {
                self.regions.remove(&range.end);
            }
        } else {
            // Insert an element at `range.end`
            self.regions.insert(range.end, old_region);
        }
    }

    /// Record that the heap grew by `len` bytes at `start`.
    pub fn insert_free_block(&mut self, start: usize, len: usize) {
        self.convert_range(start..start + len, SaRegion::Invalid, SaRegion::Free);
    }

    pub fn allocate(&mut self, start: usize, len: usize) {
        assert!(
            start % crate::ALIGNMENT == 0,
            "0x{:x} is not properly aligned",
            start
        );
        self.convert_range(start..start + len, SaRegion::Free, SaRegion::Used);
    }

    pub fn deallocate(&mut self, start: usize, len: usize) {
        self.convert_range(start..start + len, SaRegion::Used, SaRegion::Free);
    }
}

/// An observer that feeds heap growth into a [`ShadowAllocator`] and counts
/// structural events.
#[derive(Debug, Default)]
pub struct TrackingObserver {
    pub sa: ShadowAllocator,
    pub grows: usize,
    pub splits: usize,
    pub coalesces: usize,
}

impl HeapObserver for TrackingObserver {
    fn on_grow(&mut self, base: usize, bytes: usize) {
        log::trace!("on_grow{:?}", (base, bytes));
        self.sa.insert_free_block(base, bytes);
        self.grows += 1;
    }

    fn on_split(&mut self, block: usize, placed: usize, remainder: usize) {
        log::trace!("on_split{:?}", (block, placed, remainder));
        self.splits += 1;
    }

    fn on_coalesce(&mut self, block: usize, size: usize) {
        log::trace!("on_coalesce{:?}", (block, size));
        self.coalesces += 1;
    }
}
