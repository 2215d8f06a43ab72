//! Hooks into the allocator's structural events
//!
//! The allocator reports heap growth, block splits and coalescing to a
//! [`HeapObserver`]. The default observer, [`LogObserver`], forwards them to
//! the `log` facade.

/// Receives notifications about structural changes of a heap. All methods
/// default to doing nothing.
///
/// Observers are called after the heap has been updated but before the
/// public operation returns. They must not assume anything about the state of
/// the heap at that point beyond the arguments they receive.
pub trait HeapObserver {
    /// The region grew by `bytes` bytes starting at `base`.
    #[inline]
    fn on_grow(&mut self, base: usize, bytes: usize) {
        let _ = (base, bytes);
    }

    /// The free block at `block` was split into an allocated block of `placed`
    /// bytes and a free remainder of `remainder` bytes.
    #[inline]
    fn on_split(&mut self, block: usize, placed: usize, remainder: usize) {
        let _ = (block, placed, remainder);
    }

    /// Physically adjacent free blocks were merged into the free block at
    /// `block`, which is now `size` bytes long.
    #[inline]
    fn on_coalesce(&mut self, block: usize, size: usize) {
        let _ = (block, size);
    }
}

/// Ignores everything.
impl HeapObserver for () {}

impl<T: HeapObserver + ?Sized> HeapObserver for &mut T {
    #[inline]
    fn on_grow(&mut self, base: usize, bytes: usize) {
        (**self).on_grow(base, bytes)
    }

    #[inline]
    fn on_split(&mut self, block: usize, placed: usize, remainder: usize) {
        (**self).on_split(block, placed, remainder)
    }

    #[inline]
    fn on_coalesce(&mut self, block: usize, size: usize) {
        (**self).on_coalesce(block, size)
    }
}

/// Emits a `trace`-level log record for every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl HeapObserver for LogObserver {
    fn on_grow(&mut self, base: usize, bytes: usize) {
        log::trace!("grow: {} bytes at 0x{:x}", bytes, base);
    }

    fn on_split(&mut self, block: usize, placed: usize, remainder: usize) {
        log::trace!(
            "split: 0x{:x} → {} bytes allocated + {} bytes free at 0x{:x}",
            block,
            placed,
            remainder,
            block + placed
        );
    }

    fn on_coalesce(&mut self, block: usize, size: usize) {
        log::trace!("coalesce: 0x{:x} is now {} bytes", block, size);
    }
}
