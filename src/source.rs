//! The memory a [`Heap`] manages
//!
//! [`Heap`]: crate::Heap
use alloc::vec::Vec;

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use self::unix::MmapSource;

/// The default cap of [`VecSource`], 20 MiB.
pub const DEFAULT_MAX_HEAP: usize = 20 << 20;

/// The provider of the heap region. The region only ever grows at its top
/// end.
///
/// Every address handed around by the allocator is a byte index into
/// [`Self::memory`]; there is no separate base address. A source may already
/// hold bytes when a heap is laid out in it, in which case the heap starts
/// after them.
pub trait HeapSource {
    /// Extend the region by exactly `bytes` bytes.
    ///
    /// Returns the index of the first new byte, which is the length of
    /// [`Self::memory`] before the call. Returns `None` if the region cannot
    /// grow any further, in which case the region must be left unchanged.
    fn grow(&mut self, bytes: usize) -> Option<usize>;

    /// The current region.
    fn memory(&self) -> &[u8];

    /// The current region.
    fn memory_mut(&mut self) -> &mut [u8];
}

impl<T: HeapSource + ?Sized> HeapSource for &mut T {
    #[inline]
    fn grow(&mut self, bytes: usize) -> Option<usize> {
        (**self).grow(bytes)
    }

    #[inline]
    fn memory(&self) -> &[u8] {
        (**self).memory()
    }

    #[inline]
    fn memory_mut(&mut self) -> &mut [u8] {
        (**self).memory_mut()
    }
}

/// A [`HeapSource`] backed by a `Vec<u8>` that may grow up to a fixed cap.
#[derive(Debug, Clone)]
pub struct VecSource {
    mem: Vec<u8>,
    max_len: usize,
}

impl VecSource {
    /// Construct an empty `VecSource` that refuses to grow beyond `max_len`
    /// bytes.
    pub fn new(max_len: usize) -> Self {
        Self {
            mem: Vec::new(),
            max_len,
        }
    }

    #[inline]
    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl Default for VecSource {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HEAP)
    }
}

impl HeapSource for VecSource {
    fn grow(&mut self, bytes: usize) -> Option<usize> {
        let old_len = self.mem.len();
        let new_len = old_len.checked_add(bytes).filter(|&x| x <= self.max_len)?;
        self.mem.try_reserve_exact(bytes).ok()?;
        self.mem.resize(new_len, 0);
        Some(old_len)
    }

    #[inline]
    fn memory(&self) -> &[u8] {
        &self.mem
    }

    #[inline]
    fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.mem
    }
}
