/// Tunables of a [`Heap`].
///
/// Both sizes are rounded up to a multiple of 8 bytes and to at least
/// [`MIN_BLOCK_SIZE`] when they are used.
///
/// [`Heap`]: crate::Heap
/// [`MIN_BLOCK_SIZE`]: crate::MIN_BLOCK_SIZE
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct HeapConfig {
    /// The number of bytes the heap grows by right after laying out the
    /// prologue, forming the first free block.
    pub initial_chunk: usize,
    /// The minimum number of bytes the heap grows by when no free block fits
    /// a request. Larger requests grow the heap by exactly what they need.
    pub grow_floor: usize,
}

impl HeapConfig {
    pub const DEFAULT: Self = Self {
        initial_chunk: 512,
        grow_floor: 128,
    };

    pub const fn with_initial_chunk(self, initial_chunk: usize) -> Self {
        Self {
            initial_chunk,
            ..self
        }
    }

    pub const fn with_grow_floor(self, grow_floor: usize) -> Self {
        Self { grow_floor, ..self }
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
