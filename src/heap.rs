//! The allocator core
use core::{fmt, num::NonZeroUsize};

use crate::{
    codec::{
        adjusted_size, align_up, block_size, header, header_addr, is_allocated,
        next_block_addr, pack, prev_block_addr, prev_is_free, put, put_allocated, put_free,
        set_next_prev_free, size_of, DSIZE, MIN_BLOCK_SIZE, WSIZE,
    },
    link::Links,
    observer::{HeapObserver, LogObserver},
    seglist::{FreeLists, NUM_CLASSES, SENTINEL_SIZE},
    source::HeapSource,
    Error, HeapConfig,
};

mod check;

/// The size of the prologue block, which holds the size-class sentinels.
pub(crate) const PROLOGUE_SIZE: usize = DSIZE + NUM_CLASSES * SENTINEL_SIZE;

/// The bytes requested from the source by [`Heap::init`] before the first
/// free block: padding, the prologue and the epilogue header.
const INIT_SIZE: usize = PROLOGUE_SIZE + DSIZE;

/// The largest size a header can describe.
const MAX_BLOCK_SIZE: usize = (u32::MAX & !0b111) as usize;

/// The payload address of a live allocation. Never null; "no allocation" is
/// `Option<Ptr>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ptr(NonZeroUsize);

impl Ptr {
    /// The address of the first payload byte within the heap region.
    #[inline]
    pub fn addr(self) -> usize {
        self.0.get()
    }
}

#[doc = svgbobdoc::transform!(
/// A dynamic memory allocator managing one growable region.
///
/// # Heap Layout
///
/// <center>
/// ```svgbob
///  lo                                                                           hi
///  ,-----+------+--------------------+------+-----+-----------+-----+----------,
///  | pad | hdr  | 14 size-class      | ftr  | hdr | block ... | hdr | epilogue |
///  |     | 120/a| sentinels (8 each) |120/a | ... |           | ... |   0/a    |
///  '-----+------+--------------------+------+-----+-----------+-----+----------'
///         '----------- prologue -------------'
/// ```
/// </center>
///
/// Every block starts with a 4-byte header holding its size and two flags:
/// whether the block is allocated and whether its physical predecessor is
/// free. Free blocks additionally hold two 4-byte free-list links and a
/// footer duplicating the header; allocated blocks have neither.
///
/// Free blocks are kept in one of [`NUM_CLASSES`] doubly linked lists chosen
/// by size ([`CLASS_LIMITS`]). Allocation takes the first block that fits,
/// starting at the request's own class; freeing merges the block with its free
/// neighbours immediately, so no two free blocks are ever adjacent.
///
/// The region only grows. When no free block fits, the heap asks its
/// [`HeapSource`] for more memory.
///
/// [`CLASS_LIMITS`]: crate::CLASS_LIMITS
)]
pub struct Heap<S, O = LogObserver> {
    source: S,
    observer: O,
    config: HeapConfig,
    lists: FreeLists,
    /// The payload address of the prologue block, which is also the address
    /// of the first sentinel.
    prologue: usize,
}

/// Counters collected by walking the block chain.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    /// The size of the heap from [`Heap::lo`] to [`Heap::hi`], including the
    /// prologue and epilogue.
    pub heap_size: usize,
    pub allocated_blocks: usize,
    pub allocated_bytes: usize,
    pub free_blocks: usize,
    pub free_bytes: usize,
}

impl<S: HeapSource, O: HeapObserver + Default> Heap<S, O> {
    /// Lay out a new heap in `source` using the default configuration.
    ///
    /// See [`Self::with_config`].
    pub fn init(source: S) -> Result<Self, Error> {
        Self::with_config(source, HeapConfig::default(), O::default())
    }
}

impl<S: HeapSource, O: HeapObserver> Heap<S, O> {
    /// Lay out a new heap in `source`: the prologue holding the free-list
    /// sentinels, the epilogue, and a first free block of
    /// `config.initial_chunk` bytes.
    ///
    /// The heap starts at the current top of `source`, rounded up to
    /// [`DSIZE`]. Bytes already in `source` are never touched.
    pub fn with_config(mut source: S, config: HeapConfig, mut observer: O) -> Result<Self, Error> {
        let top = source.memory().len();
        let base = align_up(top).ok_or(Error::OffsetOverflow { end: usize::MAX })?;
        let bytes = base - top + INIT_SIZE;

        // Links are relative to `base`, whose padding word no block uses
        let links = Links::new(base);
        links.check_span(base.checked_add(INIT_SIZE).ok_or(Error::OffsetOverflow {
            end: usize::MAX,
        })?)?;

        let old_top = source
            .grow(bytes)
            .ok_or(Error::OutOfMemory { requested: bytes })?;
        debug_assert_eq!(old_top, top);

        let mem = source.memory_mut();
        let prologue = base + DSIZE;
        put(mem, base, 0);
        put_allocated(mem, prologue, PROLOGUE_SIZE, false);
        let lists = FreeLists::init(mem, prologue, links);
        put(
            mem,
            prologue + PROLOGUE_SIZE - DSIZE,
            pack(PROLOGUE_SIZE, true, false),
        );
        put(mem, header_addr(prologue + PROLOGUE_SIZE), pack(0, true, false));
        observer.on_grow(top, bytes);

        let mut heap = Self {
            source,
            observer,
            config,
            lists,
            prologue,
        };
        heap.extend_heap(config.initial_chunk)?;

        log::debug!("heap initialized: 0x{:x}..=0x{:x}", heap.lo(), heap.hi());
        Ok(heap)
    }

    /// Attempt to allocate a block with at least `size` bytes of payload.
    ///
    /// Returns `Ok(None)` if `size` is zero. Returns `Err` if no free block
    /// fits and the heap could not grow.
    pub fn try_allocate(&mut self, size: usize) -> Result<Option<Ptr>, Error> {
        if size == 0 {
            return Ok(None);
        }

        let asize = adjusted_size(size)
            .filter(|&x| x <= MAX_BLOCK_SIZE)
            .ok_or(Error::TooLarge { requested: size })?;

        let bp = match self.lists.find_fit(self.source.memory(), asize) {
            Some(bp) => bp,
            None => self.extend_heap(asize.max(self.config.grow_floor))?,
        };
        self.place(bp, asize);

        Ok(NonZeroUsize::new(bp).map(Ptr))
    }

    /// Attempt to allocate a block with at least `size` bytes of payload.
    ///
    /// Returns `None` if `size` is zero or the heap is out of memory.
    pub fn allocate(&mut self, size: usize) -> Option<Ptr> {
        match self.try_allocate(size) {
            Ok(ptr) => ptr,
            Err(e) => {
                log::debug!("allocate({}) failed: {}", size, e);
                None
            }
        }
    }

    /// Allocate room for `count` elements of `size` bytes each, cleared to
    /// zero.
    ///
    /// Returns `None` if the product is zero or overflows, or the heap is out
    /// of memory.
    pub fn allocate_zeroed(&mut self, count: usize, size: usize) -> Option<Ptr> {
        let ptr = self.allocate(count.checked_mul(size)?)?;
        self.payload_mut(ptr).fill(0);
        Some(ptr)
    }

    /// Deallocate a previously allocated block. Does nothing for `None`.
    ///
    /// `ptr` must be a live allocation of this heap. Freeing the same
    /// allocation twice corrupts the free lists; [`Self::check`] reports it
    /// afterwards, but nothing on this path detects it.
    pub fn free(&mut self, ptr: impl Into<Option<Ptr>>) {
        let bp = match ptr.into() {
            Some(ptr) => ptr.addr(),
            None => return,
        };

        let mem = self.source.memory_mut();
        let word = header(mem, bp);
        put_free(mem, bp, size_of(word), prev_is_free(word));
        set_next_prev_free(mem, bp, true);

        self.coalesce(bp);
    }

    /// Move an allocation to a new block of at least `new_size` bytes.
    ///
    ///  - `new_size == 0` frees `ptr` and returns `None`.
    ///  - A `None` pointer makes this an allocation.
    ///  - Otherwise a new block is allocated, the first
    ///    `min(usable_size(ptr), new_size)` bytes are copied into it, and the
    ///    old block is freed. The block is never resized in place, even when
    ///    shrinking.
    ///
    /// If the new block cannot be allocated, `None` is returned and the old
    /// allocation is left untouched.
    ///
    /// # Time Complexity
    ///
    /// Unlike other methods, this method will complete in linear time
    /// (`O(old_size)`) on top of the allocation.
    pub fn resize(&mut self, ptr: impl Into<Option<Ptr>>, new_size: usize) -> Option<Ptr> {
        let ptr = ptr.into();
        if new_size == 0 {
            self.free(ptr);
            return None;
        }

        let old = match ptr {
            Some(old) => old,
            None => return self.allocate(new_size),
        };

        let new = self.allocate(new_size)?;
        let len = self.usable_size(old).min(new_size);
        self.source
            .memory_mut()
            .copy_within(old.addr()..old.addr() + len, new.addr());
        self.free(old);

        Some(new)
    }

    /// The number of payload bytes usable through `ptr`. This is at least what
    /// was requested.
    #[inline]
    pub fn usable_size(&self, ptr: Ptr) -> usize {
        block_size(self.source.memory(), ptr.addr()) - WSIZE
    }

    /// The payload of a live allocation.
    #[inline]
    pub fn payload(&self, ptr: Ptr) -> &[u8] {
        let len = self.usable_size(ptr);
        &self.source.memory()[ptr.addr()..ptr.addr() + len]
    }

    /// The payload of a live allocation.
    #[inline]
    pub fn payload_mut(&mut self, ptr: Ptr) -> &mut [u8] {
        let len = self.usable_size(ptr);
        &mut self.source.memory_mut()[ptr.addr()..ptr.addr() + len]
    }

    /// Walk the block chain and count blocks and bytes.
    pub fn stats(&self) -> HeapStats {
        let mem = self.source.memory();
        let mut stats = HeapStats {
            heap_size: mem.len() - self.lo(),
            ..HeapStats::default()
        };

        let mut bp = next_block_addr(mem, self.prologue);
        loop {
            let word = header(mem, bp);
            let size = size_of(word);
            if size == 0 {
                break;
            }
            if is_allocated(word) {
                stats.allocated_blocks += 1;
                stats.allocated_bytes += size;
            } else {
                stats.free_blocks += 1;
                stats.free_bytes += size;
            }
            bp += size;
        }

        stats
    }

    /// The address of the lowest byte of the heap. This is 0 unless the
    /// source already held bytes when the heap was laid out.
    #[inline]
    pub fn lo(&self) -> usize {
        self.prologue - DSIZE
    }

    /// The address of the highest byte of the heap.
    #[inline]
    pub fn hi(&self) -> usize {
        self.source.memory().len() - 1
    }

    #[inline]
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    #[inline]
    pub fn source(&self) -> &S {
        &self.source
    }

    #[inline]
    pub fn observer(&self) -> &O {
        &self.observer
    }

    #[inline]
    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    /// Grow the region by at least `bytes` bytes, turn the new space into a
    /// free block and merge it with the old last block if that was free.
    /// Returns the resulting free block.
    fn extend_heap(&mut self, bytes: usize) -> Result<usize, Error> {
        let size = align_up(bytes)
            .filter(|&x| x <= MAX_BLOCK_SIZE)
            .ok_or(Error::TooLarge { requested: bytes })?
            .max(MIN_BLOCK_SIZE);

        let top = self.source.memory().len();
        let end = top
            .checked_add(size)
            .ok_or(Error::OffsetOverflow { end: usize::MAX })?;
        self.lists.links().check_span(end)?;

        let bp = self
            .source
            .grow(size)
            .ok_or(Error::OutOfMemory { requested: size })?;
        debug_assert_eq!(bp, top);

        // The old epilogue header becomes the new block's header. It already
        // knows whether the old last block is free.
        let mem = self.source.memory_mut();
        let prev_free = prev_is_free(header(mem, bp));
        put_free(mem, bp, size, prev_free);
        put(mem, header_addr(bp + size), pack(0, true, true));
        self.observer.on_grow(bp, size);

        Ok(self.coalesce(bp))
    }

    /// Carve an allocated block of `asize` bytes out of the front of the free
    /// block `bp`, splitting off the rest if it can form a block of its own.
    fn place(&mut self, bp: usize, asize: usize) {
        let lists = self.lists;
        let mem = self.source.memory_mut();
        let word = header(mem, bp);
        let csize = size_of(word);
        let prev_free = prev_is_free(word);
        debug_assert!(!is_allocated(word));
        debug_assert!(csize >= asize);

        lists.remove(mem, bp);

        if csize - asize >= MIN_BLOCK_SIZE {
            let rest = bp + asize;
            let rest_size = csize - asize;
            put_allocated(mem, bp, asize, prev_free);
            put_free(mem, rest, rest_size, false);
            set_next_prev_free(mem, rest, true);
            lists.insert(mem, rest, rest_size);
            self.observer.on_split(bp, asize, rest_size);
        } else {
            // Too small to split. The slack becomes internal fragmentation.
            put_allocated(mem, bp, csize, prev_free);
            set_next_prev_free(mem, bp, false);
        }
    }

    /// Merge the unlinked free block `bp` (header and footer already written)
    /// with its free neighbours and link the result. Returns the merged
    /// block, which starts at the predecessor if that was free.
    fn coalesce(&mut self, bp: usize) -> usize {
        let lists = self.lists;
        let mem = self.source.memory_mut();
        let word = header(mem, bp);
        let mut size = size_of(word);

        let next = next_block_addr(mem, bp);
        let next_free = !is_allocated(header(mem, next));
        let prev = if prev_is_free(word) {
            Some(prev_block_addr(mem, bp))
        } else {
            None
        };

        let mut block = bp;
        if next_free {
            size += block_size(mem, next);
            lists.remove(mem, next);
        }
        if let Some(prev) = prev {
            debug_assert!(!is_allocated(header(mem, prev)));
            size += block_size(mem, prev);
            lists.remove(mem, prev);
            block = prev;
        }

        // Invariant: no two adjacent free blocks, so `block`'s own
        // predecessor is allocated unless the heap is already corrupted
        let prev_free = prev_is_free(header(mem, block));
        put_free(mem, block, size, prev_free);
        lists.insert(mem, block, size);
        set_next_prev_free(mem, block, true);

        if next_free || prev.is_some() {
            self.observer.on_coalesce(block, size);
        }

        block
    }
}

impl<S: HeapSource, O> fmt::Debug for Heap<S, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("lo", &(self.prologue - DSIZE))
            .field("len", &self.source.memory().len())
            .field("prologue", &self.prologue)
            .field("config", &self.config)
            .finish()
    }
}
