//! Block header/footer words and the address arithmetic around them
//!
//! Every function here works on the raw bytes of the managed region. A block
//! is identified by its payload address `bp`; the header word sits right
//! before it.
//!
//! ```text
//! allocated: | hdr(4) | payload ...                              |
//! free:      | hdr(4) | prev(4) | next(4) | ...        | ftr(4)  |
//! ```

/// The size of a header/footer word.
pub const WSIZE: usize = 4;

/// A double word. Block sizes and payload addresses are multiples of this.
pub const DSIZE: usize = 8;

/// The payload alignment guaranteed to clients.
pub const ALIGNMENT: usize = DSIZE;

/// The smallest block that can hold a header, two links and a footer.
pub const MIN_BLOCK_SIZE: usize = 2 * WSIZE + 2 * crate::link::LINK_SIZE;

/// The bit of a header word indicating that the block itself is allocated.
const ALLOC: u32 = 1;
/// The bit of a header word indicating that the physically preceding block is
/// free. Allocated blocks don't have footers, so this is the only way to learn
/// about the predecessor.
const PREV_FREE: u32 = 2;
/// The bits of a header word holding the block size.
const SIZE_MASK: u32 = !0b111;

/// Build a header/footer word.
#[inline]
pub fn pack(size: usize, alloc: bool, prev_free: bool) -> u32 {
    debug_assert_eq!(size % DSIZE, 0);
    debug_assert!(size <= u32::MAX as usize);
    size as u32 | if alloc { ALLOC } else { 0 } | if prev_free { PREV_FREE } else { 0 }
}

#[inline]
pub fn size_of(word: u32) -> usize {
    (word & SIZE_MASK) as usize
}

#[inline]
pub fn is_allocated(word: u32) -> bool {
    (word & ALLOC) != 0
}

/// Read from the block's own header, not from the predecessor.
#[inline]
pub fn prev_is_free(word: u32) -> bool {
    (word & PREV_FREE) != 0
}

/// Read a word at `addr`.
///
/// # Panics
///
/// Panics if `addr..addr + WSIZE` is outside `mem`. A well-formed heap never
/// does this; hitting it means a foreign pointer or a corrupted block.
#[inline]
pub fn get(mem: &[u8], addr: usize) -> u32 {
    let mut word = [0u8; WSIZE];
    word.copy_from_slice(&mem[addr..addr + WSIZE]);
    u32::from_ne_bytes(word)
}

/// Write a word at `addr`. Panics under the same condition as [`get`].
#[inline]
pub fn put(mem: &mut [u8], addr: usize, word: u32) {
    mem[addr..addr + WSIZE].copy_from_slice(&word.to_ne_bytes());
}

#[inline]
pub fn header_addr(bp: usize) -> usize {
    bp - WSIZE
}

#[inline]
pub fn header(mem: &[u8], bp: usize) -> u32 {
    get(mem, header_addr(bp))
}

#[inline]
pub fn block_size(mem: &[u8], bp: usize) -> usize {
    size_of(header(mem, bp))
}

/// The footer of a free block. Allocated blocks have payload bytes here.
#[inline]
pub fn footer_addr(mem: &[u8], bp: usize) -> usize {
    header_addr(bp) + block_size(mem, bp) - WSIZE
}

#[inline]
pub fn next_block_addr(mem: &[u8], bp: usize) -> usize {
    bp + block_size(mem, bp)
}

/// Get the physically preceding block by reading its footer.
///
/// Only meaningful when `prev_is_free(header(mem, bp))` holds; otherwise the
/// word before the header is payload of an allocated block.
#[inline]
pub fn prev_block_addr(mem: &[u8], bp: usize) -> usize {
    debug_assert!(prev_is_free(header(mem, bp)));
    bp - size_of(get(mem, bp - DSIZE))
}

/// Write the header and footer of a free block.
#[inline]
pub fn put_free(mem: &mut [u8], bp: usize, size: usize, prev_free: bool) {
    let word = pack(size, false, prev_free);
    put(mem, header_addr(bp), word);
    put(mem, header_addr(bp) + size - WSIZE, word);
}

/// Write the header of an allocated block.
#[inline]
pub fn put_allocated(mem: &mut [u8], bp: usize, size: usize, prev_free: bool) {
    put(mem, header_addr(bp), pack(size, true, prev_free));
}

/// Update the prev-free bit of the block following `bp`. If the follower is
/// free its footer is kept in sync with its header.
#[inline]
pub fn set_next_prev_free(mem: &mut [u8], bp: usize, prev_free: bool) {
    let next = next_block_addr(mem, bp);
    let word = header(mem, next);
    let word = if prev_free {
        word | PREV_FREE
    } else {
        word & !PREV_FREE
    };
    put(mem, header_addr(next), word);
    if !is_allocated(word) && size_of(word) != 0 {
        let footer = footer_addr(mem, next);
        put(mem, footer, word);
    }
}

/// Round `size` up to a multiple of [`ALIGNMENT`]. `None` on overflow.
#[inline]
pub fn align_up(size: usize) -> Option<usize> {
    Some(size.checked_add(ALIGNMENT - 1)? & !(ALIGNMENT - 1))
}

/// The block size needed to serve a request of `size` payload bytes. Only the
/// header is accounted for because allocated blocks have no footer.
#[inline]
pub fn adjusted_size(size: usize) -> Option<usize> {
    Some(align_up(size.checked_add(WSIZE)?)?.max(MIN_BLOCK_SIZE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_and_unpack() {
        let word = pack(48, true, false);
        assert_eq!(size_of(word), 48);
        assert!(is_allocated(word));
        assert!(!prev_is_free(word));

        let word = pack(4096, false, true);
        assert_eq!(size_of(word), 4096);
        assert!(!is_allocated(word));
        assert!(prev_is_free(word));

        let epilogue = pack(0, true, true);
        assert_eq!(size_of(epilogue), 0);
        assert!(is_allocated(epilogue));
    }

    #[test]
    fn adjusted_sizes() {
        assert_eq!(MIN_BLOCK_SIZE, 16);
        assert_eq!(adjusted_size(1), Some(16));
        assert_eq!(adjusted_size(12), Some(16));
        assert_eq!(adjusted_size(13), Some(24));
        assert_eq!(adjusted_size(100), Some(104));
        assert_eq!(adjusted_size(200), Some(208));
        assert_eq!(adjusted_size(usize::MAX), None);
        assert_eq!(adjusted_size(usize::MAX - WSIZE), None);
    }

    #[test]
    fn neighbours() {
        let mut mem = [0u8; 64];
        // [hdr@4 | free 24 bytes @8 ][hdr@28 | allocated 16 bytes @32][epilogue@44]
        put_free(&mut mem, 8, 24, false);
        put_allocated(&mut mem, 32, 16, true);
        put(&mut mem, 44, pack(0, true, false));

        assert_eq!(header_addr(8), 4);
        assert_eq!(footer_addr(&mem, 8), 24);
        assert_eq!(get(&mem, 24), get(&mem, 4));
        assert_eq!(next_block_addr(&mem, 8), 32);
        assert_eq!(prev_block_addr(&mem, 32), 8);
        assert_eq!(next_block_addr(&mem, 32), 48);
        assert_eq!(block_size(&mem, 48), 0);
    }

    #[test]
    fn set_next_prev_free_keeps_footer() {
        let mut mem = [0u8; 64];
        put_allocated(&mut mem, 8, 16, false);
        put_free(&mut mem, 24, 24, false);
        put(&mut mem, 44, pack(0, true, true));

        set_next_prev_free(&mut mem, 8, true);
        assert!(prev_is_free(header(&mem, 24)));
        assert_eq!(get(&mem, footer_addr(&mem, 24)), header(&mem, 24));

        set_next_prev_free(&mut mem, 24, false);
        assert!(!prev_is_free(header(&mem, 48)));
        assert!(is_allocated(header(&mem, 48)));
    }
}
