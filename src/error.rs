use thiserror::Error;

/// Errors surfaced by heap initialization and growth.
///
/// Only [`Error::OutOfMemory`] is expected in correct operation. Requests
/// that are defined as no-ops (a zero-size allocation, freeing `None`) are not
/// errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("out of memory: the heap source refused to grow by {requested} bytes")]
    OutOfMemory { requested: usize },

    #[error("heap end 0x{end:x} is beyond the range of 4-byte free-list links")]
    OffsetOverflow { end: usize },

    #[error("a request of {requested} bytes cannot be represented as a block size")]
    TooLarge { requested: usize },
}

/// A broken heap invariant reported by [`Heap::check`].
///
/// [`Heap::check`]: crate::Heap::check
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    #[error("bad prologue at 0x{addr:x}: expected an allocated block of {expected} bytes")]
    BadPrologue { addr: usize, expected: usize },

    #[error("bad epilogue at 0x{addr:x}: the block chain must end with an allocated zero-size block at the top of the heap")]
    BadEpilogue { addr: usize },

    #[error("block 0x{addr:x} is not {align}-byte aligned")]
    Misaligned { addr: usize, align: usize },

    #[error("block 0x{addr:x} has size {size}, which is not a multiple of 8 of at least the minimum block size")]
    BadSize { addr: usize, size: usize },

    #[error("block 0x{addr:x} extends past the top of the heap")]
    BlockOutOfBounds { addr: usize },

    #[error("block 0x{addr:x} has header 0x{header:x} but footer 0x{footer:x}")]
    FooterMismatch { addr: usize, header: u32, footer: u32 },

    #[error("free blocks 0x{addr:x} and 0x{next:x} are adjacent and were not coalesced")]
    AdjacentFree { addr: usize, next: usize },

    /// `recorded` is what the block's prev-free bit claims.
    #[error("block 0x{addr:x} has a stale prev-free bit (recorded: {recorded})")]
    StalePrevFree { addr: usize, recorded: bool },

    #[error("size class {class} links to 0x{addr:x}, which is outside the heap")]
    ListOutOfBounds { class: usize, addr: usize },

    #[error("size class {class} holds 0x{addr:x}, which is allocated")]
    AllocatedInList { class: usize, addr: usize },

    #[error("size class {class} holds 0x{addr:x} of size {size}, which belongs to another class")]
    WrongClass { class: usize, addr: usize, size: usize },

    #[error("size class {class} holds 0x{addr:x}, which is not a block of the heap")]
    NotABlock { class: usize, addr: usize },

    #[error("0x{addr:x} follows 0x{expected:x} in size class {class} but links back to {found:?}")]
    LinkMismatch {
        class: usize,
        addr: usize,
        expected: usize,
        found: Option<usize>,
    },

    #[error("size class {class} loops back to 0x{addr:x}")]
    Cycle { class: usize, addr: usize },

    #[error("{in_heap} free blocks in the heap but {in_lists} in the size-class lists")]
    CountMismatch { in_heap: usize, in_lists: usize },
}
