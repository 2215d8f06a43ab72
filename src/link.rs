//! Compressed free-list links
//!
//! Free-list links are stored as 4-byte offsets from the bottom of the heap
//! instead of full-width addresses, which keeps the minimum block at 16
//! bytes. Offset 0 stands for "no block"; the bottom word of the heap is
//! padding, so no real block or sentinel ever lives there.
use crate::{codec, Error};

/// The size of a stored link.
pub const LINK_SIZE: usize = core::mem::size_of::<u32>();

/// Converts between heap addresses and stored link offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Links {
    base: usize,
}

impl Links {
    #[inline]
    pub fn new(base: usize) -> Self {
        Self { base }
    }

    /// Check that a heap ending (exclusively) at `end` keeps every address
    /// representable as a link offset.
    pub fn check_span(&self, end: usize) -> Result<(), Error> {
        match end.checked_sub(self.base) {
            Some(span) if span <= u32::MAX as usize => Ok(()),
            _ => Err(Error::OffsetOverflow { end }),
        }
    }

    #[inline]
    pub fn to_offset(&self, addr: Option<usize>) -> u32 {
        match addr {
            None => 0,
            Some(addr) => {
                debug_assert!(addr > self.base);
                debug_assert!(addr - self.base <= u32::MAX as usize);
                (addr - self.base) as u32
            }
        }
    }

    #[inline]
    pub fn to_addr(&self, offset: u32) -> Option<usize> {
        if offset == 0 {
            None
        } else {
            Some(self.base + offset as usize)
        }
    }

    /// Read the `prev` link of the free block (or sentinel) at `bp`.
    #[inline]
    pub fn prev(&self, mem: &[u8], bp: usize) -> Option<usize> {
        self.to_addr(codec::get(mem, bp))
    }

    /// Read the `next` link of the free block (or sentinel) at `bp`.
    #[inline]
    pub fn next(&self, mem: &[u8], bp: usize) -> Option<usize> {
        self.to_addr(codec::get(mem, bp + LINK_SIZE))
    }

    #[inline]
    pub fn set_prev(&self, mem: &mut [u8], bp: usize, prev: Option<usize>) {
        codec::put(mem, bp, self.to_offset(prev));
    }

    #[inline]
    pub fn set_next(&self, mem: &mut [u8], bp: usize, next: Option<usize>) {
        codec::put(mem, bp + LINK_SIZE, self.to_offset(next));
    }
}
