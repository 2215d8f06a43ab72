//! This crate implements a general-purpose dynamic memory allocator over a
//! single growable heap region, using segregated free lists, boundary-tag
//! coalescing, and first-fit placement.
//!
//!  - **The heap region is provided by an application.** A [`HeapSource`]
//!    hands out memory at the top of the region on request. [`VecSource`]
//!    grows a `Vec<u8>` up to a cap; [`MmapSource`] (Unix only) walks a break
//!    pointer through an anonymous memory mapping.
//!
//!  - **Small metadata.** Allocated blocks carry a single 4-byte header. Free
//!    blocks store their list links as 4-byte offsets into the heap, so the
//!    smallest block is 16 bytes.
//!
//!  - **All state lives in the heap.** The list heads are sentinels inside the
//!    heap's prologue block, and every address is an index into the region,
//!    which is why [`Heap::check`] can audit the whole structure at any time
//!    between operations.
//!
//!  - **This crate supports `#![no_std]`.** It needs `alloc` for
//!    [`VecSource`] and for the checker's report.
//!
//! The region never shrinks and nothing is returned to the operating system.
//! A [`Heap`] is single-threaded; wrap it in a lock to share it.
//!
//! # Examples
//!
//! ```rust
//! use segfit::{Heap, VecSource};
//!
//! let mut heap: Heap<VecSource> = Heap::init(VecSource::default()).unwrap();
//!
//! let a = heap.allocate(100).unwrap();
//! let b = heap.allocate(200).unwrap();
//! heap.payload_mut(a)[..5].copy_from_slice(b"hello");
//! heap.free(a);
//!
//! // First fit finds `a`'s block before growing the heap
//! let c = heap.allocate(90).unwrap();
//! assert_eq!(c, a);
//!
//! let c = heap.resize(c, 300).unwrap();
//! heap.free(b);
//! heap.free(c);
//! assert_eq!(heap.validate(false), Ok(()));
//! ```
//!
//! Observing structural events:
//!
//! ```rust
//! use segfit::{Heap, HeapConfig, HeapObserver, VecSource};
//!
//! #[derive(Default)]
//! struct Grows(usize);
//!
//! impl HeapObserver for Grows {
//!     fn on_grow(&mut self, _base: usize, _bytes: usize) {
//!         self.0 += 1;
//!     }
//! }
//!
//! let config = HeapConfig::default().with_initial_chunk(64);
//! let mut heap = Heap::with_config(VecSource::default(), config, Grows(0)).unwrap();
//! // The prologue and the first chunk
//! assert_eq!(heap.observer().0, 2);
//! heap.allocate(4096).unwrap();
//! assert_eq!(heap.observer().0, 3);
//! ```
#![no_std]
#![cfg_attr(feature = "doc_cfg", feature(doc_cfg))]

extern crate alloc;

#[cfg(test)]
extern crate std;

mod codec;
mod config;
mod error;
mod heap;
mod link;
mod observer;
mod seglist;
mod source;
pub use self::{
    codec::{ALIGNMENT, DSIZE, MIN_BLOCK_SIZE, WSIZE},
    config::HeapConfig,
    error::{Error, Violation},
    heap::{Heap, HeapStats, Ptr},
    link::LINK_SIZE,
    observer::{HeapObserver, LogObserver},
    seglist::{class_for, CLASS_LIMITS, NUM_CLASSES},
    source::{HeapSource, VecSource, DEFAULT_MAX_HEAP},
};

#[cfg(unix)]
#[cfg_attr(feature = "doc_cfg", doc(cfg(unix)))]
pub use self::source::MmapSource;

#[cfg(test)]
mod tests;
