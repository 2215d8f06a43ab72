//! Heap consistency checker
use alloc::{collections::BTreeSet, vec::Vec};

use super::{Heap, PROLOGUE_SIZE};
use crate::{
    codec::{
        footer_addr, get, header, header_addr, is_allocated, prev_is_free, size_of, ALIGNMENT,
        DSIZE, MIN_BLOCK_SIZE, WSIZE,
    },
    seglist::{class_for, NUM_CLASSES},
    source::HeapSource,
    Violation,
};

impl<S: HeapSource, O> Heap<S, O> {
    /// Check the heap against every structural invariant and return all
    /// violations found. An empty result means the heap is consistent.
    ///
    /// The block chain is walked from the prologue to the epilogue first,
    /// then every size-class list is walked on its own, and finally the
    /// number of free blocks seen by both walks is compared. Nothing is
    /// repaired.
    ///
    /// With `verbose`, every block and every non-empty list is dumped at the
    /// `debug` log level.
    pub fn check(&self, verbose: bool) -> Vec<Violation> {
        let mem = self.source.memory();
        let lo = self.prologue - DSIZE;
        let top = mem.len();
        let mut violations = Vec::new();

        let prologue = self.prologue;
        let word = header(mem, prologue);
        if size_of(word) != PROLOGUE_SIZE || !is_allocated(word) {
            violations.push(Violation::BadPrologue {
                addr: prologue,
                expected: PROLOGUE_SIZE,
            });
            // The chain can't be walked without a sane starting point
            return violations;
        }
        let footer = get(mem, prologue + PROLOGUE_SIZE - DSIZE);
        if footer != word {
            violations.push(Violation::FooterMismatch {
                addr: prologue,
                header: word,
                footer,
            });
        }

        if verbose {
            log::debug!("heap 0x{:x}..0x{:x}:", lo, top);
        }

        // Physical walk
        let mut free_blocks = BTreeSet::new();
        let mut prev = prologue;
        let mut prev_allocated = true;
        let mut bp = prologue + PROLOGUE_SIZE;
        loop {
            if header_addr(bp) + WSIZE > top {
                violations.push(Violation::BlockOutOfBounds { addr: bp });
                break;
            }

            let word = header(mem, bp);
            let size = size_of(word);
            let allocated = is_allocated(word);

            if prev_is_free(word) == prev_allocated {
                violations.push(Violation::StalePrevFree {
                    addr: bp,
                    recorded: prev_is_free(word),
                });
            }

            if size == 0 {
                if verbose {
                    log::debug!("  0x{:x}: end of heap", bp);
                }
                if !allocated || header_addr(bp) + WSIZE != top {
                    violations.push(Violation::BadEpilogue { addr: bp });
                }
                break;
            }

            if verbose {
                log::debug!(
                    "  0x{:x}: [{}:{}] prev_free: {}",
                    bp,
                    size,
                    if allocated { 'a' } else { 'f' },
                    prev_is_free(word)
                );
            }

            if bp % ALIGNMENT != 0 {
                violations.push(Violation::Misaligned {
                    addr: bp,
                    align: ALIGNMENT,
                });
            }
            if size < MIN_BLOCK_SIZE || size % DSIZE != 0 {
                violations.push(Violation::BadSize { addr: bp, size });
            }
            if bp + size > top {
                violations.push(Violation::BlockOutOfBounds { addr: bp });
                break;
            }

            if !allocated {
                let footer = get(mem, footer_addr(mem, bp));
                if footer != word {
                    violations.push(Violation::FooterMismatch {
                        addr: bp,
                        header: word,
                        footer,
                    });
                }
                if !prev_allocated {
                    violations.push(Violation::AdjacentFree {
                        addr: prev,
                        next: bp,
                    });
                }
                free_blocks.insert(bp);
            }

            prev = bp;
            prev_allocated = allocated;
            bp += size;
        }

        // List walk
        let links = self.lists.links();
        let mut visited = BTreeSet::new();
        let mut in_lists = 0;
        for class in 0..NUM_CLASSES {
            let sentinel = self.lists.sentinel(class);
            let mut prev = sentinel;
            let mut cursor = links.next(mem, sentinel);

            if verbose && cursor.is_some() {
                log::debug!("size class {}:", class);
            }

            while let Some(node) = cursor {
                if node < lo + DSIZE || node + DSIZE > top {
                    violations.push(Violation::ListOutOfBounds { class, addr: node });
                    break;
                }
                if !visited.insert(node) {
                    violations.push(Violation::Cycle { class, addr: node });
                    break;
                }
                in_lists += 1;

                let found = links.prev(mem, node);
                if found != Some(prev) {
                    violations.push(Violation::LinkMismatch {
                        class,
                        addr: node,
                        expected: prev,
                        found,
                    });
                }

                let word = header(mem, node);
                let size = size_of(word);
                if verbose {
                    log::debug!("  0x{:x}: {} bytes", node, size);
                }

                if is_allocated(word) {
                    violations.push(Violation::AllocatedInList { class, addr: node });
                } else if !free_blocks.contains(&node) {
                    violations.push(Violation::NotABlock { class, addr: node });
                } else if class_for(size) != class {
                    violations.push(Violation::WrongClass {
                        class,
                        addr: node,
                        size,
                    });
                }

                prev = node;
                cursor = links.next(mem, node);
            }
        }

        if free_blocks.len() != in_lists {
            violations.push(Violation::CountMismatch {
                in_heap: free_blocks.len(),
                in_lists,
            });
        }

        violations
    }

    /// Check the heap and return the first violation found, if any. Every
    /// violation is logged at the `warn` level.
    ///
    /// See [`Self::check`].
    pub fn validate(&self, verbose: bool) -> Result<(), Violation> {
        let violations = self.check(verbose);
        for violation in &violations {
            log::warn!("heap check: {}", violation);
        }
        match violations.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(()),
        }
    }
}
