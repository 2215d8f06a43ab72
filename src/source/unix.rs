use core::{ptr::NonNull, slice};

use super::HeapSource;

/// A [`HeapSource`] that reserves an anonymous memory mapping up front and
/// moves a break pointer through it, much like `sbrk` on a fixed-size arena.
#[derive(Debug)]
pub struct MmapSource {
    ptr: NonNull<u8>,
    capacity: usize,
    len: usize,
}

// Safety: The mapping is exclusively owned by `MmapSource`.
unsafe impl Send for MmapSource {}

#[inline]
fn page_size() -> usize {
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page_size <= 0 {
        // Not expected on any real system; fall back to the common size
        4096
    } else {
        page_size as usize
    }
}

impl MmapSource {
    /// Reserve a mapping of at least `capacity` bytes (rounded up to the page
    /// size). Returns `None` if `capacity` is zero or the mapping could not be
    /// created.
    pub fn new(capacity: usize) -> Option<Self> {
        let page_size_m1 = page_size() - 1;
        let capacity = capacity.checked_add(page_size_m1)? & !page_size_m1;
        if capacity == 0 {
            return None;
        }

        let ptr = unsafe {
            libc::mmap(
                core::ptr::null_mut(),
                capacity,
                libc::PROT_WRITE | libc::PROT_READ,
                libc::MAP_ANONYMOUS | libc::MAP_PRIVATE,
                -1,
                0,
            )
        };

        if ptr == libc::MAP_FAILED {
            log::debug!("mmap of {} bytes failed", capacity);
            return None;
        }

        Some(Self {
            ptr: NonNull::new(ptr as *mut u8)?,
            capacity,
            len: 0,
        })
    }

    /// The number of bytes the region can grow to.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl HeapSource for MmapSource {
    fn grow(&mut self, bytes: usize) -> Option<usize> {
        let old_len = self.len;
        self.len = old_len
            .checked_add(bytes)
            .filter(|&x| x <= self.capacity)?;
        Some(old_len)
    }

    #[inline]
    fn memory(&self) -> &[u8] {
        // Safety: `..self.len` is within the mapping, which is readable and
        //         zero-initialized by the kernel.
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    #[inline]
    fn memory_mut(&mut self) -> &mut [u8] {
        // Safety: Same as `memory`. `&mut self` guarantees exclusivity.
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for MmapSource {
    fn drop(&mut self) {
        // Safety: `ptr..ptr + capacity` is the mapping created by `new`, and
        //         no borrow of it can outlive `self`.
        unsafe { libc::munmap(self.ptr.as_ptr() as *mut _, self.capacity) };
    }
}
