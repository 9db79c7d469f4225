//! Cache-line aligned memory buffers
//!
//! [`AlignedBuffer`] owns one contiguous region whose start address is
//! aligned to a caller-chosen power-of-two boundary. The global allocator
//! makes no cache-line guarantee, so the buffer over-allocates by `alignment`
//! bytes and rounds the start address up to the next boundary:
//!
//! ```text
//! aligned = (raw + alignment - 1) & !(alignment - 1)
//! ```
//!
//! Callers only ever see the aligned window; the raw region is private.
//! The buffer is move-only: ownership transfers, it is never duplicated, so
//! exactly one owner releases the region exactly once.

use crate::error::{BenchError, Result};

/// RAII wrapper for a cache-line aligned memory buffer
///
/// On construction the aligned window is filled with the deterministic
/// pattern `byte[i] = i & 0xFF` so copy/triad kernels operate on defined,
/// non-zero content and the kernel never measures all-zero page shortcuts.
#[derive(Debug)]
pub struct AlignedBuffer {
    raw: Box<[u8]>,
    offset: usize,
    size: usize,
    alignment: usize,
}

impl AlignedBuffer {
    /// Allocate an aligned buffer of `size` bytes at `alignment` boundary
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Memory`] if `size` is zero, `alignment` is not a
    /// power of two, or `size + alignment` would overflow the address space.
    pub fn new(size: usize, alignment: usize) -> Result<Self> {
        if size == 0 {
            return Err(BenchError::memory("buffer size cannot be zero"));
        }
        if alignment == 0 || !alignment.is_power_of_two() {
            return Err(BenchError::memory("alignment must be a power of 2"));
        }
        if size > usize::MAX - alignment {
            return Err(BenchError::memory("buffer size would cause overflow"));
        }

        // The heap block is stable across moves of the Box, so the computed
        // offset stays valid for the lifetime of the buffer.
        let raw = vec![0u8; size + alignment].into_boxed_slice();
        let addr = raw.as_ptr() as usize;
        let aligned = (addr + alignment - 1) & !(alignment - 1);
        let offset = aligned - addr;

        let mut buffer = Self {
            raw,
            offset,
            size,
            alignment,
        };
        buffer.fill_pattern();
        Ok(buffer)
    }

    /// Fill the aligned window with the deterministic byte pattern
    pub fn fill_pattern(&mut self) {
        for (i, byte) in self.data_mut().iter_mut().enumerate() {
            *byte = (i & 0xFF) as u8;
        }
    }

    /// Shared view of the aligned window
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.raw[self.offset..self.offset + self.size]
    }

    /// Exclusive view of the aligned window
    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.raw[self.offset..self.offset + self.size]
    }

    /// Size of the aligned window in bytes
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Alignment boundary in bytes
    #[inline]
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Post-condition check: the window start sits on the alignment boundary
    pub fn is_aligned(&self) -> bool {
        (self.data().as_ptr() as usize) & (self.alignment - 1) == 0
    }
}

impl std::ops::Index<usize> for AlignedBuffer {
    type Output = u8;

    #[inline]
    fn index(&self, index: usize) -> &u8 {
        &self.data()[index]
    }
}

impl std::ops::IndexMut<usize> for AlignedBuffer {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut u8 {
        &mut self.data_mut()[index]
    }
}
