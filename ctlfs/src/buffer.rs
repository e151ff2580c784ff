//! Bounded byte buffer with truncate-on-write semantics
//!
//! A fixed-capacity byte store with a separately tracked logical length.
//! Reads honor an arbitrary offset and serve short counts near the end;
//! writes truncate the logical length to the written extent instead of
//! growing it. Every operation runs under the buffer's exclusive lock, and
//! the lock wait is interruptible.

use crate::error::{Result, VfsError};
use crate::guard::{Guarded, Interrupt};
use tracing::trace;

struct BufferState<const CAP: usize> {
    data: [u8; CAP],
    len: usize,
}

/// Fixed-capacity byte buffer with a logical length.
///
/// The capacity is a compile-time constant; the logical length starts at
/// zero and is set by each write to `offset + written`. Bytes past the
/// logical length are unspecified and never served.
pub struct BoundedBuffer<const CAP: usize> {
    state: Guarded<BufferState<CAP>>,
}

impl<const CAP: usize> BoundedBuffer<CAP> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Guarded::new(BufferState {
                data: [0u8; CAP],
                len: 0,
            }),
        }
    }

    /// Read up to `out.len()` bytes starting at `offset`.
    ///
    /// An offset at or past the logical length reads zero bytes; that is the
    /// end of the stream, not an error.
    ///
    /// # Errors
    /// `InvalidOffset` for a negative offset, `Interrupted` if the lock wait
    /// is aborted.
    pub fn read_at(&self, offset: i64, out: &mut [u8], intr: &Interrupt) -> Result<usize> {
        let state = self.state.lock(intr)?;

        if offset < 0 {
            return Err(VfsError::InvalidOffset(offset));
        }
        let offset = offset as usize;
        if offset >= state.len {
            return Ok(0);
        }

        let count = out.len().min(state.len - offset);
        out[..count].copy_from_slice(&state.data[offset..offset + count]);
        trace!(offset, count, len = state.len, "buffer read");
        Ok(count)
    }

    /// Write `data` at `offset`, truncating the logical length to the
    /// written extent.
    ///
    /// Returns the number of bytes actually stored, which is short when the
    /// input overruns capacity; the caller resubmits the remainder. Input
    /// beyond the short count is dropped without further signal.
    ///
    /// # Errors
    /// `InvalidOffset` for a negative offset, `OutOfSpace` when the offset
    /// is at or past capacity or nothing fits, `Interrupted` if the lock
    /// wait is aborted.
    pub fn write_at(&self, offset: i64, data: &[u8], intr: &Interrupt) -> Result<usize> {
        let mut state = self.state.lock(intr)?;

        if offset < 0 {
            return Err(VfsError::InvalidOffset(offset));
        }
        let start = offset as usize;
        if start >= CAP {
            return Err(VfsError::OutOfSpace {
                offset,
                capacity: CAP,
            });
        }

        let count = data.len().min(CAP - start);
        if count == 0 {
            return Err(VfsError::OutOfSpace {
                offset,
                capacity: CAP,
            });
        }

        state.data[start..start + count].copy_from_slice(&data[..count]);
        // Truncate on write instead of growing the logical length.
        state.len = start + count;
        trace!(offset, count, len = state.len, "buffer write");
        Ok(count)
    }

    /// Current logical length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock_blocking().len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<const CAP: usize> Default for BoundedBuffer<CAP> {
    fn default() -> Self {
        Self::new()
    }
}

/// Object-safe surface the session layer reads and writes through.
pub trait ByteStore: Send + Sync {
    fn read_at(&self, offset: i64, out: &mut [u8], intr: &Interrupt) -> Result<usize>;
    fn write_at(&self, offset: i64, data: &[u8], intr: &Interrupt) -> Result<usize>;
    fn len(&self) -> usize;
    fn capacity(&self) -> usize;
}

impl<const CAP: usize> ByteStore for BoundedBuffer<CAP> {
    fn read_at(&self, offset: i64, out: &mut [u8], intr: &Interrupt) -> Result<usize> {
        BoundedBuffer::read_at(self, offset, out, intr)
    }

    fn write_at(&self, offset: i64, data: &[u8], intr: &Interrupt) -> Result<usize> {
        BoundedBuffer::write_at(self, offset, data, intr)
    }

    fn len(&self) -> usize {
        BoundedBuffer::len(self)
    }

    fn capacity(&self) -> usize {
        CAP
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all<const CAP: usize>(buffer: &BoundedBuffer<CAP>, offset: i64, len: usize) -> Vec<u8> {
        let intr = Interrupt::new();
        let mut out = vec![0u8; len];
        let n = buffer.read_at(offset, &mut out, &intr).unwrap();
        out.truncate(n);
        out
    }

    #[test]
    fn test_round_trip() {
        let buffer = BoundedBuffer::<1024>::new();
        let intr = Interrupt::new();

        assert_eq!(buffer.write_at(0, b"hello", &intr).unwrap(), 5);
        assert_eq!(read_all(&buffer, 0, 5), b"hello");
        assert_eq!(buffer.len(), 5);
    }

    #[test]
    fn test_write_truncates_instead_of_appending() {
        let buffer = BoundedBuffer::<1024>::new();
        let intr = Interrupt::new();

        buffer.write_at(0, b"hello", &intr).unwrap();
        buffer.write_at(0, b"hi", &intr).unwrap();

        // Logical length shrank to the new extent; the tail is gone.
        assert_eq!(buffer.len(), 2);
        assert_eq!(read_all(&buffer, 0, 5), b"hi");
    }

    #[test]
    fn test_write_at_offset_sets_length_past_it() {
        let buffer = BoundedBuffer::<64>::new();
        let intr = Interrupt::new();

        buffer.write_at(0, b"0123456789", &intr).unwrap();
        assert_eq!(buffer.write_at(4, b"ab", &intr).unwrap(), 2);
        assert_eq!(buffer.len(), 6);
        assert_eq!(read_all(&buffer, 0, 16), b"0123ab");
    }

    #[test]
    fn test_read_past_length_is_empty_not_error() {
        let buffer = BoundedBuffer::<64>::new();
        let intr = Interrupt::new();

        buffer.write_at(0, b"abc", &intr).unwrap();
        assert_eq!(read_all(&buffer, 3, 8), b"");
        assert_eq!(read_all(&buffer, 100, 8), b"");
    }

    #[test]
    fn test_negative_offset_rejected() {
        let buffer = BoundedBuffer::<64>::new();
        let intr = Interrupt::new();
        let mut out = [0u8; 4];

        assert!(matches!(
            buffer.read_at(-1, &mut out, &intr),
            Err(VfsError::InvalidOffset(-1))
        ));
        assert!(matches!(
            buffer.write_at(-1, b"x", &intr),
            Err(VfsError::InvalidOffset(-1))
        ));
    }

    #[test]
    fn test_write_past_capacity_is_out_of_space() {
        let buffer = BoundedBuffer::<8>::new();
        let intr = Interrupt::new();

        assert!(matches!(
            buffer.write_at(8, b"x", &intr),
            Err(VfsError::OutOfSpace { .. })
        ));
        assert!(matches!(
            buffer.write_at(20, b"x", &intr),
            Err(VfsError::OutOfSpace { .. })
        ));
    }

    #[test]
    fn test_short_write_at_capacity_edge() {
        let buffer = BoundedBuffer::<8>::new();
        let intr = Interrupt::new();

        // Only two bytes fit; the rest is silently dropped.
        assert_eq!(buffer.write_at(6, b"abcdef", &intr).unwrap(), 2);
        assert_eq!(buffer.len(), 8);
        assert_eq!(read_all(&buffer, 6, 8), b"ab");
    }

    #[test]
    fn test_empty_write_is_out_of_space() {
        let buffer = BoundedBuffer::<8>::new();
        let intr = Interrupt::new();
        assert!(matches!(
            buffer.write_at(0, b"", &intr),
            Err(VfsError::OutOfSpace { .. })
        ));
    }

    #[test]
    fn test_concurrent_writers_at_distinct_offsets() {
        use std::sync::Arc;
        use std::thread;

        let buffer = Arc::new(BoundedBuffer::<256>::new());
        let intr = Interrupt::new();
        // Establish a full-length buffer so later truncation is observable.
        buffer.write_at(0, &[0u8; 256], &intr).unwrap();

        let mut workers = Vec::new();
        for lane in 0..8u8 {
            let buffer = Arc::clone(&buffer);
            workers.push(thread::spawn(move || {
                let intr = Interrupt::new();
                let chunk = [lane + 1; 16];
                buffer.write_at(i64::from(lane) * 16, &chunk, &intr).unwrap();
            }));
        }
        for worker in workers {
            worker.join().unwrap();
        }

        // Every lane holds exactly its writer's byte: no torn writes, no
        // corruption of unrelated ranges.
        for lane in 0..8u8 {
            let got = read_all(&buffer, i64::from(lane) * 16, 16);
            if !got.is_empty() {
                assert!(got.iter().all(|b| *b == lane + 1), "lane {lane} corrupted");
            }
        }
        // The final length matches whichever write came last in the serial
        // order: some lane's end offset.
        let len = buffer.len();
        assert!(len % 16 == 0 && len >= 16 && len <= 128);
    }
}
