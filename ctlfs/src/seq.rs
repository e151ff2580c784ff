//! Record enumeration protocol and the byte-serving engine on top of it
//!
//! A `RecordSet` walks its records one at a time: `start` pins the record at
//! a position, `next` releases the current pin and pins the successor in the
//! same step, `show` renders the pinned record. There is no explicit stop:
//! dropping the cursor is the release, so every exit path - exhaustion,
//! caller-filled buffer, error - releases exactly what it pinned.
//!
//! `SeqFile` turns that protocol into offset-addressed byte reads. Records
//! render into a carryover buffer so a record split across two reads is
//! served exactly once, and `seek` repositions by re-walking from record
//! zero the way a rendered stream must.

use crate::error::{Result, VfsError};
use crate::guard::Interrupt;
use std::sync::Arc;
use tracing::{debug, trace};

/// A dynamic set of records enumerable through a pinned cursor.
///
/// The cursor type carries whatever keeps the pinned record alive - a
/// reference-counted handle, or the set's own lock guard. Dropping a cursor
/// releases its pin; implementations must make `next` release the old pin
/// and acquire the new one as one step with respect to the set shrinking.
pub trait RecordSet {
    type Cursor<'a>
    where
        Self: 'a;

    /// Pin the record at `pos` (skipping that many live records from the
    /// head). Exhaustion and negative positions yield `None`.
    ///
    /// # Errors
    /// `Interrupted` if acquiring the set's lock is aborted.
    fn start(&self, pos: i64, intr: &Interrupt) -> Result<Option<Self::Cursor<'_>>>;

    /// Release the current pin and pin the successor, advancing `pos`.
    /// Returns `None` when the set is exhausted, including when the
    /// successor disappeared underneath the walk.
    fn next<'a>(&'a self, cursor: Self::Cursor<'a>, pos: &mut i64) -> Option<Self::Cursor<'a>>;

    /// Render the pinned record. Implementations re-validate the record
    /// before formatting.
    ///
    /// # Errors
    /// `InvalidOffset` when the cursor no longer addresses a valid record.
    fn show(&self, cursor: &Self::Cursor<'_>, out: &mut String) -> Result<()>;
}

/// Origin for [`SeqFile::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Start,
    Current,
    End,
}

/// Serves a `RecordSet` as a readable, seekable byte stream.
///
/// One instance belongs to one session; the record position, the byte
/// position and the rendered-but-unserved carryover are its private state.
pub struct SeqFile<S: RecordSet> {
    source: Arc<S>,
    record_pos: i64,
    byte_pos: i64,
    pending: Vec<u8>,
}

impl<S: RecordSet> SeqFile<S> {
    #[must_use]
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            record_pos: 0,
            byte_pos: 0,
            pending: Vec::new(),
        }
    }

    /// Current byte position in the rendered stream.
    #[must_use]
    pub fn position(&self) -> i64 {
        self.byte_pos
    }

    fn serve_pending(&mut self, out: &mut [u8]) -> usize {
        let count = self.pending.len().min(out.len());
        out[..count].copy_from_slice(&self.pending[..count]);
        self.pending.drain(..count);
        self.byte_pos += count as i64;
        count
    }

    /// Read the next chunk of the rendered stream into `out`.
    ///
    /// Returns 0 at end of stream.
    ///
    /// # Errors
    /// Propagates `Interrupted` from the set's lock and any render-time
    /// validation failure.
    pub fn read(&mut self, out: &mut [u8], intr: &Interrupt) -> Result<usize> {
        let mut served = self.serve_pending(out);
        if served == out.len() {
            return Ok(served);
        }

        let source = Arc::clone(&self.source);
        let mut cursor = match source.start(self.record_pos, intr)? {
            Some(cursor) => cursor,
            None => return Ok(served),
        };

        loop {
            let mut rendered = String::new();
            source.show(&cursor, &mut rendered)?;
            self.pending.extend_from_slice(rendered.as_bytes());

            let successor = source.next(cursor, &mut self.record_pos);
            served += self.serve_pending(&mut out[served..]);

            match successor {
                Some(next_cursor) if served < out.len() => cursor = next_cursor,
                // Dropping the successor (or ending with none) releases the
                // walk's remaining pin.
                _ => {
                    trace!(served, record_pos = self.record_pos, "read batch done");
                    return Ok(served);
                }
            }
        }
    }

    /// Total rendered length of the stream, by a counting walk.
    fn stream_len(&self, intr: &Interrupt) -> Result<i64> {
        let source = Arc::clone(&self.source);
        let mut pos = 0i64;
        let mut total = 0i64;
        let mut cursor = match source.start(0, intr)? {
            Some(cursor) => cursor,
            None => return Ok(0),
        };
        loop {
            let mut rendered = String::new();
            source.show(&cursor, &mut rendered)?;
            total += rendered.len() as i64;
            match source.next(cursor, &mut pos) {
                Some(next_cursor) => cursor = next_cursor,
                None => return Ok(total),
            }
        }
    }

    /// Reposition the stream.
    ///
    /// The rendered stream has no random access, so any movement re-walks
    /// from record zero and discards up to the target; a target past the end
    /// clamps there. Returns the new byte position.
    ///
    /// # Errors
    /// `InvalidOffset` when the resolved target is negative; `Interrupted`
    /// from the walk's lock acquisitions.
    pub fn seek(&mut self, offset: i64, whence: Whence, intr: &Interrupt) -> Result<i64> {
        let target = match whence {
            Whence::Start => offset,
            Whence::Current => self.byte_pos + offset,
            Whence::End => self.stream_len(intr)? + offset,
        };
        if target < 0 {
            return Err(VfsError::InvalidOffset(target));
        }
        if target == self.byte_pos {
            return Ok(self.byte_pos);
        }

        debug!(target, from = self.byte_pos, "seek re-walks the stream");
        self.record_pos = 0;
        self.byte_pos = 0;
        self.pending.clear();
        self.traverse(target, intr)?;
        Ok(self.byte_pos)
    }

    /// Walk forward discarding rendered bytes until `target`; a partially
    /// consumed record lands in the carryover buffer.
    fn traverse(&mut self, target: i64, intr: &Interrupt) -> Result<()> {
        let source = Arc::clone(&self.source);
        let mut cursor = match source.start(self.record_pos, intr)? {
            Some(cursor) => cursor,
            None => return Ok(()),
        };
        loop {
            let mut rendered = String::new();
            source.show(&cursor, &mut rendered)?;
            let bytes = rendered.as_bytes();
            let need = (target - self.byte_pos) as usize;

            let successor = source.next(cursor, &mut self.record_pos);
            if bytes.len() >= need {
                self.pending.extend_from_slice(&bytes[need..]);
                self.byte_pos = target;
                return Ok(());
            }
            self.byte_pos += bytes.len() as i64;
            match successor {
                Some(next_cursor) => cursor = next_cursor,
                // Stream ends before the target: clamp here.
                None => return Ok(()),
            }
        }
    }
}
