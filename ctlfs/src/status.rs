//! Single-open status node
//!
//! An exclusive, read-only node: at most one session at a time, no queueing.
//! Each successful open bumps a counter and freezes a one-line message for
//! that session to read.

use crate::error::{Result, VfsError};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::debug;

pub struct StatusNode {
    open: AtomicBool,
    opens: AtomicU32,
}

impl StatusNode {
    #[must_use]
    pub fn new() -> Self {
        Self {
            open: AtomicBool::new(false),
            opens: AtomicU32::new(0),
        }
    }

    /// Claim the exclusive open slot and produce this session's message.
    ///
    /// # Errors
    /// `Busy` if another session holds the slot.
    pub(crate) fn begin_open(&self, name: &str) -> Result<Vec<u8>> {
        if self
            .open
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(VfsError::Busy(name.to_string()));
        }
        let count = self.opens.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(node = name, count, "exclusive node opened");
        Ok(format!("{name} has been opened {count} times\n").into_bytes())
    }

    pub(crate) fn end_open(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    /// Number of successful opens so far.
    #[must_use]
    pub fn open_count(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }
}

impl Default for StatusNode {
    fn default() -> Self {
        Self::new()
    }
}
