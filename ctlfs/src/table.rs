//! Guarded byte table: listed one record at a time, overwritten in bulk
//!
//! The table is a fixed array of byte-sized slots behind one interruptible
//! lock. The listing cursor holds that lock from `start` until the cursor
//! drops, so one read batch observes a consistent table; the bulk writer
//! holds the same lock for its whole parse-clamp-store pass, serializing it
//! against concurrent listings.

use crate::error::{Result, VfsError};
use crate::guard::{Guarded, Interrupt};
use crate::parse;
use crate::seq::RecordSet;
use parking_lot::MutexGuard;
use std::fmt::Write as _;
use tracing::{debug, warn};

/// Number of slots in the table.
pub const TABLE_SLOTS: usize = 256;

const TOKEN_DELIMITERS: [u8; 5] = [b' ', b'\t', b'\r', b',', b'\n'];

/// Fixed array of byte slots, initialized to the identity ramp 0..=255.
pub struct ByteTable {
    slots: Guarded<[u8; TABLE_SLOTS]>,
}

impl ByteTable {
    #[must_use]
    pub fn new() -> Self {
        let mut slots = [0u8; TABLE_SLOTS];
        for (index, slot) in slots.iter_mut().enumerate() {
            *slot = index as u8;
        }
        Self {
            slots: Guarded::new(slots),
        }
    }

    /// Copy of the current slot values.
    ///
    /// # Errors
    /// `Interrupted` if the lock wait is aborted.
    pub fn snapshot(&self, intr: &Interrupt) -> Result<[u8; TABLE_SLOTS]> {
        Ok(*self.slots.lock(intr)?)
    }

    /// Parse `input` into integer tokens and overwrite slots from index 0.
    ///
    /// Tokens are separated by spaces, tabs, commas, carriage returns or
    /// newlines; empty tokens between consecutive delimiters are skipped.
    /// Each value is clamped into 0..=255. Tokens beyond the table size are
    /// ignored without error. There is no offset-aware variant: every call
    /// restarts at slot 0. Returns the full input length on success.
    ///
    /// # Errors
    /// `Parse` with the first malformed token; slots already written by
    /// earlier tokens keep their new values (the one documented non-atomic
    /// partial effect). `Interrupted` if the lock wait is aborted.
    pub fn store_tokens(&self, input: &[u8], intr: &Interrupt) -> Result<usize> {
        let mut slots = self.slots.lock(intr)?;

        let mut index = 0;
        for token in input.split(|byte| TOKEN_DELIMITERS.contains(byte)) {
            if token.is_empty() {
                continue;
            }
            if index >= TABLE_SLOTS {
                break;
            }
            let text = std::str::from_utf8(token)
                .map_err(|_| VfsError::Parse(String::from_utf8_lossy(token).into_owned()))?;
            let value = parse::parse_int(text)?;
            slots[index] = value.clamp(0, 255) as u8;
            index += 1;
        }

        debug!(tokens = index, bytes = input.len(), "bulk token store");
        Ok(input.len())
    }
}

impl Default for ByteTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Listing cursor; owning it is holding the table lock.
pub struct TableCursor<'a> {
    slots: MutexGuard<'a, [u8; TABLE_SLOTS]>,
    index: usize,
}

impl RecordSet for ByteTable {
    type Cursor<'a>
        = TableCursor<'a>
    where
        Self: 'a;

    fn start(&self, pos: i64, intr: &Interrupt) -> Result<Option<TableCursor<'_>>> {
        if pos < 0 {
            warn!(pos, "negative start position");
            return Ok(None);
        }
        if pos as usize >= TABLE_SLOTS {
            return Ok(None);
        }
        let slots = self.slots.lock(intr)?;
        Ok(Some(TableCursor {
            slots,
            index: pos as usize,
        }))
    }

    fn next<'a>(&'a self, cursor: TableCursor<'a>, pos: &mut i64) -> Option<TableCursor<'a>> {
        *pos += 1;
        if *pos as usize >= TABLE_SLOTS {
            // Dropping the cursor here releases the table lock.
            return None;
        }
        Some(TableCursor {
            slots: cursor.slots,
            index: *pos as usize,
        })
    }

    fn show(&self, cursor: &TableCursor<'_>, out: &mut String) -> Result<()> {
        if cursor.index >= TABLE_SLOTS {
            return Err(VfsError::InvalidOffset(cursor.index as i64));
        }
        // Fixed-width records: three decimal digits and a newline.
        let _ = writeln!(out, "{:03}", cursor.slots[cursor.index]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_table_is_identity_ramp() {
        let table = ByteTable::new();
        let intr = Interrupt::new();
        let slots = table.snapshot(&intr).unwrap();
        assert_eq!(slots[0], 0);
        assert_eq!(slots[100], 100);
        assert_eq!(slots[255], 255);
    }

    #[test]
    fn test_store_tokens_mixed_delimiters() {
        let table = ByteTable::new();
        let intr = Interrupt::new();

        let consumed = table.store_tokens(b"10 20,30\n40", &intr).unwrap();
        assert_eq!(consumed, 11);

        let slots = table.snapshot(&intr).unwrap();
        assert_eq!(&slots[..4], &[10, 20, 30, 40]);
        // Slots past the parsed tokens keep their previous values.
        assert_eq!(slots[4], 4);
    }

    #[test]
    fn test_store_tokens_skips_empty_tokens() {
        let table = ByteTable::new();
        let intr = Interrupt::new();
        table.store_tokens(b"  1,,2\n\n3  ", &intr).unwrap();
        let slots = table.snapshot(&intr).unwrap();
        assert_eq!(&slots[..3], &[1, 2, 3]);
        assert_eq!(slots[3], 3);
    }

    #[test]
    fn test_store_tokens_clamps_to_byte_range() {
        let table = ByteTable::new();
        let intr = Interrupt::new();
        table.store_tokens(b"-5 300 0x1ff 255", &intr).unwrap();
        let slots = table.snapshot(&intr).unwrap();
        assert_eq!(&slots[..4], &[0, 255, 255, 255]);
    }

    #[test]
    fn test_store_tokens_aborts_on_first_bad_token() {
        let table = ByteTable::new();
        let intr = Interrupt::new();

        let err = table.store_tokens(b"7 8 nine 10", &intr).unwrap_err();
        assert!(matches!(err, VfsError::Parse(token) if token == "nine"));

        // Earlier slots were already overwritten; later ones untouched.
        let slots = table.snapshot(&intr).unwrap();
        assert_eq!(&slots[..2], &[7, 8]);
        assert_eq!(slots[2], 2);
        assert_eq!(slots[3], 3);
    }

    #[test]
    fn test_store_tokens_restarts_at_slot_zero() {
        let table = ByteTable::new();
        let intr = Interrupt::new();
        table.store_tokens(b"1 2 3", &intr).unwrap();
        table.store_tokens(b"9", &intr).unwrap();
        let slots = table.snapshot(&intr).unwrap();
        assert_eq!(&slots[..3], &[9, 2, 3]);
    }

    #[test]
    fn test_extra_tokens_beyond_slots_are_ignored() {
        let table = ByteTable::new();
        let intr = Interrupt::new();
        let input: Vec<u8> = (0..300).map(|_| "1 ").collect::<String>().into_bytes();
        let consumed = table.store_tokens(&input, &intr).unwrap();
        assert_eq!(consumed, input.len());
        let slots = table.snapshot(&intr).unwrap();
        assert!(slots.iter().all(|slot| *slot == 1));
    }

    #[test]
    fn test_cursor_walk_renders_fixed_width() {
        let table = ByteTable::new();
        let intr = Interrupt::new();

        let mut pos = 254;
        let mut out = String::new();
        let mut cursor = table.start(pos, &intr).unwrap().unwrap();
        loop {
            table.show(&cursor, &mut out).unwrap();
            match table.next(cursor, &mut pos) {
                Some(next_cursor) => cursor = next_cursor,
                None => break,
            }
        }
        assert_eq!(out, "254\n255\n");
    }

    #[test]
    fn test_start_out_of_range_is_none() {
        let table = ByteTable::new();
        let intr = Interrupt::new();
        assert!(table.start(-1, &intr).unwrap().is_none());
        assert!(table.start(256, &intr).unwrap().is_none());
    }

    #[test]
    fn test_cursor_drop_releases_table_lock() {
        let table = ByteTable::new();
        let intr = Interrupt::new();

        let cursor = table.start(0, &intr).unwrap().unwrap();
        drop(cursor);

        // Lock must be free again for the bulk writer.
        table.store_tokens(b"1", &intr).unwrap();
    }
}
