//! Independently locked typed attributes
//!
//! Each attribute owns one value and one lock; locking one attribute never
//! blocks access to another. The textual protocol is show/store: `show`
//! renders the value with a trailing newline, `store` parses caller text and
//! replaces the value. Critical sections are a single copy, so the locks are
//! taken unconditionally.

use crate::error::{Result, VfsError};
use crate::parse;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Capacity of the string attribute, one byte reserved for the terminator
/// in the classic fixed-array layout: 1023 usable bytes.
pub const LABEL_CAPACITY: usize = 1024;

/// Show/store surface the session layer drives.
///
/// `store` returns the number of input bytes it consumed; for the string
/// attribute that is the truncated length when the input overruns capacity.
pub trait Attribute: Send + Sync {
    fn show(&self) -> String;

    /// # Errors
    /// `Parse` when the input does not parse as the attribute's type.
    fn store(&self, input: &[u8]) -> Result<usize>;
}

fn as_text(input: &[u8]) -> Result<&str> {
    std::str::from_utf8(input)
        .map_err(|_| VfsError::Parse(String::from_utf8_lossy(input).into_owned()))
}

/// Boolean attribute rendered as `1`/`0`.
pub struct BoolAttr {
    value: Mutex<bool>,
}

impl BoolAttr {
    #[must_use]
    pub fn new(init: bool) -> Self {
        Self {
            value: Mutex::new(init),
        }
    }

    #[must_use]
    pub fn get(&self) -> bool {
        *self.value.lock()
    }
}

impl Attribute for BoolAttr {
    fn show(&self) -> String {
        format!("{}\n", i32::from(*self.value.lock()))
    }

    fn store(&self, input: &[u8]) -> Result<usize> {
        // Parse outside the lock; the lock only covers the store itself.
        let parsed = parse::parse_bool(as_text(input)?)?;
        *self.value.lock() = parsed;
        debug!(value = parsed, "stored bool attribute");
        Ok(input.len())
    }
}

/// Signed integer attribute accepting base-prefixed literals.
pub struct IntAttr {
    value: Mutex<i32>,
}

impl IntAttr {
    #[must_use]
    pub fn new(init: i32) -> Self {
        Self {
            value: Mutex::new(init),
        }
    }

    #[must_use]
    pub fn get(&self) -> i32 {
        *self.value.lock()
    }
}

impl Attribute for IntAttr {
    fn show(&self) -> String {
        format!("{}\n", *self.value.lock())
    }

    fn store(&self, input: &[u8]) -> Result<usize> {
        let parsed = parse::parse_i32(as_text(input)?)?;
        *self.value.lock() = parsed;
        debug!(value = parsed, "stored int attribute");
        Ok(input.len())
    }
}

/// Bounded string attribute storing raw bytes.
///
/// Stores up to `CAP - 1` bytes; oversized input is truncated and the
/// truncated length is returned instead of an error.
pub struct StrAttr<const CAP: usize> {
    value: Mutex<Vec<u8>>,
}

impl<const CAP: usize> StrAttr<CAP> {
    #[must_use]
    pub fn new(init: &str) -> Self {
        let mut value = init.as_bytes().to_vec();
        value.truncate(CAP - 1);
        Self {
            value: Mutex::new(value),
        }
    }

    #[must_use]
    pub fn get(&self) -> Vec<u8> {
        self.value.lock().clone()
    }
}

impl<const CAP: usize> Attribute for StrAttr<CAP> {
    fn show(&self) -> String {
        format!("{}\n", String::from_utf8_lossy(&self.value.lock()))
    }

    fn store(&self, input: &[u8]) -> Result<usize> {
        let kept = input.len().min(CAP - 1);
        let mut value = self.value.lock();
        value.clear();
        value.extend_from_slice(&input[..kept]);
        debug!(kept, requested = input.len(), "stored string attribute");
        Ok(kept)
    }
}

/// The standard trio of attributes mounted by the subsystem.
pub struct AttrGroup {
    pub flag: Arc<BoolAttr>,
    pub level: Arc<IntAttr>,
    pub label: Arc<StrAttr<LABEL_CAPACITY>>,
}

impl AttrGroup {
    #[must_use]
    pub fn new() -> Self {
        Self {
            flag: Arc::new(BoolAttr::new(false)),
            level: Arc::new(IntAttr::new(0)),
            label: Arc::new(StrAttr::new("")),
        }
    }
}

impl Default for AttrGroup {
    fn default() -> Self {
        Self::new()
    }
}
