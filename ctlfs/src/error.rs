//! Error type shared by every node and session operation

/// Errors reported by node and session operations.
///
/// Running past the end of a buffer or an enumeration is not an error:
/// reads report it as `Ok(0)` and cursors as `None`.
#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    /// Negative offset supplied to an offset-addressed operation
    #[error("invalid offset {0}")]
    InvalidOffset(i64),

    /// Write starts at or past capacity, or the available span is zero
    #[error("no space left at offset {offset} (capacity {capacity})")]
    OutOfSpace { offset: i64, capacity: usize },

    /// A textual token could not be parsed as the expected type
    #[error("failed to parse token {0:?}")]
    Parse(String),

    /// A lock wait was aborted by the caller's interrupt token
    #[error("lock wait interrupted")]
    Interrupted,

    /// No node is mounted under the given name
    #[error("no node named {0:?}")]
    NotFound(String),

    /// The node does not accept writes
    #[error("node {0:?} is read-only")]
    ReadOnly(String),

    /// The node is exclusive and already has an open session
    #[error("node {0:?} is already open")]
    Busy(String),

    /// The session does not carry the context the operation requires.
    /// Always a caller defect, never silently recovered.
    #[error("session context missing for operation")]
    MissingContext,
}

pub type Result<T> = std::result::Result<T, VfsError>;
