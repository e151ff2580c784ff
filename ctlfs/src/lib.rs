//! ctlfs: expose a process's tunable state as named nodes with
//! POSIX-shaped sessions
//!
//! Callers mount byte buffers, typed attributes, record listings and an
//! exclusive status message into a [`Vfs`], then open [`Session`]s that
//! read, write and seek against them. All shared state sits behind
//! exclusive locks; long waits are interruptible through a per-session
//! token, and enumeration pins are released on every exit path.

pub mod attr;
pub mod buffer;
pub mod error;
pub mod guard;
pub mod parse;
pub mod registry;
pub mod seq;
pub mod session;
pub mod status;
pub mod table;

// Re-export the session surface for convenience
pub use error::{Result, VfsError};
pub use session::{NodeHandle, Session, Vfs};

// Re-export node building blocks
pub use attr::{AttrGroup, Attribute, BoolAttr, IntAttr, StrAttr, LABEL_CAPACITY};
pub use buffer::{BoundedBuffer, ByteStore};
pub use guard::{Guarded, Interrupt};
pub use registry::{DeviceAddr, DeviceRecord, DeviceRef, DeviceRegistry};
pub use seq::{RecordSet, SeqFile, Whence};
pub use status::StatusNode;
pub use table::{ByteTable, TABLE_SLOTS};
