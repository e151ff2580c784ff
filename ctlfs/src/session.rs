//! Node registry and session layer
//!
//! A `Vfs` maps names to mounted nodes; `open` hands back a `Session` that
//! owns everything the open acquired: the node binding, the byte position,
//! the per-flavor private context and an interrupt token. Dropping the
//! session releases all of it, however the walk ended.

use crate::attr::Attribute;
use crate::buffer::ByteStore;
use crate::error::{Result, VfsError};
use crate::guard::Interrupt;
use crate::registry::DeviceRegistry;
use crate::seq::{SeqFile, Whence};
use crate::status::StatusNode;
use crate::table::ByteTable;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// What a name resolves to.
#[derive(Clone)]
pub enum NodeHandle {
    /// Offset-addressed byte buffer, read/write
    Buffer(Arc<dyn ByteStore>),
    /// Typed show/store attribute, read/write
    Attr(Arc<dyn Attribute>),
    /// Byte table: listed by records, overwritten by bulk token writes
    Table(Arc<ByteTable>),
    /// Device listing, read-only
    Devices(Arc<DeviceRegistry>),
    /// Exclusive single-open status message, read-only
    Status(Arc<StatusNode>),
}

/// Name-to-node registry. Mounting happens at subsystem initialization;
/// lookups happen per open.
pub struct Vfs {
    nodes: Mutex<HashMap<String, NodeHandle>>,
}

impl Vfs {
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Mutex::new(HashMap::new()),
        }
    }

    /// Mount `node` under `name`, replacing any previous mount.
    pub fn mount(&self, name: &str, node: NodeHandle) {
        debug!(node = name, "mounting");
        self.nodes.lock().insert(name.to_string(), node);
    }

    /// Mounted names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.nodes.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Open a session against the node mounted under `name`.
    ///
    /// # Errors
    /// `NotFound` for an unknown name; `Busy` when an exclusive node
    /// already has a session.
    pub fn open(&self, name: &str) -> Result<Session> {
        let node = self
            .nodes
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| VfsError::NotFound(name.to_string()))?;

        let state = match node {
            NodeHandle::Buffer(store) => SessionState::Buffer { store },
            NodeHandle::Attr(attr) => SessionState::Attr {
                attr,
                rendered: None,
            },
            NodeHandle::Table(table) => SessionState::Table {
                seq: SeqFile::new(Arc::clone(&table)),
                table,
            },
            NodeHandle::Devices(registry) => SessionState::Devices {
                seq: SeqFile::new(registry),
            },
            NodeHandle::Status(node) => {
                let message = node.begin_open(name)?;
                SessionState::Status { node, message }
            }
        };

        debug!(node = name, "session opened");
        Ok(Session {
            name: name.to_string(),
            pos: 0,
            intr: Interrupt::new(),
            state,
        })
    }
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

enum SessionState {
    Buffer {
        store: Arc<dyn ByteStore>,
    },
    Attr {
        attr: Arc<dyn Attribute>,
        /// Snapshot rendered on first read and served byte-ranged after
        /// that; a fresh session renders fresh.
        rendered: Option<Vec<u8>>,
    },
    Table {
        table: Arc<ByteTable>,
        seq: SeqFile<ByteTable>,
    },
    Devices {
        seq: SeqFile<DeviceRegistry>,
    },
    Status {
        node: Arc<StatusNode>,
        message: Vec<u8>,
    },
}

fn serve_slice(data: &[u8], pos: &mut i64, out: &mut [u8]) -> usize {
    let offset = *pos as usize;
    if offset >= data.len() {
        return 0;
    }
    let count = out.len().min(data.len() - offset);
    out[..count].copy_from_slice(&data[offset..offset + count]);
    *pos += count as i64;
    count
}

/// One open session against one node.
///
/// The session tracks its own byte position; reads and writes advance it.
/// Dropping (or `close`-ing) the session releases the exclusive-open slot
/// and anything else the open acquired.
pub struct Session {
    name: String,
    pos: i64,
    intr: Interrupt,
    state: SessionState,
}

impl Session {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current byte position.
    #[must_use]
    pub fn position(&self) -> i64 {
        match &self.state {
            SessionState::Table { seq, .. } => seq.position(),
            SessionState::Devices { seq } => seq.position(),
            _ => self.pos,
        }
    }

    /// Token another thread can use to abort this session's lock waits.
    #[must_use]
    pub fn interrupt(&self) -> Interrupt {
        self.intr.clone()
    }

    /// Read the next chunk at the session position. `Ok(0)` is end of
    /// stream.
    ///
    /// # Errors
    /// Propagates the node's errors; `Interrupted` if a lock wait aborts.
    pub fn read(&mut self, out: &mut [u8]) -> Result<usize> {
        trace!(node = %self.name, pos = self.position(), len = out.len(), "read");
        match &mut self.state {
            SessionState::Buffer { store } => {
                let count = store.read_at(self.pos, out, &self.intr)?;
                self.pos += count as i64;
                Ok(count)
            }
            SessionState::Attr { attr, rendered } => {
                let snapshot = rendered.get_or_insert_with(|| attr.show().into_bytes());
                Ok(serve_slice(snapshot, &mut self.pos, out))
            }
            SessionState::Table { seq, .. } => seq.read(out, &self.intr),
            SessionState::Devices { seq } => seq.read(out, &self.intr),
            SessionState::Status { message, .. } => {
                Ok(serve_slice(message, &mut self.pos, out))
            }
        }
    }

    /// Write at the session position.
    ///
    /// Attribute stores parse the whole input regardless of position, and
    /// table writes always restart at slot 0; both match their node
    /// contracts rather than stream semantics.
    ///
    /// # Errors
    /// `ReadOnly` for listing and status nodes; otherwise the node's own
    /// errors.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        trace!(node = %self.name, pos = self.position(), len = data.len(), "write");
        match &mut self.state {
            SessionState::Buffer { store } => {
                let count = store.write_at(self.pos, data, &self.intr)?;
                self.pos += count as i64;
                Ok(count)
            }
            SessionState::Attr { attr, rendered } => {
                // A stored value invalidates this session's snapshot.
                *rendered = None;
                attr.store(data)
            }
            SessionState::Table { table, .. } => table.store_tokens(data, &self.intr),
            SessionState::Devices { .. } | SessionState::Status { .. } => {
                Err(VfsError::ReadOnly(self.name.clone()))
            }
        }
    }

    /// Reposition an enumeration-backed session.
    ///
    /// # Errors
    /// `MissingContext` for sessions without a cursor; `InvalidOffset` for
    /// a negative resolved target.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<i64> {
        trace!(node = %self.name, offset, ?whence, "seek");
        match &mut self.state {
            SessionState::Table { seq, .. } => seq.seek(offset, whence, &self.intr),
            SessionState::Devices { seq } => seq.seek(offset, whence, &self.intr),
            _ => Err(VfsError::MissingContext),
        }
    }

    /// Explicit close; equivalent to dropping the session.
    pub fn close(self) {}
}

impl Drop for Session {
    fn drop(&mut self) {
        if let SessionState::Status { node, .. } = &self.state {
            node.end_open();
        }
        debug!(node = %self.name, "session closed");
    }
}
