//! Reference-counted device registry and its enumeration cursor
//!
//! The registry models an external, mutable collection: devices come and go
//! while walks are in flight. Enumeration pins one device at a time through
//! a [`DeviceRef`]; creating a ref counts an acquisition, dropping it counts
//! the release, and the registry can report the net outstanding pins. The
//! pin hand-off in [`DeviceRegistry::advance`] happens under the registry
//! lock, so a device removed mid-walk reads as exhaustion, never a crash.

use crate::error::Result;
use crate::guard::Interrupt;
use crate::seq::RecordSet;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Bus/slot/function address, rendered as `BB:SS.F` in hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceAddr {
    pub bus: u8,
    pub slot: u8,
    pub function: u8,
}

impl fmt::Display for DeviceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}:{:02X}.{:X}", self.bus, self.slot, self.function)
    }
}

/// One registered device.
pub struct DeviceRecord {
    /// Monotonic insertion sequence; defines collection order and lets a
    /// walk find the successor of a record that was removed underneath it.
    seq: u64,
    pub addr: DeviceAddr,
    pub vendor: u16,
    pub device: u16,
    pub driver: Option<String>,
}

impl DeviceRecord {
    /// One summary line: address, vendor:device, bound driver (possibly
    /// empty brackets).
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} {:04X}:{:04X} [{}]\n",
            self.addr,
            self.vendor,
            self.device,
            self.driver.as_deref().unwrap_or("")
        )
    }
}

/// Pinned reference to a registry device.
///
/// Each `DeviceRef` is exactly one acquisition; dropping it is the one
/// matching release. There is deliberately no `Clone`.
pub struct DeviceRef {
    record: Arc<DeviceRecord>,
    pins: Arc<AtomicUsize>,
}

impl DeviceRef {
    fn pin(record: Arc<DeviceRecord>, pins: &Arc<AtomicUsize>) -> Self {
        pins.fetch_add(1, Ordering::SeqCst);
        trace!(seq = record.seq, addr = %record.addr, "pinned device");
        Self {
            record,
            pins: Arc::clone(pins),
        }
    }

    #[must_use]
    pub fn record(&self) -> &DeviceRecord {
        &self.record
    }
}

impl Drop for DeviceRef {
    fn drop(&mut self) {
        self.pins.fetch_sub(1, Ordering::SeqCst);
        trace!(seq = self.record.seq, addr = %self.record.addr, "released device");
    }
}

/// Mutable collection of devices with pin-counted enumeration.
///
/// Internal critical sections are short and bounded (no caller-held lock is
/// ever taken inside), so acquisition is unconditional.
pub struct DeviceRegistry {
    devices: Mutex<Vec<Arc<DeviceRecord>>>,
    next_seq: AtomicU64,
    pins: Arc<AtomicUsize>,
}

impl DeviceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(Vec::new()),
            next_seq: AtomicU64::new(1),
            pins: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn insert(&self, addr: DeviceAddr, vendor: u16, device: u16, driver: Option<&str>) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let record = Arc::new(DeviceRecord {
            seq,
            addr,
            vendor,
            device,
            driver: driver.map(str::to_string),
        });
        debug!(addr = %addr, vendor, device, "device inserted");
        self.devices.lock().push(record);
    }

    /// Remove the device at `addr`. Outstanding pins keep the record alive;
    /// walks simply stop seeing it.
    pub fn remove(&self, addr: DeviceAddr) -> bool {
        let mut devices = self.devices.lock();
        let before = devices.len();
        devices.retain(|record| record.addr != addr);
        let removed = devices.len() != before;
        if removed {
            debug!(addr = %addr, "device removed");
        }
        removed
    }

    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.lock().len()
    }

    /// Net unreleased acquisitions across all walks.
    #[must_use]
    pub fn outstanding_pins(&self) -> usize {
        self.pins.load(Ordering::SeqCst)
    }

    /// Pin the `n`-th live device in collection order.
    #[must_use]
    pub fn pin_nth(&self, n: usize) -> Option<DeviceRef> {
        let devices = self.devices.lock();
        devices
            .get(n)
            .map(|record| DeviceRef::pin(Arc::clone(record), &self.pins))
    }

    /// Release `current` and pin its successor as one step under the
    /// registry lock. A successor that no longer exists means exhaustion.
    #[must_use]
    pub fn advance(&self, current: DeviceRef) -> Option<DeviceRef> {
        let devices = self.devices.lock();
        let successor = devices
            .iter()
            .find(|record| record.seq > current.record.seq)
            .map(|record| DeviceRef::pin(Arc::clone(record), &self.pins));
        // Release the old pin while still holding the registry lock: the
        // hand-off is atomic with respect to concurrent removal.
        drop(current);
        successor
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordSet for DeviceRegistry {
    type Cursor<'a>
        = DeviceRef
    where
        Self: 'a;

    fn start(&self, pos: i64, _intr: &Interrupt) -> Result<Option<DeviceRef>> {
        if pos < 0 {
            warn!(pos, "negative start position");
            return Ok(None);
        }
        Ok(self.pin_nth(pos as usize))
    }

    fn next<'a>(&'a self, cursor: DeviceRef, pos: &mut i64) -> Option<DeviceRef> {
        *pos += 1;
        self.advance(cursor)
    }

    fn show(&self, cursor: &DeviceRef, out: &mut String) -> Result<()> {
        out.push_str(&cursor.record().summary());
        Ok(())
    }
}
