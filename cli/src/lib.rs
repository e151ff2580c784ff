//! Command-line driver for a ctlfs node set
//!
//! Mounts the standard nodes, seeds a few demo devices, and drives them
//! from subcommands: `nodes`, `cat <node>`, `put <node> <text..>`,
//! `skip <node> <offset> <len>`.

use ctlfs::{
    AttrGroup, BoundedBuffer, ByteTable, DeviceAddr, DeviceRegistry, NodeHandle, StatusNode, Vfs,
    Whence,
};
use std::error::Error;
use std::sync::Arc;
use tracing::info;

/// Build the standard mount set with a seeded device registry.
#[must_use]
pub fn build_vfs() -> Vfs {
    let vfs = Vfs::new();
    let attrs = AttrGroup::new();

    vfs.mount(
        "message",
        NodeHandle::Buffer(Arc::new(BoundedBuffer::<1024>::new())),
    );
    vfs.mount(
        "scratch",
        NodeHandle::Buffer(Arc::new(BoundedBuffer::<127>::new())),
    );
    vfs.mount("flag", NodeHandle::Attr(attrs.flag));
    vfs.mount("level", NodeHandle::Attr(attrs.level));
    vfs.mount("label", NodeHandle::Attr(attrs.label));
    vfs.mount("tokens", NodeHandle::Table(Arc::new(ByteTable::new())));

    let registry = Arc::new(DeviceRegistry::new());
    registry.insert(
        DeviceAddr {
            bus: 0,
            slot: 0,
            function: 0,
        },
        0x8086,
        0x1237,
        Some("hostbridge"),
    );
    registry.insert(
        DeviceAddr {
            bus: 0,
            slot: 2,
            function: 0,
        },
        0x1234,
        0x1111,
        Some("bochs-display"),
    );
    registry.insert(
        DeviceAddr {
            bus: 0,
            slot: 3,
            function: 0,
        },
        0x8086,
        0x100E,
        None,
    );
    vfs.mount("devices", NodeHandle::Devices(registry));

    vfs.mount("status", NodeHandle::Status(Arc::new(StatusNode::new())));
    vfs
}

fn cat(vfs: &Vfs, name: &str) -> Result<String, Box<dyn Error>> {
    let mut session = vfs.open(name)?;
    let mut collected = Vec::new();
    let mut chunk = [0u8; 64];
    loop {
        let n = session.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        collected.extend_from_slice(&chunk[..n]);
    }
    Ok(String::from_utf8_lossy(&collected).into_owned())
}

fn put(vfs: &Vfs, name: &str, text: &str) -> Result<usize, Box<dyn Error>> {
    let mut session = vfs.open(name)?;
    let mut written = 0;
    let data = text.as_bytes();
    // Short writes resubmit the remainder until the node is full.
    while written < data.len() {
        match session.write(&data[written..]) {
            Ok(n) => written += n,
            Err(err) if written > 0 => {
                info!(node = name, written, %err, "stopping after short write");
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(written)
}

fn skip(vfs: &Vfs, name: &str, offset: i64, len: usize) -> Result<String, Box<dyn Error>> {
    let mut session = vfs.open(name)?;
    session.seek(offset, Whence::Start)?;
    let mut out = vec![0u8; len];
    let n = session.read(&mut out)?;
    out.truncate(n);
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Run one subcommand against a freshly mounted node set.
///
/// # Errors
/// Usage problems and node errors are both reported to the caller.
pub fn run(args: impl Iterator<Item = String>) -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = args.collect();
    let vfs = build_vfs();

    match args.first().map(String::as_str) {
        Some("nodes") => {
            for name in vfs.names() {
                println!("{name}");
            }
            Ok(())
        }
        Some("cat") => {
            let name = args.get(1).ok_or("usage: cat <node>")?;
            print!("{}", cat(&vfs, name)?);
            Ok(())
        }
        Some("put") => {
            let name = args.get(1).ok_or("usage: put <node> <text..>")?;
            let text = args[2..].join(" ");
            let written = put(&vfs, name, &text)?;
            println!("wrote {written} bytes");
            Ok(())
        }
        Some("skip") => {
            let name = args.get(1).ok_or("usage: skip <node> <offset> <len>")?;
            let offset: i64 = args.get(2).ok_or("missing offset")?.parse()?;
            let len: usize = args.get(3).ok_or("missing len")?.parse()?;
            print!("{}", skip(&vfs, name, offset, len)?);
            Ok(())
        }
        _ => Err("usage: nodes | cat <node> | put <node> <text..> | skip <node> <offset> <len>"
            .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cat_seeded_devices() {
        let vfs = build_vfs();
        let listing = cat(&vfs, "devices").unwrap();
        assert_eq!(listing.lines().count(), 3);
        assert!(listing.contains("00:02.0 1234:1111 [bochs-display]"));
    }

    #[test]
    fn test_put_then_cat_message() {
        let vfs = build_vfs();
        assert_eq!(put(&vfs, "message", "hello").unwrap(), 5);
        assert_eq!(cat(&vfs, "message").unwrap(), "hello");
    }

    #[test]
    fn test_put_oversized_message_stops_at_capacity() {
        let vfs = build_vfs();
        let big = "x".repeat(300);
        assert_eq!(put(&vfs, "scratch", &big).unwrap(), 127);
    }

    #[test]
    fn test_skip_into_token_listing() {
        let vfs = build_vfs();
        let text = skip(&vfs, "tokens", 40, 16).unwrap();
        assert_eq!(text, "010\n011\n012\n013\n");
    }

    #[test]
    fn test_unknown_command_is_usage_error() {
        assert!(run(std::iter::empty()).is_err());
    }
}
