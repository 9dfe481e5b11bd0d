//! ueventfw Protocol - the libudev monitor wire format, standalone.
//!
//! This crate provides:
//! - [`DeviceEvent`] - the device event model, with kernel uevent
//!   datagram parsing
//! - [`MonitorHeader`], [`encode_monitor`] and [`parse_monitor`] - the
//!   libudev monitor message layout, reproduced bit for bit
//! - [`string_hash`] and [`tag_bloom`] - the MurmurHash2-based filter
//!   hashes libudev receivers match against
//! - [`MonitorGroup`] and netlink addressing helpers
//!
//! # Wire Format
//!
//! A monitor datagram is a fixed 40-byte header (8-byte `"libudev\0"`
//! prefix, `0xFEEDCAFE` magic, blob offset/length, filter hashes, tag
//! bloom filter; all multi-byte fields big-endian) followed by the
//! property blob: NUL-terminated `name=value` strings closed by one
//! empty string.
//!
//! # Example
//!
//! ```rust
//! use ueventfw_protocol::{DeviceEvent, encode_monitor, parse_monitor};
//!
//! let event = DeviceEvent::from_properties(vec![
//!     ("ACTION".to_string(), "add".to_string()),
//!     ("SUBSYSTEM".to_string(), "net".to_string()),
//! ]);
//!
//! // Serialize for transmission
//! let datagram = encode_monitor(&event);
//!
//! // A receiver decodes it back
//! let decoded = parse_monitor(&datagram).unwrap();
//! assert_eq!(decoded.subsystem.as_deref(), Some("net"));
//! ```

mod event;
mod hash;
mod message;
mod netlink;

// Re-export main types at crate root
pub use event::DeviceEvent;
pub use hash::{murmur2, string_hash, tag_bloom};
pub use message::{
    MONITOR_MAGIC, MONITOR_PREFIX, MonitorHeader, WireError, decode_properties, encode_monitor,
    encode_properties, is_monitor_datagram, parse_monitor,
};
pub use netlink::{KOBJECT_UEVENT, MonitorGroup, sockaddr};
