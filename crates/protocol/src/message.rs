//! libudev monitor wire format.
//!
//! Monitor datagrams are a fixed 40-byte header followed by the
//! property blob. The layout is dictated by libudev's receiving parser
//! and must be reproduced bit for bit, so serialization is an explicit
//! byte layout rather than a `repr(C)` struct copy: every multi-byte
//! field is written big-endian regardless of host architecture.
//!
//! ```text
//! 0   8 bytes  "libudev\0"
//! 8   u32      magic 0xFEEDCAFE
//! 12  u32      header size (40)
//! 16  u32      property blob offset
//! 20  u32      property blob length
//! 24  u32      subsystem hash (0 if absent)
//! 28  u32      devtype hash (0 if absent)
//! 32  u32      tag bloom, low half
//! 36  u32      tag bloom, high half
//! ```
//!
//! The blob is `name=value\0` for each property in order, closed by one
//! empty NUL-terminated string.

use thiserror::Error;

use crate::event::DeviceEvent;
use crate::hash::{string_hash, tag_bloom};

/// 8-byte ASCII prefix identifying the protocol family.
pub const MONITOR_PREFIX: [u8; 8] = *b"libudev\0";

/// Magic constant identifying monitor messages (network byte order on
/// the wire).
pub const MONITOR_MAGIC: u32 = 0xFEED_CAFE;

/// Error type for wire-format operations.
#[derive(Debug, Error)]
pub enum WireError {
    /// Datagram shorter than the fixed header.
    #[error("datagram too short for monitor header: {0} bytes")]
    Truncated(usize),

    /// Prefix is not `"libudev\0"`.
    #[error("bad monitor prefix")]
    BadPrefix,

    /// Magic field mismatch.
    #[error("bad monitor magic {0:#010x}")]
    BadMagic(u32),

    /// Property blob offset/length point outside the datagram.
    #[error("property blob out of bounds (offset {offset}, len {len}, datagram {datagram})")]
    BlobBounds {
        offset: usize,
        len: usize,
        datagram: usize,
    },

    /// Property blob is missing its end-of-list terminator.
    #[error("property blob missing terminator")]
    MissingTerminator,

    /// Property data is not valid UTF-8.
    #[error("property string is not valid UTF-8")]
    InvalidUtf8,

    /// Property entry has no `=` separator.
    #[error("malformed property entry {0:?}")]
    MalformedProperty(String),

    /// Datagram is not in the kernel uevent text format.
    #[error("not a kernel uevent datagram")]
    NotKernelFormat,
}

/// Fixed-layout monitor message header.
///
/// `prefix`, `magic` and the header size are implied constants; only
/// the per-message fields are carried here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorHeader {
    /// Byte offset of the property blob from message start.
    pub properties_offset: u32,
    /// Byte length of the property blob.
    pub properties_len: u32,
    /// Hash of the subsystem name, 0 if absent.
    pub filter_subsystem_hash: u32,
    /// Hash of the device type name, 0 if absent.
    pub filter_devtype_hash: u32,
    /// 64-bit tag bloom filter.
    pub filter_tag_bloom: u64,
}

impl MonitorHeader {
    /// Size of the header record on the wire.
    pub const SIZE: usize = 40;

    /// Build the header for one event and its serialized blob length.
    #[must_use]
    pub fn for_event(event: &DeviceEvent, properties_len: u32) -> Self {
        let bloom = event.tags.iter().fold(0u64, |acc, t| acc | tag_bloom(t));
        Self {
            properties_offset: Self::SIZE as u32,
            properties_len,
            filter_subsystem_hash: event.subsystem.as_deref().map_or(0, string_hash),
            filter_devtype_hash: event.devtype.as_deref().map_or(0, string_hash),
            filter_tag_bloom: bloom,
        }
    }

    /// Serialize the header to its explicit byte layout.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..8].copy_from_slice(&MONITOR_PREFIX);
        buf[8..12].copy_from_slice(&MONITOR_MAGIC.to_be_bytes());
        buf[12..16].copy_from_slice(&(Self::SIZE as u32).to_be_bytes());
        buf[16..20].copy_from_slice(&self.properties_offset.to_be_bytes());
        buf[20..24].copy_from_slice(&self.properties_len.to_be_bytes());
        buf[24..28].copy_from_slice(&self.filter_subsystem_hash.to_be_bytes());
        buf[28..32].copy_from_slice(&self.filter_devtype_hash.to_be_bytes());
        let low = (self.filter_tag_bloom & 0xFFFF_FFFF) as u32;
        let high = (self.filter_tag_bloom >> 32) as u32;
        buf[32..36].copy_from_slice(&low.to_be_bytes());
        buf[36..40].copy_from_slice(&high.to_be_bytes());
        buf
    }

    /// Parse and validate a header from the start of a datagram.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < Self::SIZE {
            return Err(WireError::Truncated(buf.len()));
        }
        if buf[0..8] != MONITOR_PREFIX {
            return Err(WireError::BadPrefix);
        }
        let magic = read_u32(buf, 8);
        if magic != MONITOR_MAGIC {
            return Err(WireError::BadMagic(magic));
        }

        let low = u64::from(read_u32(buf, 32));
        let high = u64::from(read_u32(buf, 36));
        Ok(Self {
            properties_offset: read_u32(buf, 16),
            properties_len: read_u32(buf, 20),
            filter_subsystem_hash: read_u32(buf, 24),
            filter_devtype_hash: read_u32(buf, 28),
            filter_tag_bloom: high << 32 | low,
        })
    }
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

/// Serialize an ordered property list into the NUL-terminated blob.
#[must_use]
pub fn encode_properties(properties: &[(String, String)]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(
        properties
            .iter()
            .map(|(n, v)| n.len() + v.len() + 2)
            .sum::<usize>()
            + 1,
    );
    for (name, value) in properties {
        blob.extend_from_slice(name.as_bytes());
        blob.push(b'=');
        blob.extend_from_slice(value.as_bytes());
        blob.push(0);
    }
    // End-of-list marker: one empty NUL-terminated string.
    blob.push(0);
    blob
}

/// Decode a property blob back into an ordered property list.
pub fn decode_properties(blob: &[u8]) -> Result<Vec<(String, String)>, WireError> {
    let mut properties = Vec::new();
    let mut rest = blob;
    loop {
        let nul = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or(WireError::MissingTerminator)?;
        let entry = &rest[..nul];
        rest = &rest[nul + 1..];
        if entry.is_empty() {
            return Ok(properties);
        }
        let s = std::str::from_utf8(entry).map_err(|_| WireError::InvalidUtf8)?;
        let (name, value) = s
            .split_once('=')
            .ok_or_else(|| WireError::MalformedProperty(s.to_string()))?;
        properties.push((name.to_string(), value.to_string()));
    }
}

/// Encode one event as a complete monitor datagram: header followed by
/// the property blob. Pure; performs no I/O.
#[must_use]
pub fn encode_monitor(event: &DeviceEvent) -> Vec<u8> {
    let blob = encode_properties(&event.properties);
    let header = MonitorHeader::for_event(event, blob.len() as u32);

    let mut message = Vec::with_capacity(MonitorHeader::SIZE + blob.len());
    message.extend_from_slice(&header.to_bytes());
    message.extend_from_slice(&blob);
    message
}

/// Decode a monitor datagram into a [`DeviceEvent`].
///
/// The filter hashes are not reversible, so subsystem/devtype/tags are
/// re-derived from the decoded properties.
pub fn parse_monitor(buf: &[u8]) -> Result<DeviceEvent, WireError> {
    let header = MonitorHeader::from_bytes(buf)?;
    let offset = header.properties_offset as usize;
    let len = header.properties_len as usize;
    let end = offset.checked_add(len).filter(|end| *end <= buf.len());
    let Some(end) = end else {
        return Err(WireError::BlobBounds {
            offset,
            len,
            datagram: buf.len(),
        });
    };

    let properties = decode_properties(&buf[offset..end])?;
    Ok(DeviceEvent::from_properties(properties))
}

/// Whether a datagram carries the monitor prefix (as opposed to the
/// kernel uevent text format).
#[must_use]
pub fn is_monitor_datagram(buf: &[u8]) -> bool {
    buf.len() >= MONITOR_PREFIX.len() && buf[..MONITOR_PREFIX.len()] == MONITOR_PREFIX
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{string_hash, tag_bloom};

    fn sample_event() -> DeviceEvent {
        DeviceEvent::from_properties(vec![
            ("ACTION".to_string(), "add".to_string()),
            ("SUBSYSTEM".to_string(), "net".to_string()),
            ("TAGS".to_string(), ":uevent:".to_string()),
        ])
    }

    #[test]
    fn test_header_is_forty_bytes() {
        assert_eq!(MonitorHeader::SIZE, 40);
        let event = sample_event();
        assert_eq!(MonitorHeader::for_event(&event, 0).to_bytes().len(), 40);
    }

    #[test]
    fn test_header_fixed_fields() {
        let bytes = MonitorHeader::for_event(&sample_event(), 12).to_bytes();
        assert_eq!(&bytes[0..8], b"libudev\0");
        assert_eq!(&bytes[8..12], &[0xFE, 0xED, 0xCA, 0xFE]);
        assert_eq!(&bytes[12..16], &40u32.to_be_bytes());
        assert_eq!(&bytes[16..20], &40u32.to_be_bytes());
        assert_eq!(&bytes[20..24], &12u32.to_be_bytes());
    }

    #[test]
    fn test_header_roundtrip() {
        let event = sample_event();
        let header = MonitorHeader::for_event(&event, 33);
        let parsed = MonitorHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn test_encode_known_vector() {
        // Subsystem "net", no devtype, one tag, one property.
        let event = DeviceEvent {
            subsystem: Some("net".to_string()),
            devtype: None,
            tags: vec!["uevent".to_string()],
            properties: vec![("ACTION".to_string(), "add".to_string())],
        };
        let message = encode_monitor(&event);
        let header = MonitorHeader::from_bytes(&message).unwrap();

        assert_eq!(header.filter_subsystem_hash, string_hash("net"));
        assert_ne!(header.filter_subsystem_hash, 0);
        assert_eq!(header.filter_devtype_hash, 0);
        assert_eq!(header.filter_tag_bloom, tag_bloom("uevent"));
        assert!(header.filter_tag_bloom.count_ones() <= 4);
        assert_eq!(&message[40..], b"ACTION=add\0\0");
        assert_eq!(header.properties_len as usize, message.len() - 40);
    }

    #[test]
    fn test_bloom_is_or_of_tag_contributions() {
        let event = DeviceEvent {
            subsystem: None,
            devtype: None,
            tags: vec!["systemd".to_string(), "seat".to_string()],
            properties: Vec::new(),
        };
        let header = MonitorHeader::for_event(&event, 0);
        assert_eq!(
            header.filter_tag_bloom,
            tag_bloom("systemd") | tag_bloom("seat")
        );
    }

    #[test]
    fn test_properties_roundtrip_preserves_order() {
        let properties = vec![
            ("ACTION".to_string(), "change".to_string()),
            ("DEVPATH".to_string(), "/devices/pci0000:00".to_string()),
            ("EMPTY".to_string(), String::new()),
            ("SUBSYSTEM".to_string(), "block".to_string()),
        ];
        let blob = encode_properties(&properties);
        assert_eq!(blob.last(), Some(&0));
        assert_eq!(decode_properties(&blob).unwrap(), properties);
    }

    #[test]
    fn test_empty_property_list() {
        let blob = encode_properties(&[]);
        assert_eq!(blob, vec![0]);
        assert!(decode_properties(&blob).unwrap().is_empty());
    }

    #[test]
    fn test_monitor_roundtrip() {
        let event = sample_event();
        let decoded = parse_monitor(&encode_monitor(&event)).unwrap();
        assert_eq!(decoded.properties, event.properties);
        assert_eq!(decoded.subsystem, event.subsystem);
        assert_eq!(decoded.tags, event.tags);
    }

    #[test]
    fn test_parse_rejects_truncated() {
        assert!(matches!(
            parse_monitor(b"libudev\0"),
            Err(WireError::Truncated(_))
        ));
    }

    #[test]
    fn test_parse_rejects_bad_prefix_and_magic() {
        let mut message = encode_monitor(&sample_event());
        message[0] = b'X';
        assert!(matches!(
            parse_monitor(&message),
            Err(WireError::BadPrefix)
        ));

        let mut message = encode_monitor(&sample_event());
        message[8] = 0;
        assert!(matches!(
            parse_monitor(&message),
            Err(WireError::BadMagic(_))
        ));
    }

    #[test]
    fn test_parse_rejects_out_of_bounds_blob() {
        let mut message = encode_monitor(&sample_event());
        // Inflate the advertised blob length past the datagram end.
        message[20..24].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(
            parse_monitor(&message),
            Err(WireError::BlobBounds { .. })
        ));
    }

    #[test]
    fn test_is_monitor_datagram() {
        assert!(is_monitor_datagram(&encode_monitor(&sample_event())));
        assert!(!is_monitor_datagram(b"add@/devices/foo\0ACTION=add\0"));
        assert!(!is_monitor_datagram(b"lib"));
    }
}
