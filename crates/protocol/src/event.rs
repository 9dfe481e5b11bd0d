//! Device event model and kernel uevent parsing.
//!
//! A [`DeviceEvent`] carries the ordered property list of one uevent
//! plus the fields libudev receivers filter on: subsystem, device type
//! and tags. Events are plain owned values; whoever holds one last
//! drops it.

use crate::message::WireError;

/// One device state-change notification.
///
/// `subsystem`, `devtype` and `tags` are derived from the property
/// list; properties keep their source order because the wire format
/// serializes them in iteration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEvent {
    /// Subsystem name (`SUBSYSTEM` property), if present.
    pub subsystem: Option<String>,
    /// Device type name (`DEVTYPE` property), if present.
    pub devtype: Option<String>,
    /// udev tags attached to the device.
    pub tags: Vec<String>,
    /// Ordered `(name, value)` property pairs.
    pub properties: Vec<(String, String)>,
}

impl DeviceEvent {
    /// Build an event from an ordered property list, deriving the
    /// filter fields.
    ///
    /// Tags come from `CURRENT_TAGS` when present (newer udev), else
    /// `TAGS`; both are `:`-delimited with leading/trailing separators
    /// (`:systemd:seat:`).
    #[must_use]
    pub fn from_properties(properties: Vec<(String, String)>) -> Self {
        let mut subsystem = None;
        let mut devtype = None;
        let mut tags_raw = None;
        let mut current_tags_raw = None;

        for (name, value) in &properties {
            match name.as_str() {
                "SUBSYSTEM" => subsystem = Some(value.clone()),
                "DEVTYPE" => devtype = Some(value.clone()),
                "TAGS" => tags_raw = Some(value.clone()),
                "CURRENT_TAGS" => current_tags_raw = Some(value.clone()),
                _ => {}
            }
        }

        let tags = current_tags_raw
            .or(tags_raw)
            .map(|raw| split_tags(&raw))
            .unwrap_or_default();

        Self {
            subsystem,
            devtype,
            tags,
            properties,
        }
    }

    /// Parse a kernel-format uevent datagram.
    ///
    /// The kernel broadcasts `action@devpath\0KEY=VALUE\0...` on the
    /// uevent netlink family. The leading summary line is redundant
    /// with the `ACTION`/`DEVPATH` properties and is only validated,
    /// not kept.
    pub fn parse_kernel(buf: &[u8]) -> Result<Self, WireError> {
        let mut segments = buf.split(|b| *b == 0);

        let header = segments.next().ok_or(WireError::NotKernelFormat)?;
        let header = std::str::from_utf8(header).map_err(|_| WireError::InvalidUtf8)?;
        // Kernel datagrams always start with "action@devpath".
        if !header.contains('@') || header.contains('=') {
            return Err(WireError::NotKernelFormat);
        }

        let mut properties = Vec::new();
        for segment in segments {
            if segment.is_empty() {
                // Trailing NUL, or padding after the last property.
                continue;
            }
            let s = std::str::from_utf8(segment).map_err(|_| WireError::InvalidUtf8)?;
            let (name, value) = s
                .split_once('=')
                .ok_or_else(|| WireError::MalformedProperty(s.to_string()))?;
            properties.push((name.to_string(), value.to_string()));
        }

        if properties.is_empty() {
            return Err(WireError::NotKernelFormat);
        }

        Ok(Self::from_properties(properties))
    }
}

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(':')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_properties_derives_filter_fields() {
        let event = DeviceEvent::from_properties(props(&[
            ("ACTION", "add"),
            ("SUBSYSTEM", "net"),
            ("DEVTYPE", "wlan"),
            ("TAGS", ":systemd:seat:"),
        ]));

        assert_eq!(event.subsystem.as_deref(), Some("net"));
        assert_eq!(event.devtype.as_deref(), Some("wlan"));
        assert_eq!(event.tags, vec!["systemd", "seat"]);
        assert_eq!(event.properties.len(), 4);
    }

    #[test]
    fn test_from_properties_prefers_current_tags() {
        let event = DeviceEvent::from_properties(props(&[
            ("TAGS", ":stale:"),
            ("CURRENT_TAGS", ":fresh:"),
        ]));
        assert_eq!(event.tags, vec!["fresh"]);
    }

    #[test]
    fn test_from_properties_absent_fields() {
        let event = DeviceEvent::from_properties(props(&[("ACTION", "remove")]));
        assert_eq!(event.subsystem, None);
        assert_eq!(event.devtype, None);
        assert!(event.tags.is_empty());
    }

    #[test]
    fn test_parse_kernel_datagram() {
        let buf = b"add@/devices/virtual/net/wlan0\0\
                    ACTION=add\0\
                    DEVPATH=/devices/virtual/net/wlan0\0\
                    SUBSYSTEM=net\0\
                    SEQNUM=4711\0";
        let event = DeviceEvent::parse_kernel(buf).unwrap();
        assert_eq!(event.subsystem.as_deref(), Some("net"));
        assert_eq!(
            event.properties[0],
            ("ACTION".to_string(), "add".to_string())
        );
        assert_eq!(event.properties.len(), 4);
    }

    #[test]
    fn test_parse_kernel_rejects_non_kernel_payload() {
        assert!(matches!(
            DeviceEvent::parse_kernel(b"ACTION=add\0SUBSYSTEM=net\0"),
            Err(WireError::NotKernelFormat)
        ));
        assert!(matches!(
            DeviceEvent::parse_kernel(b"add@/devices/foo\0"),
            Err(WireError::NotKernelFormat)
        ));
    }

    #[test]
    fn test_parse_kernel_rejects_malformed_property() {
        let err = DeviceEvent::parse_kernel(b"add@/devices/foo\0NOEQUALS\0").unwrap_err();
        assert!(matches!(err, WireError::MalformedProperty(_)));
    }
}
