//! Netlink addressing for the kernel uevent protocol family.

use bitflags::bitflags;

/// Netlink protocol number for kernel object uevents.
pub const KOBJECT_UEVENT: libc::c_int = libc::NETLINK_KOBJECT_UEVENT;

bitflags! {
    /// Multicast groups on the uevent netlink family.
    ///
    /// These are the group masks libudev binds to, not group indices.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MonitorGroup: u32 {
        /// Raw kernel uevents, text format.
        const KERNEL = 1;
        /// Processed udev daemon events, monitor binary format.
        const UDEV = 2;
    }
}

/// Build a `sockaddr_nl` for binding to or sending toward the given
/// multicast groups.
#[must_use]
pub fn sockaddr(groups: MonitorGroup) -> libc::sockaddr_nl {
    // sockaddr_nl has private padding; zero-init is the only portable
    // way to construct it.
    let mut addr: libc::sockaddr_nl = unsafe { std::mem::zeroed() };
    addr.nl_family = libc::AF_NETLINK as libc::sa_family_t;
    addr.nl_pid = 0;
    addr.nl_groups = groups.bits();
    addr
}
