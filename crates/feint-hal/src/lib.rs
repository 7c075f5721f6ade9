#![forbid(unsafe_code)]

use std::io;
use std::net::{IpAddr, SocketAddr};

use feint_core::AuthSignature;

/// Which hop counter the socket carries: IPv4 TTL or IPv6 hop limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpFamily {
    V4,
    V6,
}

impl IpFamily {
    /// Chosen once from the connected peer. An IPv4-mapped peer on a dual-stack
    /// socket sends IPv4 packets, so it takes the IPv4 TTL.
    pub fn of(peer: &SocketAddr) -> Self {
        match peer {
            SocketAddr::V4(_) => IpFamily::V4,
            SocketAddr::V6(v6) if v6.ip().to_ipv4_mapped().is_some() => IpFamily::V4,
            SocketAddr::V6(_) => IpFamily::V6,
        }
    }
}

/// Socket options of one live connection.
///
/// Calls are synchronous and block for the duration of the system call.
/// Implementations carry no locking: the hop limit is shared state of the
/// socket, and a concurrent writer observes whatever value is set.
pub trait SocketControl: Send {
    fn family(&self) -> IpFamily;

    /// Current IPv4 TTL or IPv6 unicast hop limit.
    fn hop_limit(&self) -> io::Result<u32>;

    fn set_hop_limit(&self, value: u32) -> io::Result<()>;

    /// Installs the TCP MD5 signature option.
    fn set_auth_signature(&self, signature: &AuthSignature) -> io::Result<()>;

    fn clear_auth_signature(&self, peer: IpAddr) -> io::Result<()> {
        self.set_auth_signature(&AuthSignature::cleared(peer))
    }

    /// Sends straight from the descriptor, skipping any user-space buffering.
    fn send_raw(&self, _data: &[u8], _flags: i32) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "raw send not available on this platform"))
    }
}

impl<T: SocketControl + ?Sized> SocketControl for Box<T> {
    fn family(&self) -> IpFamily { (**self).family() }
    fn hop_limit(&self) -> io::Result<u32> { (**self).hop_limit() }
    fn set_hop_limit(&self, value: u32) -> io::Result<()> { (**self).set_hop_limit(value) }
    fn set_auth_signature(&self, signature: &AuthSignature) -> io::Result<()> {
        (**self).set_auth_signature(signature)
    }
    fn clear_auth_signature(&self, peer: IpAddr) -> io::Result<()> {
        (**self).clear_auth_signature(peer)
    }
    fn send_raw(&self, data: &[u8], flags: i32) -> io::Result<usize> {
        (**self).send_raw(data, flags)
    }
}
