use core::net::IpAddr;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::SIGNATURE_KEY_MAX;

/// TCP MD5 signature option value.
///
/// Layout: `addr[16] | key_len u16 | flags u16 | key[80]`, integers in host
/// byte order. IPv4 peers use the IPv4-mapped IPv6 form.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AuthSignature {
    pub addr: [u8; 16],
    pub key_len: u16,
    pub flags: u16,
    pub key: [u8; SIGNATURE_KEY_MAX],
}

impl AuthSignature {
    pub const SIZE: usize = 16 + 2 + 2 + SIGNATURE_KEY_MAX;

    /// Keys longer than the buffer are truncated.
    pub fn new(peer: IpAddr, secret: &[u8]) -> Self {
        let len = secret.len().min(SIGNATURE_KEY_MAX);
        let mut key = [0u8; SIGNATURE_KEY_MAX];
        key[..len].copy_from_slice(&secret[..len]);
        Self {
            addr: mapped_octets(peer),
            key_len: len as u16,
            flags: 0,
            key,
        }
    }

    /// Zero-length key: removes the option for `peer`.
    pub fn cleared(peer: IpAddr) -> Self {
        Self::new(peer, &[])
    }

    pub fn is_cleared(&self) -> bool {
        self.key_len == 0
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..16].copy_from_slice(&self.addr);
        buf[16..18].copy_from_slice(&self.key_len.to_ne_bytes());
        buf[18..20].copy_from_slice(&self.flags.to_ne_bytes());
        buf[20..].copy_from_slice(&self.key);
        buf
    }
}

// Key material stays out of logs.
impl core::fmt::Debug for AuthSignature {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthSignature")
            .field("addr", &self.addr)
            .field("key_len", &self.key_len)
            .finish_non_exhaustive()
    }
}

fn mapped_octets(peer: IpAddr) -> [u8; 16] {
    match peer {
        IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
        IpAddr::V6(v6) => v6.octets(),
    }
}
