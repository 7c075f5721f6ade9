use std::sync::Arc;

use rand::RngCore;

const HTTP_METHODS: [&[u8]; 9] = [
    b"HEAD", b"GET", b"POST", b"PUT", b"DELETE", b"OPTIONS", b"CONNECT", b"TRACE", b"PATCH",
];

const HTTP_DECOY: &[u8] = b"GET / HTTP/1.1\r\nHost: www.w3.org\r\nAccept: */*\r\n\r\n";

const TLS_DECOY_BODY: usize = 512;

/// Picks a decoy from the first bytes of the real stream.
pub trait DecoyProvider: Send + Sync {
    fn decoy_for(&self, head: &[u8]) -> Vec<u8>;
}

/// Default heuristic: an HTTP request when the stream starts with an HTTP
/// method, otherwise a TLS handshake record carrying random bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbeDecoy;

impl ProbeDecoy {
    /// Needs the full 4-byte peek to match.
    pub fn is_http(head: &[u8]) -> bool {
        if head.len() < feint_core::DECOY_PEEK_LEN {
            return false;
        }
        let peek = &head[..feint_core::DECOY_PEEK_LEN];
        HTTP_METHODS.iter().any(|method| {
            let n = method.len().min(peek.len());
            peek[..n] == method[..n]
        })
    }
}

impl DecoyProvider for ProbeDecoy {
    fn decoy_for(&self, head: &[u8]) -> Vec<u8> {
        if Self::is_http(head) {
            return HTTP_DECOY.to_vec();
        }
        let mut record = Vec::with_capacity(5 + TLS_DECOY_BODY);
        record.extend_from_slice(&[0x16, 0x03, 0x01]);
        record.extend_from_slice(&(TLS_DECOY_BODY as u16).to_be_bytes());
        record.resize(5 + TLS_DECOY_BODY, 0);
        rand::thread_rng().fill_bytes(&mut record[5..]);
        record
    }
}

/// Where a writer's decoy bytes come from.
#[derive(Clone)]
pub enum DecoySource {
    Fixed(Vec<u8>),
    Provided(Arc<dyn DecoyProvider>),
}

impl DecoySource {
    pub fn needs_head(&self) -> bool {
        matches!(self, DecoySource::Provided(_))
    }

    pub fn bytes_for(&self, head: &[u8]) -> Vec<u8> {
        match self {
            DecoySource::Fixed(bytes) => bytes.clone(),
            DecoySource::Provided(provider) => provider.decoy_for(head),
        }
    }
}

impl std::fmt::Debug for DecoySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecoySource::Fixed(bytes) => write!(f, "Fixed({} bytes)", bytes.len()),
            DecoySource::Provided(_) => f.write_str("Provided"),
        }
    }
}
