#![allow(dead_code)]

use std::io::{self, Cursor, Read, Write};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use feint_core::AuthSignature;
use feint_hal::{IpFamily, SocketControl};
use feint_inject::{ReadFrom, Sink, StreamConn, StreamDialer};

pub const PEER: &str = "192.0.2.10:443";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Write(Vec<u8>),
    SetHop(u32),
    Signature { addr: [u8; 16], key: Vec<u8> },
    Closed,
}

/// Shared, ordered record of what reached the "wire".
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Event>>>);

impl Journal {
    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Write(data) => Some(data),
                _ => None,
            })
            .collect()
    }

    pub fn written(&self) -> Vec<u8> {
        self.writes().concat()
    }
}

pub fn chunks(parts: &[&str]) -> Vec<Vec<u8>> {
    parts.iter().map(|p| p.as_bytes().to_vec()).collect()
}

/// Plain sink without a bulk path. Can cap write sizes and fail writes.
pub struct CollectWrites {
    pub journal: Journal,
    pub max_write: usize,
    pub fail_next: usize,
    /// Zero-based index of a single write call that fails.
    pub fail_call: Option<usize>,
    calls: usize,
}

impl CollectWrites {
    pub fn new(journal: &Journal) -> Self {
        Self { journal: journal.clone(), max_write: usize::MAX, fail_next: 0, fail_call: None, calls: 0 }
    }
}

impl Write for CollectWrites {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_call == Some(call) {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "scripted timeout"));
        }
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted failure"));
        }
        let n = data.len().min(self.max_write);
        self.journal.push(Event::Write(data[..n].to_vec()));
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Sink for CollectWrites {}

/// Sink with a bulk path: each read from the source lands as one write.
pub struct BulkCollect {
    pub journal: Journal,
    pub chunk: usize,
    pub fail_next: usize,
}

impl BulkCollect {
    pub fn new(journal: &Journal) -> Self {
        Self { journal: journal.clone(), chunk: 32 * 1024, fail_next: 0 }
    }
}

impl Write for BulkCollect {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "scripted failure"));
        }
        self.journal.push(Event::Write(data.to_vec()));
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Sink for BulkCollect {
    fn bulk(&mut self) -> Option<&mut dyn ReadFrom> {
        Some(self)
    }
}

impl ReadFrom for BulkCollect {
    fn read_from(&mut self, source: &mut dyn Read) -> io::Result<u64> {
        let mut buf = vec![0u8; self.chunk];
        let mut total = 0u64;
        loop {
            match source.read(&mut buf) {
                Ok(0) => return Ok(total),
                Ok(n) => {
                    self.journal.push(Event::Write(buf[..n].to_vec()));
                    total += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

#[derive(Default)]
pub struct FailPlan {
    pub get: bool,
    /// Hop values whose `set_hop_limit` fails.
    pub set: Vec<u32>,
    pub signature: bool,
}

/// Journaling socket control with scripted failures.
#[derive(Clone)]
pub struct FakeControl {
    pub journal: Journal,
    pub hops: Arc<Mutex<u32>>,
    pub plan: Arc<Mutex<FailPlan>>,
}

impl FakeControl {
    pub fn new(journal: &Journal, hops: u32) -> Self {
        Self {
            journal: journal.clone(),
            hops: Arc::new(Mutex::new(hops)),
            plan: Arc::new(Mutex::new(FailPlan::default())),
        }
    }

    pub fn hops(&self) -> u32 {
        *self.hops.lock().unwrap()
    }
}

impl SocketControl for FakeControl {
    fn family(&self) -> IpFamily {
        IpFamily::V4
    }

    fn hop_limit(&self) -> io::Result<u32> {
        if self.plan.lock().unwrap().get {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "getsockopt"));
        }
        Ok(self.hops())
    }

    fn set_hop_limit(&self, value: u32) -> io::Result<()> {
        if self.plan.lock().unwrap().set.contains(&value) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "setsockopt"));
        }
        *self.hops.lock().unwrap() = value;
        self.journal.push(Event::SetHop(value));
        Ok(())
    }

    fn set_auth_signature(&self, signature: &AuthSignature) -> io::Result<()> {
        if self.plan.lock().unwrap().signature {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "TCP_MD5SIG"));
        }
        let key = signature.key[..signature.key_len as usize].to_vec();
        self.journal.push(Event::Signature { addr: signature.addr, key });
        Ok(())
    }
}

/// In-memory connection: canned inbound bytes, journaled outbound bytes.
pub struct FakeConn {
    pub journal: Journal,
    pub inbound: Cursor<Vec<u8>>,
    pub control: Option<FakeControl>,
    pub bulk: bool,
}

impl Read for FakeConn {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inbound.read(buf)
    }
}

impl Write for FakeConn {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.journal.push(Event::Write(data.to_vec()));
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Sink for FakeConn {
    fn bulk(&mut self) -> Option<&mut dyn ReadFrom> {
        if self.bulk {
            Some(self)
        } else {
            None
        }
    }
}

impl ReadFrom for FakeConn {
    fn read_from(&mut self, source: &mut dyn Read) -> io::Result<u64> {
        BulkCollect::new(&self.journal).read_from(source)
    }
}

impl StreamConn for FakeConn {
    fn peer_addr(&self) -> io::Result<SocketAddr> {
        Ok(PEER.parse().unwrap())
    }

    fn socket_control(&self) -> io::Result<Box<dyn SocketControl>> {
        match &self.control {
            Some(control) => Ok(Box::new(control.clone())),
            None => Err(io::Error::new(io::ErrorKind::Unsupported, "in-memory stream")),
        }
    }
}

impl Drop for FakeConn {
    fn drop(&mut self) {
        self.journal.push(Event::Closed);
    }
}

pub struct FakeDialer {
    pub journal: Journal,
    pub control: Option<FakeControl>,
    pub bulk: bool,
    pub refuse: bool,
    pub inbound: Vec<u8>,
}

impl FakeDialer {
    pub fn new(journal: &Journal, control: Option<FakeControl>) -> Self {
        Self { journal: journal.clone(), control, bulk: false, refuse: false, inbound: Vec::new() }
    }
}

impl StreamDialer for FakeDialer {
    fn dial(&self, addr: &str) -> io::Result<Box<dyn StreamConn>> {
        if self.refuse {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, format!("refused {}", addr)));
        }
        Ok(Box::new(FakeConn {
            journal: self.journal.clone(),
            inbound: Cursor::new(self.inbound.clone()),
            control: self.control.clone(),
            bulk: self.bulk,
        }))
    }
}
