use std::io::{self, Read, Write};

use feint_core::DECOY_PEEK_LEN;
use log::debug;

use crate::copy::{HeadFirst, ReadFrom, Sink, SplitReader};
use crate::decoy::DecoySource;
use crate::hop::{with_hop_limit, HopTrick};
use crate::InjectError;

/// Bytes accepted by one `inject` call, split by origin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub decoy: usize,
    pub real: usize,
}

impl Progress {
    pub fn total(&self) -> usize {
        self.decoy + self.real
    }
}

/// Writes a decoy ahead of the first real bytes, then splits the outgoing
/// stream once `split_budget` bytes (decoy included) have gone out. After
/// that it is a pass-through.
///
/// ```text
/// decoy "Fake data", offset 5, length 6, write "Request"
///   -> "data" | "Re" | "quest"
/// ```
///
/// The state belongs to one connection and is not locked; callers serialize
/// their writes as they would on the bare socket.
pub struct InjectionWriter<W> {
    inner: W,
    source: DecoySource,
    offset: usize,
    length: usize,
    /// Effective decoy slice, resolved on the first non-empty write.
    decoy: Option<Vec<u8>>,
    cursor: usize,
    split_budget: usize,
    hop: Option<HopTrick>,
    bulk: bool,
    /// Real bytes taken from a bulk source whose decoy then failed. They go
    /// out ahead of the next call's data.
    held: Vec<u8>,
}

impl<W: Sink> InjectionWriter<W> {
    pub fn new(mut inner: W, source: DecoySource, offset: usize, length: usize) -> Self {
        let bulk = inner.bulk().is_some();
        Self {
            inner,
            source,
            offset,
            length,
            decoy: None,
            cursor: 0,
            split_budget: length,
            hop: None,
            bulk,
            held: Vec::new(),
        }
    }

    /// Sends the decoy under a lowered hop limit.
    pub fn with_hop_trick(mut self, trick: HopTrick) -> Self {
        self.hop = Some(trick);
        self
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Outgoing bytes left before the split point.
    pub fn split_budget(&self) -> usize {
        self.split_budget
    }

    pub fn is_passthrough(&self) -> bool {
        let decoy_done = self.decoy.as_ref().map_or(false, |d| self.cursor >= d.len());
        decoy_done && self.split_budget == 0
    }

    /// Writes `data`, preceded by the decoy on the first call.
    ///
    /// A decoy or hop-limit failure returns the error with no real bytes sent.
    pub fn inject(&mut self, data: &[u8]) -> io::Result<Progress> {
        if data.is_empty() {
            return Ok(Progress::default());
        }
        let decoy = self.send_decoy(data)?;
        self.flush_held()?;
        let real = self.forward(data)?;
        Ok(Progress { decoy, real })
    }

    fn flush_held(&mut self) -> io::Result<()> {
        let held = std::mem::take(&mut self.held);
        let mut sent = 0;
        while sent < held.len() {
            match self.forward(&held[sent..]) {
                Ok(0) => {
                    self.held = held[sent..].to_vec();
                    return Err(io::ErrorKind::WriteZero.into());
                }
                Ok(n) => sent += n,
                Err(e) => {
                    self.held = held[sent..].to_vec();
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    fn send_decoy(&mut self, head: &[u8]) -> Result<usize, InjectError> {
        let (offset, length) = (self.offset, self.length);
        let source = &self.source;
        let split_budget = &mut self.split_budget;
        let decoy = self.decoy.get_or_insert_with(|| {
            let window = feint_core::window(&source.bytes_for(head), offset, length).to_vec();
            if window.is_empty() {
                *split_budget = 0;
            }
            window
        });
        if self.cursor >= decoy.len() {
            return Ok(0);
        }

        let pending = &decoy[self.cursor..];
        let inner = &mut self.inner;
        let mut accepted = 0;
        let mut write_decoy = || match inner.write(pending) {
            Ok(0) => Err(io::Error::new(io::ErrorKind::WriteZero, "sink accepted no decoy bytes")),
            Ok(n) => {
                accepted = n;
                Ok(n)
            }
            Err(e) => Err(e),
        };
        let result = match &self.hop {
            Some(trick) => with_hop_limit(&*trick.control, trick.hop_limit, write_decoy),
            None => write_decoy().map_err(InjectError::DecoyWrite),
        };

        // Sent once, as a unit; a failed restore does not unsend it.
        if accepted > 0 {
            self.cursor = decoy.len();
            self.split_budget = self.split_budget.saturating_sub(accepted);
            debug!(
                "decoy sent: {} of {} bytes, {} left before split",
                accepted,
                decoy.len(),
                self.split_budget
            );
        }
        result
    }

    fn forward(&mut self, data: &[u8]) -> io::Result<usize> {
        let budget = self.split_budget;
        if 0 < budget && budget < data.len() {
            let n = self.inner.write(&data[..budget])?;
            self.split_budget = budget.saturating_sub(n);
            if n < budget {
                return Ok(n);
            }
            debug!("split point reached, {} bytes follow", data.len() - n);
            return match self.inner.write(&data[n..]) {
                Ok(m) => Ok(n + m),
                Err(e) => {
                    debug!("write after split point failed, {} of {} bytes sent: {}", n, data.len(), e);
                    Ok(n)
                }
            };
        }
        let n = self.inner.write(data)?;
        self.split_budget = self.split_budget.saturating_sub(n);
        Ok(n)
    }
}

impl<W: Sink> Write for InjectionWriter<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.inject(data).map(|progress| progress.real)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Sink> Sink for InjectionWriter<W> {
    fn bulk(&mut self) -> Option<&mut dyn ReadFrom> {
        if self.bulk {
            Some(self)
        } else {
            None
        }
    }
}

/// Keeps the wrapped sink's bulk path: the decoy goes out as a write, then
/// the source is handed to the sink through a view that ends a read exactly
/// at the split point.
impl<W: Sink> ReadFrom for InjectionWriter<W> {
    fn read_from(&mut self, source: &mut dyn Read) -> io::Result<u64> {
        let mut head = std::mem::take(&mut self.held);
        // Only a provided decoy that is not chosen yet looks at the stream.
        // An empty source then sends nothing at all.
        if self.decoy.is_none() && self.source.needs_head() {
            let start = head.len();
            head.resize(start.max(DECOY_PEEK_LEN), 0);
            let filled = peek_head(source, &mut head[start..]);
            head.truncate(start + filled.as_ref().map_or(0, |n| *n));
            if let Err(e) = filled {
                self.held = head;
                return Err(e);
            }
            if head.is_empty() {
                return Ok(0);
            }
        }
        let decoy = match self.send_decoy(&head) {
            Ok(n) => n,
            Err(e) => {
                self.held = head;
                return Err(e.into());
            }
        };

        let mut rest = HeadFirst::new(&head, source);
        let mut view = SplitReader::new(&mut rest, self.split_budget);
        let bulk = match self.inner.bulk() {
            Some(bulk) => bulk,
            None => return Err(InjectError::MissingCapability("bulk transfer").into()),
        };
        let result = bulk.read_from(&mut view);
        self.split_budget = view.remaining();
        Ok(decoy as u64 + result?)
    }
}

/// Reads until `buf` is full or the source hits EOF. Bytes read before an
/// error are kept and reported as a short peek.
fn peek_head(source: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) if filled > 0 => break,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
