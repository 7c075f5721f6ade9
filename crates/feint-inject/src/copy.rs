use std::io::{self, Read, Write};

/// Bulk transfer from a source stream into a sink.
pub trait ReadFrom {
    /// Pulls from `source` until EOF. Returns the bytes handed to the sink.
    fn read_from(&mut self, source: &mut dyn Read) -> io::Result<u64>;
}

/// Output side of a connection, with an optional bulk-transfer capability.
///
/// `bulk` answers the same way for the lifetime of a sink, so wrappers may
/// resolve it once when they are built.
pub trait Sink: Write {
    fn bulk(&mut self) -> Option<&mut dyn ReadFrom> {
        None
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn bulk(&mut self) -> Option<&mut dyn ReadFrom> {
        (**self).bulk()
    }
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn bulk(&mut self) -> Option<&mut dyn ReadFrom> {
        (**self).bulk()
    }
}

impl Sink for Vec<u8> {
    fn bulk(&mut self) -> Option<&mut dyn ReadFrom> {
        Some(self)
    }
}

impl ReadFrom for Vec<u8> {
    fn read_from(&mut self, source: &mut dyn Read) -> io::Result<u64> {
        source.read_to_end(self).map(|n| n as u64)
    }
}

/// Yields at most `remaining` bytes per read until that many have been
/// read, then passes reads through unbounded.
///
/// Puts a read boundary exactly at the split point without buffering.
pub struct SplitReader<'a> {
    source: &'a mut dyn Read,
    remaining: usize,
}

impl<'a> SplitReader<'a> {
    pub fn new(source: &'a mut dyn Read, split_at: usize) -> Self {
        Self { source, remaining: split_at }
    }

    /// Bytes still to be yielded before the split point.
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl Read for SplitReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return self.source.read(buf);
        }
        let cap = buf.len().min(self.remaining);
        let n = self.source.read(&mut buf[..cap])?;
        self.remaining -= n;
        Ok(n)
    }
}

/// Replays bytes already taken from `source` ahead of it. The first read
/// carries the head and as much of the source as fits, so the head does not
/// become a segment of its own.
pub(crate) struct HeadFirst<'a> {
    head: &'a [u8],
    source: &'a mut dyn Read,
}

impl<'a> HeadFirst<'a> {
    pub(crate) fn new(head: &'a [u8], source: &'a mut dyn Read) -> Self {
        Self { head, source }
    }
}

impl Read for HeadFirst<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.head.is_empty() {
            return self.source.read(buf);
        }
        let n = self.head.len().min(buf.len());
        buf[..n].copy_from_slice(&self.head[..n]);
        self.head = &self.head[n..];
        if !self.head.is_empty() || n == buf.len() {
            return Ok(n);
        }
        // A source error here resurfaces on the next read.
        match self.source.read(&mut buf[n..]) {
            Ok(m) => Ok(n + m),
            Err(_) => Ok(n),
        }
    }
}
