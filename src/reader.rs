//! Buffered line reader with bounded look-ahead
//!
//! The parser consumes its input one line at a time, but Python-style
//! multiline values need to look at upcoming lines before deciding whether
//! they belong to the current value. [`LineReader`] keeps a growable buffer
//! in front of the source, allows peeking at up to `capacity` bytes without
//! consuming them, and discarding exactly the bytes that were accepted.

use std::io::{self, Read};

/// Byte-order marks recognised at the start of a source
///
/// Only the marker bytes are skipped. The content that follows is not
/// decoded, so UTF-16 input is passed through byte for byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrderMark {
    /// `EF BB BF`
    Utf8,
    /// `FF FE`
    Utf16Le,
    /// `FE FF`
    Utf16Be,
}

impl ByteOrderMark {
    /// Detects a byte-order mark at the start of `bytes`
    ///
    /// A two-byte UTF-8 prefix without the third byte is not a match.
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0xFE, 0xFF, ..] => Some(ByteOrderMark::Utf16Be),
            [0xFF, 0xFE, ..] => Some(ByteOrderMark::Utf16Le),
            [0xEF, 0xBB, 0xBF, ..] => Some(ByteOrderMark::Utf8),
            _ => None,
        }
    }

    /// Number of marker bytes
    pub fn size(self) -> usize {
        match self {
            ByteOrderMark::Utf8 => 3,
            ByteOrderMark::Utf16Le | ByteOrderMark::Utf16Be => 2,
        }
    }
}

/// Forward-only reader returning raw lines and supporting bounded peeks
pub(crate) struct LineReader<R> {
    inner: R,
    buf: Vec<u8>,
    pos: usize,
    capacity: usize,
    exhausted: bool,
}

impl<R: Read> LineReader<R> {
    pub(crate) fn with_capacity(capacity: usize, inner: R) -> Self {
        Self {
            inner,
            buf: Vec::with_capacity(capacity),
            pos: 0,
            capacity: capacity.max(1),
            exhausted: false,
        }
    }

    /// Maximum number of bytes a single peek can return
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    fn available(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Reads one more chunk from the source, compacting consumed bytes first
    fn fill(&mut self) -> io::Result<usize> {
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.pos = 0;
        }

        let start = self.buf.len();
        self.buf.resize(start + self.capacity, 0);
        loop {
            match self.inner.read(&mut self.buf[start..]) {
                Ok(n) => {
                    self.buf.truncate(start + n);
                    if n == 0 {
                        self.exhausted = true;
                    }
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buf.truncate(start);
                    return Err(e);
                }
            }
        }
    }

    /// Returns up to `n` upcoming bytes without consuming them
    ///
    /// `n` is capped at the reader capacity; fewer bytes are returned when
    /// the source ends first.
    pub(crate) fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        let n = n.min(self.capacity);
        while self.available() < n && !self.exhausted {
            self.fill()?;
        }
        let end = self.pos + n.min(self.available());
        Ok(&self.buf[self.pos..end])
    }

    /// Discards `n` buffered bytes
    pub(crate) fn consume(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.buf.len());
    }

    /// Reads through the next line break
    ///
    /// Returns the line including its `\n`, and `true` when the source ended
    /// before a line break was found. In that case the line may be empty.
    pub(crate) fn read_line(&mut self) -> io::Result<(Vec<u8>, bool)> {
        let mut scanned = 0;
        loop {
            let start = self.pos + scanned;
            if let Some(i) = self.buf[start..].iter().position(|&b| b == b'\n') {
                let end = start + i + 1;
                let line = self.buf[self.pos..end].to_vec();
                self.pos = end;
                return Ok((line, false));
            }

            scanned = self.available();
            if self.exhausted {
                let line = self.buf[self.pos..].to_vec();
                self.pos = self.buf.len();
                return Ok((line, true));
            }
            self.fill()?;
        }
    }

    /// Skips a leading byte-order mark, if any
    pub(crate) fn skip_bom(&mut self) -> io::Result<Option<ByteOrderMark>> {
        let head = self.peek(3)?;
        let bom = ByteOrderMark::detect(head);
        if let Some(bom) = bom {
            self.consume(bom.size());
        }
        Ok(bom)
    }
}
