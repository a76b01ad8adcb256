//! Bounded read-ahead window over a byte source.
//!
//! The window never holds more than its configured size plus the largest
//! request outstanding, so memory stays flat however long the dump is.

use std::io::{self, Read};

/// Minimum usable window size.
pub const MIN_WINDOW_SIZE: usize = 16;

/// Default window size.
pub const DEFAULT_WINDOW_SIZE: usize = 64 * 1024;

/// Sliding window over a [`Read`] source.
#[derive(Debug)]
pub struct ByteWindow<R> {
    reader: R,
    buffer: Vec<u8>,
    /// Index of the cursor within `buffer`.
    start: usize,
    /// Absolute stream offset of the cursor.
    position: u64,
    window_size: usize,
    eof: bool,
}

impl<R: Read> ByteWindow<R> {
    pub fn new(reader: R, window_size: usize) -> Self {
        let window_size = window_size.max(MIN_WINDOW_SIZE);
        Self {
            reader,
            buffer: Vec::with_capacity(window_size),
            start: 0,
            position: 0,
            window_size,
            eof: false,
        }
    }

    /// Absolute stream offset of the cursor.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Bytes buffered ahead of the cursor.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer[self.start..]
    }

    pub fn available(&self) -> usize {
        self.buffer.len() - self.start
    }

    /// Whether the source is exhausted and nothing remains buffered.
    pub fn is_exhausted(&self) -> bool {
        self.eof && self.available() == 0
    }

    /// Buffer at least `len` bytes ahead of the cursor.
    ///
    /// Returns the number of bytes available, which is less than `len` only
    /// once the source is exhausted.
    pub fn fill(&mut self, len: usize) -> io::Result<usize> {
        while self.available() < len && !self.eof {
            self.compact();
            let want = self.window_size.max(len - self.available());
            let filled = self.buffer.len();
            self.buffer.resize(filled + want, 0);
            let read = loop {
                match self.reader.read(&mut self.buffer[filled..]) {
                    Ok(n) => break Ok(n),
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => break Err(e),
                }
            };
            match read {
                Ok(n) => {
                    self.buffer.truncate(filled + n);
                    if n == 0 {
                        self.eof = true;
                    }
                }
                Err(e) => {
                    self.buffer.truncate(filled);
                    return Err(e);
                }
            }
        }
        Ok(self.available())
    }

    /// Buffered bytes `[cursor, cursor + len)`, if that many are buffered.
    pub fn peek(&self, len: usize) -> Option<&[u8]> {
        self.buffered().get(..len)
    }

    /// Move the cursor forward by up to `n` buffered bytes.
    pub fn advance(&mut self, n: usize) {
        let n = n.min(self.available());
        self.start += n;
        self.position += n as u64;
    }

    fn compact(&mut self) {
        if self.start > 0 {
            self.buffer.drain(..self.start);
            self.start = 0;
        }
    }
}
