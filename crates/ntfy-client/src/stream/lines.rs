//! Line framing for the SSE body.

use crate::NtfyError;

const DATA_PREFIX: &str = "data: ";
const COMMENT_PREFIX: char = ':';

/// Longest line accepted before the stream is treated as broken.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Accumulates body chunks and yields complete lines.
///
/// Chunks may split a line (or a multi-byte character) anywhere; bytes are
/// kept until the terminating `\n` arrives. A trailing `\r` is stripped.
/// Bytes already searched for `\n` are not searched again.
#[derive(Debug)]
pub struct LineBuffer {
    buffer: Vec<u8>,
    scanned: usize,
    max_line: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line,
        }
    }

    /// Feed a chunk and return every line it completed.
    ///
    /// Fails once a line, complete or not, grows past the limit.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<String>, NtfyError> {
        self.buffer.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(pos) = self.buffer[from..].iter().position(|&b| b == b'\n') {
            let end = from + pos;
            self.check_len(end - start)?;
            lines.push(decode_line(&self.buffer[start..end]));
            start = end + 1;
            from = start;
        }
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
        self.check_len(self.buffer.len())?;
        Ok(lines)
    }

    fn check_len(&self, len: usize) -> Result<(), NtfyError> {
        if len > self.max_line {
            return Err(NtfyError::LineTooLong(self.max_line));
        }
        Ok(())
    }

    /// Remaining unterminated bytes, if any, as a final line.
    pub fn finish(&mut self) -> Option<String> {
        self.scanned = 0;
        if self.buffer.is_empty() {
            return None;
        }
        let line = decode_line(&self.buffer);
        self.buffer.clear();
        Some(line)
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Shape of one protocol line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    Blank,
    Comment,
    Data(&'a str),
    Other,
}

impl<'a> Line<'a> {
    pub fn classify(line: &'a str) -> Self {
        if line.is_empty() {
            Line::Blank
        } else if line.starts_with(COMMENT_PREFIX) {
            Line::Comment
        } else if let Some(payload) = line.strip_prefix(DATA_PREFIX) {
            Line::Data(payload)
        } else {
            Line::Other
        }
    }
}
