//! Line framing for the MCU link
//!
//! Bytes arrive in arbitrary chunks. [`LineFramer`] accumulates them and hands
//! out one payload per line feed, keeping whatever follows the last delimiter
//! for the next read. A payload split over many reads comes out once; several
//! payloads in one read come out separately, in order.

use crate::error::{CaptureError, Result};

/// The sole message delimiter
pub const DELIMITER: u8 = b'\n';

/// Per-connection receive buffer
#[derive(Debug, Clone)]
pub struct LineFramer {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already searched for a delimiter
    scanned: usize,
    max_line_bytes: usize,
}

impl LineFramer {
    /// Create a framer that rejects lines longer than `max_line_bytes`
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line_bytes,
        }
    }

    /// Append received bytes
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Take the next complete payload, without its delimiter
    ///
    /// Returns `Ok(None)` when no full line is buffered yet, and
    /// [`CaptureError::LineTooLong`] once the next line, complete or not,
    /// exceeds the limit.
    pub fn next_line(&mut self) -> Result<Option<Vec<u8>>> {
        match self.buffer[self.scanned..]
            .iter()
            .position(|&b| b == DELIMITER)
        {
            Some(offset) => {
                let end = self.scanned + offset;
                if end > self.max_line_bytes {
                    return Err(CaptureError::LineTooLong {
                        limit: self.max_line_bytes,
                    });
                }
                let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
                line.pop();
                self.scanned = 0;
                Ok(Some(line))
            }
            None => {
                self.scanned = self.buffer.len();
                if self.buffer.len() > self.max_line_bytes {
                    return Err(CaptureError::LineTooLong {
                        limit: self.max_line_bytes,
                    });
                }
                Ok(None)
            }
        }
    }

    /// Bytes waiting for a delimiter
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drop any partial line
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
    }
}
