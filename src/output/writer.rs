//! Diagnostic writer
//!
//! Bodies write diagnostic output here; the runner truncates it before each
//! spec or hook and stores what was written in the report.

use parking_lot::Mutex;
use std::io::{self, Write};

/// Buffered diagnostic output shared by the runner and running bodies
pub trait Writer: Send + Sync {
    fn write(&self, bytes: &[u8]);
    fn truncate(&self);
    fn bytes(&self) -> Vec<u8>;

    fn write_str(&self, s: &str) {
        self.write(s.as_bytes());
    }
}

/// In-memory writer, optionally streaming everything to stdout as well
#[derive(Debug, Default)]
pub struct BufferWriter {
    buffer: Mutex<Vec<u8>>,
    stream: bool,
}

impl BufferWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also echo writes to stdout
    pub fn streaming(mut self) -> Self {
        self.stream = true;
        self
    }
}

impl Writer for BufferWriter {
    fn write(&self, bytes: &[u8]) {
        self.buffer.lock().extend_from_slice(bytes);
        if self.stream {
            let mut stdout = io::stdout().lock();
            let _ = stdout.write_all(bytes);
            let _ = stdout.flush();
        }
    }

    fn truncate(&self) {
        self.buffer.lock().clear();
    }

    fn bytes(&self) -> Vec<u8> {
        self.buffer.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_truncate() {
        let writer = BufferWriter::new();
        writer.write_str("hello ");
        writer.write(b"world");
        assert_eq!(writer.bytes(), b"hello world");

        writer.truncate();
        assert!(writer.bytes().is_empty());
    }
}
