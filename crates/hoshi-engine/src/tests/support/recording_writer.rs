//! Writers standing in for an engine's standard input.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Records every byte written; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct RecordingWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl RecordingWriter {
    /// Complete lines written so far.
    pub fn lines(&self) -> Vec<String> {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer)
            .lines()
            .map(str::to_owned)
            .collect()
    }

    /// Lines with their leading command id removed.
    pub fn commands(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .map(|line| match line.split_once(' ') {
                Some((_, command)) => command.to_owned(),
                None => line,
            })
            .collect()
    }
}

impl Write for RecordingWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        buffer.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Rejects every write, as a closed pipe would.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingWriter;

impl Write for FailingWriter {
    fn write(&mut self, _data: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
