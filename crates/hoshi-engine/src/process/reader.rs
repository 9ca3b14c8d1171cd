//! Threads draining the engine's output streams.

use std::io::{self, Read};
use std::thread::{self, JoinHandle};

use tracing::trace;

use crate::framer::LineFramer;
use crate::logging::PROCESS_TARGET;

const READ_CHUNK: usize = 4096;

/// Which output stream a reader drains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl OutputStream {
    /// Stream name used in logs and failures.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// How a reader finished.
#[derive(Debug)]
pub enum ReaderEnd {
    /// The stream reached end of file.
    Closed,
    /// Reading failed.
    Failed(io::Error),
}

/// Spawns a thread that frames `source` into lines.
///
/// `on_line` receives every complete line, including an unterminated final
/// one; `on_end` runs once when the stream closes or fails.
///
/// # Errors
///
/// Returns the I/O error raised when the thread cannot be spawned.
pub fn spawn_reader<R, L, E>(
    stream: OutputStream,
    mut source: R,
    mut on_line: L,
    on_end: E,
) -> io::Result<JoinHandle<()>>
where
    R: Read + Send + 'static,
    L: FnMut(&str) + Send + 'static,
    E: FnOnce(ReaderEnd) + Send + 'static,
{
    thread::Builder::new()
        .name(format!("hoshi-{}", stream.name()))
        .spawn(move || {
            let mut framer = LineFramer::new();
            let mut chunk = [0_u8; READ_CHUNK];
            let end = loop {
                match source.read(&mut chunk) {
                    Ok(0) => break ReaderEnd::Closed,
                    Ok(read) => {
                        for line in framer.push(chunk.get(..read).unwrap_or_default()) {
                            on_line(&line);
                        }
                    }
                    Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                    Err(error) => break ReaderEnd::Failed(error),
                }
            };
            if let Some(line) = framer.finish() {
                on_line(&line);
            }
            trace!(target: PROCESS_TARGET, stream = stream.name(), ?end, "reader finished");
            on_end(end);
        })
}
