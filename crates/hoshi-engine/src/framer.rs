//! Reassembly of raw stream chunks into text lines.
//!
//! Pipes deliver output in arbitrary pieces: a single read may end in the
//! middle of a line or even in the middle of a multi-byte character. The
//! framer buffers bytes until a newline arrives and only then decodes them.

/// Accumulates partial output until a newline completes a line.
#[derive(Debug, Default)]
pub struct LineFramer {
    pending: Vec<u8>,
}

impl LineFramer {
    /// Creates an empty framer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk and returns every line it completes.
    ///
    /// Both `\n` and `\r\n` terminators are stripped. Invalid UTF-8 is
    /// replaced rather than rejected.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' {
                let mut line = std::mem::take(&mut self.pending);
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                lines.push(String::from_utf8_lossy(&line).into_owned());
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    /// Returns the trailing unterminated line once the stream has closed.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&line).into_owned())
    }

    /// Whether a partial line is waiting for its terminator.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn joins_lines_split_across_chunks() {
        let mut framer = LineFramer::new();

        assert_eq!(framer.push(b"=0\n=1"), vec!["=0"]);
        assert!(framer.has_pending());
        let lines = framer.push(b"2\ninfo move D4\n");

        assert_eq!(lines, vec!["=12", "info move D4"]);
        assert!(!framer.has_pending());
    }

    #[rstest]
    fn strips_carriage_returns() {
        let mut framer = LineFramer::new();

        let lines = framer.push(b"GTP ready\r\n\r\n");

        assert_eq!(lines, vec!["GTP ready", ""]);
    }

    #[rstest]
    fn buffers_multibyte_characters_split_between_reads() {
        let mut framer = LineFramer::new();
        let text = "置石\n".as_bytes();
        let (head, tail) = text.split_at(2);

        assert!(framer.push(head).is_empty());
        assert_eq!(framer.push(tail), vec!["置石"]);
    }

    #[rstest]
    fn finish_returns_unterminated_tail() {
        let mut framer = LineFramer::new();
        framer.push(b"=3\npartial");

        assert_eq!(framer.finish().as_deref(), Some("partial"));
        assert_eq!(framer.finish(), None);
    }
}
