//! Line framing for the request byte stream.
//!
//! Lines end at `\r` or `\n`; empty lines are skipped. Partial lines are kept
//! across reads, so a request split between two reads is reassembled.

/// Size of each socket read.
pub const READ_BUFFER_SIZE: usize = 4096;

/// Longest accepted request line, terminator excluded.
pub const MAX_LINE_LEN: usize = 4096;

/// Output of the framer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Line(String),
    /// A line exceeded [`MAX_LINE_LEN`]; its bytes up to the next terminator
    /// are discarded.
    TooLong,
}

#[derive(Debug, Default)]
pub struct LineFramer {
    pending: Vec<u8>,
    discarding: bool,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and collect the frames it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();

        for &byte in chunk {
            if byte == b'\r' || byte == b'\n' {
                if self.discarding {
                    self.discarding = false;
                } else if let Some(frame) = self.take_line() {
                    frames.push(frame);
                }
            } else if !self.discarding {
                self.pending.push(byte);
                if self.pending.len() > MAX_LINE_LEN {
                    self.pending.clear();
                    self.discarding = true;
                    frames.push(Frame::TooLong);
                }
            }
        }

        frames
    }

    /// Flush an unterminated trailing line once the peer stops sending.
    pub fn finish(&mut self) -> Option<Frame> {
        self.discarding = false;
        self.take_line()
    }

    fn take_line(&mut self) -> Option<Frame> {
        if self.pending.is_empty() {
            return None;
        }
        let line = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(Frame::Line(line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(s: &str) -> Frame {
        Frame::Line(s.to_string())
    }

    #[test]
    fn splits_on_cr_and_lf() {
        let mut framer = LineFramer::new();
        let frames = framer.push(b"PING\r\nHEALTH\nVERSION\r");
        assert_eq!(frames, vec![line("PING"), line("HEALTH"), line("VERSION")]);
    }

    #[test]
    fn skips_empty_lines() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push(b"\n\r\n\nPING\n\n"), vec![line("PING")]);
    }

    #[test]
    fn reassembles_lines_across_reads() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"VM.CREATE name=w").is_empty());
        assert!(framer.push(b"eb mem=").is_empty());
        assert_eq!(
            framer.push(b"256\nPI"),
            vec![line("VM.CREATE name=web mem=256")]
        );
        assert_eq!(framer.push(b"NG\n"), vec![line("PING")]);
    }

    #[test]
    fn oversized_line_is_reported_once_and_dropped() {
        let mut framer = LineFramer::new();
        let big = vec![b'a'; MAX_LINE_LEN + 10];

        assert_eq!(framer.push(&big), vec![Frame::TooLong]);
        assert!(framer.push(&big).is_empty());
        assert_eq!(framer.push(b"tail\nPING\n"), vec![line("PING")]);
    }

    #[test]
    fn finish_flushes_trailing_line() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"PING").is_empty());
        assert_eq!(framer.finish(), Some(line("PING")));
        assert_eq!(framer.finish(), None);
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let mut framer = LineFramer::new();
        assert_eq!(
            framer.push(b"ECHO \xff\n"),
            vec![line("ECHO \u{fffd}")]
        );
    }
}
