//! Stream framing for AMI
//!
//! The manager writes a one-line greeting on connect and then blank-line
//! separated blocks. [`AmiFrameDecoder`] turns an arbitrary byte stream into
//! [`Frame`]s.

use bytes::{Buf, BytesMut};

use crate::error::{Error, Result};
use crate::message::AmiMessage;

/// Upper bound for a single buffered block
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

const GREETING_PREFIX: &str = "Asterisk Call Manager";

/// A decoded unit from the stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `Asterisk Call Manager/<version>` banner
    Greeting(String),
    Message(AmiMessage),
}

/// Incremental frame decoder
#[derive(Debug, Default)]
pub struct AmiFrameDecoder {
    buffer: BytesMut,
    greeted: bool,
}

impl AmiFrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes read from the socket
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Bytes held but not yet decoded
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Pop the next complete frame, if one is buffered
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if !self.greeted {
                let Some(end) = find(&self.buffer, b"\n") else {
                    return self.check_size();
                };
                let line = String::from_utf8_lossy(&self.buffer[..end]).trim().to_string();
                if line.starts_with(GREETING_PREFIX) {
                    self.buffer.advance(end + 1);
                    self.greeted = true;
                    let version = line
                        .split_once('/')
                        .map(|(_, v)| v.to_string())
                        .unwrap_or_default();
                    return Ok(Some(Frame::Greeting(version)));
                }
                // No banner, go straight to blocks
                self.greeted = true;
            }

            // Skip stray line endings between blocks
            while self.buffer.first().is_some_and(|b| *b == b'\r' || *b == b'\n') {
                self.buffer.advance(1);
            }

            let Some((end, sep_len)) = block_end(&self.buffer) else {
                return self.check_size();
            };

            let block = self.buffer.split_to(end + sep_len);
            let text = String::from_utf8_lossy(&block[..end]);
            if text.trim().is_empty() {
                continue;
            }
            return AmiMessage::parse(&text).map(|m| Some(Frame::Message(m)));
        }
    }

    fn check_size(&self) -> Result<Option<Frame>> {
        if self.buffer.len() > MAX_FRAME_SIZE {
            return Err(Error::protocol(format!(
                "AMI frame exceeds {} bytes without terminator",
                MAX_FRAME_SIZE
            )));
        }
        Ok(None)
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Position of the blank line ending the first block and its length
fn block_end(buf: &[u8]) -> Option<(usize, usize)> {
    let crlf = find(buf, b"\r\n\r\n").map(|p| (p, 4));
    let lf = find(buf, b"\n\n").map(|p| (p, 2));
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_then_event() {
        let mut decoder = AmiFrameDecoder::new();
        decoder.extend(b"Asterisk Call Manager/5.0.1\r\n");
        decoder.extend(b"Event: FullyBooted\r\nStatus: Fully Booted\r\n\r\n");

        assert_eq!(
            decoder.next_frame().unwrap(),
            Some(Frame::Greeting("5.0.1".to_string()))
        );
        match decoder.next_frame().unwrap() {
            Some(Frame::Message(msg)) => assert!(msg.is_event("FullyBooted")),
            other => panic!("unexpected frame: {:?}", other),
        }
        assert_eq!(decoder.next_frame().unwrap(), None);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_partial_reads() {
        let mut decoder = AmiFrameDecoder::new();
        decoder.extend(b"Asterisk Call Manager/2.10.4\r\nEvent: Hangup\r\nUniq");
        assert!(matches!(decoder.next_frame().unwrap(), Some(Frame::Greeting(_))));
        assert_eq!(decoder.next_frame().unwrap(), None);

        decoder.extend(b"ueid: 1.1\r\n\r\nEvent: Newstate\r\n");
        match decoder.next_frame().unwrap() {
            Some(Frame::Message(msg)) => assert_eq!(msg.get("Uniqueid"), Some("1.1")),
            other => panic!("unexpected frame: {:?}", other),
        }
        assert_eq!(decoder.next_frame().unwrap(), None);

        decoder.extend(b"\r\n");
        assert!(matches!(decoder.next_frame().unwrap(), Some(Frame::Message(_))));
    }

    #[test]
    fn test_no_greeting_and_bare_newlines() {
        let mut decoder = AmiFrameDecoder::new();
        decoder.extend(b"Response: Success\nActionID: 1\n\nResponse: Goodbye\nActionID: 2\n\n");

        let mut ids = Vec::new();
        while let Some(frame) = decoder.next_frame().unwrap() {
            if let Frame::Message(msg) = frame {
                ids.push(msg.action_id().unwrap().to_string());
            }
        }
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_oversized_frame() {
        let mut decoder = AmiFrameDecoder::new();
        decoder.extend(b"Asterisk Call Manager/5.0\r\n");
        decoder.next_frame().unwrap();
        decoder.extend(&vec![b'a'; MAX_FRAME_SIZE + 1]);
        assert!(decoder.next_frame().is_err());
    }
}
