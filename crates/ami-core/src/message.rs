//! AMI message blocks
//!
//! An AMI message is a sequence of `Key: Value` lines terminated by an empty
//! line. Keys are case-insensitive. Command output arrives either as bare
//! lines after `Response: Follows` (older Asterisk) or as repeated `Output:`
//! headers (Asterisk 13+); both end up in [`AmiMessage::output`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Marker closing legacy command output
const END_COMMAND: &str = "--END COMMAND--";

/// What kind of block a message is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// Unsolicited event, carrying the event name
    Event(String),
    /// Response to an action, carrying the response status
    Response(String),
    /// Neither `Event` nor `Response` header present
    Unknown,
}

/// A single AMI message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmiMessage {
    headers: Vec<(String, String)>,
    output: Vec<String>,
}

impl AmiMessage {
    /// Create an empty message
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder style header append
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push_header(key, value);
        self
    }

    /// Append a header, keeping earlier ones with the same key
    pub fn push_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.push((key.into(), value.into()));
    }

    /// First value for `key`, compared case-insensitively
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Like [`get`](Self::get) but treats an empty value as absent
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.trim().is_empty())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Command output lines
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// The `ActionID` header, if any
    pub fn action_id(&self) -> Option<&str> {
        self.get("ActionID")
    }

    pub fn kind(&self) -> MessageKind {
        if let Some(event) = self.get("Event") {
            MessageKind::Event(event.to_string())
        } else if let Some(response) = self.get("Response") {
            MessageKind::Response(response.to_string())
        } else {
            MessageKind::Unknown
        }
    }

    /// True if this is an event named `name` (case-insensitive)
    pub fn is_event(&self, name: &str) -> bool {
        matches!(self.kind(), MessageKind::Event(ref e) if e.eq_ignore_ascii_case(name))
    }

    /// Parse one block of text (without the terminating blank line)
    pub fn parse(block: &str) -> Result<Self> {
        let mut message = AmiMessage::new();

        for raw_line in block.lines() {
            let line = raw_line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            if line == END_COMMAND {
                continue;
            }

            match split_header(line) {
                Some((key, value)) if key.eq_ignore_ascii_case("Output") => {
                    message.output.push(value.to_string());
                }
                Some((key, value)) if message.output.is_empty() || !is_follows(&message) => {
                    message.push_header(key, value);
                }
                _ => {
                    // Legacy command output can contain anything, colons included
                    if is_follows(&message) {
                        message.output.push(strip_end_marker(line).to_string());
                    } else {
                        return Err(Error::protocol(format!("Malformed AMI line: {:?}", line)));
                    }
                }
            }
        }

        if message.headers.is_empty() {
            return Err(Error::protocol("Empty AMI message"));
        }

        message.output.retain(|l| !l.is_empty());
        Ok(message)
    }

    /// Serialize for the wire, including the terminating blank line
    pub fn to_wire(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.headers {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out
    }
}

impl fmt::Display for AmiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            MessageKind::Event(name) => write!(f, "Event({})", name)?,
            MessageKind::Response(status) => write!(f, "Response({})", status)?,
            MessageKind::Unknown => write!(f, "Message")?,
        }
        if let Some(id) = self.action_id() {
            write!(f, " [{}]", id)?;
        }
        Ok(())
    }
}

fn is_follows(message: &AmiMessage) -> bool {
    message
        .get("Response")
        .map(|r| r.eq_ignore_ascii_case("Follows"))
        .unwrap_or(false)
}

fn strip_end_marker(line: &str) -> &str {
    line.strip_suffix(END_COMMAND).unwrap_or(line).trim_end()
}

fn split_header(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }
    Some((key, value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_block() {
        let block = "Event: Newstate\r\nPrivilege: call,all\r\nChannel: SIP/100-0000001\r\n\
                     ChannelStateDesc: Ringing\r\nUniqueid: 1700000000.12\r\n";
        let msg = AmiMessage::parse(block).unwrap();

        assert_eq!(msg.kind(), MessageKind::Event("Newstate".to_string()));
        assert!(msg.is_event("newstate"));
        assert_eq!(msg.get("uniqueid"), Some("1700000000.12"));
        assert_eq!(msg.get("CHANNELSTATEDESC"), Some("Ringing"));
        assert_eq!(msg.headers().len(), 5);
    }

    #[test]
    fn test_first_header_wins() {
        let msg = AmiMessage::parse("Event: Test\nVariable: a\nVariable: b\n").unwrap();
        assert_eq!(msg.get("Variable"), Some("a"));
    }

    #[test]
    fn test_empty_values() {
        let msg = AmiMessage::parse("Event: Newexten\r\nLinkedid: \r\n").unwrap();
        assert_eq!(msg.get("Linkedid"), Some(""));
        assert_eq!(msg.get_non_empty("Linkedid"), None);
    }

    #[test]
    fn test_output_headers() {
        let block = "Response: Success\r\nActionID: 42\r\n\
                     Message: Command output follows\r\n\
                     Output: Name/username  Host  Status\r\n\
                     Output: 100/100  10.0.0.5  OK (12 ms)\r\n";
        let msg = AmiMessage::parse(block).unwrap();

        assert_eq!(msg.kind(), MessageKind::Response("Success".to_string()));
        assert_eq!(msg.action_id(), Some("42"));
        assert_eq!(msg.output().len(), 2);
        assert_eq!(msg.output()[1], "100/100  10.0.0.5  OK (12 ms)");
    }

    #[test]
    fn test_legacy_follows_output() {
        let block = "Response: Follows\r\nPrivilege: Command\r\nActionID: 7\r\n\
                     Channel              Location\r\nSIP/100-00000001     s@from-internal:1\r\n\
                     1 active channel\r\n--END COMMAND--\r\n";
        let msg = AmiMessage::parse(block).unwrap();

        assert_eq!(msg.action_id(), Some("7"));
        assert_eq!(msg.output().len(), 3);
        assert!(msg.output()[1].starts_with("SIP/100-00000001"));
    }

    #[test]
    fn test_malformed_line_rejected() {
        let err = AmiMessage::parse("Event: Test\r\nthis is not a header\r\n").unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert!(AmiMessage::parse("\r\n").is_err());
    }

    #[test]
    fn test_to_wire() {
        let msg = AmiMessage::new()
            .with_header("Action", "Ping")
            .with_header("ActionID", "1");
        assert_eq!(msg.to_wire(), "Action: Ping\r\nActionID: 1\r\n\r\n");
    }
}
