//! Extension status from `sip show peers` / `core show channels` output

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::numbers::InternalNumbers;

/// Registration state of a SIP peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerRegistration {
    /// Registered and qualifying `OK`
    Available,
    Unreachable,
    /// Listed, but neither OK nor unreachable
    NotRegistered,
    /// No peer line for the extension
    NotFound,
}

impl fmt::Display for PeerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PeerRegistration::Available => "registered (available)",
            PeerRegistration::Unreachable => "unreachable",
            PeerRegistration::NotRegistered => "not registered",
            PeerRegistration::NotFound => "not found",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtensionStatus {
    pub registration: PeerRegistration,
    pub in_call: bool,
}

impl fmt::Display for ExtensionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.registration)?;
        if self.in_call {
            write!(f, " + in call")?;
        }
        Ok(())
    }
}

/// Status of every internal number, keyed by extension
pub fn extension_states(
    numbers: &InternalNumbers,
    peer_lines: &[String],
    channel_lines: &[String],
) -> BTreeMap<String, ExtensionStatus> {
    numbers
        .sorted()
        .into_iter()
        .map(|ext| {
            let status = ExtensionStatus {
                registration: registration(ext, peer_lines),
                in_call: in_call(ext, channel_lines),
            };
            (ext.to_string(), status)
        })
        .collect()
}

fn registration(ext: &str, peer_lines: &[String]) -> PeerRegistration {
    let prefix = format!("{}/", ext);
    match peer_lines.iter().find(|line| line.starts_with(&prefix)) {
        None => PeerRegistration::NotFound,
        Some(line) if line.contains("UNREACHABLE") => PeerRegistration::Unreachable,
        Some(line) if line.contains("OK") => PeerRegistration::Available,
        Some(_) => PeerRegistration::NotRegistered,
    }
}

/// A channel line mentions `SIP/<ext>` as a whole extension (`SIP/100-...`,
/// not `SIP/1000-...`)
fn in_call(ext: &str, channel_lines: &[String]) -> bool {
    let needle = format!("SIP/{}", ext);
    channel_lines.iter().any(|line| {
        line.match_indices(&needle).any(|(pos, _)| {
            line[pos + needle.len()..]
                .chars()
                .next()
                .map_or(true, |c| !c.is_ascii_alphanumeric())
        })
    })
}
