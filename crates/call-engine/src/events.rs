//! Typed call events
//!
//! Raw manager events are classified into these types once, at the adapter
//! boundary. The correlation core only ever sees the closed sets below.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-leg channel identifier (the manager's `Uniqueid`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId(pub String);

/// Identifier shared by every leg of one logical call (the manager's `Linkedid`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CallGroupId(pub String);

impl ChannelId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl CallGroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for CallGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Asterisk channel states, as reported in `ChannelStateDesc`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelState {
    Down,
    Reserved,
    OffHook,
    Dialing,
    Ring,
    Ringing,
    Up,
    Busy,
    DialingOffHook,
    PreRing,
    Unknown,
}

impl ChannelState {
    /// Classify a state description, ignoring case and surrounding blanks
    pub fn from_description(desc: &str) -> Self {
        match desc.trim().to_ascii_lowercase().as_str() {
            "down" => ChannelState::Down,
            "rsrvd" | "reserved" => ChannelState::Reserved,
            "offhook" => ChannelState::OffHook,
            "dialing" => ChannelState::Dialing,
            "ring" => ChannelState::Ring,
            "ringing" => ChannelState::Ringing,
            "up" => ChannelState::Up,
            "busy" => ChannelState::Busy,
            "dialing offhook" => ChannelState::DialingOffHook,
            "pre-ring" | "prering" => ChannelState::PreRing,
            _ => ChannelState::Unknown,
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChannelState::Down => "Down",
            ChannelState::Reserved => "Rsrvd",
            ChannelState::OffHook => "OffHook",
            ChannelState::Dialing => "Dialing",
            ChannelState::Ring => "Ring",
            ChannelState::Ringing => "Ringing",
            ChannelState::Up => "Up",
            ChannelState::Busy => "Busy",
            ChannelState::DialingOffHook => "Dialing Offhook",
            ChannelState::PreRing => "Pre-ring",
            ChannelState::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Dialplan application reported by a dial-stage event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DialApplication {
    /// Queue / ring-group member dial stage
    AppDial,
    Other,
}

impl DialApplication {
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("appdial") {
            DialApplication::AppDial
        } else {
            DialApplication::Other
        }
    }
}

/// Normalize a phone number field; blanks and `<unknown>` mean absent
pub fn normalize_number(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("<unknown>") {
        return None;
    }
    Some(value.to_string())
}

/// A channel changed state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChangeEvent {
    pub channel_id: ChannelId,
    pub state: ChannelState,
    /// The channel's own number (`CallerIDNum`), the callee for this leg
    pub callee: Option<String>,
    /// The connected party (`ConnectedLineNum`), the caller for this leg
    pub caller: Option<String>,
}

/// A channel entered a dialplan application
///
/// This is the authoritative source of the channel → call-group mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialEvent {
    pub channel_id: Option<ChannelId>,
    pub group_id: Option<CallGroupId>,
    pub application: DialApplication,
    pub callee: Option<String>,
    pub caller: Option<String>,
    pub state: ChannelState,
}

/// A channel hung up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HangupEvent {
    pub channel_id: ChannelId,
}

/// One of the three events the engine consumes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    StateChange(StateChangeEvent),
    Dial(DialEvent),
    Hangup(HangupEvent),
}
