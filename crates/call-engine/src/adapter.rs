//! AMI event adapter
//!
//! Classifies raw manager events into [`ManagerEvent`]s. This is the only
//! place that knows AMI header names or compares state strings.

use callwatch_ami_core::AmiMessage;
use tracing::trace;

use crate::engine::CallEventHandler;
use crate::events::{
    normalize_number, CallGroupId, ChannelId, ChannelState, DialApplication, DialEvent, HangupEvent,
    ManagerEvent, StateChangeEvent,
};

pub const EVENT_NEW_STATE: &str = "Newstate";
pub const EVENT_NEW_EXTEN: &str = "Newexten";
pub const EVENT_HANGUP: &str = "Hangup";

/// Convert one AMI message, or `None` if it is not a correlated event
/// or lacks its channel id
pub fn classify(message: &AmiMessage) -> Option<ManagerEvent> {
    if message.is_event(EVENT_NEW_STATE) {
        Some(ManagerEvent::StateChange(StateChangeEvent {
            channel_id: channel_id(message)?,
            state: channel_state(message),
            callee: normalize_number(message.get("CallerIDNum")),
            caller: normalize_number(message.get("ConnectedLineNum")),
        }))
    } else if message.is_event(EVENT_NEW_EXTEN) {
        Some(ManagerEvent::Dial(DialEvent {
            channel_id: channel_id(message),
            group_id: message.get_non_empty("Linkedid").map(|id| CallGroupId::new(id.trim())),
            application: DialApplication::from_name(message.get("Application").unwrap_or("")),
            callee: normalize_number(message.get("CallerIDNum")),
            caller: normalize_number(message.get("ConnectedLineNum")),
            state: channel_state(message),
        }))
    } else if message.is_event(EVENT_HANGUP) {
        Some(ManagerEvent::Hangup(HangupEvent {
            channel_id: channel_id(message)?,
        }))
    } else {
        None
    }
}

/// Feed a raw message through `handler`. Returns whether it was consumed.
pub fn dispatch(handler: &dyn CallEventHandler, message: &AmiMessage) -> bool {
    match classify(message) {
        Some(event) => {
            handler.on_event(event);
            true
        }
        None => {
            trace!("Skipping AMI message {}", message);
            false
        }
    }
}

fn channel_id(message: &AmiMessage) -> Option<ChannelId> {
    message.get_non_empty("Uniqueid").map(|id| ChannelId::new(id.trim()))
}

fn channel_state(message: &AmiMessage) -> ChannelState {
    ChannelState::from_description(message.get("ChannelStateDesc").unwrap_or(""))
}
