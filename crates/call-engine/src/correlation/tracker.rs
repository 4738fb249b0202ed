//! Per-call lifecycle state
//!
//! ```text
//! Unknown ──ringing──▶ Ringing (pending, notified) ──up──▶ Up ──hangup──▶ gone
//!                         │
//!                         └──────────hangup (missed, notified)──────────▶ gone
//! ```

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::events::{CallGroupId, ChannelState, DialApplication};
use crate::numbers::InternalNumbers;
use crate::sink::CallNotification;

/// Lifecycle state of one call group as seen by the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Unknown,
    Ringing,
    Up,
}

/// A call that is ringing and has not been answered or hung up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCall {
    pub caller: String,
    pub callee: String,
}

/// Why an event did not change anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Same state reported again
    DuplicateState,
    /// Dial event for an application other than the ring-group stage
    NotDialStage,
    MissingNumbers,
    /// Both internal or both external
    NotBridgingOutside,
    /// A ring notification was already sent for this call
    AlreadyPending,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IgnoreReason::DuplicateState => "duplicate state",
            IgnoreReason::NotDialStage => "not a dial stage",
            IgnoreReason::MissingNumbers => "missing numbers",
            IgnoreReason::NotBridgingOutside => "not internal/external",
            IgnoreReason::AlreadyPending => "already ringing",
        };
        f.write_str(s)
    }
}

/// Result of feeding one event to the tracker
#[derive(Debug, Clone, PartialEq)]
pub enum TrackOutcome {
    Ignored(IgnoreReason),
    /// A new pending call was created
    RingStarted(CallNotification),
    /// The call answered; any pending record was cleared
    Answered { was_pending: bool },
    /// Recorded, nothing to report
    Unchanged,
}

/// Pending-call bookkeeping keyed by call group
#[derive(Debug, Default)]
pub struct CallTracker {
    last_seen: HashMap<CallGroupId, ChannelState>,
    pending: HashMap<CallGroupId, PendingCall>,
}

impl CallTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a channel state change for a resolved call group
    pub fn on_state_change(
        &mut self,
        numbers: &InternalNumbers,
        group_id: &CallGroupId,
        state: ChannelState,
        caller: Option<&str>,
        callee: Option<&str>,
    ) -> TrackOutcome {
        if self.last_seen.get(group_id) == Some(&state) {
            return TrackOutcome::Ignored(IgnoreReason::DuplicateState);
        }
        self.last_seen.insert(group_id.clone(), state);

        let (Some(caller), Some(callee)) = (caller, callee) else {
            return TrackOutcome::Ignored(IgnoreReason::MissingNumbers);
        };
        if !numbers.bridges_outside(caller, callee) {
            return TrackOutcome::Ignored(IgnoreReason::NotBridgingOutside);
        }

        match state {
            ChannelState::Ringing => self.start_ringing(group_id, caller, callee),
            ChannelState::Up => self.answer(group_id),
            _ => TrackOutcome::Unchanged,
        }
    }

    /// Apply the payload of a dial-stage event for a resolved call group
    pub fn on_dial(
        &mut self,
        numbers: &InternalNumbers,
        group_id: &CallGroupId,
        application: DialApplication,
        state: ChannelState,
        caller: Option<&str>,
        callee: Option<&str>,
    ) -> TrackOutcome {
        if application != DialApplication::AppDial {
            return TrackOutcome::Ignored(IgnoreReason::NotDialStage);
        }
        let (Some(caller), Some(callee)) = (caller, callee) else {
            return TrackOutcome::Ignored(IgnoreReason::MissingNumbers);
        };
        if !numbers.bridges_outside(caller, callee) {
            return TrackOutcome::Ignored(IgnoreReason::NotBridgingOutside);
        }
        if self.pending.contains_key(group_id) {
            return TrackOutcome::Ignored(IgnoreReason::AlreadyPending);
        }

        match state {
            ChannelState::Ringing => self.start_ringing(group_id, caller, callee),
            ChannelState::Up => self.answer(group_id),
            _ => TrackOutcome::Unchanged,
        }
    }

    /// Finalize a call group: forget it, returning the missed notification
    /// if it was still ringing
    pub fn finish(&mut self, group_id: &CallGroupId) -> Option<CallNotification> {
        self.last_seen.remove(group_id);
        self.pending
            .remove(group_id)
            .map(|call| CallNotification::missed(call.caller, call.callee))
    }

    pub fn is_pending(&self, group_id: &CallGroupId) -> bool {
        self.pending.contains_key(group_id)
    }

    pub fn pending_call(&self, group_id: &CallGroupId) -> Option<&PendingCall> {
        self.pending.get(group_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of call groups with a recorded state
    pub fn tracked_count(&self) -> usize {
        self.last_seen.len()
    }

    pub fn call_state(&self, group_id: &CallGroupId) -> CallState {
        if self.pending.contains_key(group_id) {
            return CallState::Ringing;
        }
        match self.last_seen.get(group_id) {
            Some(ChannelState::Up) => CallState::Up,
            _ => CallState::Unknown,
        }
    }

    fn start_ringing(
        &mut self,
        group_id: &CallGroupId,
        caller: &str,
        callee: &str,
    ) -> TrackOutcome {
        if self.pending.contains_key(group_id) {
            return TrackOutcome::Ignored(IgnoreReason::AlreadyPending);
        }
        debug!("Call {} ringing: {} -> {}", group_id, caller, callee);
        self.pending.insert(
            group_id.clone(),
            PendingCall {
                caller: caller.to_string(),
                callee: callee.to_string(),
            },
        );
        TrackOutcome::RingStarted(CallNotification::ringing(caller, callee))
    }

    fn answer(&mut self, group_id: &CallGroupId) -> TrackOutcome {
        // Dial-stage answers bypass the state-change path
        self.last_seen.insert(group_id.clone(), ChannelState::Up);
        let was_pending = self.pending.remove(group_id).is_some();
        if was_pending {
            debug!("Call {} answered", group_id);
        }
        TrackOutcome::Answered { was_pending }
    }
}
