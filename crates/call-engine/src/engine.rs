//! The correlation engine
//!
//! Consumes state-change, dial-stage and hangup events for many concurrent
//! calls and turns them into "ringing" and "missed" notifications for calls
//! between an internal extension and an outside party.
//!
//! All mutable state lives behind one mutex. Notifications are collected
//! while the lock is held and handed to the sink after it is released, so a
//! sink may safely call back into the engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::CorrelationConfig;
use crate::correlation::{
    CallState, CallTracker, EarlyEventBuffer, EarlyTake, HangupGuard, IdentifierResolver,
    IgnoreReason, PendingCall, TrackOutcome,
};
use crate::events::{CallGroupId, DialEvent, HangupEvent, ManagerEvent, StateChangeEvent};
use crate::numbers::InternalNumbers;
use crate::sink::{CallNotification, NotificationSink};

/// Receiver of the three event kinds, implemented by the engine and driven
/// by the event-source adapter
pub trait CallEventHandler: Send + Sync {
    fn on_state_change(&self, event: StateChangeEvent);

    fn on_dial(&self, event: DialEvent);

    fn on_hangup(&self, event: HangupEvent);

    fn on_event(&self, event: ManagerEvent) {
        match event {
            ManagerEvent::StateChange(e) => self.on_state_change(e),
            ManagerEvent::Dial(e) => self.on_dial(e),
            ManagerEvent::Hangup(e) => self.on_hangup(e),
        }
    }
}

struct CorrelationState {
    resolver: IdentifierResolver,
    early_events: EarlyEventBuffer,
    tracker: CallTracker,
    guard: HangupGuard,
}

#[derive(Default)]
struct Counters {
    ring_notifications: AtomicU64,
    missed_notifications: AtomicU64,
    events_buffered: AtomicU64,
    events_replayed: AtomicU64,
    early_events_expired: AtomicU64,
    duplicate_hangups: AtomicU64,
    unmapped_hangups: AtomicU64,
    events_ignored: AtomicU64,
}

/// Counters and current table sizes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CorrelationStats {
    pub ring_notifications: u64,
    pub missed_notifications: u64,
    pub events_buffered: u64,
    pub events_replayed: u64,
    pub early_events_expired: u64,
    pub duplicate_hangups: u64,
    pub unmapped_hangups: u64,
    pub events_ignored: u64,
    pub mapped_channels: usize,
    pub buffered_events: usize,
    pub pending_calls: usize,
    pub tracked_calls: usize,
    pub guarded_calls: usize,
}

/// Call-event correlation engine
pub struct CorrelationEngine {
    numbers: InternalNumbers,
    state: Mutex<CorrelationState>,
    sink: Arc<dyn NotificationSink>,
    counters: Counters,
}

impl CorrelationEngine {
    /// Engine with the default retention windows (5 s early buffer, 10 min guard)
    pub fn new(numbers: InternalNumbers, sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_config(numbers, &CorrelationConfig::default(), sink)
    }

    pub fn with_config(
        numbers: InternalNumbers,
        config: &CorrelationConfig,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        info!(
            "🎯 Correlation engine ready ({} internal numbers, early buffer {:?}, guard {:?})",
            numbers.len(),
            config.early_event_timeout(),
            config.hangup_guard_ttl()
        );
        Self {
            numbers,
            state: Mutex::new(CorrelationState {
                resolver: IdentifierResolver::new(),
                early_events: EarlyEventBuffer::new(config.early_event_timeout()),
                tracker: CallTracker::new(),
                guard: HangupGuard::new(config.hangup_guard_ttl()),
            }),
            sink,
            counters: Counters::default(),
        }
    }

    pub fn internal_numbers(&self) -> &InternalNumbers {
        &self.numbers
    }

    /// Handle a channel state change observed at `now`
    pub fn handle_state_change_at(&self, event: StateChangeEvent, now: Instant) {
        let mut notifications = Vec::new();
        {
            let mut state = self.state.lock();

            let Some(group_id) = state.resolver.resolve(&event.channel_id).cloned() else {
                debug!(
                    "No call group for channel {} yet, buffering {} event",
                    event.channel_id, event.state
                );
                let expired = state.early_events.buffer(event, now);
                self.counters.events_buffered.fetch_add(1, Ordering::Relaxed);
                self.counters.early_events_expired.fetch_add(expired as u64, Ordering::Relaxed);
                return;
            };

            self.apply_state_change(&mut state, &group_id, &event, &mut notifications);
        }
        self.deliver(notifications);
    }

    /// Handle a dial-stage event observed at `now`
    pub fn handle_dial_at(&self, event: DialEvent, now: Instant) {
        let mut notifications = Vec::new();
        {
            let mut state = self.state.lock();

            if let (Some(channel_id), Some(group_id)) = (&event.channel_id, &event.group_id) {
                state.resolver.bind(channel_id.clone(), group_id.clone());

                match state.early_events.take(channel_id, now) {
                    EarlyTake::Fresh(early) => {
                        debug!("Replaying early {} event for channel {}", early.state, channel_id);
                        self.counters.events_replayed.fetch_add(1, Ordering::Relaxed);
                        self.apply_state_change(&mut state, group_id, &early, &mut notifications);
                    }
                    EarlyTake::Expired => {
                        self.counters.early_events_expired.fetch_add(1, Ordering::Relaxed);
                    }
                    EarlyTake::Absent => {}
                }
            }

            if let Some(group_id) = &event.group_id {
                let outcome = state.tracker.on_dial(
                    &self.numbers,
                    group_id,
                    event.application,
                    event.state,
                    event.caller.as_deref(),
                    event.callee.as_deref(),
                );
                self.record(&mut state, group_id, outcome, &mut notifications);
            } else {
                self.ignore(None, IgnoreReason::MissingNumbers);
            }
        }
        self.deliver(notifications);
    }

    /// Handle a hangup observed at `now`
    pub fn handle_hangup_at(&self, event: HangupEvent, now: Instant) {
        let mut notifications = Vec::new();
        {
            let mut state = self.state.lock();

            let Some(group_id) = state.resolver.resolve(&event.channel_id).cloned() else {
                debug!("Hangup for unmapped channel {}, ignoring", event.channel_id);
                self.counters.unmapped_hangups.fetch_add(1, Ordering::Relaxed);
                return;
            };

            if state.guard.is_guarded(&group_id, now) {
                debug!("Call {} already finalized, ignoring duplicate hangup", group_id);
                self.counters.duplicate_hangups.fetch_add(1, Ordering::Relaxed);
                // Legs bound after finalization must not outlive the call
                let released = state.resolver.release_all(&group_id);
                for channel_id in &released {
                    state.early_events.remove(channel_id);
                }
                return;
            }

            if let Some(missed) = state.tracker.finish(&group_id) {
                info!(
                    "📵 Missed call {} -> {} (call {})",
                    missed.caller, missed.callee, group_id
                );
                self.counters.missed_notifications.fetch_add(1, Ordering::Relaxed);
                state.guard.guard(group_id.clone(), now);
                notifications.push(missed);
            }

            let released = state.resolver.release_all(&group_id);
            for channel_id in &released {
                state.early_events.remove(channel_id);
            }
            let swept = state.guard.sweep(now);
            debug!(
                "Call {} finalized, released {} channels, swept {} guard entries",
                group_id,
                released.len(),
                swept
            );
        }
        self.deliver(notifications);
    }

    /// Current lifecycle state of a call group
    pub fn call_state(&self, group_id: &CallGroupId) -> CallState {
        self.state.lock().tracker.call_state(group_id)
    }

    pub fn pending_call(&self, group_id: &CallGroupId) -> Option<PendingCall> {
        self.state.lock().tracker.pending_call(group_id).cloned()
    }

    pub fn stats(&self) -> CorrelationStats {
        let state = self.state.lock();
        CorrelationStats {
            ring_notifications: self.counters.ring_notifications.load(Ordering::Relaxed),
            missed_notifications: self.counters.missed_notifications.load(Ordering::Relaxed),
            events_buffered: self.counters.events_buffered.load(Ordering::Relaxed),
            events_replayed: self.counters.events_replayed.load(Ordering::Relaxed),
            early_events_expired: self.counters.early_events_expired.load(Ordering::Relaxed),
            duplicate_hangups: self.counters.duplicate_hangups.load(Ordering::Relaxed),
            unmapped_hangups: self.counters.unmapped_hangups.load(Ordering::Relaxed),
            events_ignored: self.counters.events_ignored.load(Ordering::Relaxed),
            mapped_channels: state.resolver.len(),
            buffered_events: state.early_events.len(),
            pending_calls: state.tracker.pending_count(),
            tracked_calls: state.tracker.tracked_count(),
            guarded_calls: state.guard.len(),
        }
    }

    fn apply_state_change(
        &self,
        state: &mut CorrelationState,
        group_id: &CallGroupId,
        event: &StateChangeEvent,
        notifications: &mut Vec<CallNotification>,
    ) {
        let outcome = state.tracker.on_state_change(
            &self.numbers,
            group_id,
            event.state,
            event.caller.as_deref(),
            event.callee.as_deref(),
        );
        self.record(state, group_id, outcome, notifications);
    }

    fn record(
        &self,
        state: &mut CorrelationState,
        group_id: &CallGroupId,
        outcome: TrackOutcome,
        notifications: &mut Vec<CallNotification>,
    ) {
        match outcome {
            TrackOutcome::RingStarted(notification) => {
                // A group is never pending and guarded at once
                if state.guard.release(group_id) {
                    debug!("Call {} rings again after being reported missed", group_id);
                }
                info!(
                    "📞 Ringing {} -> {} (call {})",
                    notification.caller, notification.callee, group_id
                );
                self.counters.ring_notifications.fetch_add(1, Ordering::Relaxed);
                notifications.push(notification);
            }
            TrackOutcome::Answered { was_pending: true } => {
                debug!("Call {} answered before hangup", group_id);
            }
            TrackOutcome::Ignored(reason) => self.ignore(Some(group_id), reason),
            TrackOutcome::Answered { was_pending: false } | TrackOutcome::Unchanged => {}
        }
    }

    fn ignore(&self, group_id: Option<&CallGroupId>, reason: IgnoreReason) {
        self.counters.events_ignored.fetch_add(1, Ordering::Relaxed);
        match group_id {
            Some(id) => debug!("Ignoring event for call {}: {}", id, reason),
            None => debug!("Ignoring event without call group: {}", reason),
        }
    }

    fn deliver(&self, notifications: Vec<CallNotification>) {
        for notification in notifications {
            self.sink.notify(&notification);
        }
    }
}

impl CallEventHandler for CorrelationEngine {
    fn on_state_change(&self, event: StateChangeEvent) {
        self.handle_state_change_at(event, Instant::now());
    }

    fn on_dial(&self, event: DialEvent) {
        self.handle_dial_at(event, Instant::now());
    }

    fn on_hangup(&self, event: HangupEvent) {
        self.handle_hangup_at(event, Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChannelId, ChannelState, DialApplication};
    use std::time::Duration;

    type Recorded = Arc<parking_lot::Mutex<Vec<(String, String, bool)>>>;

    fn engine() -> (CorrelationEngine, Recorded) {
        let recorded: Recorded = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = recorded.clone();
        let engine = CorrelationEngine::new(
            InternalNumbers::new(["100", "200"]),
            Arc::new(move |caller: &str, callee: &str, missed: bool| {
                sink.lock().push((caller.to_string(), callee.to_string(), missed));
            }),
        );
        (engine, recorded)
    }

    fn dial(channel: &str, group: &str, state: ChannelState) -> DialEvent {
        DialEvent {
            channel_id: Some(ChannelId::new(channel)),
            group_id: Some(CallGroupId::new(group)),
            application: DialApplication::Other,
            callee: None,
            caller: None,
            state,
        }
    }

    fn state_change(channel: &str, state: ChannelState) -> StateChangeEvent {
        StateChangeEvent {
            channel_id: ChannelId::new(channel),
            state,
            callee: Some("100".to_string()),
            caller: Some("09120000000".to_string()),
        }
    }

    #[test]
    fn test_ringing_again_lifts_guard() {
        let (engine, recorded) = engine();
        let now = Instant::now();

        engine.handle_dial_at(dial("1.1", "1.1", ChannelState::Down), now);
        engine.handle_state_change_at(state_change("1.1", ChannelState::Ringing), now);
        engine.handle_hangup_at(HangupEvent { channel_id: ChannelId::new("1.1") }, now);
        assert_eq!(engine.stats().guarded_calls, 1);

        // The queue rings the member again on a new leg of the same call
        let later = now + Duration::from_secs(1);
        engine.handle_dial_at(dial("1.2", "1.1", ChannelState::Down), later);
        engine.handle_state_change_at(state_change("1.2", ChannelState::Ringing), later);

        let stats = engine.stats();
        assert_eq!(stats.pending_calls, 1);
        assert_eq!(stats.guarded_calls, 0);

        engine.handle_hangup_at(HangupEvent { channel_id: ChannelId::new("1.2") }, later);

        let missed: Vec<bool> = recorded.lock().iter().map(|(_, _, missed)| *missed).collect();
        assert_eq!(missed, vec![false, true, false, true]);
        let stats = engine.stats();
        assert_eq!(stats.duplicate_hangups, 0);
        assert_eq!(stats.missed_notifications, 2);
        assert_eq!(stats.guarded_calls, 1);
        assert_eq!(stats.mapped_channels, 0);
    }

    #[test]
    fn test_unbounded_guard_ttl_does_not_overflow() {
        let config = CorrelationConfig {
            hangup_guard_ttl_secs: u64::MAX,
            ..Default::default()
        };
        let engine = CorrelationEngine::with_config(
            InternalNumbers::new(["100"]),
            &config,
            Arc::new(|_: &str, _: &str, _: bool| {}),
        );
        let now = Instant::now();

        engine.handle_dial_at(dial("1.1", "1.1", ChannelState::Down), now);
        engine.handle_state_change_at(state_change("1.1", ChannelState::Ringing), now);
        engine.handle_hangup_at(HangupEvent { channel_id: ChannelId::new("1.1") }, now);

        engine.handle_dial_at(dial("1.2", "1.1", ChannelState::Down), now);
        engine.handle_hangup_at(HangupEvent { channel_id: ChannelId::new("1.2") }, now);

        let stats = engine.stats();
        assert_eq!(stats.missed_notifications, 1);
        assert_eq!(stats.duplicate_hangups, 1);
        assert_eq!(stats.guarded_calls, 1);
    }

    #[test]
    fn test_guard_expires_and_is_swept() {
        let (engine, _recorded) = engine();
        let now = Instant::now();

        engine.handle_dial_at(dial("1.1", "1.1", ChannelState::Down), now);
        engine.handle_state_change_at(state_change("1.1", ChannelState::Ringing), now);
        engine.handle_hangup_at(HangupEvent { channel_id: ChannelId::new("1.1") }, now);
        assert_eq!(engine.stats().guarded_calls, 1);

        // Any later hangup sweeps expired entries
        let later = now + Duration::from_secs(11 * 60);
        engine.handle_dial_at(dial("2.1", "2.1", ChannelState::Down), later);
        engine.handle_hangup_at(HangupEvent { channel_id: ChannelId::new("2.1") }, later);
        assert_eq!(engine.stats().guarded_calls, 0);
    }

    #[test]
    fn test_sink_may_reenter_engine() {
        let engine_slot: Arc<parking_lot::Mutex<Option<Arc<CorrelationEngine>>>> =
            Arc::new(parking_lot::Mutex::new(None));
        let slot = engine_slot.clone();
        let seen = Arc::new(AtomicU64::new(0));
        let seen_in_sink = seen.clone();

        let engine = Arc::new(CorrelationEngine::new(
            InternalNumbers::new(["100"]),
            Arc::new(move |_: &str, _: &str, _: bool| {
                if let Some(engine) = slot.lock().as_ref() {
                    // Would deadlock if called under the engine lock
                    let _ = engine.stats();
                }
                seen_in_sink.fetch_add(1, Ordering::SeqCst);
            }),
        ));
        *engine_slot.lock() = Some(engine.clone());

        let now = Instant::now();
        engine.handle_dial_at(dial("1.1", "1.1", ChannelState::Down), now);
        engine.handle_state_change_at(state_change("1.1", ChannelState::Ringing), now);
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        *engine_slot.lock() = None;
    }
}
