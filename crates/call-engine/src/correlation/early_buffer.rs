use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::events::{ChannelId, StateChangeEvent};

/// Default retention for state changes whose call group is not known yet
pub const DEFAULT_EARLY_EVENT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct BufferedEvent {
    event: StateChangeEvent,
    arrived_at: Instant,
}

/// Result of looking up a buffered event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EarlyTake {
    /// Buffered within the retention window
    Fresh(StateChangeEvent),
    /// Buffered too long ago; dropped
    Expired,
    Absent,
}

/// Holds state-change events that arrived before their channel was mapped
///
/// Only the most recent event per channel is kept. Expiry is checked
/// lazily: on every [`buffer`](Self::buffer) call and when an entry is taken.
#[derive(Debug)]
pub struct EarlyEventBuffer {
    entries: HashMap<ChannelId, BufferedEvent>,
    retention: Duration,
}

impl EarlyEventBuffer {
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            retention,
        }
    }

    /// Store `event`, replacing any earlier one for the same channel.
    /// Returns how many stale entries the implied sweep removed.
    pub fn buffer(&mut self, event: StateChangeEvent, now: Instant) -> usize {
        let channel_id = event.channel_id.clone();
        self.entries.insert(channel_id, BufferedEvent { event, arrived_at: now });
        self.sweep(now)
    }

    /// Remove the buffered event for `channel_id`
    ///
    /// An entry older than the retention window is discarded and reported
    /// as [`EarlyTake::Expired`].
    pub fn take(&mut self, channel_id: &ChannelId, now: Instant) -> EarlyTake {
        let Some(entry) = self.entries.remove(channel_id) else {
            return EarlyTake::Absent;
        };
        if self.is_expired(entry.arrived_at, now) {
            debug!("Discarding expired early event for channel {}", channel_id);
            return EarlyTake::Expired;
        }
        EarlyTake::Fresh(entry.event)
    }

    /// Drop the entry for `channel_id`, if any
    pub fn remove(&mut self, channel_id: &ChannelId) -> bool {
        self.entries.remove(channel_id).is_some()
    }

    /// Drop every entry older than the retention window
    pub fn sweep(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        let retention = self.retention;
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.arrived_at) <= retention);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!("🧹 Swept {} expired early events", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, arrived_at: Instant, now: Instant) -> bool {
        now.saturating_duration_since(arrived_at) > self.retention
    }
}

impl Default for EarlyEventBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_EARLY_EVENT_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ChannelState;

    fn state_event(channel: &str, state: ChannelState) -> StateChangeEvent {
        StateChangeEvent {
            channel_id: ChannelId::new(channel),
            state,
            callee: Some("100".to_string()),
            caller: Some("09120000000".to_string()),
        }
    }

    #[test]
    fn test_latest_event_wins() {
        let mut buffer = EarlyEventBuffer::default();
        let now = Instant::now();

        buffer.buffer(state_event("1.1", ChannelState::Ring), now);
        buffer.buffer(state_event("1.1", ChannelState::Ringing), now);
        assert_eq!(buffer.len(), 1);

        match buffer.take(&ChannelId::new("1.1"), now) {
            EarlyTake::Fresh(event) => assert_eq!(event.state, ChannelState::Ringing),
            other => panic!("unexpected {:?}", other),
        }
        assert!(buffer.is_empty());
        assert_eq!(buffer.take(&ChannelId::new("1.1"), now), EarlyTake::Absent);
    }

    #[test]
    fn test_buffer_sweeps_stale_entries() {
        let mut buffer = EarlyEventBuffer::default();
        let start = Instant::now();

        buffer.buffer(state_event("1.1", ChannelState::Ringing), start);
        let later = start + Duration::from_secs(6);
        let removed = buffer.buffer(state_event("2.1", ChannelState::Ringing), later);

        assert_eq!(removed, 1);
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.take(&ChannelId::new("1.1"), later), EarlyTake::Absent);
    }

    #[test]
    fn test_take_discards_expired_without_sweep() {
        let mut buffer = EarlyEventBuffer::new(Duration::from_secs(5));
        let start = Instant::now();

        buffer.buffer(state_event("1.1", ChannelState::Ringing), start);
        let too_late = start + Duration::from_millis(5_001);
        assert_eq!(buffer.take(&ChannelId::new("1.1"), too_late), EarlyTake::Expired);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_within_window_is_kept() {
        let mut buffer = EarlyEventBuffer::default();
        let start = Instant::now();

        buffer.buffer(state_event("1.1", ChannelState::Ringing), start);
        assert_eq!(buffer.sweep(start + Duration::from_secs(5)), 0);
        let taken = buffer.take(&ChannelId::new("1.1"), start + Duration::from_secs(4));
        assert!(matches!(taken, EarlyTake::Fresh(_)));
    }
}
