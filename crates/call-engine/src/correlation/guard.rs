use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::events::CallGroupId;

/// Default lifetime of a guard entry
pub const DEFAULT_HANGUP_GUARD_TTL: Duration = Duration::from_secs(10 * 60);

/// Short-lived memory of calls already finalized as missed
///
/// Absorbs duplicate hangup events for the same call group.
#[derive(Debug)]
pub struct HangupGuard {
    finalized_at: HashMap<CallGroupId, Instant>,
    ttl: Duration,
}

impl HangupGuard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            finalized_at: HashMap::new(),
            ttl,
        }
    }

    /// True while an unexpired entry exists for `group_id`
    pub fn is_guarded(&self, group_id: &CallGroupId, now: Instant) -> bool {
        self.finalized_at
            .get(group_id)
            .is_some_and(|at| self.is_live(*at, now))
    }

    pub fn guard(&mut self, group_id: CallGroupId, now: Instant) {
        self.finalized_at.insert(group_id, now);
    }

    /// Forget `group_id`, returning whether it was guarded
    pub fn release(&mut self, group_id: &CallGroupId) -> bool {
        self.finalized_at.remove(group_id).is_some()
    }

    /// Remove expired entries, returning how many were dropped
    pub fn sweep(&mut self, now: Instant) -> usize {
        let before = self.finalized_at.len();
        let ttl = self.ttl;
        self.finalized_at.retain(|_, at| now.saturating_duration_since(*at) <= ttl);
        before - self.finalized_at.len()
    }

    pub fn len(&self) -> usize {
        self.finalized_at.len()
    }

    pub fn is_empty(&self) -> bool {
        self.finalized_at.is_empty()
    }

    // Compare elapsed time: `finalized_at + ttl` overflows for large TTLs
    fn is_live(&self, finalized_at: Instant, now: Instant) -> bool {
        now.saturating_duration_since(finalized_at) <= self.ttl
    }
}

impl Default for HangupGuard {
    fn default() -> Self {
        Self::new(DEFAULT_HANGUP_GUARD_TTL)
    }
}
