use std::collections::HashMap;

use tracing::debug;

use crate::events::{CallGroupId, ChannelId};

/// Channel id → call-group id mapping
///
/// Only dial-stage events bind; hangup finalization releases.
#[derive(Debug, Default)]
pub struct IdentifierResolver {
    by_channel: HashMap<ChannelId, CallGroupId>,
}

impl IdentifierResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, channel_id: &ChannelId) -> Option<&CallGroupId> {
        self.by_channel.get(channel_id)
    }

    /// Bind a channel to its group. Returns true if the mapping changed.
    pub fn bind(&mut self, channel_id: ChannelId, group_id: CallGroupId) -> bool {
        match self.by_channel.get(&channel_id) {
            Some(existing) if *existing == group_id => false,
            _ => {
                debug!("Binding channel {} to call {}", channel_id, group_id);
                self.by_channel.insert(channel_id, group_id);
                true
            }
        }
    }

    /// Drop every channel bound to `group_id`, returning the released channels
    pub fn release_all(&mut self, group_id: &CallGroupId) -> Vec<ChannelId> {
        let mut released = Vec::new();
        self.by_channel.retain(|channel, group| {
            if group == group_id {
                released.push(channel.clone());
                false
            } else {
                true
            }
        });
        released
    }

    pub fn len(&self) -> usize {
        self.by_channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_channel.is_empty()
    }
}
