//! Where notifications go
//!
//! The sink runs on the event delivery path and must not block.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

/// A call started ringing (`missed == false`) or went unanswered (`missed == true`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallNotification {
    pub caller: String,
    pub callee: String,
    pub missed: bool,
    pub at: DateTime<Utc>,
}

impl CallNotification {
    pub fn ringing(caller: impl Into<String>, callee: impl Into<String>) -> Self {
        Self {
            caller: caller.into(),
            callee: callee.into(),
            missed: false,
            at: Utc::now(),
        }
    }

    pub fn missed(caller: impl Into<String>, callee: impl Into<String>) -> Self {
        Self {
            caller: caller.into(),
            callee: callee.into(),
            missed: true,
            at: Utc::now(),
        }
    }
}

/// Receiver of call notifications
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: &CallNotification);
}

/// Plain `(caller, callee, missed)` callbacks
impl<F> NotificationSink for F
where
    F: Fn(&str, &str, bool) + Send + Sync,
{
    fn notify(&self, notification: &CallNotification) {
        self(&notification.caller, &notification.callee, notification.missed)
    }
}

/// Forwards notifications into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<CallNotification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CallNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: &CallNotification) {
        if self.tx.send(notification.clone()).is_err() {
            warn!(
                "Notification receiver dropped; lost notification for {} -> {}",
                notification.caller, notification.callee
            );
        }
    }
}
