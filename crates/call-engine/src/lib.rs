//! # Call correlation engine for callwatch
//!
//! Turns the unordered stream of Asterisk manager events into two
//! high-level notifications for calls between an internal extension and an
//! outside party:
//!
//! - **ringing**: `(caller, callee, missed = false)` when the call starts ringing
//! - **missed**: `(caller, callee, missed = true)` when it hangs up unanswered
//!
//! ## Architecture
//!
//! - [`events`]: typed events, classified once at the adapter boundary
//! - [`correlation`]: identifier resolver, early-event buffer, call tracker, hangup guard
//! - [`engine`]: [`CorrelationEngine`], which owns the above behind one lock
//! - [`sink`]: where notifications are delivered
//! - [`adapter`]: AMI message → typed event
//! - [`monitor`]: [`CallMonitor`], session lifecycle plus click-to-call and extension status
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use callwatch_call_engine::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = MonitorConfig::from_file("callwatch.toml")?;
//!
//!     let sink = |caller: &str, callee: &str, missed: bool| {
//!         println!("{} -> {} missed={}", caller, callee, missed);
//!     };
//!     let monitor = CallMonitor::start(config, Arc::new(sink)).await?;
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     monitor.stop().await?;
//!     Ok(())
//! }
//! ```

// Core modules
pub mod config;
pub mod error;
pub mod logging;

// Correlation
pub mod correlation;
pub mod engine;
pub mod events;
pub mod numbers;
pub mod sink;

// Manager interface integration
pub mod adapter;
pub mod extensions;
pub mod monitor;

// Re-exports for convenience
pub use config::{CorrelationConfig, DialingConfig, MonitorConfig};
pub use engine::{CallEventHandler, CorrelationEngine, CorrelationStats};
pub use error::{CallEngineError, Result};
pub use logging::{LogFormat, LoggingConfig};
pub use monitor::{CallMonitor, OriginateOutcome};
pub use numbers::InternalNumbers;
pub use sink::{CallNotification, ChannelSink, NotificationSink};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CallEngineError, CallEventHandler, CallMonitor, CallNotification, ChannelSink,
        CorrelationConfig, CorrelationEngine, CorrelationStats, InternalNumbers, MonitorConfig,
        NotificationSink, OriginateOutcome, Result,
    };

    pub use crate::correlation::{CallState, PendingCall};
    pub use crate::events::{
        CallGroupId, ChannelId, ChannelState, DialApplication, DialEvent, HangupEvent, ManagerEvent,
        StateChangeEvent,
    };
    pub use crate::extensions::{ExtensionStatus, PeerRegistration};
}
