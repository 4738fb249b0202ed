//! Building blocks of the correlation engine
//!
//! None of these types lock or know about time sources; the
//! [`CorrelationEngine`](crate::engine::CorrelationEngine) owns them behind
//! one mutex and passes `now` in.

pub mod early_buffer;
pub mod guard;
pub mod resolver;
pub mod tracker;

pub use early_buffer::{EarlyEventBuffer, EarlyTake, DEFAULT_EARLY_EVENT_TIMEOUT};
pub use guard::{HangupGuard, DEFAULT_HANGUP_GUARD_TTL};
pub use resolver::IdentifierResolver;
pub use tracker::{CallState, CallTracker, IgnoreReason, PendingCall, TrackOutcome};
