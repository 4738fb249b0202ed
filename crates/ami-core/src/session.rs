use std::time::Duration;

use async_trait::async_trait;

use crate::action::{Action, ActionResponse};
use crate::error::Result;

/// A logged-in (or about to log in) manager session
///
/// Events are not part of this trait; implementations hand out an event
/// receiver when they are created.
#[async_trait]
pub trait ManagerSession: Send + Sync {
    /// Authenticate and enable event delivery
    async fn login(&self) -> Result<()>;

    /// Log off and release the connection. Calling it twice is harmless.
    async fn logoff(&self) -> Result<()>;

    /// Send an action and wait for its response
    async fn send_action(&self, action: Action, timeout: Duration) -> Result<ActionResponse>;

    fn is_connected(&self) -> bool;
}
