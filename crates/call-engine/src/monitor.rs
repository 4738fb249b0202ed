//! Call monitor service
//!
//! Owns the manager session for its lifetime: logs in on start, pumps
//! events into the [`CorrelationEngine`], answers click-to-call and
//! extension status requests, and logs off on [`stop`](CallMonitor::stop).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use callwatch_ami_core::{Action, AmiConnection, AmiMessage, ManagerSession};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::adapter;
use crate::config::{DialingConfig, MonitorConfig};
use crate::engine::CorrelationEngine;
use crate::error::{CallEngineError, Result};
use crate::extensions::{extension_states, ExtensionStatus};
use crate::numbers::InternalNumbers;
use crate::sink::NotificationSink;

/// Result of a click-to-call request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OriginateOutcome {
    pub success: bool,
    pub message: String,
}

pub struct CallMonitor {
    config: MonitorConfig,
    session: Arc<dyn ManagerSession>,
    engine: Arc<CorrelationEngine>,
    event_task: Mutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
}

impl CallMonitor {
    /// Connect to the manager interface, log in and start correlating
    pub async fn start(config: MonitorConfig, sink: Arc<dyn NotificationSink>) -> Result<Self> {
        config.validate()?;
        let (connection, events) = AmiConnection::connect(config.ami.clone()).await?;
        Self::with_session(Arc::new(connection), events, config, sink).await
    }

    /// Like [`start`](Self::start) over an already connected session
    ///
    /// On login failure the session is logged off before the error is
    /// returned; retrying is up to the caller.
    pub async fn with_session(
        session: Arc<dyn ManagerSession>,
        events: mpsc::Receiver<AmiMessage>,
        config: MonitorConfig,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self> {
        let numbers = InternalNumbers::new(config.internal_numbers.iter().cloned());
        let engine = Arc::new(CorrelationEngine::with_config(numbers, &config.correlation, sink));

        if let Err(e) = session.login().await {
            error!("❌ AMI login failed: {}", e);
            if let Err(logoff_err) = session.logoff().await {
                debug!("Logoff after failed login also failed: {}", logoff_err);
            }
            return Err(e.into());
        }

        let event_task = spawn_event_loop(engine.clone(), events);
        info!("🚀 Call monitor started");

        Ok(Self {
            config,
            session,
            engine,
            event_task: Mutex::new(Some(event_task)),
            running: AtomicBool::new(true),
        })
    }

    pub fn engine(&self) -> &Arc<CorrelationEngine> {
        &self.engine
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop event processing and log off. Safe to call more than once.
    ///
    /// A recoverable logoff failure is returned and the next call retries
    /// the logoff.
    pub async fn stop(&self) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }

        if let Some(task) = self.event_task.lock().take() {
            task.abort();
        }

        if self.session.is_connected() {
            if let Err(e) = self.session.logoff().await {
                warn!("Logoff failed during shutdown: {}", e);
                if !e.is_fatal() {
                    return Err(e.into());
                }
            }
        }

        if self.running.swap(false, Ordering::SeqCst) {
            info!("🛑 Call monitor stopped");
        }
        Ok(())
    }

    /// Ring `internal_number` and, once picked up, dial `destination`
    pub async fn click_to_call(
        &self,
        internal_number: &str,
        destination: &str,
    ) -> Result<OriginateOutcome> {
        let internal_number = internal_number.trim();
        let destination = destination.trim();

        if internal_number.is_empty() {
            return Err(CallEngineError::invalid_input(
                "Internal number of the calling user is empty; check the user's extension",
            ));
        }
        if destination.is_empty() {
            return Err(CallEngineError::invalid_input("Destination number is empty"));
        }
        self.ensure_running()?;

        let action = originate_action(&self.config.dialing, internal_number, destination);
        info!("📲 Click-to-call {} -> {}", internal_number, destination);
        let response = self
            .session
            .send_action(action, self.config.originate_timeout())
            .await?;

        let outcome = OriginateOutcome {
            success: response.is_success(),
            message: response.message().to_string(),
        };
        if !outcome.success {
            warn!("Originate {} -> {} failed: {}", internal_number, destination, outcome.message);
        }
        Ok(outcome)
    }

    /// Registration and in-call status of every internal number
    pub async fn extension_states(&self) -> Result<BTreeMap<String, ExtensionStatus>> {
        self.ensure_running()?;

        let peers = self.command("sip show peers").await?;
        let channels = self.command("core show channels").await?;

        Ok(extension_states(self.engine.internal_numbers(), &peers, &channels))
    }

    async fn command(&self, command: &str) -> Result<Vec<String>> {
        let response = self
            .session
            .send_action(
                Action::Command {
                    command: command.to_string(),
                },
                self.config.ami.action_timeout(),
            )
            .await?;

        if !response.is_success() {
            return Err(callwatch_ami_core::Error::ActionFailed {
                action: command.to_string(),
                message: response.message().to_string(),
            }
            .into());
        }
        Ok(response.output().to_vec())
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_running() && self.session.is_connected() {
            Ok(())
        } else {
            Err(CallEngineError::NotRunning)
        }
    }
}

impl Drop for CallMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.event_task.get_mut().take() {
            task.abort();
        }
    }
}

fn spawn_event_loop(
    engine: Arc<CorrelationEngine>,
    mut events: mpsc::Receiver<AmiMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = events.recv().await {
            adapter::dispatch(engine.as_ref(), &message);
        }
        warn!("AMI event stream closed");
    })
}

/// The operator's extension is rung first through a Local channel, then the
/// destination is dialled showing the destination number
fn originate_action(dialing: &DialingConfig, internal_number: &str, destination: &str) -> Action {
    Action::Originate {
        channel: format!("Local/{}@{}", internal_number, dialing.context),
        context: dialing.context.clone(),
        exten: destination.to_string(),
        priority: "1".to_string(),
        caller_id: destination.to_string(),
        timeout_ms: dialing.originate_timeout_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_originate_action() {
        let action = originate_action(&DialingConfig::default(), "100", "09120000000");
        assert_eq!(
            action,
            Action::Originate {
                channel: "Local/100@from-internal".to_string(),
                context: "from-internal".to_string(),
                exten: "09120000000".to_string(),
                priority: "1".to_string(),
                caller_id: "09120000000".to_string(),
                timeout_ms: 30_000,
            }
        );
    }
}
