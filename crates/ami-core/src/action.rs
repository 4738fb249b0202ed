//! Manager actions and their responses

use std::fmt;

use crate::message::{AmiMessage, MessageKind};

/// Actions the session knows how to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Login {
        username: String,
        secret: String,
    },
    Logoff,
    Ping,
    /// Place a call from `channel` into `context`/`exten`
    Originate {
        channel: String,
        context: String,
        exten: String,
        priority: String,
        caller_id: String,
        timeout_ms: u64,
    },
    /// Run a CLI command, e.g. `sip show peers`
    Command {
        command: String,
    },
}

impl Action {
    /// AMI action name
    pub fn name(&self) -> &'static str {
        match self {
            Action::Login { .. } => "Login",
            Action::Logoff => "Logoff",
            Action::Ping => "Ping",
            Action::Originate { .. } => "Originate",
            Action::Command { .. } => "Command",
        }
    }

    /// Render the request block with the given `ActionID`
    pub fn to_message(&self, action_id: &str) -> AmiMessage {
        let msg = AmiMessage::new()
            .with_header("Action", self.name())
            .with_header("ActionID", action_id);

        match self {
            Action::Login { username, secret } => msg
                .with_header("Username", username.as_str())
                .with_header("Secret", secret.as_str())
                .with_header("Events", "on"),
            Action::Logoff | Action::Ping => msg,
            Action::Originate {
                channel,
                context,
                exten,
                priority,
                caller_id,
                timeout_ms,
            } => msg
                .with_header("Channel", channel.as_str())
                .with_header("Context", context.as_str())
                .with_header("Exten", exten.as_str())
                .with_header("Priority", priority.as_str())
                .with_header("CallerID", caller_id.as_str())
                .with_header("Timeout", timeout_ms.to_string()),
            Action::Command { command } => msg.with_header("Command", command.as_str()),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Never print the secret
            Action::Login { username, .. } => write!(f, "Login({})", username),
            Action::Originate { channel, exten, .. } => {
                write!(f, "Originate({} -> {})", channel, exten)
            }
            Action::Command { command } => write!(f, "Command({})", command),
            other => f.write_str(other.name()),
        }
    }
}

/// Response to an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    message: AmiMessage,
}

impl ActionResponse {
    pub fn new(message: AmiMessage) -> Self {
        Self { message }
    }

    /// `Success`, `Follows` and `Goodbye` all count as success
    pub fn is_success(&self) -> bool {
        match self.message.kind() {
            MessageKind::Response(status) => {
                let status = status.to_ascii_lowercase();
                status == "success" || status == "follows" || status == "goodbye"
            }
            _ => false,
        }
    }

    /// The `Message` header, empty when absent
    pub fn message(&self) -> &str {
        self.message.get("Message").unwrap_or("")
    }

    /// Command output lines
    pub fn output(&self) -> &[String] {
        self.message.output()
    }

    pub fn raw(&self) -> &AmiMessage {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_message() {
        let action = Action::Login {
            username: "admin".to_string(),
            secret: "s3cret".to_string(),
        };
        let msg = action.to_message("abc");

        assert_eq!(msg.get("Action"), Some("Login"));
        assert_eq!(msg.action_id(), Some("abc"));
        assert_eq!(msg.get("Events"), Some("on"));
        assert!(!action.to_string().contains("s3cret"));
    }

    #[test]
    fn test_originate_message() {
        let action = Action::Originate {
            channel: "Local/100@from-internal".to_string(),
            context: "from-internal".to_string(),
            exten: "09120000000".to_string(),
            priority: "1".to_string(),
            caller_id: "09120000000".to_string(),
            timeout_ms: 30_000,
        };
        let wire = action.to_message("1").to_wire();

        assert!(wire.starts_with("Action: Originate\r\nActionID: 1\r\n"));
        assert!(wire.contains("Channel: Local/100@from-internal\r\n"));
        assert!(wire.contains("Timeout: 30000\r\n"));
        assert!(wire.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_response_status() {
        let ok = ActionResponse::new(AmiMessage::new().with_header("Response", "Success"));
        assert!(ok.is_success());
        assert_eq!(ok.message(), "");

        let err = ActionResponse::new(
            AmiMessage::new()
                .with_header("Response", "Error")
                .with_header("Message", "Authentication failed"),
        );
        assert!(!err.is_success());
        assert_eq!(err.message(), "Authentication failed");
    }
}
