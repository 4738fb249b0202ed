//! # Asterisk Manager Interface for callwatch
//!
//! Wire-level support for the Asterisk Manager Interface (AMI): message
//! parsing and framing, the actions callwatch sends, and a tokio TCP session.
//!
//! - [`message`]: `Key: Value` blocks
//! - [`codec`]: stream framing, including the connect greeting
//! - [`action`]: requests and their responses
//! - [`session`]: the [`ManagerSession`] trait the rest of the workspace codes against
//! - [`connection`]: [`AmiConnection`], the TCP implementation
//!
//! ```rust,no_run
//! use callwatch_ami_core::{AmiConnection, ConnectionConfig, ManagerSession};
//!
//! # async fn run() -> callwatch_ami_core::Result<()> {
//! let config = ConnectionConfig::new("127.0.0.1", 5038, "monitor", "secret");
//! let (connection, mut events) = AmiConnection::connect(config).await?;
//! connection.login().await?;
//!
//! while let Some(event) = events.recv().await {
//!     println!("{}", event);
//! }
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod session;

pub use action::{Action, ActionResponse};
pub use codec::{AmiFrameDecoder, Frame};
pub use config::ConnectionConfig;
pub use connection::AmiConnection;
pub use error::{Error, Result};
pub use message::{AmiMessage, MessageKind};
pub use session::ManagerSession;
