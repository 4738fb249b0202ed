//! Integration tests for the AMI TCP connection
//!
//! Each test runs a small fake manager on a loopback port.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use callwatch_ami_core::{
    Action, AmiConnection, AmiFrameDecoder, AmiMessage, ConnectionConfig, Error, Frame,
    ManagerSession,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("callwatch_ami_core=debug")
        .with_test_writer()
        .try_init();
}

/// Server side of a fake manager connection
struct FakeManager {
    stream: TcpStream,
    decoder: AmiFrameDecoder,
}

impl FakeManager {
    async fn accept(listener: &TcpListener) -> Self {
        let (mut stream, _) = listener.accept().await.unwrap();
        stream.write_all(b"Asterisk Call Manager/5.0.1\r\n").await.unwrap();
        Self {
            stream,
            decoder: AmiFrameDecoder::new(),
        }
    }

    async fn read_action(&mut self) -> AmiMessage {
        let mut buf = [0u8; 1024];
        loop {
            if let Some(Frame::Message(msg)) = self.decoder.next_frame().unwrap() {
                return msg;
            }
            let n = self.stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "client closed before sending an action");
            self.decoder.extend(&buf[..n]);
        }
    }

    async fn send(&mut self, message: AmiMessage) {
        self.stream.write_all(message.to_wire().as_bytes()).await.unwrap();
    }

    async fn reply(&mut self, action: &AmiMessage, status: &str, message: &str) {
        let reply = AmiMessage::new()
            .with_header("Response", status)
            .with_header("ActionID", action.action_id().unwrap())
            .with_header("Message", message);
        self.send(reply).await;
    }
}

async fn bind() -> (TcpListener, ConnectionConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let mut config = ConnectionConfig::new("127.0.0.1", port, "monitor", "secret");
    config.action_timeout_ms = 2_000;
    (listener, config)
}

#[tokio::test]
async fn test_login_events_command_and_logoff() {
    init_tracing();
    let (listener, config) = bind().await;

    let server = tokio::spawn(async move {
        let mut manager = FakeManager::accept(&listener).await;

        let login = manager.read_action().await;
        assert_eq!(login.get("Action"), Some("Login"));
        assert_eq!(login.get("Username"), Some("monitor"));
        assert_eq!(login.get("Secret"), Some("secret"));
        manager.reply(&login, "Success", "Authentication accepted").await;

        manager
            .send(
                AmiMessage::new()
                    .with_header("Event", "Newstate")
                    .with_header("Uniqueid", "1700000000.1")
                    .with_header("ChannelStateDesc", "Ringing"),
            )
            .await;

        let command = manager.read_action().await;
        assert_eq!(command.get("Command"), Some("sip show peers"));
        manager
            .send(
                AmiMessage::new()
                    .with_header("Response", "Success")
                    .with_header("ActionID", command.action_id().unwrap())
                    .with_header("Output", "100/100  10.0.0.5  OK (5 ms)")
                    .with_header("Output", "1 sip peers"),
            )
            .await;

        let logoff = manager.read_action().await;
        assert_eq!(logoff.get("Action"), Some("Logoff"));
        manager.reply(&logoff, "Goodbye", "Thanks for all the fish.").await;
    });

    let (connection, mut events) = AmiConnection::connect(config).await.unwrap();
    connection.login().await.unwrap();
    assert!(connection.is_connected());

    let event = timeout(Duration::from_secs(2), events.recv()).await.unwrap().unwrap();
    assert!(event.is_event("Newstate"));
    assert_eq!(event.get("Uniqueid"), Some("1700000000.1"));
    assert_eq!(connection.server_version(), Some("5.0.1"));

    let response = connection
        .send_action(
            Action::Command {
                command: "sip show peers".to_string(),
            },
            Duration::from_secs(2),
        )
        .await
        .unwrap();
    assert!(response.is_success());
    assert_eq!(response.output().len(), 2);

    connection.logoff().await.unwrap();
    assert!(!connection.is_connected());
    // Second logoff is a no-op
    connection.logoff().await.unwrap();

    server.await.unwrap();
}

#[tokio::test]
async fn test_login_rejected() {
    init_tracing();
    let (listener, config) = bind().await;

    let server = tokio::spawn(async move {
        let mut manager = FakeManager::accept(&listener).await;
        let login = manager.read_action().await;
        manager.reply(&login, "Error", "Authentication failed").await;
        manager
    });

    let (connection, _events) = AmiConnection::connect(config).await.unwrap();
    let err = connection.login().await.unwrap_err();
    match err {
        Error::Authentication(message) => assert_eq!(message, "Authentication failed"),
        other => panic!("expected authentication error, got {:?}", other),
    }

    let _manager = server.await.unwrap();
}

#[tokio::test]
async fn test_action_timeout() {
    init_tracing();
    let (listener, config) = bind().await;

    let server = tokio::spawn(async move {
        let mut manager = FakeManager::accept(&listener).await;
        let _ping = manager.read_action().await;
        // Never answer, keep the socket open until the client gives up
        tokio::time::sleep(Duration::from_millis(500)).await;
        manager
    });

    let (connection, _events) = AmiConnection::connect(config).await.unwrap();
    let err = connection
        .send_action(Action::Ping, Duration::from_millis(100))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));
    assert_eq!(connection.pending_actions(), 0);

    let _manager = server.await.unwrap();
}

#[tokio::test]
async fn test_peer_close_ends_event_stream() {
    init_tracing();
    let (listener, config) = bind().await;

    let server = tokio::spawn(async move {
        let manager = FakeManager::accept(&listener).await;
        drop(manager);
    });

    let (connection, mut events) = AmiConnection::connect(config).await.unwrap();
    server.await.unwrap();

    let closed = timeout(Duration::from_secs(2), events.recv()).await.unwrap();
    assert!(closed.is_none());
    assert!(!connection.is_connected());

    let err = connection.send_action(Action::Ping, Duration::from_millis(100)).await.unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_connect_refused() {
    init_tracing();
    let (listener, config) = bind().await;
    drop(listener);

    let err = AmiConnection::connect(config).await.unwrap_err();
    assert!(matches!(err, Error::Io(_) | Error::Timeout(_)));
}
