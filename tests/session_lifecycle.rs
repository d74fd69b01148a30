//! Session lifecycle integration tests
//!
//! Drives `SessionManager` end to end through `MockTransport`: pairing,
//! restore, the daemon loop with both event streams, and logout.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tether::commands::CommandRegistry;
use tether::session::context::now_secs;
use tether::session::credentials;
use tether::session::dispatcher::FAILURE_NOTICE;
use tether::session::mock::Call;
use tether::session::{
    ConnectionState, ConversationId, InboundMessage, MockConnector, MockTransport, SessionError,
    SessionManager, SessionSettings, TransportError,
};
use tokio::sync::oneshot;
use tokio::time::sleep;

const OWN: &str = "15550001111@c.us";
const FRIEND: &str = "15550002222@c.us";

fn settings(path: &Path) -> SessionSettings {
    let mut settings = SessionSettings::new(path, "!bot");
    settings.reconnect_delay = Duration::from_millis(20);
    settings
}

async fn init_manager(path: &Path) -> (SessionManager<MockConnector>, MockTransport) {
    let transport = MockTransport::new(OWN);
    let manager = SessionManager::new(MockConnector::new(transport.clone()), settings(path));
    manager.init(Duration::from_secs(5)).await.unwrap();
    (manager, transport)
}

fn message(conversation: &str, id: &str, text: &str) -> InboundMessage {
    InboundMessage {
        conversation: ConversationId::from(conversation),
        from_me: conversation == OWN,
        id: id.to_string(),
        text: text.to_string(),
        timestamp: now_secs() + 1,
        quoted_id: None,
    }
}

async fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..300 {
        if condition() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

fn session_path(dir: &TempDir) -> PathBuf {
    dir.path().join("tether").join("session.cbor")
}

#[tokio::test]
async fn test_login_then_restore_then_logout() {
    let dir = TempDir::new().unwrap();
    let path = session_path(&dir);

    // Pair and close
    let (manager, transport) = init_manager(&path).await;
    let mut shown = None;
    manager.login(|code| shown = Some(code)).await.unwrap();
    assert!(shown.is_some());
    manager.close().await.unwrap();
    assert!(path.exists());
    assert_eq!(transport.call_count(Call::Logout), 0);

    // A fresh process restores from the file
    let (manager, transport) = init_manager(&path).await;
    manager.restore().await.unwrap();
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert_eq!(manager.session().own_id(), Some(ConversationId::from(OWN)));

    manager.logout().await.unwrap();
    assert!(!path.exists());
    assert_eq!(manager.state(), ConnectionState::Terminated);
    assert_eq!(
        transport.calls(),
        vec![
            Call::RestoreWithBundle,
            Call::AdminTest,
            Call::Logout,
            Call::Disconnect
        ]
    );
}

#[tokio::test]
async fn test_login_never_clobbers_existing_session() {
    let dir = TempDir::new().unwrap();
    let path = session_path(&dir);
    credentials::save(&path, &MockTransport::sample_bundle(OWN)).unwrap();
    let before = fs::read(&path).unwrap();

    let (manager, transport) = init_manager(&path).await;
    let err = manager.login(|_| {}).await.unwrap_err();

    assert!(matches!(err, SessionError::SessionAlreadyExists(_)));
    assert!(err.to_string().contains("already exists"));
    assert!(transport.calls().is_empty());
    assert_eq!(fs::read(&path).unwrap(), before);
}

#[tokio::test]
async fn test_restore_without_session_disconnects_once() {
    let dir = TempDir::new().unwrap();
    let (manager, transport) = init_manager(&session_path(&dir)).await;

    let err = manager.restore().await.unwrap_err();

    assert!(matches!(err, SessionError::SessionNotFound(_)));
    assert_eq!(transport.call_count(Call::Disconnect), 1);
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test]
async fn test_restore_with_corrupt_session_removes_it() {
    let dir = TempDir::new().unwrap();
    let path = session_path(&dir);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, b"definitely not cbor").unwrap();

    let (manager, transport) = init_manager(&path).await;
    let err = manager.restore().await.unwrap_err();

    assert!(matches!(err, SessionError::SessionCorrupt(_)));
    assert!(!path.exists());
    assert_eq!(transport.call_count(Call::RestoreWithBundle), 0);
    assert_eq!(transport.call_count(Call::Disconnect), 1);
}

#[tokio::test]
async fn test_restore_ping_failure_is_surfaced() {
    let dir = TempDir::new().unwrap();
    let path = session_path(&dir);
    credentials::save(&path, &MockTransport::sample_bundle(OWN)).unwrap();

    let (manager, transport) = init_manager(&path).await;
    transport.set_ping(Ok(false));

    let err = manager.restore().await.unwrap_err();

    assert!(matches!(err, SessionError::PingFailed));
    assert!(path.exists());
    assert_eq!(transport.call_count(Call::Disconnect), 1);
}

#[tokio::test]
async fn test_init_failure_is_surfaced() {
    let dir = TempDir::new().unwrap();
    let manager = SessionManager::new(
        MockConnector::failing(TransportError::Protocol("unsupported version".to_string())),
        settings(&session_path(&dir)),
    );

    let err = manager.init(Duration::from_secs(5)).await.unwrap_err();

    assert!(matches!(err, SessionError::Init(_)));
    assert!(err.to_string().starts_with("failed to initialize connection"));
}

#[tokio::test]
async fn test_daemon_answers_and_reconnects() {
    let dir = TempDir::new().unwrap();
    let path = session_path(&dir);
    credentials::save(&path, &MockTransport::sample_bundle(OWN)).unwrap();

    let (manager, transport) = init_manager(&path).await;
    manager.restore().await.unwrap();
    let session = manager.session();
    let started = session.started_at();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let run = manager.run_until(CommandRegistry::with_builtins(), async {
        let _ = stop_rx.await;
    });

    let driver = async {
        transport.emit_message(message(FRIEND, "M1", "!bot ping"));
        transport.emit_message(message(FRIEND, "M2", "!bot nonsense"));
        transport.emit_message(message(FRIEND, "M3", "hello there"));
        wait_for("replies", || transport.sent().len() == 2).await;

        // Wait past a second boundary so the watermark visibly moves
        sleep(Duration::from_millis(1100)).await;
        transport.emit_error(TransportError::ConnectionFailed("eof".to_string()));
        wait_for("restore", || transport.call_count(Call::Restore) == 1).await;

        transport.emit_error(TransportError::classify("Server closed connection"));
        sleep(Duration::from_millis(50)).await;

        let _ = stop_tx.send(());
    };

    let (result, ()) = tokio::join!(run, driver);
    result.unwrap();

    let sent = transport.sent();
    assert_eq!(sent[0].text, "pong");
    assert_eq!(sent[0].to, ConversationId::from(FRIEND));
    assert_eq!(sent[0].quote.as_ref().unwrap().id, "M1");
    assert!(sent[1].text.starts_with(FAILURE_NOTICE));
    assert!(sent[1].text.contains("Unknown command 'nonsense'"));

    assert!(session.started_at() > started);
    assert_eq!(transport.call_count(Call::Restore), 1);
    assert_eq!(manager.state(), ConnectionState::Terminated);
    assert_eq!(transport.calls().last(), Some(&Call::Disconnect));
}

#[tokio::test]
async fn test_daemon_test_mode_only_answers_self() {
    let dir = TempDir::new().unwrap();
    let path = session_path(&dir);
    credentials::save(&path, &MockTransport::sample_bundle(OWN)).unwrap();

    let transport = MockTransport::new(OWN);
    let mut settings = settings(&path);
    settings.test_mode = true;
    let manager = SessionManager::new(MockConnector::new(transport.clone()), settings);
    manager.init(Duration::from_secs(5)).await.unwrap();
    manager.restore().await.unwrap();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let run = manager.run_until(CommandRegistry::with_builtins(), async {
        let _ = stop_rx.await;
    });

    let driver = async {
        transport.emit_message(message(FRIEND, "M1", "!bot ping"));
        transport.emit_message(message(OWN, "M2", "!bot echo only me"));
        wait_for("self reply", || !transport.sent().is_empty()).await;
        sleep(Duration::from_millis(50)).await;
        let _ = stop_tx.send(());
    };

    let (result, ()) = tokio::join!(run, driver);
    result.unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, ConversationId::from(OWN));
    assert_eq!(sent[0].text, "only me");
}

#[tokio::test]
async fn test_daemon_requires_connected_session() {
    let dir = TempDir::new().unwrap();
    let (manager, _transport) = init_manager(&session_path(&dir)).await;

    let err = manager
        .run_until(CommandRegistry::with_builtins(), async {})
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::InvalidState { .. }));
}
