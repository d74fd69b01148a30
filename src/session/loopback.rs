//! Loopback transport
//!
//! Local stand-in for the chat service. Pairing completes immediately with a
//! freshly generated bundle, each line read from the input becomes a message
//! in the operator's own conversation, and replies are printed to stdout.
//!
//! Useful for exercising the full login / daemon / logout cycle without a
//! phone.

use super::context::now_secs;
use super::traits::*;
use async_trait::async_trait;
use futures::channel::oneshot;
use std::io::{self, BufRead};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info, warn};

// Read on a plain thread: a pending stdin read must not hold up runtime shutdown
type Input = Box<dyn BufRead + Send>;

/// Connector producing `LoopbackTransport` handles fed from stdin
pub struct LoopbackConnector {
    client_name: String,
}

impl LoopbackConnector {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }
}

#[async_trait]
impl Connector for LoopbackConnector {
    type Transport = LoopbackTransport;

    async fn connect(&self, timeout: Duration) -> TransportResult<LoopbackTransport> {
        debug!(client = %self.client_name, ?timeout, "opening loopback transport");
        Ok(LoopbackTransport::new(
            self.client_name.clone(),
            Box::new(io::BufReader::new(io::stdin())),
        ))
    }
}

#[derive(Clone)]
pub struct LoopbackTransport {
    state: Arc<Mutex<LoopbackState>>,
}

struct LoopbackState {
    client_name: String,
    bundle: Option<CredentialBundle>,
    connected: bool,
    input: Option<Input>,
    // Kept so the error stream stays open while the handle lives
    error_tx: Option<UnboundedSender<TransportError>>,
}

impl LoopbackTransport {
    /// Transport whose inbound messages are the lines of `input`
    pub fn new(client_name: impl Into<String>, input: Input) -> Self {
        Self {
            state: Arc::new(Mutex::new(LoopbackState {
                client_name: client_name.into(),
                bundle: None,
                connected: false,
                input: Some(input),
                error_tx: None,
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn generate_bundle(client_name: &str) -> CredentialBundle {
    let client_id: [u8; 16] = rand::random();
    let number = rand::random::<u64>() % 10_000_000_000;
    let enc_key: [u8; 32] = rand::random();
    let mac_key: [u8; 32] = rand::random();

    CredentialBundle {
        client_id: format!("{}-{}", client_name.to_lowercase(), hex::encode(client_id)),
        client_token: hex::encode(rand::random::<[u8; 20]>()),
        server_token: hex::encode(rand::random::<[u8; 20]>()),
        wid: format!("{:010}@loopback", number),
        enc_key: enc_key.to_vec(),
        mac_key: mac_key.to_vec(),
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    fn version(&self) -> String {
        format!("loopback {}", env!("CARGO_PKG_VERSION"))
    }

    fn own_id(&self) -> Option<ConversationId> {
        let state = self.state();
        match (&state.bundle, state.connected) {
            (Some(bundle), true) => Some(ConversationId(bundle.wid.clone())),
            _ => None,
        }
    }

    async fn login(&self, code: oneshot::Sender<String>) -> TransportResult<CredentialBundle> {
        let mut state = self.state();
        let bundle = generate_bundle(&state.client_name);

        code.send(format!("2@{},{}", bundle.client_token, bundle.fingerprint()))
            .map_err(|_| TransportError::Protocol("pairing code receiver dropped".to_string()))?;

        state.bundle = Some(bundle.clone());
        state.connected = true;
        Ok(bundle)
    }

    async fn restore_with_bundle(
        &self,
        bundle: CredentialBundle,
    ) -> TransportResult<CredentialBundle> {
        let mut state = self.state();
        state.bundle = Some(bundle.clone());
        state.connected = true;
        Ok(bundle)
    }

    async fn restore(&self) -> TransportResult<()> {
        let mut state = self.state();
        if state.bundle.is_none() {
            return Err(TransportError::ConnectionFailed(
                "no session to restore".to_string(),
            ));
        }
        state.connected = true;
        Ok(())
    }

    async fn send(&self, reply: OutboundReply) -> TransportResult<()> {
        if !self.state().connected {
            return Err(TransportError::NotConnected);
        }

        match &reply.quote {
            Some(quote) => println!("[{}] > {}\n{}", reply.to, quote.text, reply.text),
            None => println!("[{}] {}", reply.to, reply.text),
        }
        Ok(())
    }

    async fn disconnect(&self) -> TransportResult<()> {
        let mut state = self.state();
        state.connected = false;
        state.error_tx = None;
        Ok(())
    }

    async fn admin_test(&self) -> TransportResult<bool> {
        let state = self.state();
        Ok(state.connected && state.bundle.is_some())
    }

    async fn logout(&self) -> TransportResult<()> {
        let mut state = self.state();
        if state.bundle.take().is_none() {
            return Err(TransportError::Unauthorized("not paired".to_string()));
        }
        state.connected = false;
        Ok(())
    }

    fn take_events(&self) -> Option<TransportEvents> {
        let mut state = self.state();
        let input = state.input.take()?;
        let own_id = state
            .bundle
            .as_ref()
            .map(|b| ConversationId(b.wid.clone()))
            .unwrap_or_else(|| ConversationId::from("self@loopback"));

        let (message_tx, messages) = mpsc::unbounded_channel();
        let (error_tx, errors) = mpsc::unbounded_channel();
        state.error_tx = Some(error_tx.clone());

        let spawned = thread::Builder::new()
            .name("loopback-input".to_string())
            .spawn(move || {
                for (sequence, line) in input.lines().enumerate() {
                    let text = match line {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("loopback input failed: {}", e);
                            let _ = error_tx.send(TransportError::classify(&e.to_string()));
                            return;
                        }
                    };
                    let message = InboundMessage {
                        conversation: own_id.clone(),
                        from_me: true,
                        id: format!("LOOPBACK{:06}", sequence + 1),
                        text,
                        timestamp: now_secs(),
                        quoted_id: None,
                    };
                    if message_tx.send(message).is_err() {
                        return;
                    }
                }
                info!("loopback input closed");
            });

        if let Err(e) = spawned {
            warn!("failed to start loopback input reader: {}", e);
            return None;
        }

        Some(TransportEvents { messages, errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::pairing;

    fn transport(input: &'static [u8]) -> LoopbackTransport {
        LoopbackTransport::new("Tether", Box::new(io::Cursor::new(input)))
    }

    #[tokio::test]
    async fn test_pairing_issues_code_and_bundle() {
        let transport = transport(b"");
        let mut shown = None;

        let bundle = pairing::pair(&transport, |code| shown = Some(code))
            .await
            .unwrap();

        assert!(shown.unwrap().starts_with("2@"));
        assert!(bundle.client_id.starts_with("tether-"));
        assert_eq!(bundle.enc_key.len(), 32);
        assert_eq!(transport.own_id(), Some(ConversationId(bundle.wid.clone())));
        assert!(transport.admin_test().await.unwrap());
    }

    #[test]
    fn test_bundles_are_unique() {
        let a = generate_bundle("Tether");
        let b = generate_bundle("Tether");
        assert_ne!(a.client_token, b.client_token);
    }

    #[tokio::test]
    async fn test_restore_requires_bundle() {
        let transport = transport(b"");

        assert!(matches!(
            transport.restore().await,
            Err(TransportError::ConnectionFailed(_))
        ));

        transport
            .restore_with_bundle(generate_bundle("Tether"))
            .await
            .unwrap();
        transport.disconnect().await.unwrap();
        assert!(transport.own_id().is_none());

        transport.restore().await.unwrap();
        assert!(transport.own_id().is_some());
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let transport = transport(b"");
        let reply = OutboundReply::new(ConversationId::from("1@loopback"), "hi");

        assert_eq!(
            transport.send(reply.clone()).await,
            Err(TransportError::NotConnected)
        );

        transport
            .restore_with_bundle(generate_bundle("Tether"))
            .await
            .unwrap();
        assert!(transport.send(reply).await.is_ok());
    }

    #[tokio::test]
    async fn test_input_lines_become_own_messages() {
        let transport = transport(b"!bot ping\nhello\n");
        let bundle = transport
            .restore_with_bundle(generate_bundle("Tether"))
            .await
            .unwrap();

        let mut events = transport.take_events().unwrap();
        assert!(transport.take_events().is_none());

        let first = events.messages.recv().await.unwrap();
        assert_eq!(first.text, "!bot ping");
        assert_eq!(first.conversation, ConversationId(bundle.wid.clone()));
        assert!(first.from_me);

        let second = events.messages.recv().await.unwrap();
        assert_eq!(second.text, "hello");
        assert_ne!(first.id, second.id);

        assert!(events.messages.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_logout_forgets_bundle() {
        let transport = transport(b"");
        transport
            .restore_with_bundle(generate_bundle("Tether"))
            .await
            .unwrap();

        transport.logout().await.unwrap();

        assert!(!transport.admin_test().await.unwrap());
        assert!(matches!(
            transport.logout().await,
            Err(TransportError::Unauthorized(_))
        ));
    }
}
