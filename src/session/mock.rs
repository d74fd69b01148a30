//! Mock Transport for Testing
//!
//! In-memory `Transport` that records every call and lets tests script
//! failures and inject inbound events.

use super::traits::*;
use async_trait::async_trait;
use futures::channel::oneshot;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};

/// Pairing code handed out by `MockTransport::login`
pub const MOCK_PAIRING_CODE: &str = "2@mock-pairing-code";

/// Transport operations, as recorded by the mock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Login,
    RestoreWithBundle,
    Restore,
    Send,
    Disconnect,
    AdminTest,
    Logout,
}

/// Mock transport for testing
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

struct MockState {
    calls: Vec<Call>,
    sent: Vec<OutboundReply>,
    bundle: CredentialBundle,
    own_id: ConversationId,
    authenticated: bool,
    login_error: Option<TransportError>,
    restore_error: Option<TransportError>,
    logout_error: Option<TransportError>,
    ping: Result<bool, TransportError>,
    send_errors: VecDeque<TransportError>,
    message_tx: UnboundedSender<InboundMessage>,
    error_tx: UnboundedSender<TransportError>,
    events: Option<TransportEvents>,
}

impl MockTransport {
    /// Create new mock transport whose account owns `own_id`
    pub fn new(own_id: impl Into<String>) -> Self {
        let own_id = own_id.into();
        let (message_tx, messages) = mpsc::unbounded_channel();
        let (error_tx, errors) = mpsc::unbounded_channel();

        Self {
            state: Arc::new(Mutex::new(MockState {
                calls: Vec::new(),
                sent: Vec::new(),
                bundle: Self::sample_bundle(&own_id),
                own_id: ConversationId(own_id),
                authenticated: false,
                login_error: None,
                restore_error: None,
                logout_error: None,
                ping: Ok(true),
                send_errors: VecDeque::new(),
                message_tx,
                error_tx,
                events: Some(TransportEvents { messages, errors }),
            })),
        }
    }

    /// Bundle the mock produces on login
    pub fn sample_bundle(own_id: &str) -> CredentialBundle {
        CredentialBundle {
            client_id: "mock-client".to_string(),
            client_token: "mock-client-token".to_string(),
            server_token: "mock-server-token".to_string(),
            wid: own_id.to_string(),
            enc_key: vec![0x11; 32],
            mac_key: vec![0x22; 32],
        }
    }

    pub fn fail_login(&self, err: TransportError) {
        self.state.lock().unwrap().login_error = Some(err);
    }

    /// Fail both bundle and in-place restores
    pub fn fail_restore(&self, err: TransportError) {
        self.state.lock().unwrap().restore_error = Some(err);
    }

    pub fn fail_logout(&self, err: TransportError) {
        self.state.lock().unwrap().logout_error = Some(err);
    }

    pub fn set_ping(&self, outcome: Result<bool, TransportError>) {
        self.state.lock().unwrap().ping = outcome;
    }

    /// Fail the next send with `err`; queued failures are consumed in order
    pub fn fail_next_send(&self, err: TransportError) {
        self.state.lock().unwrap().send_errors.push_back(err);
    }

    /// Replace the bundle returned by login / restore
    pub fn set_bundle(&self, bundle: CredentialBundle) {
        self.state.lock().unwrap().bundle = bundle;
    }

    /// Deliver an inbound message on the message stream
    pub fn emit_message(&self, message: InboundMessage) {
        let _ = self.state.lock().unwrap().message_tx.send(message);
    }

    /// Deliver an error on the error stream
    pub fn emit_error(&self, err: TransportError) {
        let _ = self.state.lock().unwrap().error_tx.send(err);
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of times `call` was made
    pub fn call_count(&self, call: Call) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| **c == call)
            .count()
    }

    /// Replies accepted by `send`, for assertions
    pub fn sent(&self) -> Vec<OutboundReply> {
        self.state.lock().unwrap().sent.clone()
    }

    fn record(&self, call: Call) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn version(&self) -> String {
        "mock 2.2142.12".to_string()
    }

    fn own_id(&self) -> Option<ConversationId> {
        let state = self.state.lock().unwrap();
        state.authenticated.then(|| state.own_id.clone())
    }

    async fn login(&self, code: oneshot::Sender<String>) -> TransportResult<CredentialBundle> {
        self.record(Call::Login);

        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.login_error.clone() {
            // Service never issued a code; dropping the sender cancels the display
            return Err(err);
        }

        code.send(MOCK_PAIRING_CODE.to_string())
            .map_err(|_| TransportError::Protocol("pairing code receiver dropped".to_string()))?;

        state.authenticated = true;
        Ok(state.bundle.clone())
    }

    async fn restore_with_bundle(
        &self,
        bundle: CredentialBundle,
    ) -> TransportResult<CredentialBundle> {
        self.record(Call::RestoreWithBundle);

        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.restore_error.clone() {
            return Err(err);
        }

        state.bundle = bundle;
        state.authenticated = true;
        Ok(state.bundle.clone())
    }

    async fn restore(&self) -> TransportResult<()> {
        self.record(Call::Restore);

        let state = self.state.lock().unwrap();
        match state.restore_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn send(&self, reply: OutboundReply) -> TransportResult<()> {
        self.record(Call::Send);

        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.send_errors.pop_front() {
            return Err(err);
        }

        state.sent.push(reply);
        Ok(())
    }

    async fn disconnect(&self) -> TransportResult<()> {
        self.record(Call::Disconnect);
        Ok(())
    }

    async fn admin_test(&self) -> TransportResult<bool> {
        self.record(Call::AdminTest);
        self.state.lock().unwrap().ping.clone()
    }

    async fn logout(&self) -> TransportResult<()> {
        self.record(Call::Logout);

        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.logout_error.clone() {
            return Err(err);
        }

        state.authenticated = false;
        Ok(())
    }

    fn take_events(&self) -> Option<TransportEvents> {
        self.state.lock().unwrap().events.take()
    }
}

/// Connector that hands out clones of one `MockTransport`
pub struct MockConnector {
    transport: MockTransport,
    error: Option<TransportError>,
    timeouts: Arc<Mutex<Vec<Duration>>>,
}

impl MockConnector {
    pub fn new(transport: MockTransport) -> Self {
        Self {
            transport,
            error: None,
            timeouts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Connector whose `connect` always fails with `err`
    pub fn failing(err: TransportError) -> Self {
        Self {
            transport: MockTransport::new("unused@mock"),
            error: Some(err),
            timeouts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Timeouts passed to `connect`, in order
    pub fn timeouts(&self) -> Vec<Duration> {
        self.timeouts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self, timeout: Duration) -> TransportResult<MockTransport> {
        self.timeouts.lock().unwrap().push(timeout);
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(self.transport.clone()),
        }
    }
}
