//! Transport Trait Abstractions
//!
//! The chat protocol itself (wire encoding, encryption, version negotiation)
//! lives behind `Transport`. Everything in this crate talks to the remote
//! service through these traits, which lets `MockTransport` stand in for the
//! real connection in tests.

use async_trait::async_trait;
use futures::channel::oneshot;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Conversation identifier (a direct chat or a group)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Authenticated identity produced by pairing.
///
/// Opaque to this crate: it is stored and handed back to the transport
/// verbatim. Secret material is wiped when the bundle is dropped.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct CredentialBundle {
    /// Client identifier registered with the service
    pub client_id: String,
    pub client_token: String,
    pub server_token: String,
    /// Own conversation identifier on the service
    pub wid: String,
    pub enc_key: Vec<u8>,
    pub mac_key: Vec<u8>,
}

impl CredentialBundle {
    /// Short, non-reversible identifier for logs
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.client_id.as_bytes());
        hex::encode(&digest[..8])
    }
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("fingerprint", &self.fingerprint())
            .field("wid", &self.wid)
            .finish_non_exhaustive()
    }
}

/// Incoming text message
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub conversation: ConversationId,
    /// Sent by the paired account itself (e.g. from the phone)
    pub from_me: bool,
    pub id: String,
    pub text: String,
    /// Epoch seconds
    pub timestamp: u64,
    pub quoted_id: Option<String>,
}

/// Message being quoted by a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub id: String,
    pub text: String,
}

/// Outgoing text reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundReply {
    pub to: ConversationId,
    pub text: String,
    pub quote: Option<Quote>,
    /// Cooperative wait applied before the send
    pub delay: Duration,
}

impl OutboundReply {
    pub fn new(to: ConversationId, text: impl Into<String>) -> Self {
        Self {
            to,
            text: text.into(),
            quote: None,
            delay: Duration::ZERO,
        }
    }

    pub fn quoting(mut self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.quote = Some(Quote {
            id: id.into(),
            text: text.into(),
        });
        self
    }
}

/// The two independent event streams a connected transport delivers.
///
/// Can be taken once per transport handle.
pub struct TransportEvents {
    pub messages: UnboundedReceiver<InboundMessage>,
    pub errors: UnboundedReceiver<TransportError>,
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Transport errors, classified by kind.
///
/// Adapters must map their native failures onto these variants; callers
/// match on the variant and never on the message text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection dropped unexpectedly; drives the reconnect policy
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Remote side shut the connection down as part of a normal close
    #[error("remote closed connection: {0}")]
    RemoteClosed(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("connection is not valid")]
    NotConnected,
}

impl TransportError {
    /// Map free-form error text from an underlying library onto a kind.
    pub fn classify(text: &str) -> Self {
        let lower = text.to_lowercase();
        if lower.contains("server closed connection") {
            TransportError::RemoteClosed(text.to_string())
        } else if lower.contains("timed out") {
            TransportError::Timeout(text.to_string())
        } else if lower.contains("connection") && (lower.contains("closed") || lower.contains("reset")) {
            TransportError::ConnectionFailed(text.to_string())
        } else {
            TransportError::Protocol(text.to_string())
        }
    }
}

/// Opaque chat-protocol connection.
///
/// Handles are cheap to clone and share one underlying connection, so the
/// manager, dispatcher and reconnect policy can each hold a copy.
#[async_trait]
pub trait Transport: Clone + Send + Sync + 'static {
    /// Protocol version negotiated with the service
    fn version(&self) -> String;

    /// Own conversation identifier, known once authenticated
    fn own_id(&self) -> Option<ConversationId>;

    /// Pair a new session.
    ///
    /// Sends the pairing code through `code` as soon as the service issues it,
    /// then resolves once the code has been scanned.
    async fn login(&self, code: oneshot::Sender<String>) -> TransportResult<CredentialBundle>;

    /// Resume a session from a stored bundle; returns the (possibly refreshed) bundle
    async fn restore_with_bundle(&self, bundle: CredentialBundle)
        -> TransportResult<CredentialBundle>;

    /// Re-establish the connection in place with the handle's current state
    async fn restore(&self) -> TransportResult<()>;

    async fn send(&self, reply: OutboundReply) -> TransportResult<()>;

    async fn disconnect(&self) -> TransportResult<()>;

    /// Liveness check; `Ok(false)` means the service answered but the
    /// paired phone did not
    async fn admin_test(&self) -> TransportResult<bool>;

    /// Revoke the session on the service side
    async fn logout(&self) -> TransportResult<()>;

    /// Take the inbound message and error streams
    fn take_events(&self) -> Option<TransportEvents>;
}

/// Builds transport handles.
#[async_trait]
pub trait Connector: Send + Sync {
    type Transport: Transport;

    async fn connect(&self, timeout: Duration) -> TransportResult<Self::Transport>;
}
