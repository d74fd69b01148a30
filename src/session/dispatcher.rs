//! Message Dispatcher
//!
//! Turns inbound text messages into command executions. A message is
//! acted on only if, in order:
//! 1. test mode is off, or it arrived in the operator's own conversation
//! 2. its first token is the trigger tag and some text follows it
//! 3. it is not older than the session-start watermark
//!
//! Every resulting line is sent back as its own reply, quoting the
//! triggering message.

use super::context::Session;
use super::traits::*;
use crate::commands::{self, CommandRegistry, Execution};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Sent in place of (or ahead of) command output when execution fails
pub const FAILURE_NOTICE: &str = "Ouch, Got some error here while processing your request 🙈";

pub struct Dispatcher<T: Transport> {
    session: Arc<Session<T>>,
    registry: Arc<CommandRegistry>,
}

impl<T: Transport> Dispatcher<T> {
    pub fn new(session: Arc<Session<T>>, registry: Arc<CommandRegistry>) -> Self {
        Self { session, registry }
    }

    /// Handle one inbound message. Never fails; problems are logged.
    pub async fn handle(&self, message: InboundMessage) {
        let Some(command_line) = self.accept(&message) else {
            return;
        };

        info!(
            id = %message.id,
            conversation = %message.conversation,
            timestamp = message.timestamp,
            quoted = ?message.quoted_id,
            command = %command_line,
            "received command"
        );

        let args: Vec<String> = command_line.split_whitespace().map(String::from).collect();
        let execution = commands::execute(&self.registry, &args, 0).await;

        if let Some(err) = &execution.error {
            error!(id = %message.id, "command failed: {}", err);
        }

        for line in reply_lines(execution) {
            let reply = OutboundReply::new(message.conversation.clone(), line)
                .quoting(message.id.clone(), message.text.clone());

            if let Err(e) = self.send(reply).await {
                error!(conversation = %message.conversation, "failed to send reply: {}", e);
            }
        }
    }

    /// Command line to execute, if the message passes every filter
    fn accept<'m>(&self, message: &'m InboundMessage) -> Option<&'m str> {
        if self.session.settings().test_mode
            && self.session.own_id().as_ref() != Some(&message.conversation)
        {
            debug!(conversation = %message.conversation, "test mode: ignoring foreign conversation");
            return None;
        }

        let (tag, rest) = message.text.trim().split_once(' ')?;
        if tag != self.session.settings().tag {
            return None;
        }

        if message.timestamp < self.session.started_at() {
            debug!(id = %message.id, timestamp = message.timestamp, "ignoring backlog message");
            return None;
        }

        Some(rest.trim())
    }

    /// Send after the reply's delay. A send timeout counts as delivered.
    async fn send(&self, reply: OutboundReply) -> TransportResult<()> {
        let transport = self.session.transport().ok_or(TransportError::NotConnected)?;

        if reply.delay > Duration::ZERO {
            tokio::time::sleep(reply.delay).await;
        }

        match transport.send(reply).await {
            Err(TransportError::Timeout(e)) => {
                debug!("send timed out, assuming delivered: {}", e);
                Ok(())
            }
            other => other,
        }
    }
}

/// Lines to send for an execution; failures get the notice up front
fn reply_lines(execution: Execution) -> Vec<String> {
    let mut lines = execution.lines;
    if execution.error.is_some() {
        match lines.first_mut() {
            None => lines.push(FAILURE_NOTICE.to_string()),
            Some(first) => *first = format!("{}\n{}", FAILURE_NOTICE, first),
        }
    }
    lines
}
