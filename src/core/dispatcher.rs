//! Turns a submitted prompt into one request event and primes the session.

use tracing::debug;

use crate::api::events::OutboundEvent;
use crate::api::RequestEnvelope;
use crate::core::message::{Message, Role};
use crate::core::session::ChatSession;
use crate::core::transport::SurfaceTransport;

/// Reasons a dispatch was a no-op. None of them change the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DispatchRejected {
    #[error("input is empty")]
    EmptyInput,
    #[error("a reply is still streaming")]
    Busy,
    #[error("transport is not available")]
    TransportUnavailable,
}

pub struct OutboundDispatcher<'t> {
    transport: &'t SurfaceTransport,
}

impl<'t> OutboundDispatcher<'t> {
    pub fn new(transport: &'t SurfaceTransport) -> Self {
        Self { transport }
    }

    /// Send `input` as the next user turn.
    ///
    /// The request is sent before the session is touched, so every rejection,
    /// a failed send included, leaves the log, flags and pending input as
    /// they were.
    pub fn dispatch(
        &self,
        session: &mut ChatSession,
        input: &str,
    ) -> Result<RequestEnvelope, DispatchRejected> {
        if input.trim().is_empty() {
            return Err(DispatchRejected::EmptyInput);
        }
        if session.loading() {
            return Err(DispatchRejected::Busy);
        }
        if !self.transport.is_available() {
            return Err(DispatchRejected::TransportUnavailable);
        }

        let mut staged = session.clone();
        let user_id = staged.allocate_id();
        let user_message = Message::new(user_id, Role::User, input.to_string());
        let mut messages = staged.messages().to_vec();
        messages.push(user_message.clone());
        let envelope = RequestEnvelope {
            messages,
            model: staged.model().as_str().to_string(),
        };

        self.transport
            .send(&OutboundEvent::ChatRequest(envelope.clone()))
            .map_err(|err| {
                debug!(error = %err, "Dispatch send failed");
                DispatchRejected::TransportUnavailable
            })?;

        staged
            .append(user_message)
            .and_then(|()| staged.append(Message::sentinel()))
            .map_err(|_| DispatchRejected::Busy)?;
        staged.clear_pending_input();
        *session = staged;

        debug!(
            model = %envelope.model,
            messages = envelope.messages.len(),
            "Dispatched chat request"
        );
        Ok(envelope)
    }
}
