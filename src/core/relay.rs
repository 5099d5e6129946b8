//! Relay between the transport and the backend HTTP endpoint.
//!
//! Every request event becomes one POST whose streamed body is re-emitted as
//! `Chunk` events, followed by exactly one terminal event. The terminal is
//! chosen from the single result of [`ProxyRelay::exchange`], so `End` can
//! never follow an `Error` and no request produces two terminals.

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::events::{OutboundEvent, ProtocolEvent, RelayFailure};
use crate::api::RequestEnvelope;
use crate::core::credentials::CredentialSource;
use crate::core::decoder::Utf8StreamDecoder;
use crate::core::transport::{RelayEmitter, RelayTransport};

enum ExchangeError {
    Failed(RelayFailure),
    /// The surface end is gone; nobody is left to tell.
    SurfaceGone,
}

impl From<RelayFailure> for ExchangeError {
    fn from(failure: RelayFailure) -> Self {
        ExchangeError::Failed(failure)
    }
}

pub struct ProxyRelay {
    client: reqwest::Client,
    endpoint: String,
    credentials: Arc<dyn CredentialSource>,
}

impl ProxyRelay {
    pub fn new(
        endpoint: impl Into<String>,
        credentials: Arc<dyn CredentialSource>,
        request_timeout: Option<Duration>,
    ) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self::with_client(builder.build()?, endpoint, credentials))
    }

    pub fn with_client(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            credentials,
        }
    }

    /// Serve requests until the surface end closes or `shutdown` fires.
    ///
    /// In-flight exchanges are cancelled on the way out, which drops their
    /// outbound connections whether or not a terminal event was sent.
    pub async fn run(self, mut transport: RelayTransport, shutdown: CancellationToken) {
        let relay = Arc::new(self);
        let exchanges = shutdown.child_token();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Relay shutdown requested");
                    break;
                }
                request = transport.recv_request() => match request {
                    Some(OutboundEvent::ChatRequest(envelope)) => {
                        relay.spawn_exchange(envelope, transport.emitter(), exchanges.child_token());
                    }
                    None => {
                        debug!("Surface transport closed");
                        break;
                    }
                },
            }
        }
        exchanges.cancel();
    }

    pub fn spawn_exchange(
        self: &Arc<Self>,
        envelope: RequestEnvelope,
        emitter: RelayEmitter,
        cancel_token: CancellationToken,
    ) -> JoinHandle<()> {
        let relay = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                outcome = relay.exchange(envelope, &emitter) => {
                    let terminal = match outcome {
                        Ok(()) => ProtocolEvent::End,
                        Err(ExchangeError::Failed(failure)) => {
                            warn!(kind = %failure.kind, error = %failure.message, "Relay exchange failed");
                            ProtocolEvent::Error(failure)
                        }
                        Err(ExchangeError::SurfaceGone) => {
                            debug!("Surface gone mid-stream, abandoning exchange");
                            return;
                        }
                    };
                    if emitter.emit(terminal).is_err() {
                        debug!("Surface gone before terminal event");
                    }
                }
                _ = cancel_token.cancelled() => {
                    debug!("Relay exchange cancelled");
                }
            }
        })
    }

    async fn exchange(
        &self,
        envelope: RequestEnvelope,
        emitter: &RelayEmitter,
    ) -> Result<(), ExchangeError> {
        // Keyring lookups block on platform IPC.
        let credentials = Arc::clone(&self.credentials);
        let token = tokio::task::spawn_blocking(move || credentials.bearer_token())
            .await
            .map_err(|err| RelayFailure::credential(format!("credential lookup aborted: {err}")))?
            .map_err(|err| RelayFailure::credential(err.to_string()))?;

        debug!(
            endpoint = %self.endpoint,
            model = %envelope.model,
            messages = envelope.messages.len(),
            "Relaying chat request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(token)
            .json(&envelope)
            .send()
            .await
            .map_err(|err| RelayFailure::network(describe_error(&err)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(RelayFailure::http(status.as_u16(), &body).into());
        }
        debug!(status = status.as_u16(), "Backend accepted request, streaming");

        let mut stream = response.bytes_stream();
        let mut decoder = Utf8StreamDecoder::new();
        while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|err| RelayFailure::network(describe_error(&err)))?;
            emit_text(emitter, decoder.decode(&bytes))?;
        }
        if let Some(tail) = decoder.finish() {
            emit_text(emitter, tail)?;
        }
        Ok(())
    }
}

fn emit_text(emitter: &RelayEmitter, text: String) -> Result<(), ExchangeError> {
    if text.is_empty() {
        return Ok(());
    }
    emitter
        .emit(ProtocolEvent::Chunk(text))
        .map_err(|_| ExchangeError::SurfaceGone)
}

/// Flatten an error and its sources into one line.
fn describe_error(err: &(dyn StdError + 'static)) -> String {
    let mut description = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !description.contains(&text) {
            description.push_str(": ");
            description.push_str(&text);
        }
        source = cause.source();
    }
    description
}
