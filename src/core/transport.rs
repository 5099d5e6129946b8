//! Ordered, bidirectional event channel between the interactive surface and
//! the relay.
//!
//! Both directions carry JSON text, so the two contexts share nothing but
//! serialized events. Each direction is an unbounded `mpsc` channel and keeps
//! per-direction ordering. There are no acknowledgements.

use tokio::sync::mpsc;
use tracing::warn;

use crate::api::events::{self, OutboundEvent, ProtocolEvent};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("transport peer is gone")]
    Closed,
    #[error("event could not be encoded: {0}")]
    Encode(String),
}

pub struct Transport;

impl Transport {
    /// Build both ends of the channel.
    ///
    /// Call once at startup and hand the surface end to the interactive
    /// surface and the relay end to the relay.
    pub fn pair() -> (SurfaceTransport, RelayTransport) {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            SurfaceTransport {
                requests: request_tx,
                events: event_rx,
            },
            RelayTransport {
                requests: request_rx,
                events: RelayEmitter { tx: event_tx },
            },
        )
    }
}

/// Surface end: sends requests, receives protocol events.
pub struct SurfaceTransport {
    requests: mpsc::UnboundedSender<String>,
    events: mpsc::UnboundedReceiver<String>,
}

impl SurfaceTransport {
    pub fn is_available(&self) -> bool {
        !self.requests.is_closed()
    }

    pub fn send(&self, event: &OutboundEvent) -> Result<(), TransportError> {
        if !self.is_available() {
            return Err(TransportError::Closed);
        }
        let raw = events::encode(event).map_err(|err| TransportError::Encode(err.to_string()))?;
        self.requests
            .send(raw)
            .map_err(|_| TransportError::Closed)
    }

    /// Next raw inbound event, or `None` once the relay end is dropped and
    /// the queue is drained.
    pub async fn recv(&mut self) -> Option<String> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<String> {
        self.events.try_recv().ok()
    }
}

/// Relay end: receives requests, emits protocol events.
pub struct RelayTransport {
    requests: mpsc::UnboundedReceiver<String>,
    events: RelayEmitter,
}

impl RelayTransport {
    /// Next decodable request. Undecodable requests are logged and skipped.
    /// Returns `None` when the surface end has been dropped.
    pub async fn recv_request(&mut self) -> Option<OutboundEvent> {
        loop {
            let raw = self.requests.recv().await?;
            match events::decode::<OutboundEvent>(&raw) {
                Ok(event) => return Some(event),
                Err(err) => warn!(error = %err, "Dropping undecodable request event"),
            }
        }
    }

    pub fn emitter(&self) -> RelayEmitter {
        self.events.clone()
    }
}

/// Cloneable sender half used by in-flight exchanges.
#[derive(Clone)]
pub struct RelayEmitter {
    tx: mpsc::UnboundedSender<String>,
}

impl RelayEmitter {
    pub fn emit(&self, event: ProtocolEvent) -> Result<(), TransportError> {
        let raw = events::encode(&event).map_err(|err| TransportError::Encode(err.to_string()))?;
        self.tx.send(raw).map_err(|_| TransportError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RequestEnvelope;

    fn request() -> OutboundEvent {
        OutboundEvent::ChatRequest(RequestEnvelope {
            messages: Vec::new(),
            model: "gpt-4".into(),
        })
    }

    #[tokio::test]
    async fn requests_and_events_cross_in_order() {
        let (mut surface, mut relay) = Transport::pair();
        surface.send(&request()).expect("send");
        assert_eq!(relay.recv_request().await, Some(request()));

        let emitter = relay.emitter();
        emitter.emit(ProtocolEvent::Chunk("a".into())).expect("a");
        emitter.emit(ProtocolEvent::Chunk("b".into())).expect("b");
        emitter.emit(ProtocolEvent::End).expect("end");

        let received: Vec<ProtocolEvent> = [
            surface.recv().await,
            surface.recv().await,
            surface.recv().await,
        ]
        .into_iter()
        .map(|raw| events::decode(&raw.expect("event")).expect("decode"))
        .collect();
        assert_eq!(
            received,
            vec![
                ProtocolEvent::Chunk("a".into()),
                ProtocolEvent::Chunk("b".into()),
                ProtocolEvent::End
            ]
        );
    }

    #[tokio::test]
    async fn dropped_relay_makes_surface_unavailable() {
        let (surface, relay) = Transport::pair();
        assert!(surface.is_available());
        drop(relay);
        assert!(!surface.is_available());
        assert_eq!(surface.send(&request()), Err(TransportError::Closed));
    }

    #[tokio::test]
    async fn undecodable_requests_are_skipped() {
        let (surface, mut relay) = Transport::pair();
        surface.requests.send("{\"type\":\"bogus\"}".into()).expect("raw");
        surface.send(&request()).expect("send");
        assert_eq!(relay.recv_request().await, Some(request()));
    }

    #[tokio::test]
    async fn dropped_surface_closes_the_relay_side() {
        let (surface, mut relay) = Transport::pair();
        let emitter = relay.emitter();
        drop(surface);
        assert!(emitter.is_closed());
        assert_eq!(
            emitter.emit(ProtocolEvent::End),
            Err(TransportError::Closed)
        );
        assert_eq!(relay.recv_request().await, None);
    }
}
