//! Single-threaded driver for the interactive surface.
//!
//! Each user action and each inbound event is handled by one call that runs
//! to completion before the next, so the assembler's read-modify-write on the
//! sentinel never interleaves with a dispatch.

use tracing::warn;

use crate::api::events::{self, ProtocolEvent};
use crate::api::RequestEnvelope;
use crate::core::assembler::{AssembleOutcome, DropReason, InboundStreamAssembler};
use crate::core::catalog::{ModelId, UnknownModel};
use crate::core::dispatcher::{DispatchRejected, OutboundDispatcher};
use crate::core::session::{ChatSession, SessionError};
use crate::core::transport::SurfaceTransport;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAction {
    EditInput(String),
    Submit,
    SelectModel(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelSelectError {
    #[error(transparent)]
    Unknown(#[from] UnknownModel),
    #[error(transparent)]
    Locked(#[from] SessionError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    InputUpdated,
    Dispatched(RequestEnvelope),
    Rejected(DispatchRejected),
    ModelChanged(ModelId),
    ModelRejected(ModelSelectError),
}

pub struct ChatSurface {
    session: ChatSession,
    transport: SurfaceTransport,
    assembler: InboundStreamAssembler,
}

impl ChatSurface {
    pub fn new(session: ChatSession, transport: SurfaceTransport) -> Self {
        Self {
            session,
            transport,
            assembler: InboundStreamAssembler::new(),
        }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn handle_action(&mut self, action: UserAction) -> ActionOutcome {
        match action {
            UserAction::EditInput(text) => {
                self.session.set_pending_input(text);
                ActionOutcome::InputUpdated
            }
            UserAction::Submit => {
                let input = self.session.pending_input().to_string();
                match OutboundDispatcher::new(&self.transport).dispatch(&mut self.session, &input)
                {
                    Ok(envelope) => ActionOutcome::Dispatched(envelope),
                    Err(rejected) => ActionOutcome::Rejected(rejected),
                }
            }
            UserAction::SelectModel(id) => match self.select_model(&id) {
                Ok(model) => ActionOutcome::ModelChanged(model),
                Err(err) => ActionOutcome::ModelRejected(err),
            },
        }
    }

    fn select_model(&mut self, id: &str) -> Result<ModelId, ModelSelectError> {
        let model = ModelId::parse(id)?;
        self.session.set_model(model)?;
        Ok(model)
    }

    /// Decode and apply one raw inbound event. Undecodable events are
    /// protocol violations and are dropped.
    pub fn handle_inbound(&mut self, raw: &str) -> AssembleOutcome {
        match events::decode::<ProtocolEvent>(raw) {
            Ok(event) => self.assembler.apply(&mut self.session, event),
            Err(err) => {
                warn!(error = %err, "Dropping undecodable inbound event");
                AssembleOutcome::Dropped(DropReason::Undecodable)
            }
        }
    }

    pub async fn recv_inbound(&mut self) -> Option<String> {
        self.transport.recv().await
    }
}
