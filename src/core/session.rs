//! The chat session: the single source of truth for the interactive surface.
//!
//! The log is append-only with one mutable slot. The sentinel placeholder,
//! when present, is always the last message, and it is the only message that
//! [`ChatSession::replace`] accepts. Loading state is derived from the
//! sentinel's presence rather than stored separately, so the two can never
//! disagree.

use crate::core::catalog::ModelId;
use crate::core::message::{Message, MessageId, Role};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("an assistant reply is already streaming")]
    ExchangeInFlight,
    #[error("message {0} is sealed and cannot be replaced")]
    Sealed(MessageId),
    #[error("no message with id {0}")]
    NotFound(MessageId),
    #[error("the model cannot be changed while a reply is streaming")]
    ModelLocked,
}

#[derive(Debug, Clone)]
pub struct ChatSession {
    messages: Vec<Message>,
    model: ModelId,
    pending_input: String,
    next_id: u64,
}

impl ChatSession {
    pub fn new(model: ModelId) -> Self {
        Self {
            messages: Vec::new(),
            model,
            pending_input: String::new(),
            next_id: 1,
        }
    }

    /// Start a session whose log opens with a sealed system message.
    pub fn with_system_prompt(model: ModelId, prompt: &str) -> Self {
        let mut session = Self::new(model);
        let prompt = prompt.trim();
        if !prompt.is_empty() {
            let id = session.allocate_id();
            session
                .messages
                .push(Message::new(id, Role::System, prompt.to_string()));
        }
        session
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn model(&self) -> ModelId {
        self.model
    }

    pub fn loading(&self) -> bool {
        self.sentinel().is_some()
    }

    pub fn sentinel(&self) -> Option<&Message> {
        self.messages.last().filter(|message| message.is_sentinel())
    }

    pub fn pending_input(&self) -> &str {
        &self.pending_input
    }

    pub fn set_pending_input(&mut self, input: impl Into<String>) {
        self.pending_input = input.into();
    }

    pub fn clear_pending_input(&mut self) {
        self.pending_input.clear();
    }

    pub fn set_model(&mut self, model: ModelId) -> Result<(), SessionError> {
        if self.loading() {
            return Err(SessionError::ModelLocked);
        }
        debug!(from = %self.model, to = %model, "Model changed");
        self.model = model;
        Ok(())
    }

    /// Reserve the next permanent message id.
    ///
    /// Ids come from a per-session counter, so two finalizations in quick
    /// succession can never collide.
    pub fn allocate_id(&mut self) -> MessageId {
        let id = MessageId::Sealed(self.next_id);
        self.next_id += 1;
        id
    }

    /// Append a message to the end of the log.
    ///
    /// Nothing may be appended behind an in-flight sentinel, which also rules
    /// out a second sentinel.
    pub fn append(&mut self, message: Message) -> Result<(), SessionError> {
        if self.loading() {
            return Err(SessionError::ExchangeInFlight);
        }
        self.messages.push(message);
        Ok(())
    }

    /// Replace the message holding `id`. Only the sentinel is replaceable.
    pub fn replace(&mut self, id: MessageId, message: Message) -> Result<(), SessionError> {
        let slot = self
            .messages
            .iter_mut()
            .rev()
            .find(|existing| existing.id == id)
            .ok_or(SessionError::NotFound(id))?;
        if !slot.is_sentinel() {
            return Err(SessionError::Sealed(id));
        }
        *slot = message;
        Ok(())
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new(ModelId::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(id: &str) -> ModelId {
        ModelId::parse(id).expect("catalog model")
    }

    #[test]
    fn loading_tracks_sentinel_presence() {
        let mut session = ChatSession::default();
        assert!(!session.loading());
        let id = session.allocate_id();
        session
            .append(Message::new(id, Role::User, "hi"))
            .expect("append user");
        session.append(Message::sentinel()).expect("append sentinel");
        assert!(session.loading());

        let sealed = session.allocate_id();
        session
            .replace(
                MessageId::Sentinel,
                Message::new(sealed, Role::Assistant, "done"),
            )
            .expect("seal");
        assert!(!session.loading());
        assert_eq!(session.messages().last().map(|m| m.id), Some(sealed));
    }

    #[test]
    fn second_sentinel_is_rejected() {
        let mut session = ChatSession::default();
        session.append(Message::sentinel()).expect("first");
        assert_eq!(
            session.append(Message::sentinel()),
            Err(SessionError::ExchangeInFlight)
        );
        assert_eq!(session.messages().len(), 1);
    }

    #[test]
    fn sealed_messages_are_immutable() {
        let mut session = ChatSession::default();
        let id = session.allocate_id();
        session
            .append(Message::new(id, Role::User, "original"))
            .expect("append");
        let result = session.replace(id, Message::new(id, Role::User, "changed"));
        assert_eq!(result, Err(SessionError::Sealed(id)));
        assert_eq!(session.messages()[0].content, "original");
    }

    #[test]
    fn replacing_missing_ids_reports_not_found() {
        let mut session = ChatSession::default();
        assert_eq!(
            session.replace(MessageId::Sentinel, Message::sentinel()),
            Err(SessionError::NotFound(MessageId::Sentinel))
        );
    }

    #[test]
    fn model_switch_is_locked_while_loading() {
        let mut session = ChatSession::default();
        session.set_model(model("gpt-4")).expect("idle switch");
        session.append(Message::sentinel()).expect("sentinel");
        assert_eq!(
            session.set_model(model("claude-2")),
            Err(SessionError::ModelLocked)
        );
        assert_eq!(session.model().as_str(), "gpt-4");
    }

    #[test]
    fn allocated_ids_are_strictly_increasing() {
        let mut session = ChatSession::default();
        let ids: Vec<_> = (0..100).map(|_| session.allocate_id()).collect();
        assert!(ids.windows(2).all(|pair| match (pair[0], pair[1]) {
            (MessageId::Sealed(a), MessageId::Sealed(b)) => a < b,
            _ => false,
        }));
    }

    #[test]
    fn system_prompt_is_sealed_first_message() {
        let session = ChatSession::with_system_prompt(ModelId::default(), "  Be brief.  ");
        assert_eq!(session.messages().len(), 1);
        assert_eq!(session.messages()[0].role, Role::System);
        assert_eq!(session.messages()[0].content, "Be brief.");
        assert!(!session.messages()[0].is_sentinel());

        let empty = ChatSession::with_system_prompt(ModelId::default(), "   ");
        assert!(empty.messages().is_empty());
    }
}
