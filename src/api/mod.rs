//! Wire payloads: the backend HTTP body and the events exchanged over the
//! transport between the interactive surface and the relay.

use serde::{Deserialize, Serialize};

use crate::core::message::Message;

pub mod events;

/// Request body sent to the relay and forwarded verbatim to the backend.
///
/// `messages` never contains the in-flight sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub messages: Vec<Message>,
    pub model: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::{MessageId, Role};

    #[test]
    fn envelope_serializes_as_backend_body() {
        let envelope = RequestEnvelope {
            messages: vec![
                Message::new(MessageId::Sealed(1), Role::System, "Be helpful."),
                Message::new(MessageId::Sealed(2), Role::User, "Hi"),
            ],
            model: "gpt-4".into(),
        };
        let json = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "messages": [
                    {"id": "m1", "role": "system", "content": "Be helpful."},
                    {"id": "m2", "role": "user", "content": "Hi"}
                ],
                "model": "gpt-4"
            })
        );
    }
}
