use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn is_assistant(self) -> bool {
        self == Role::Assistant
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(format!("invalid message role: {value}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

const SENTINEL_ID: &str = "pending";

/// Identity of a message in the session log.
///
/// `Sentinel` is reserved for the single in-flight assistant placeholder.
/// Every other message carries a `Sealed` id drawn from the session's
/// monotonic counter and never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MessageId {
    Sentinel,
    Sealed(u64),
}

impl MessageId {
    pub fn is_sentinel(self) -> bool {
        self == MessageId::Sentinel
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Sentinel => f.write_str(SENTINEL_ID),
            MessageId::Sealed(n) => write!(f, "m{n}"),
        }
    }
}

impl TryFrom<&str> for MessageId {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if value == SENTINEL_ID {
            return Ok(MessageId::Sentinel);
        }
        value
            .strip_prefix('m')
            .and_then(|digits| digits.parse::<u64>().ok())
            .map(MessageId::Sealed)
            .ok_or_else(|| format!("invalid message id: {value}"))
    }
}

impl TryFrom<String> for MessageId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<MessageId> for String {
    fn from(value: MessageId) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(id: MessageId, role: Role, content: impl Into<String>) -> Self {
        Self {
            id,
            role,
            content: content.into(),
        }
    }

    /// Empty assistant placeholder for a reply that is still streaming.
    pub fn sentinel() -> Self {
        Self::new(MessageId::Sentinel, Role::Assistant, String::new())
    }

    pub fn is_sentinel(&self) -> bool {
        self.id.is_sentinel()
    }

    pub fn is_assistant(&self) -> bool {
        self.role.is_assistant()
    }
}
