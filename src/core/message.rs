use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a transcript turn. The backend only knows these two roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    User,
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }

    pub fn is_user(self) -> bool {
        self == Role::User
    }

    pub fn is_model(self) -> bool {
        self == Role::Model
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for Role {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Role::User),
            "model" => Ok(Role::Model),
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

static LAST_ID: AtomicU64 = AtomicU64::new(0);

/// Returns a process-wide id that is strictly greater than every id handed
/// out before it. Ids start from the wall clock in milliseconds so they sort
/// roughly by creation time.
pub(crate) fn next_id() -> u64 {
    let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
    let mut last = LAST_ID.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST_ID.compare_exchange_weak(last, candidate, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => return candidate,
            Err(actual) => last = actual,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(u64);

impl MessageId {
    pub fn next() -> Self {
        Self(next_id())
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One turn of a conversation.
///
/// Fields are read through accessors. The role is fixed at construction and
/// content can only be replaced by the session store while the message is
/// still streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: MessageId,
    role: Role,
    content: String,
    is_streaming: bool,
    timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::next(),
            role,
            content: content.into(),
            is_streaming: false,
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self::new(Role::Model, content)
    }

    /// Empty model turn that is filled in as the backend streams text.
    pub fn model_placeholder() -> Self {
        Self {
            is_streaming: true,
            ..Self::new(Role::Model, String::new())
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn is_user(&self) -> bool {
        self.role.is_user()
    }

    pub fn is_model(&self) -> bool {
        self.role.is_model()
    }

    /// Finalized turn with visible text; the only kind sent as history.
    pub fn is_sendable(&self) -> bool {
        !self.is_streaming && !self.content.trim().is_empty()
    }

    pub(crate) fn with_content(&self, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..self.clone()
        }
    }

    pub(crate) fn with_streaming(&self, is_streaming: bool) -> Self {
        Self {
            is_streaming,
            ..self.clone()
        }
    }
}
