use std::fmt;

use chrono::{DateTime, Utc};
use unicode_segmentation::UnicodeSegmentation;

use crate::core::message::{next_id, Message, MessageId};
use crate::core::store::StoreError;

pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

/// Titles keep at most this many user-perceived characters of the first
/// user message.
pub const TITLE_MAX_CHARS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
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

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Derive a session title from the first user message.
pub fn derive_title(content: &str) -> String {
    let title: String = content.trim().graphemes(true).take(TITLE_MAX_CHARS).collect();
    if title.is_empty() {
        DEFAULT_SESSION_TITLE.to_string()
    } else {
        title
    }
}

/// One conversation thread. Sessions are never edited in place; the store
/// derives a new value for every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    id: SessionId,
    title: String,
    messages: Vec<Message>,
    created_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: SessionId::next(),
            title: DEFAULT_SESSION_TITLE.to_string(),
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id() == id)
    }

    pub fn streaming_message(&self) -> Option<&Message> {
        self.messages.iter().find(|message| message.is_streaming())
    }

    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(Message::is_user)
    }

    pub(crate) fn with_appended(&self, new_messages: Vec<Message>) -> Result<Self, StoreError> {
        let mut streaming = usize::from(self.streaming_message().is_some());
        for (index, message) in new_messages.iter().enumerate() {
            let seen_earlier = new_messages[..index]
                .iter()
                .any(|other| other.id() == message.id());
            if seen_earlier || self.message(message.id()).is_some() {
                return Err(StoreError::DuplicateMessageId {
                    session_id: self.id,
                    message_id: message.id(),
                });
            }
            if message.is_streaming() {
                streaming += 1;
            }
        }
        if streaming > 1 {
            return Err(StoreError::StreamingConflict {
                session_id: self.id,
            });
        }

        let title = if self.has_user_message() {
            self.title.clone()
        } else {
            new_messages
                .iter()
                .find(|message| message.is_user())
                .map(|message| derive_title(message.content()))
                .unwrap_or_else(|| self.title.clone())
        };

        let mut messages = Vec::with_capacity(self.messages.len() + new_messages.len());
        messages.extend(self.messages.iter().cloned());
        messages.extend(new_messages);

        Ok(Self {
            id: self.id,
            title,
            messages,
            created_at: self.created_at,
        })
    }

    pub(crate) fn with_message_content(
        &self,
        message_id: MessageId,
        content: &str,
    ) -> Result<Self, StoreError> {
        self.with_message_rewritten(message_id, |message| {
            if !message.is_streaming() {
                return Err(StoreError::MessageFinalized {
                    session_id: self.id,
                    message_id,
                });
            }
            Ok(message.with_content(content))
        })
    }

    pub(crate) fn with_message_streaming(
        &self,
        message_id: MessageId,
        is_streaming: bool,
    ) -> Result<Self, StoreError> {
        if is_streaming {
            if let Some(other) = self.streaming_message() {
                if other.id() != message_id {
                    return Err(StoreError::StreamingConflict {
                        session_id: self.id,
                    });
                }
            }
        }
        self.with_message_rewritten(message_id, |message| {
            Ok(message.with_streaming(is_streaming))
        })
    }

    fn with_message_rewritten(
        &self,
        message_id: MessageId,
        rewrite: impl FnOnce(&Message) -> Result<Message, StoreError>,
    ) -> Result<Self, StoreError> {
        let index = self
            .messages
            .iter()
            .position(|message| message.id() == message_id)
            .ok_or(StoreError::MessageNotFound {
                session_id: self.id,
                message_id,
            })?;

        let mut messages = self.messages.clone();
        messages[index] = rewrite(&self.messages[index])?;

        Ok(Self {
            id: self.id,
            title: self.title.clone(),
            messages,
            created_at: self.created_at,
        })
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
