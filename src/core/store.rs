//! In-memory session list with copy-on-write snapshots.
//!
//! Every change builds a new [`StoreSnapshot`] and publishes it through a
//! `tokio::sync::watch` channel in one step. Sessions that a change does not
//! touch are shared by pointer between the old and new snapshot, so readers
//! can skip re-rendering them with `Arc::ptr_eq`, and a snapshot a reader
//! already holds never changes underneath it.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use crate::core::message::{Message, MessageId};
use crate::core::session::{Session, SessionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    SessionNotFound(SessionId),
    MessageNotFound {
        session_id: SessionId,
        message_id: MessageId,
    },
    DuplicateMessageId {
        session_id: SessionId,
        message_id: MessageId,
    },
    MessageFinalized {
        session_id: SessionId,
        message_id: MessageId,
    },
    StreamingConflict {
        session_id: SessionId,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::SessionNotFound(id) => write!(f, "session {id} does not exist"),
            StoreError::MessageNotFound {
                session_id,
                message_id,
            } => write!(f, "message {message_id} not found in session {session_id}"),
            StoreError::DuplicateMessageId {
                session_id,
                message_id,
            } => write!(
                f,
                "message id {message_id} is already used in session {session_id}"
            ),
            StoreError::MessageFinalized {
                session_id,
                message_id,
            } => write!(
                f,
                "message {message_id} in session {session_id} is no longer streaming"
            ),
            StoreError::StreamingConflict { session_id } => write!(
                f,
                "session {session_id} already has a streaming message"
            ),
        }
    }
}

impl Error for StoreError {}

/// Immutable view of every session plus the current selection.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    sessions: Arc<Vec<Arc<Session>>>,
    current: Option<SessionId>,
}

impl StoreSnapshot {
    /// Sessions, newest first.
    pub fn sessions(&self) -> &[Arc<Session>] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn current_id(&self) -> Option<SessionId> {
        self.current
    }

    pub fn current_session(&self) -> Option<&Arc<Session>> {
        self.current.and_then(|id| self.session(id))
    }

    pub fn session(&self, id: SessionId) -> Option<&Arc<Session>> {
        self.sessions.iter().find(|session| session.id() == id)
    }

    pub fn with_new_session(&self, session: Session) -> Self {
        let id = session.id();
        let mut sessions = Vec::with_capacity(self.sessions.len() + 1);
        sessions.push(Arc::new(session));
        sessions.extend(self.sessions.iter().cloned());
        Self {
            sessions: Arc::new(sessions),
            current: Some(id),
        }
    }

    /// Returns `None` when `id` is unknown.
    pub fn with_current(&self, id: SessionId) -> Option<Self> {
        self.session(id)?;
        Some(Self {
            sessions: Arc::clone(&self.sessions),
            current: Some(id),
        })
    }

    pub fn with_appended(
        &self,
        session_id: SessionId,
        new_messages: Vec<Message>,
    ) -> Result<Self, StoreError> {
        self.with_session_replaced(session_id, |session| session.with_appended(new_messages))
    }

    pub fn with_message_content(
        &self,
        session_id: SessionId,
        message_id: MessageId,
        content: &str,
    ) -> Result<Self, StoreError> {
        self.with_session_replaced(session_id, |session| {
            session.with_message_content(message_id, content)
        })
    }

    pub fn with_message_streaming(
        &self,
        session_id: SessionId,
        message_id: MessageId,
        is_streaming: bool,
    ) -> Result<Self, StoreError> {
        self.with_session_replaced(session_id, |session| {
            session.with_message_streaming(message_id, is_streaming)
        })
    }

    fn with_session_replaced(
        &self,
        session_id: SessionId,
        rewrite: impl FnOnce(&Session) -> Result<Session, StoreError>,
    ) -> Result<Self, StoreError> {
        let index = self
            .sessions
            .iter()
            .position(|session| session.id() == session_id)
            .ok_or(StoreError::SessionNotFound(session_id))?;

        let updated = rewrite(&self.sessions[index])?;
        let mut sessions: Vec<Arc<Session>> = self.sessions.iter().cloned().collect();
        sessions[index] = Arc::new(updated);

        Ok(Self {
            sessions: Arc::new(sessions),
            current: self.current,
        })
    }
}

/// Owner of the session list.
///
/// All methods take `&self`; each successful call publishes exactly one new
/// snapshot and a failed call publishes nothing.
pub struct SessionStore {
    tx: watch::Sender<StoreSnapshot>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StoreSnapshot::default());
        Self { tx }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.tx.borrow().clone()
    }

    /// Receiver that observes every snapshot published after this call.
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.tx.subscribe()
    }

    pub fn current_session(&self) -> Option<Arc<Session>> {
        self.tx.borrow().current_session().cloned()
    }

    pub fn session(&self, id: SessionId) -> Option<Arc<Session>> {
        self.tx.borrow().session(id).cloned()
    }

    /// Insert an empty session at the front of the list and select it.
    pub fn create_session(&self) -> SessionId {
        let session = Session::new();
        let id = session.id();
        self.tx
            .send_modify(|snapshot| *snapshot = snapshot.with_new_session(session));
        id
    }

    /// Select `id`. Unknown ids leave the selection alone and return `false`.
    pub fn select_session(&self, id: SessionId) -> bool {
        self.tx.send_if_modified(|snapshot| match snapshot.with_current(id) {
            Some(next) => {
                *snapshot = next;
                true
            }
            None => false,
        })
    }

    pub fn append_messages(
        &self,
        session_id: SessionId,
        new_messages: Vec<Message>,
    ) -> Result<(), StoreError> {
        self.apply(|snapshot| snapshot.with_appended(session_id, new_messages))
    }

    pub fn update_message_content(
        &self,
        session_id: SessionId,
        message_id: MessageId,
        content: &str,
    ) -> Result<(), StoreError> {
        self.apply(|snapshot| snapshot.with_message_content(session_id, message_id, content))
    }

    pub fn set_message_streaming(
        &self,
        session_id: SessionId,
        message_id: MessageId,
        is_streaming: bool,
    ) -> Result<(), StoreError> {
        self.apply(|snapshot| {
            snapshot.with_message_streaming(session_id, message_id, is_streaming)
        })
    }

    /// Drop every session and the selection.
    pub fn clear(&self) {
        self.tx.send_replace(StoreSnapshot::default());
    }

    fn apply(
        &self,
        change: impl FnOnce(&StoreSnapshot) -> Result<StoreSnapshot, StoreError>,
    ) -> Result<(), StoreError> {
        let mut outcome = Ok(());
        self.tx.send_if_modified(|snapshot| match change(snapshot) {
            Ok(next) => {
                *snapshot = next;
                true
            }
            Err(err) => {
                outcome = Err(err);
                false
            }
        });
        outcome
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
