use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::core::chat_stream::{ChatBackend, StreamError};
use crate::core::message::{Message, MessageId};
use crate::core::session::SessionId;
use crate::core::store::{SessionStore, StoreError};

/// Why a submit did nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitRejection {
    EmptyInput,
    AlreadyGenerating,
    NoSession,
    Store(StoreError),
}

impl fmt::Display for SubmitRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitRejection::EmptyInput => f.write_str("nothing to send"),
            SubmitRejection::AlreadyGenerating => f.write_str("a reply is still being generated"),
            SubmitRejection::NoSession => f.write_str("no chat session is selected"),
            SubmitRejection::Store(err) => err.fmt(f),
        }
    }
}

#[derive(Debug)]
pub enum SubmitOutcome {
    Completed {
        session_id: SessionId,
        message_id: MessageId,
    },
    /// The stream failed. The diagnostic is already part of the reply text.
    Failed {
        session_id: SessionId,
        message_id: MessageId,
        error: StreamError,
    },
    Ignored(SubmitRejection),
}

impl SubmitOutcome {
    pub fn is_ignored(&self) -> bool {
        matches!(self, SubmitOutcome::Ignored(_))
    }

    /// The model message this submit created, if it got that far.
    pub fn reply_id(&self) -> Option<(SessionId, MessageId)> {
        match self {
            SubmitOutcome::Completed {
                session_id,
                message_id,
            }
            | SubmitOutcome::Failed {
                session_id,
                message_id,
                ..
            } => Some((*session_id, *message_id)),
            SubmitOutcome::Ignored(_) => None,
        }
    }
}

/// Drives one reply at a time from user input to a finalized model message.
///
/// A single generating flag covers every session: while any reply streams,
/// further submits are ignored.
pub struct ConversationController {
    backend: Arc<dyn ChatBackend>,
    store: Arc<SessionStore>,
    generating: AtomicBool,
}

impl ConversationController {
    pub fn new(backend: Arc<dyn ChatBackend>, store: Arc<SessionStore>) -> Self {
        Self {
            backend,
            store,
            generating: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::Acquire)
    }

    /// Claim the generating flag. Returns `false` if it was already held.
    pub fn begin_generation(&self) -> bool {
        self.generating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn end_generation(&self) {
        self.generating.store(false, Ordering::Release);
    }

    /// Send `input` as a user turn of the current session and stream the
    /// reply into a placeholder model turn.
    ///
    /// Stream failures are reported in the outcome, never as an error: by the
    /// time this returns the generating flag is clear and the placeholder is
    /// finalized whatever happened.
    pub async fn submit(&self, input: &str) -> SubmitOutcome {
        let text = input.trim();
        if text.is_empty() {
            return SubmitOutcome::Ignored(SubmitRejection::EmptyInput);
        }
        if !self.begin_generation() {
            return SubmitOutcome::Ignored(SubmitRejection::AlreadyGenerating);
        }
        let mut guard = GenerationGuard::new(self);

        let Some(session_id) = self.store.snapshot().current_id() else {
            return SubmitOutcome::Ignored(SubmitRejection::NoSession);
        };

        let user_message = Message::user(text);
        let placeholder = Message::model_placeholder();
        let message_id = placeholder.id();
        if let Err(err) = self
            .store
            .append_messages(session_id, vec![user_message, placeholder])
        {
            return SubmitOutcome::Ignored(SubmitRejection::Store(err));
        }
        guard.pin_reply(session_id, message_id);

        let history = self
            .store
            .session(session_id)
            .map(|session| session.messages().to_vec())
            .unwrap_or_default();

        info!(session = %session_id, reply = %message_id, "generating reply");
        let store = &self.store;
        let mut reply = String::new();
        let mut on_chunk = |chunk: &str| {
            reply.push_str(chunk);
            apply_reply_text(store, session_id, message_id, &reply);
        };
        let result = self
            .backend
            .stream_response(&history, &mut on_chunk)
            .await;

        drop(guard);
        match result {
            Ok(()) => SubmitOutcome::Completed {
                session_id,
                message_id,
            },
            Err(error) => {
                debug!(session = %session_id, %error, "reply finished with an error");
                SubmitOutcome::Failed {
                    session_id,
                    message_id,
                    error,
                }
            }
        }
    }
}

/// Write the whole reply so far. Rewriting the full buffer keeps a repeated
/// application harmless as long as chunks arrive in order.
fn apply_reply_text(
    store: &SessionStore,
    session_id: SessionId,
    message_id: MessageId,
    reply: &str,
) {
    if let Err(err) = store.update_message_content(session_id, message_id, reply) {
        debug!(error = %err, "discarding reply text");
    }
}

/// Clears the generating flag and finalizes the pinned reply when dropped,
/// including when the submit future itself is dropped mid-stream.
struct GenerationGuard<'a> {
    controller: &'a ConversationController,
    reply: Option<(SessionId, MessageId)>,
}

impl<'a> GenerationGuard<'a> {
    fn new(controller: &'a ConversationController) -> Self {
        Self {
            controller,
            reply: None,
        }
    }

    fn pin_reply(&mut self, session_id: SessionId, message_id: MessageId) {
        self.reply = Some((session_id, message_id));
    }
}

impl Drop for GenerationGuard<'_> {
    fn drop(&mut self) {
        self.controller.end_generation();
        if let Some((session_id, message_id)) = self.reply.take() {
            if let Err(err) =
                self.controller
                    .store
                    .set_message_streaming(session_id, message_id, false)
            {
                debug!(error = %err, "reply could not be finalized");
            }
        }
    }
}
