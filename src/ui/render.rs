//! Plain-text rendering of store snapshots for the line-mode interface.

use std::io::{self, Write};

use unicode_width::UnicodeWidthStr;

use crate::core::message::{Message, MessageId, Role};
use crate::core::session::{Session, SessionId, TITLE_MAX_CHARS};
use crate::core::store::StoreSnapshot;

/// Prints a streaming reply incrementally.
///
/// Each flush writes only the text added since the previous one, so calling
/// it for every published snapshot reproduces the reply exactly once.
#[derive(Debug, Default)]
pub struct ReplyPrinter {
    reply: Option<(SessionId, MessageId)>,
    printed: usize,
}

impl ReplyPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow a specific reply. Ignored once a reply is already being followed.
    pub fn pin(&mut self, session_id: SessionId, message_id: MessageId) {
        if self.reply.is_none() {
            self.reply = Some((session_id, message_id));
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.reply.is_some()
    }

    /// Write whatever part of the reply has not been written yet.
    /// Returns whether anything was written.
    pub fn flush<W: Write>(&mut self, snapshot: &StoreSnapshot, out: &mut W) -> io::Result<bool> {
        let Some(message) = self.locate(snapshot) else {
            return Ok(false);
        };
        let content = message.content();
        let delta = match content.get(self.printed..) {
            Some(delta) => delta,
            None => {
                writeln!(out)?;
                content
            }
        };
        if delta.is_empty() {
            return Ok(false);
        }
        out.write_all(delta.as_bytes())?;
        out.flush()?;
        self.printed = content.len();
        Ok(true)
    }

    fn locate<'s>(&mut self, snapshot: &'s StoreSnapshot) -> Option<&'s Message> {
        match self.reply {
            Some((session_id, message_id)) => snapshot.session(session_id)?.message(message_id),
            None => {
                let session = snapshot.current_session()?;
                let message = session.streaming_message()?;
                self.reply = Some((session.id(), message.id()));
                Some(message)
            }
        }
    }
}

pub fn role_label(role: Role) -> &'static str {
    match role {
        Role::User => "You",
        Role::Model => "Model",
    }
}

/// Pad `text` with spaces to `width` terminal columns.
fn pad_to_width(text: &str, width: usize) -> String {
    let used = UnicodeWidthStr::width(text);
    let mut padded = text.to_string();
    padded.extend(std::iter::repeat_n(' ', width.saturating_sub(used)));
    padded
}

/// One line per session, newest first, numbered from 1. The current session
/// is marked with `*`.
pub fn format_session_list(snapshot: &StoreSnapshot) -> Vec<String> {
    if snapshot.is_empty() {
        return vec!["No sessions.".to_string()];
    }

    // Titles are capped by grapheme count; wide graphemes can take two columns.
    let title_width = snapshot
        .sessions()
        .iter()
        .map(|session| UnicodeWidthStr::width(session.title()))
        .max()
        .unwrap_or(0)
        .min(TITLE_MAX_CHARS * 2);

    let current = snapshot.current_id();
    snapshot
        .sessions()
        .iter()
        .enumerate()
        .map(|(index, session)| {
            let marker = if Some(session.id()) == current { '*' } else { ' ' };
            let count = session.messages().len();
            let noun = if count == 1 { "message" } else { "messages" };
            format!(
                "{marker} {:>2}. {}  {count} {noun}, started {}",
                index + 1,
                pad_to_width(session.title(), title_width),
                session.created_at().format("%H:%M"),
            )
        })
        .collect()
}

/// Every turn of a session, each prefixed with its speaker.
pub fn format_transcript(session: &Session) -> Vec<String> {
    let mut lines = vec![format!("== {} ==", session.title())];
    for message in session.messages() {
        let label = role_label(message.role());
        let mut body = message.content().to_string();
        if message.is_streaming() {
            body.push_str(" …");
        }
        lines.push(format!("{label}: {body}"));
    }
    lines
}
