//! Request bodies exchanged with the chat backend.

use serde::Serialize;

use crate::core::message::{Message, Role};

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role(),
            content: message.content().to_string(),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    /// Keep only finalized turns with visible text. A reply that is still
    /// streaming is never sent.
    pub fn from_history(history: &[Message]) -> Self {
        Self {
            messages: history
                .iter()
                .filter(|message| message.is_sendable())
                .map(ChatMessage::from)
                .collect(),
        }
    }
}

#[derive(Serialize, Debug)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn history_filter_drops_streaming_and_blank_turns() {
        let history = vec![
            Message::user("Hi"),
            Message::model("Hello!"),
            Message::user("   "),
            Message::model(""),
            Message::user("Tell me more"),
            Message::model_placeholder().with_content("partial"),
        ];

        let request = ChatRequest::from_history(&history);
        let value = serde_json::to_value(&request).expect("request should serialize");
        assert_eq!(
            value,
            json!({
                "messages": [
                    {"role": "user", "content": "Hi"},
                    {"role": "model", "content": "Hello!"},
                    {"role": "user", "content": "Tell me more"},
                ]
            })
        );
    }

    #[test]
    fn content_is_sent_verbatim() {
        let request = ChatRequest::from_history(&[Message::user("  padded\n")]);
        assert_eq!(request.messages[0].content, "  padded\n");
    }

    #[test]
    fn login_body_has_email_and_password() {
        let body = LoginRequest {
            email: "a@b.com",
            password: "pw",
        };
        assert_eq!(
            serde_json::to_value(&body).expect("login should serialize"),
            json!({"email": "a@b.com", "password": "pw"})
        );
    }
}
