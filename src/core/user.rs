use serde_json::Value;

/// Gate for which half of the interface is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    Loading,
    Authenticated,
}

impl AuthState {
    pub fn is_authenticated(self) -> bool {
        self == AuthState::Authenticated
    }
}

const FALLBACK_USER_ID: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
}

impl User {
    /// Build the signed-in user from the login payload.
    ///
    /// The payload shape is not fixed. String `id`, `name` and `avatar`
    /// fields are picked up from the top level or from a nested `user`
    /// object; anything missing falls back to values derived from the email.
    pub fn from_login(email: &str, payload: &Value) -> Self {
        let field = |key: &str| -> Option<String> {
            payload
                .get(key)
                .or_else(|| payload.pointer(&format!("/user/{key}")))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
        };

        Self {
            id: field("id").unwrap_or_else(|| FALLBACK_USER_ID.to_string()),
            email: email.to_string(),
            name: field("name").unwrap_or_else(|| display_name_from_email(email)),
            avatar: field("avatar"),
        }
    }
}

fn display_name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default().trim();
    if local.is_empty() {
        email.to_string()
    } else {
        local.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn opaque_payload_falls_back_to_email() {
        let user = User::from_login("a@b.com", &Value::Null);
        assert_eq!(user.id, "1");
        assert_eq!(user.email, "a@b.com");
        assert_eq!(user.name, "a");
        assert_eq!(user.avatar, None);
    }

    #[test]
    fn payload_fields_are_used_when_present() {
        let top = User::from_login("a@b.com", &json!({"id": "42", "name": "Ada"}));
        assert_eq!(top.id, "42");
        assert_eq!(top.name, "Ada");

        let nested = User::from_login(
            "a@b.com",
            &json!({"token": "t", "user": {"name": "Grace", "avatar": "https://x/y.png"}}),
        );
        assert_eq!(nested.id, "1");
        assert_eq!(nested.name, "Grace");
        assert_eq!(nested.avatar.as_deref(), Some("https://x/y.png"));
    }

    #[test]
    fn blank_or_non_string_fields_are_ignored() {
        let user = User::from_login("bob@example.org", &json!({"id": 7, "name": "  "}));
        assert_eq!(user.id, "1");
        assert_eq!(user.name, "bob");
    }

    #[test]
    fn auth_state_defaults_to_signed_out() {
        assert_eq!(AuthState::default(), AuthState::Unauthenticated);
        assert!(!AuthState::Loading.is_authenticated());
        assert!(AuthState::Authenticated.is_authenticated());
    }
}
