use std::sync::Arc;

use tracing::info;

use crate::core::chat_stream::{AuthError, ChatBackend};
use crate::core::controller::{ConversationController, SubmitOutcome};
use crate::core::session::SessionId;
use crate::core::store::SessionStore;
use crate::core::user::{AuthState, User};

/// Top-level client state: who is signed in plus their sessions.
///
/// Sessions only live as long as the login; logging out drops them.
pub struct ChatApp {
    backend: Arc<dyn ChatBackend>,
    controller: ConversationController,
    auth_state: AuthState,
    user: Option<User>,
}

impl ChatApp {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        let store = Arc::new(SessionStore::new());
        Self {
            controller: ConversationController::new(Arc::clone(&backend), store),
            backend,
            auth_state: AuthState::Unauthenticated,
            user: None,
        }
    }

    pub fn auth_state(&self) -> AuthState {
        self.auth_state
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        self.controller.store()
    }

    pub fn controller(&self) -> &ConversationController {
        &self.controller
    }

    pub fn is_generating(&self) -> bool {
        self.controller.is_generating()
    }

    /// Sign in and open a first empty session.
    ///
    /// Any previous user and their sessions are dropped first, so a failed or
    /// abandoned login always leaves the app signed out with no sessions.
    pub async fn login(&mut self, email: &str, password: &str) -> Result<&User, AuthError> {
        self.user = None;
        self.controller.store().clear();
        let pending = PendingLogin::begin(&mut self.auth_state);

        match self.backend.login(email, password).await {
            Ok(payload) => {
                let user = User::from_login(email, &payload);
                info!(user = %user.id, "signed in");
                self.controller.store().create_session();
                pending.settle(AuthState::Authenticated);
                Ok(&*self.user.insert(user))
            }
            Err(err) => {
                info!(error = %err, "sign in failed");
                pending.settle(AuthState::Unauthenticated);
                Err(err)
            }
        }
    }

    /// Forget the user and every session. A reply that is still streaming
    /// keeps running; its chunks are discarded once they find no session.
    pub fn logout(&mut self) {
        self.auth_state = AuthState::Unauthenticated;
        self.user = None;
        self.store().clear();
    }

    pub fn new_session(&self) -> SessionId {
        self.store().create_session()
    }

    pub fn select_session(&self, id: SessionId) -> bool {
        self.store().select_session(id)
    }

    pub async fn submit(&self, input: &str) -> SubmitOutcome {
        self.controller.submit(input).await
    }
}

/// Holds the app in `Loading` while a login is in flight and falls back to
/// `Unauthenticated` if the login future is dropped before it settles.
struct PendingLogin<'a> {
    state: &'a mut AuthState,
}

impl<'a> PendingLogin<'a> {
    fn begin(state: &'a mut AuthState) -> Self {
        *state = AuthState::Loading;
        Self { state }
    }

    fn settle(self, outcome: AuthState) {
        *self.state = outcome;
    }
}

impl Drop for PendingLogin<'_> {
    fn drop(&mut self) {
        if *self.state == AuthState::Loading {
            *self.state = AuthState::Unauthenticated;
        }
    }
}
