use tokio::sync::watch;

use crate::{AuthClient, AuthResult, Session, User};

/// Session state for one signed-in portal user.
///
/// Holds the current [`Session`] and broadcasts every change to listeners
/// obtained from [`AuthSession::on_auth_state_change`].
#[derive(Debug)]
pub struct AuthSession {
    client: AuthClient,
    redirect_to: Option<String>,
    state: watch::Sender<Option<Session>>,
}

impl AuthSession {
    pub fn new(client: AuthClient) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            client,
            redirect_to: None,
            state,
        }
    }

    /// Where magic links should land (the portal page).
    pub fn with_redirect(mut self, redirect_to: impl Into<String>) -> Self {
        self.redirect_to = Some(redirect_to.into());
        self
    }

    pub async fn send_magic_link(&self, email: &str) -> AuthResult<()> {
        self.client
            .send_magic_link(email, self.redirect_to.as_deref())
            .await
    }

    /// Complete a magic-link sign-in and publish the new session.
    pub async fn sign_in_with_link(&self, email: &str, token: &str) -> AuthResult<User> {
        let session = self.client.verify_magic_link(email, token).await?;
        let user = session.user.clone();
        self.state.send_replace(Some(session));
        Ok(user)
    }

    /// Adopt a session token obtained elsewhere (e.g. from the redirect URL).
    pub async fn set_session(&self, access_token: &str) -> AuthResult<User> {
        let user = self.client.verify_access_token(access_token).await?;
        self.state.send_replace(Some(Session {
            access_token: access_token.to_string(),
            refresh_token: None,
            expires_in: None,
            user: user.clone(),
        }));
        Ok(user)
    }

    pub fn access_token(&self) -> Option<String> {
        self.state
            .borrow()
            .as_ref()
            .map(|session| session.access_token.clone())
    }

    /// Current user, re-validated against the auth service. `None` when
    /// signed out.
    pub async fn get_user(&self) -> AuthResult<Option<User>> {
        match self.access_token() {
            Some(token) => self.client.verify_access_token(&token).await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn sign_out(&self) -> AuthResult<()> {
        let token = self.access_token();
        self.state.send_replace(None);
        if let Some(token) = token {
            self.client.sign_out(&token).await?;
        }
        Ok(())
    }

    /// Listener that yields the current user first, then again on every
    /// sign-in, session swap or sign-out.
    pub fn on_auth_state_change(&self) -> AuthStateListener {
        let mut state = self.state.subscribe();
        state.mark_changed();
        AuthStateListener { state }
    }
}

pub struct AuthStateListener {
    state: watch::Receiver<Option<Session>>,
}

impl AuthStateListener {
    /// Waits for the next change. The outer `None` means the session owner
    /// is gone and no further changes will come.
    pub async fn next(&mut self) -> Option<Option<User>> {
        self.state.changed().await.ok()?;
        let user = self
            .state
            .borrow_and_update()
            .as_ref()
            .map(|session| session.user.clone());
        Some(user)
    }

    pub fn current(&self) -> Option<User> {
        self.state
            .borrow()
            .as_ref()
            .map(|session| session.user.clone())
    }

    pub fn unsubscribe(self) {}
}
