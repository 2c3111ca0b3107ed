//! Platform authentication helpers.
//!
//! Talks to the hosted auth service (`/auth/v1`): passwordless magic links for
//! the client portal, bearer-token verification, and the admin endpoints used
//! to provision portal accounts. [`AuthSession`] layers session state and
//! change notifications on top for long-lived callers.

mod session;

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

pub use session::{AuthSession, AuthStateListener};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("auth {0} is not configured")]
    NotConfigured(&'static str),
    #[error("auth service returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("auth request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Clone, Debug)]
pub struct AuthSettings {
    pub url: String,
    pub anon_key: String,
    /// Needed only for the admin endpoints.
    pub service_key: Option<String>,
    pub timeout: Duration,
}

impl AuthSettings {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            service_key: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_service_key(mut self, key: impl Into<String>) -> Self {
        self.service_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct User {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub user: User,
}

/// Result of provisioning a portal account.
#[derive(Clone, Debug, PartialEq)]
pub enum InviteOutcome {
    /// New account; the service sent the "set your password" email.
    Invited(User),
    AlreadyRegistered,
}

#[derive(Deserialize)]
struct UserPage {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Clone, Debug)]
pub struct AuthClient {
    http: reqwest::Client,
    base_url: Arc<str>,
    anon_key: Arc<str>,
    service_key: Option<Arc<str>>,
}

impl AuthClient {
    pub fn new(settings: &AuthSettings) -> AuthResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: settings.url.trim_end_matches('/').into(),
            anon_key: settings.anon_key.as_str().into(),
            service_key: settings.service_key.as_deref().map(Into::into),
        })
    }

    /// Email a one-time sign-in link that lands on `redirect_to`.
    pub async fn send_magic_link(&self, email: &str, redirect_to: Option<&str>) -> AuthResult<()> {
        let mut request = self
            .public(self.http.post(self.endpoint("/otp")))
            .json(&json!({ "email": email, "create_user": true }));
        if let Some(target) = redirect_to {
            request = request.query(&[("redirect_to", target)]);
        }
        ensure_success(request.send().await?).await?;
        debug!(%email, "magic link sent");
        Ok(())
    }

    /// Exchange the token from a magic-link email for a session.
    pub async fn verify_magic_link(&self, email: &str, token: &str) -> AuthResult<Session> {
        let request = self
            .public(self.http.post(self.endpoint("/verify")))
            .json(&json!({ "type": "magiclink", "email": email, "token": token }));
        let response = ensure_success(request.send().await?).await?;
        Ok(response.json().await?)
    }

    /// Resolve the user behind a session token. Any rejection from the
    /// service is [`AuthError::Unauthorized`].
    pub async fn verify_access_token(&self, access_token: &str) -> AuthResult<User> {
        let response = self
            .http
            .get(self.endpoint("/user"))
            .header("apikey", self.anon_key.as_ref())
            .bearer_auth(access_token)
            .send()
            .await?;
        if !response.status().is_success() {
            debug!(status = %response.status(), "session token rejected");
            return Err(AuthError::Unauthorized);
        }
        Ok(response.json().await?)
    }

    pub async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let request = self
            .http
            .post(self.endpoint("/logout"))
            .header("apikey", self.anon_key.as_ref())
            .bearer_auth(access_token);
        ensure_success(request.send().await?).await?;
        Ok(())
    }

    /// Admin lookup of an account by exact (case-insensitive) email.
    pub async fn find_user_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let request = self
            .admin(self.http.get(self.endpoint("/admin/users")))?
            .query(&[("filter", email), ("page", "1"), ("per_page", "50")]);
        let response = ensure_success(request.send().await?).await?;
        let page: UserPage = response.json().await?;
        Ok(page.users.into_iter().find(|user| {
            user.email
                .as_deref()
                .is_some_and(|candidate| candidate.eq_ignore_ascii_case(email))
        }))
    }

    /// Create the account and send the invitation ("set your password") email.
    pub async fn invite_user(
        &self,
        email: &str,
        metadata: Value,
        redirect_to: Option<&str>,
    ) -> AuthResult<InviteOutcome> {
        let mut request = self
            .admin(self.http.post(self.endpoint("/invite")))?
            .json(&json!({ "email": email, "data": metadata }));
        if let Some(target) = redirect_to {
            request = request.query(&[("redirect_to", target)]);
        }
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            let user: User = response.json().await?;
            info!(%email, user_id = %user.id, "portal account invited");
            return Ok(InviteOutcome::Invited(user));
        }
        let body = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<Value>(&body).unwrap_or(Value::Null);
        if is_already_registered(&parsed) {
            debug!(%email, "invite skipped, account exists");
            return Ok(InviteOutcome::AlreadyRegistered);
        }
        Err(AuthError::Upstream {
            status: status.as_u16(),
            message: error_message(&parsed).unwrap_or(body),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }

    fn public(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("apikey", self.anon_key.as_ref())
    }

    fn admin(&self, request: RequestBuilder) -> AuthResult<RequestBuilder> {
        let key = self
            .service_key
            .as_deref()
            .ok_or(AuthError::NotConfigured("service key"))?;
        Ok(request.header("apikey", key).bearer_auth(key))
    }
}

/// Whether an auth-service error body means "this email already has an
/// account". The service has reported this as a structured `email_exists`
/// code and, in older versions, only through the message text.
pub fn is_already_registered(body: &Value) -> bool {
    let coded = ["code", "error_code"]
        .iter()
        .any(|key| body.get(*key).and_then(Value::as_str) == Some("email_exists"));
    if coded {
        return true;
    }
    ["msg", "message", "error_description", "error"]
        .iter()
        .filter_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_ascii_lowercase)
        .any(|text| text.contains("already") || text.contains("registered"))
}

fn error_message(body: &Value) -> Option<String> {
    ["msg", "message", "error_description", "error"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str).map(str::to_string))
}

async fn ensure_success(response: Response) -> AuthResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| error_message(&value))
        .unwrap_or(body);
    Err(AuthError::Upstream {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_detection_covers_every_reported_shape() {
        assert!(is_already_registered(&json!({"code": "email_exists"})));
        assert!(is_already_registered(&json!({"error_code": "email_exists", "msg": "x"})));
        assert!(is_already_registered(
            &json!({"msg": "A user with this email address has already been registered"})
        ));
        assert!(is_already_registered(&json!({"message": "User already registered"})));
        assert!(is_already_registered(&json!({"message": "Email registered elsewhere"})));
        assert!(!is_already_registered(&json!({"msg": "Invalid email"})));
        assert!(!is_already_registered(&Value::Null));
    }

    #[test]
    fn admin_calls_need_the_service_key() {
        let client = AuthClient::new(&AuthSettings::new("http://localhost", "anon")).unwrap();
        let err = client.admin(client.http.get("http://localhost")).unwrap_err();
        assert!(matches!(err, AuthError::NotConfigured("service key")));
    }
}
