//! Hosted backend primitives.
//!
//! The relational store, object storage and realtime feed all live behind one
//! HTTP endpoint. [`BackendClient`] carries the endpoint plus the key pair used
//! to authorize calls and hands out the per-surface helpers.

mod realtime;
mod rest;
mod storage;

use std::{sync::Arc, time::Duration};

use reqwest::{RequestBuilder, Response};
use serde_json::Value;
use thiserror::Error;

pub use realtime::{ChangeEvent, ChangeFilter, Subscription};
pub use rest::TableQuery;
pub use storage::Bucket;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error("backend returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected backend payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid backend url: {0}")]
    InvalidUrl(String),
    #[error("realtime channel error: {0}")]
    Realtime(String),
    #[error("local store error: {0}")]
    LocalIo(#[from] std::io::Error),
    #[error("{0} is unavailable without a configured backend")]
    Unavailable(&'static str),
}

impl DbError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound)
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Endpoint and keys for the hosted backend.
#[derive(Clone, Debug)]
pub struct BackendSettings {
    pub url: String,
    pub service_key: String,
    pub anon_key: String,
    pub timeout: Duration,
}

impl BackendSettings {
    pub fn new(
        url: impl Into<String>,
        service_key: impl Into<String>,
        anon_key: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            service_key: service_key.into(),
            anon_key: anon_key.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Authorized handle on the hosted backend.
///
/// Built with the service-role key; [`BackendClient::as_user`] derives a
/// handle that acts under a signed-in user's session instead, so row-level
/// policies on the backend decide what is visible.
#[derive(Clone, Debug)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Arc<str>,
    api_key: Arc<str>,
    bearer: Arc<str>,
    anon_key: Arc<str>,
}

impl BackendClient {
    pub fn connect(settings: &BackendSettings) -> DbResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: settings.url.trim_end_matches('/').into(),
            api_key: settings.service_key.as_str().into(),
            bearer: settings.service_key.as_str().into(),
            anon_key: settings.anon_key.as_str().into(),
        })
    }

    pub fn as_user(&self, access_token: &str) -> Self {
        Self {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            api_key: self.anon_key.clone(),
            bearer: access_token.into(),
            anon_key: self.anon_key.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn from(&self, table: &str) -> TableQuery {
        TableQuery::new(self.clone(), table)
    }

    pub fn storage(&self, bucket: &str) -> Bucket {
        Bucket::new(self.clone(), bucket)
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn api_key(&self) -> &str {
        &self.api_key
    }

    pub(crate) fn bearer(&self) -> &str {
        &self.bearer
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", self.api_key.as_ref())
            .bearer_auth(self.bearer.as_ref())
    }
}

/// Turn a non-2xx response into [`DbError::Upstream`], keeping the backend's
/// own message when the body carries one.
pub(crate) async fn ensure_success(response: Response) -> DbResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(DbError::Upstream {
        status: status.as_u16(),
        message: upstream_message(&body),
    })
}

fn upstream_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string())
}
