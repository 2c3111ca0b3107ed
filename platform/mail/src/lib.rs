//! Outbound email through the hosted email API (`POST {api_url}/emails`).

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_API_URL: &str = "https://api.resend.com";

#[derive(Debug, Error)]
pub enum MailError {
    #[error("email API rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("email API request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Clone, Debug)]
pub struct MailSettings {
    pub api_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl MailSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Email {
    pub from: String,
    pub to: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    pub subject: String,
    pub html: String,
}

impl Email {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        html: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: vec![to.into()],
            reply_to: None,
            subject: subject.into(),
            html: html.into(),
        }
    }

    pub fn reply_to(mut self, address: impl Into<String>) -> Self {
        self.reply_to = Some(address.into());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct SentEmail {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct Mailer {
    http: reqwest::Client,
    endpoint: Arc<str>,
    api_key: Arc<str>,
}

impl Mailer {
    pub fn new(settings: &MailSettings) -> Result<Self, MailError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        let endpoint = format!("{}/emails", settings.api_url.trim_end_matches('/'));
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: settings.api_key.as_str().into(),
        })
    }

    pub async fn send(&self, email: &Email) -> Result<SentEmail, MailError> {
        let response = self
            .http
            .post(self.endpoint.as_ref())
            .bearer_auth(self.api_key.as_ref())
            .json(email)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), subject = %email.subject, "email rejected");
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        let sent = response.json::<SentEmail>().await.unwrap_or_default();
        debug!(id = ?sent.id, subject = %email.subject, "email accepted");
        Ok(sent)
    }
}
