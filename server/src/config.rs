use std::{fmt, path::PathBuf, time::Duration};

use anyhow::{Context, Result, anyhow, bail};
use axum_extra::extract::cookie::Key;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use platform_db::BackendSettings;
use platform_mail::{DEFAULT_API_URL, MailSettings};
use products_portal::CompletionPolicy;
use tracing::warn;

pub const DEFAULT_ADMIN_EMAIL: &str = "hello@floortype.com";
pub const DEFAULT_CONTACT_EMAIL: &str = "s.sterling@floortype.com";
pub const DEFAULT_PORTAL_URL: &str = "https://floortype.com";
pub const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Cookie signing keys must carry at least this much material.
const MIN_COOKIE_SECRET: usize = 64;

/// Everything the server reads from the environment, loaded once at startup.
#[derive(Clone)]
pub struct AppConfig {
    /// `None` runs the dashboards against the local fallback store.
    pub backend: Option<BackendSettings>,
    pub mail: MailSettings,
    pub admin_email: String,
    pub contact_email: String,
    pub admin_password: String,
    pub cookie_key: Key,
    pub portal_url: String,
    pub local_data_dir: PathBuf,
    pub http_timeout: Duration,
    pub cors_allowed_origins: Vec<String>,
    pub completion_policy: CompletionPolicy,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("backend", &self.backend.as_ref().map(|backend| &backend.url))
            .field("mail_api_url", &self.mail.api_url)
            .field("admin_email", &self.admin_email)
            .field("contact_email", &self.contact_email)
            .field("portal_url", &self.portal_url)
            .field("local_data_dir", &self.local_data_dir)
            .field("http_timeout", &self.http_timeout)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("completion_policy", &self.completion_policy)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Read the process environment, after merging a `.env` file if present.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let required = |key: &str| var(key).ok_or_else(|| anyhow!("missing env {key}"));

        let http_timeout = match var("HTTP_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse()
                    .with_context(|| format!("invalid HTTP_TIMEOUT_SECS {raw:?}"))?,
            ),
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let backend = match var("BACKEND_URL") {
            Some(url) => Some(
                BackendSettings::new(
                    url,
                    required("BACKEND_SERVICE_KEY")?,
                    required("BACKEND_ANON_KEY")?,
                )
                .with_timeout(http_timeout),
            ),
            None => None,
        };

        let mail = MailSettings::new(required("RESEND_API_KEY")?)
            .with_api_url(var("EMAIL_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into()))
            .with_timeout(http_timeout);

        let cookie_key = match var("COOKIE_SECRET_BASE64") {
            Some(secret) => {
                let bytes = STANDARD
                    .decode(&secret)
                    .context("invalid COOKIE_SECRET_BASE64")?;
                if bytes.len() < MIN_COOKIE_SECRET {
                    bail!("COOKIE_SECRET_BASE64 must decode to at least {MIN_COOKIE_SECRET} bytes");
                }
                Key::from(&bytes)
            }
            None => {
                warn!("COOKIE_SECRET_BASE64 not set; admin sessions will not survive a restart");
                Key::generate()
            }
        };

        let completion_policy = match var("COMPLETION_POLICY") {
            Some(raw) => raw
                .parse::<CompletionPolicy>()
                .map_err(|err| anyhow!(err))?,
            None => CompletionPolicy::default(),
        };

        let cors_allowed_origins = var("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            backend,
            mail,
            admin_email: var("ADMIN_EMAIL").unwrap_or_else(|| DEFAULT_ADMIN_EMAIL.into()),
            contact_email: var("CONTACT_EMAIL").unwrap_or_else(|| DEFAULT_CONTACT_EMAIL.into()),
            admin_password: required("ADMIN_PASSWORD")?,
            cookie_key,
            portal_url: var("PORTAL_URL").unwrap_or_else(|| DEFAULT_PORTAL_URL.into()),
            local_data_dir: var("LOCAL_DATA_DIR")
                .unwrap_or_else(|| DEFAULT_DATA_DIR.into())
                .into(),
            http_timeout,
            cors_allowed_origins,
            completion_policy,
        })
    }
}
