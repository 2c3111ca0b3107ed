//! Data access for the Floortype portal and admin dashboard.
//!
//! [`Db`] is the entry point. It talks to the hosted backend when one is
//! configured and otherwise falls back to a JSON-file [`LocalStore`] that
//! supports the subset of operations the dashboards need for demos.

mod clients;
pub mod fallback;
mod orders;
mod quotes;
mod revisions;

use platform_db::{BackendClient, DbResult};
use tracing::{debug, error};

pub use clients::ClientsApi;
pub use fallback::LocalStore;
pub use orders::{DELIVERABLE_URL_TTL, FILE_URL_TTL, OrdersApi};
pub use quotes::QuotesApi;
pub use revisions::{Approval, CompletionPolicy, RevisionsApi};

pub const ORDERS_BUCKET: &str = "order-files";
pub const DELIVERABLES_BUCKET: &str = "deliverables";
pub const QUOTES_BUCKET: &str = "quote-files";

/// A file handed over by a dashboard form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileUpload {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> i64 {
        self.bytes.len() as i64
    }
}

#[derive(Clone, Debug)]
pub(crate) enum Backend {
    Hosted(BackendClient),
    Local(LocalStore),
}

#[derive(Clone, Debug)]
pub struct Db {
    backend: Backend,
    completion: CompletionPolicy,
}

impl Db {
    pub fn hosted(client: BackendClient) -> Self {
        Self {
            backend: Backend::Hosted(client),
            completion: CompletionPolicy::default(),
        }
    }

    pub fn local(store: LocalStore) -> Self {
        Self {
            backend: Backend::Local(store),
            completion: CompletionPolicy::default(),
        }
    }

    pub fn with_completion_policy(mut self, policy: CompletionPolicy) -> Self {
        self.completion = policy;
        self
    }

    pub fn completion_policy(&self) -> CompletionPolicy {
        self.completion
    }

    pub fn is_hosted(&self) -> bool {
        matches!(self.backend, Backend::Hosted(_))
    }

    /// Handle that acts under a portal user's session, so the backend's row
    /// policies limit what is visible. The local store has no sessions.
    pub fn for_session(&self, access_token: &str) -> Self {
        let backend = match &self.backend {
            Backend::Hosted(client) => Backend::Hosted(client.as_user(access_token)),
            Backend::Local(store) => Backend::Local(store.clone()),
        };
        Self {
            backend,
            completion: self.completion,
        }
    }

    pub fn orders(&self) -> OrdersApi<'_> {
        OrdersApi::new(&self.backend)
    }

    pub fn revisions(&self) -> RevisionsApi<'_> {
        RevisionsApi::new(&self.backend, self.completion)
    }

    pub fn quotes(&self) -> QuotesApi<'_> {
        QuotesApi::new(&self.backend)
    }

    pub fn clients(&self) -> ClientsApi<'_> {
        ClientsApi::new(&self.backend)
    }
}

/// Log a failed call under its call-site tag and hand the result back.
pub(crate) fn traced<T>(site: &'static str, result: DbResult<T>) -> DbResult<T> {
    match &result {
        Err(err) if err.is_not_found() => debug!(site, "no matching record"),
        Err(err) => error!(site, error = %err, "backend call failed"),
        Ok(_) => {}
    }
    result
}

pub(crate) fn millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
