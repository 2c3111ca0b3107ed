//! HTTP entry points.
//!
//! The notification endpoints accept only `POST`; any other method gets a
//! JSON 405 before anything else happens.

mod accounts;
mod admin;
mod files;
mod notify;
mod portal;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    handler::Handler,
    routing::{MethodRouter, post},
};
use platform_api::{ApiError, ApiResult};
use platform_mail::Email;

use crate::http::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/confirm-review", post_only(notify::confirm_review))
        .route("/api/create-client-account", post_only(accounts::create_client_account))
        .route("/api/get-download-url", post_only(files::get_download_url))
        .route("/api/notify-order", post_only(notify::notify_order))
        .route("/api/notify-quote", post_only(notify::notify_quote))
        .route(
            "/api/upload-deliverable",
            post_only(files::upload_deliverable)
                .layer(DefaultBodyLimit::max(files::UPLOAD_BODY_LIMIT)),
        )
        .route("/api/contact", post_only(notify::contact))
        .merge(admin::routes())
        .merge(portal::routes())
}

fn post_only<H, T>(handler: H) -> MethodRouter<AppState>
where
    H: Handler<T, AppState>,
    T: 'static,
{
    post(handler).fallback(method_not_allowed)
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Non-blank value of an optional form field.
fn field(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.trim().is_empty())
}

async fn deliver(state: &AppState, site: &'static str, email: Email) -> ApiResult<()> {
    state
        .mailer
        .send(&email)
        .await
        .map(|_| ())
        .map_err(|err| ApiError::upstream(site, err))
}
