use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use platform_api::{ApiError, ApiResult};
use platform_authn::InviteOutcome;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::field;
use crate::http::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccountRequest {
    email: Option<String>,
    name: Option<String>,
    order_ref: Option<String>,
}

/// Provision a portal login for a paying client. An email that already has
/// an account is a success with `existing: true`.
pub async fn create_client_account(
    State(state): State<AppState>,
    payload: Result<Json<AccountRequest>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let Some(email) = field(&body.email) else {
        return Err(ApiError::invalid("Email required"));
    };
    let auth = state.auth()?;

    let known = auth
        .find_user_by_email(email)
        .await
        .map_err(|err| ApiError::upstream("create-client-account.lookup", err))?;
    if known.is_some() {
        info!(%email, "portal account already exists");
        return Ok(Json(json!({ "ok": true, "existing": true })));
    }

    let metadata = json!({
        "full_name": field(&body.name),
        "order_ref": field(&body.order_ref),
    });
    let outcome = auth
        .invite_user(email, metadata, Some(&state.portal_redirect()))
        .await
        .map_err(|err| ApiError::upstream("create-client-account.invite", err))?;
    let existing = matches!(outcome, InviteOutcome::AlreadyRegistered);
    Ok(Json(json!({ "ok": true, "existing": existing })))
}
