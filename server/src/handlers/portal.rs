//! Client portal routes, authorised by the portal session's bearer token.

use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, State, rejection::JsonRejection},
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post},
};
use entity::{AuthorType, Order, RecordId, RevisionNote};
use platform_api::{ApiError, ApiResult};
use platform_authn::User;
use products_portal::Approval;
use serde::Deserialize;

use super::field;
use crate::http::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/portal/orders", get(my_orders))
        .route("/api/portal/rounds/{round_id}/notes", post(add_note))
        .route("/api/portal/rounds/{round_id}/approve", post(approve_round))
}

/// Signed-in portal user, resolved from `Authorization: Bearer <token>`.
pub struct PortalUser {
    pub user: User,
    pub access_token: String,
}

impl PortalUser {
    /// Name shown next to the user's notes.
    fn display_name(&self) -> String {
        self.user
            .user_metadata
            .get("full_name")
            .and_then(|name| name.as_str())
            .filter(|name| !name.trim().is_empty())
            .or(self.user.email.as_deref())
            .unwrap_or("Client")
            .to_string()
    }
}

impl FromRequestParts<AppState> for PortalUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::Unauthorized)?;
        let user = state.auth()?.verify_access_token(token).await?;
        Ok(Self {
            user,
            access_token: token.to_string(),
        })
    }
}

async fn my_orders(
    State(state): State<AppState>,
    portal: PortalUser,
) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.db.orders().get_mine(&portal.access_token).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NoteRequest {
    order_id: RecordId,
    #[serde(default)]
    body: Option<String>,
}

async fn add_note(
    State(state): State<AppState>,
    portal: PortalUser,
    Path(round_id): Path<RecordId>,
    payload: Result<Json<NoteRequest>, JsonRejection>,
) -> ApiResult<Json<RevisionNote>> {
    let Json(request) = payload?;
    let Some(body) = field(&request.body) else {
        return Err(ApiError::invalid("Note body required"));
    };
    let note = state
        .db
        .for_session(&portal.access_token)
        .revisions()
        .add_note(
            round_id,
            request.order_id,
            AuthorType::Client,
            &portal.display_name(),
            body,
        )
        .await?;
    Ok(Json(note))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApproveRequest {
    order_id: RecordId,
}

async fn approve_round(
    State(state): State<AppState>,
    portal: PortalUser,
    Path(round_id): Path<RecordId>,
    payload: Result<Json<ApproveRequest>, JsonRejection>,
) -> ApiResult<Json<Approval>> {
    let Json(request) = payload?;
    let approval = state
        .db
        .for_session(&portal.access_token)
        .revisions()
        .approve_round(round_id, request.order_id)
        .await?;
    Ok(Json(approval))
}
