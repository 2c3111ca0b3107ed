use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use platform_api::{ApiError, ApiResult};
use platform_mail::Email;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::{deliver, field};
use crate::{
    emails::{self, ContactMessage, OrderNotice, QuoteNotice, ReviewSummary},
    http::AppState,
};

pub async fn notify_order(
    State(state): State<AppState>,
    payload: Result<Json<OrderNotice>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(notice) = payload?;
    let rendered = emails::order_notification(&notice, &state.dashboard_url());
    let email = Email::new(
        emails::ORDERS_FROM,
        state.config.admin_email.as_str(),
        rendered.subject,
        rendered.html,
    );
    deliver(&state, "notify-order", email).await?;
    info!(reference = ?notice.reference, net30 = notice.is_net30(), "order notification sent");
    Ok(Json(json!({ "ok": true })))
}

pub async fn notify_quote(
    State(state): State<AppState>,
    payload: Result<Json<QuoteNotice>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(notice) = payload?;
    let rendered = emails::quote_notification(&notice, &state.dashboard_url());
    let email = Email::new(
        emails::QUOTES_FROM,
        state.config.admin_email.as_str(),
        rendered.subject,
        rendered.html,
    );
    deliver(&state, "notify-quote", email).await?;
    info!(reference = ?notice.reference, "quote notification sent");
    Ok(Json(json!({ "ok": true })))
}

pub async fn contact(
    State(state): State<AppState>,
    payload: Result<Json<ContactMessage>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(message) = payload?;
    let (Some(_), Some(sender), Some(_)) = (
        field(&message.first),
        field(&message.email),
        field(&message.message),
    ) else {
        return Err(ApiError::invalid("Missing fields"));
    };
    let rendered = emails::contact_message(&message);
    let email = Email::new(
        emails::STUDIO_FROM,
        state.config.contact_email.as_str(),
        rendered.subject,
        rendered.html,
    )
    .reply_to(sender);
    deliver(&state, "contact", email).await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReviewConfirmation {
    order_ref: Option<String>,
    project_name: Option<String>,
    client_email: Option<String>,
    client_name: Option<String>,
    current_stage: Option<String>,
}

/// Stage an order moves to once the client confirms a review. Unknown
/// stages are kept as they are.
pub fn next_stage(current: &str) -> &str {
    match current {
        "draft-1-ready" => "draft-1-revisions",
        "draft-2-ready" => "draft-2-revisions",
        "final-draft-ready" => "final-draft-ready",
        other => other,
    }
}

pub fn stage_label(current: &str) -> &str {
    match current {
        "draft-1-ready" => "Draft 1",
        "draft-2-ready" => "Draft 2",
        "final-draft-ready" => "Final Draft",
        other => other,
    }
}

pub async fn confirm_review(
    State(state): State<AppState>,
    payload: Result<Json<ReviewConfirmation>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let (Some(order_ref), Some(client_email)) =
        (field(&body.order_ref), field(&body.client_email))
    else {
        return Err(ApiError::invalid("Missing required fields"));
    };

    let current = field(&body.current_stage);
    let next = current.map(next_stage);
    if let Some(next) = next {
        state.require_backend()?;
        state
            .db
            .orders()
            .update_stage(order_ref, next)
            .await
            .map_err(|err| ApiError::upstream("confirm-review.updateStage", err))?;
    }

    let label = current.map(stage_label).unwrap_or("Review");
    let review = ReviewSummary {
        order_ref,
        project_name: field(&body.project_name),
        reviewer: field(&body.client_name).unwrap_or(client_email),
        stage_label: label,
        next_stage: next.unwrap_or(label),
    };
    let rendered = emails::review_confirmation(&review, &state.dashboard_url());
    let email = Email::new(
        emails::STUDIO_FROM,
        state.config.admin_email.as_str(),
        rendered.subject,
        rendered.html,
    );
    deliver(&state, "confirm-review", email).await?;
    info!(%order_ref, next_stage = ?next, "review confirmed");
    Ok(Json(json!({ "ok": true, "nextStage": next })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_stages_advance_to_revisions() {
        assert_eq!(next_stage("draft-1-ready"), "draft-1-revisions");
        assert_eq!(next_stage("draft-2-ready"), "draft-2-revisions");
        assert_eq!(next_stage("final-draft-ready"), "final-draft-ready");
        assert_eq!(next_stage("on-hold"), "on-hold");
        assert_eq!(stage_label("final-draft-ready"), "Final Draft");
        assert_eq!(stage_label("on-hold"), "on-hold");
    }
}
