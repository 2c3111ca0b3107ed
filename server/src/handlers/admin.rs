//! Dashboard routes. Everything here sits behind the admin gate.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    response::Html,
    routing::{get, post},
};
use entity::{Client, Order, OrderStatus, Quote, QuoteUpdate, RecordId, RevisionRound};
use platform_api::{ApiError, ApiResult};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use super::field;
use crate::http::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin", get(landing))
        .route("/admin/api/orders", get(list_orders))
        .route("/admin/api/quotes", get(list_quotes))
        .route("/admin/api/clients", get(list_clients))
        .route("/admin/api/orders/{reference}/status", post(set_order_status))
        .route("/admin/api/quotes/{reference}", post(update_quote))
        .route("/admin/api/orders/{order_id}/rounds", post(open_round))
}

async fn landing(State(state): State<AppState>) -> Html<String> {
    let mode = if state.db.is_hosted() {
        "hosted backend"
    } else {
        "local store"
    };
    Html(format!(
        r#"<!doctype html>
<html lang="en">
<head><meta charset="utf-8"><title>Floortype Admin</title></head>
<body style="font-family:sans-serif;max-width:640px;margin:40px auto">
<h1>Floortype Admin</h1>
<p>Data source: {mode}</p>
<ul>
<li><a href="/admin/api/orders">Orders</a></li>
<li><a href="/admin/api/quotes">Quotes</a></li>
<li><a href="/admin/api/clients">Clients</a></li>
</ul>
</body>
</html>"#
    ))
}

async fn list_orders(State(state): State<AppState>) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.db.orders().get_all().await?))
}

async fn list_quotes(State(state): State<AppState>) -> ApiResult<Json<Vec<Quote>>> {
    Ok(Json(state.db.quotes().get_all().await?))
}

async fn list_clients(State(state): State<AppState>) -> ApiResult<Json<Vec<Client>>> {
    Ok(Json(state.db.clients().get_all().await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StatusChange {
    status: Option<String>,
}

async fn set_order_status(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    payload: Result<Json<StatusChange>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = payload?;
    let Some(label) = field(&body.status) else {
        return Err(ApiError::invalid("status required"));
    };
    let status = OrderStatus::from(label);
    state.db.orders().update_status(&reference, &status).await?;
    info!(%reference, status = status.as_str(), "order status changed");
    Ok(Json(json!({ "ok": true, "status": status })))
}

async fn update_quote(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    payload: Result<Json<QuoteUpdate>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(update) = payload?;
    state.db.quotes().update(&reference, &update).await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewRound {
    round_number: i32,
}

async fn open_round(
    State(state): State<AppState>,
    Path(order_id): Path<RecordId>,
    payload: Result<Json<NewRound>, JsonRejection>,
) -> ApiResult<Json<RevisionRound>> {
    let Json(body) = payload?;
    if body.round_number < 1 {
        return Err(ApiError::invalid("roundNumber must be at least 1"));
    }
    let round = state
        .db
        .revisions()
        .create_round(order_id, body.round_number)
        .await?;
    Ok(Json(round))
}
