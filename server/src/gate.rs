//! Shared-password gate in front of `/admin`.
//!
//! A correct `?pwd=` sets a signed `ft_admin_auth` cookie holding only the
//! issue time (`v1:<unix seconds>`). Requests carrying a cookie whose
//! signature checks out and which is younger than [`SESSION_TTL_SECS`] pass.

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, SameSite, SignedCookieJar};
use chrono::Utc;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::http::AppState;

pub const ADMIN_COOKIE: &str = "ft_admin_auth";
pub const SESSION_TTL_SECS: i64 = 8 * 60 * 60;
const TOKEN_VERSION: &str = "v1";

#[derive(Debug, Default, Deserialize)]
pub struct GateQuery {
    pwd: Option<String>,
}

pub fn is_gated(path: &str) -> bool {
    path == "/admin" || path.starts_with("/admin/")
}

pub async fn admin_gate(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    request: Request,
    next: Next,
) -> Response {
    if !is_gated(request.uri().path()) {
        return next.run(request).await;
    }

    let now = Utc::now().timestamp();
    if jar
        .get(ADMIN_COOKIE)
        .is_some_and(|cookie| token_is_fresh(cookie.value(), now))
    {
        return next.run(request).await;
    }

    let submitted = Query::<GateQuery>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(query)| query.pwd);
    match submitted {
        Some(pwd) if password_matches(&pwd, &state.config.admin_password) => {
            info!("admin session started");
            let jar = jar.add(session_cookie(now));
            (jar, Redirect::to("/admin")).into_response()
        }
        Some(_) => {
            debug!("admin password rejected");
            login_page(true)
        }
        None => login_page(false),
    }
}

pub fn session_cookie(issued_at: i64) -> Cookie<'static> {
    Cookie::build((ADMIN_COOKIE, issue_token(issued_at)))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(SESSION_TTL_SECS))
        .build()
}

pub fn issue_token(issued_at: i64) -> String {
    format!("{TOKEN_VERSION}:{issued_at}")
}

/// The cookie signature is checked by the jar; this checks the payload.
pub fn token_is_fresh(token: &str, now: i64) -> bool {
    let Some((version, issued)) = token.split_once(':') else {
        return false;
    };
    let Ok(issued_at) = issued.parse::<i64>() else {
        return false;
    };
    version == TOKEN_VERSION && issued_at <= now && now - issued_at < SESSION_TTL_SECS
}

/// Compares SHA-256 digests so timing does not depend on where the inputs differ.
pub fn password_matches(submitted: &str, expected: &str) -> bool {
    let submitted = Sha256::digest(submitted.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    submitted
        .iter()
        .zip(expected.iter())
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

fn login_page(failed: bool) -> Response {
    let error = if failed {
        r#"<p class="error">Incorrect password. Try again.</p>"#
    } else {
        ""
    };
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Floortype Admin</title>
<style>
body {{ font-family: 'DM Sans', Arial, sans-serif; background: #F7F5FF; display: flex; align-items: center; justify-content: center; height: 100vh; margin: 0; }}
form {{ background: white; padding: 32px; border-radius: 16px; width: 320px; }}
input {{ width: 100%; padding: 10px; margin: 12px 0; box-sizing: border-box; }}
button {{ width: 100%; padding: 10px; background: #4B2EC5; color: white; border: 0; border-radius: 10px; }}
.error {{ color: #C0392B; font-size: 13px; }}
</style></head>
<body>
<form method="GET" action="/admin">
<h2>Floortype Admin</h2>
{error}
<input type="password" name="pwd" placeholder="Password" autofocus>
<button type="submit">Enter</button>
</form>
</body>
</html>"#
    );
    (StatusCode::UNAUTHORIZED, Html(html)).into_response()
}
