#![allow(dead_code)]

use std::path::Path;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use http_body_util::BodyExt;
use ops_testkit::{Method, MockUpstream};
use serde_json::{Value, json};
use server::{
    config::AppConfig,
    http::{AppState, build_router},
};
use tower::ServiceExt;

pub const ADMIN_PASSWORD: &str = "letmein";
pub const COOKIE_SECRET: [u8; 64] = [7u8; 64];

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub text: String,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.text).unwrap_or(Value::Null)
    }

    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }
}

/// Server wired to a mock standing in for both the backend and the email API.
pub struct Harness {
    pub mock: MockUpstream,
    pub router: Router,
}

impl Harness {
    pub async fn hosted() -> Self {
        let mock = MockUpstream::start().await;
        mock.respond(Method::POST, "/emails", 200, json!({"id": "em_1"}));
        let url = mock.url();
        let config = config_with(move |key| match key {
            "BACKEND_URL" | "EMAIL_API_URL" => Some(url.clone()),
            "BACKEND_SERVICE_KEY" => Some("service-key".into()),
            "BACKEND_ANON_KEY" => Some("anon-key".into()),
            _ => None,
        });
        Self {
            mock,
            router: build_router(AppState::new(config).unwrap()),
        }
    }

    /// No backend; dashboards read the local store in `dir`.
    pub async fn local(dir: &Path) -> Self {
        let mock = MockUpstream::start().await;
        mock.respond(Method::POST, "/emails", 200, json!({"id": "em_1"}));
        let url = mock.url();
        let dir = dir.display().to_string();
        let config = config_with(move |key| match key {
            "EMAIL_API_URL" => Some(url.clone()),
            "LOCAL_DATA_DIR" => Some(dir.clone()),
            _ => None,
        });
        Self {
            mock,
            router: build_router(AppState::new(config).unwrap()),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        Reply {
            status,
            headers,
            text: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    pub async fn post_json(&self, path: &str, body: Value) -> Reply {
        self.send(post_json(path, body)).await
    }

    pub async fn get(&self, path: &str) -> Reply {
        self.send(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    /// Emails the mock email API received.
    pub fn sent_emails(&self) -> Vec<Value> {
        self.mock
            .requests_to(Method::POST, "/emails")
            .iter()
            .map(|request| request.json())
            .collect()
    }
}

fn config_with(extra: impl Fn(&str) -> Option<String>) -> AppConfig {
    let secret = STANDARD.encode(COOKIE_SECRET);
    AppConfig::from_lookup(move |key| match key {
        "RESEND_API_KEY" => Some("re_test".into()),
        "ADMIN_PASSWORD" => Some(ADMIN_PASSWORD.into()),
        "ADMIN_EMAIL" => Some("admin@floortype.test".into()),
        "CONTACT_EMAIL" => Some("studio@floortype.test".into()),
        "PORTAL_URL" => Some("https://floortype.test".into()),
        "COOKIE_SECRET_BASE64" => Some(secret.clone()),
        other => extra(other),
    })
    .unwrap()
}

pub fn post_json(path: &str, body: Value) -> Request<Body> {
    Request::post(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}
