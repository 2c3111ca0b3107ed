use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{FromRef, State},
    http::{self, HeaderName, HeaderValue, Method},
    middleware,
    response::IntoResponse,
    routing::get,
};
use axum_extra::extract::cookie::Key;
use platform_api::{ApiError, ApiResult};
use platform_authn::{AuthClient, AuthSettings};
use platform_db::BackendClient;
use platform_mail::Mailer;
use products_portal::{Db, LocalStore};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{config::AppConfig, gate, handlers};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Db,
    /// Present only with a configured backend.
    pub auth: Option<AuthClient>,
    pub mailer: Mailer,
    pub cookie_key: Key,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

impl AppState {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let db = match &config.backend {
            Some(settings) => Db::hosted(
                BackendClient::connect(settings).context("building backend client")?,
            ),
            None => {
                warn!(
                    dir = %config.local_data_dir.display(),
                    "BACKEND_URL not set; dashboards use the local store"
                );
                Db::local(LocalStore::open(&config.local_data_dir))
            }
        }
        .with_completion_policy(config.completion_policy);

        let auth = config
            .backend
            .as_ref()
            .map(|settings| {
                AuthClient::new(
                    &AuthSettings::new(&settings.url, &settings.anon_key)
                        .with_service_key(&settings.service_key)
                        .with_timeout(settings.timeout),
                )
            })
            .transpose()
            .context("building auth client")?;
        let mailer = Mailer::new(&config.mail).context("building mail client")?;
        let cookie_key = config.cookie_key.clone();

        Ok(Self {
            config: Arc::new(config),
            db,
            auth,
            mailer,
            cookie_key,
        })
    }

    /// Fails with a 500 when the handler needs the hosted backend and none is set.
    pub fn require_backend(&self) -> ApiResult<()> {
        if self.db.is_hosted() {
            Ok(())
        } else {
            Err(ApiError::Upstream("backend not configured".into()))
        }
    }

    pub fn auth(&self) -> ApiResult<&AuthClient> {
        self.auth
            .as_ref()
            .ok_or_else(|| ApiError::Upstream("backend not configured".into()))
    }

    pub fn dashboard_url(&self) -> String {
        format!("{}/admin", self.config.portal_url.trim_end_matches('/'))
    }

    /// Landing page for invitation and magic-link emails.
    pub fn portal_redirect(&self) -> String {
        format!("{}/portal", self.config.portal_url.trim_end_matches('/'))
    }
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "floortype ops server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    let layer = CorsLayer::new()
        .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION])
        .allow_methods([Method::POST, Method::GET]);
    if allowed.is_empty() {
        layer.allow_origin(AllowOrigin::any())
    } else {
        layer
            .allow_credentials(true)
            .allow_origin(AllowOrigin::list(allowed))
    }
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/health", get(health_handler))
        .merge(handlers::routes())
        .layer(middleware::from_fn_with_state(state.clone(), gate::admin_gate))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_allowed_origins)),
        )
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    backend: &'static str,
    version: &'static str,
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        ok: true,
        backend: if state.db.is_hosted() { "hosted" } else { "local" },
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    ctrl_c.await;

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
    info!("shutdown signal received");
}
