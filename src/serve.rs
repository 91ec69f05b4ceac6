//! Purpose: Provide the HTTP/JSON API server for Collavo.
//! Exports: `ServeConfig`, `serve`.
//! Role: Axum-based server exposing session-gated invitation state.
//! Invariants: Error payload shapes are stable: 401 and 500 bodies carry a
//! fixed `error` string; 500 adds best-effort `details`.
//! Invariants: Loopback-only unless explicitly allowed.

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use collavo::api::{
    Error, ErrorKind, InvitationStore, JsonFileStore, SessionResolver, TokenSessions,
};

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub store_path: PathBuf,
    pub sessions_path: Option<PathBuf>,
    pub cors_origins: Vec<String>,
    pub allow_non_loopback: bool,
    pub max_body_bytes: u64,
}

#[derive(Clone)]
struct AppState {
    sessions: Arc<dyn SessionResolver>,
    invitations: Arc<dyn InvitationStore>,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    init_tracing();

    let sessions: Arc<dyn SessionResolver> = match &config.sessions_path {
        Some(path) => Arc::new(TokenSessions::from_file(path)?),
        None => Arc::new(TokenSessions::new()),
    };
    let state = Arc::new(AppState {
        sessions,
        invitations: Arc::new(JsonFileStore::new(config.store_path)),
    });

    let max_body_bytes: usize = config
        .max_body_bytes
        .try_into()
        .map_err(|_| Error::new(ErrorKind::Usage).with_message("--max-body-bytes is too large"))?;

    let mut app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/invitations/pending", get(pending_invitations))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state);
    if !config.cors_origins.is_empty() {
        app = app.layer(cors_layer(&config.cors_origins)?);
    }

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if !is_loopback(config.bind.ip()) && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }

    if config.max_body_bytes == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes must be greater than zero")
            .with_hint("Use a positive value like 1048576."));
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler");
        signal.recv().await;
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer, Error> {
    let mut allowed = Vec::new();
    for origin in origins {
        allowed.push(origin.parse::<HeaderValue>().map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid cors origin: {origin}"))
                .with_source(err)
        })?);
    }
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET])
        .allow_headers([header::AUTHORIZATION, header::ACCEPT]))
}

async fn healthz() -> Response {
    json_response(json!({ "ok": true }))
}

async fn pending_invitations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let session = match state.sessions.resolve(&headers) {
        Ok(session) => session,
        Err(err) => return lookup_failure_response(&err),
    };
    let Some(email) = session.and_then(|session| session.user.email) else {
        return failure_response(StatusCode::UNAUTHORIZED, "Authentication required", None);
    };

    match state.invitations.pending_for(&email) {
        Ok(invitations) => {
            let count = invitations.len();
            json_response(json!({ "invitations": invitations, "count": count }))
        }
        Err(err) => lookup_failure_response(&err),
    }
}

fn lookup_failure_response(err: &Error) -> Response {
    let details = err.message().unwrap_or("Unknown error").to_string();
    failure_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Failed to get pending invitations",
        Some(details),
    )
}

fn failure_response(status: StatusCode, error: &str, details: Option<String>) -> Response {
    let mut body = serde_json::Map::new();
    body.insert("error".to_string(), json!(error));
    if let Some(details) = details {
        body.insert("details".to_string(), json!(details));
    }
    let mut response = (status, Json(serde_json::Value::Object(body))).into_response();
    response
        .headers_mut()
        .insert("collavo-version", HeaderValue::from_static("0"));
    response
}

fn json_response(payload: serde_json::Value) -> Response {
    let mut response = Json(payload).into_response();
    response
        .headers_mut()
        .insert("collavo-version", HeaderValue::from_static("0"));
    response
}
