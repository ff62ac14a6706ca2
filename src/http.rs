//! HTTP gateway: websocket upgrade, metrics, and health endpoints.
//!
//! Authentication happens before the upgrade: the bearer token (from the
//! `Authorization` header, or the `token` query parameter for browser
//! clients that cannot set headers) is resolved in the auth_session table.
//! Invalid or absent tokens get 401 and never reach the session layer.

use crate::hub::Hub;
use crate::session::{UserSnapshot, run_session};
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Build the gateway router.
pub fn build_router(hub: Arc<Hub>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(hub)
}

/// Serve the gateway until `shutdown` resolves, then drain the hub.
pub async fn serve(
    hub: Arc<Hub>,
    listener: tokio::net::TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = build_router(hub.clone());
    info!(addr = %listener.local_addr()?, "Gateway listening");

    let drain_hub = hub.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.await;
            // Draining closes every session; their websocket tasks then end,
            // which lets the graceful shutdown complete.
            drain_hub.shutdown().await;
        })
        .await
}

fn bearer_token<'a>(
    headers: &'a HeaderMap,
    params: &'a HashMap<String, String>,
) -> Option<&'a str> {
    if let Some(value) = headers.get(header::AUTHORIZATION)
        && let Ok(value) = value.to_str()
        && let Some(token) = value.strip_prefix("Bearer ")
    {
        return Some(token.trim());
    }
    params.get("token").map(String::as_str)
}

async fn ws_handler(
    State(hub): State<Arc<Hub>>,
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(token) = bearer_token(&headers, &params) else {
        return (StatusCode::UNAUTHORIZED, "missing bearer token").into_response();
    };

    let auth = match hub.db.users().authenticate(token).await {
        Ok(Some(auth)) => auth,
        Ok(None) => {
            debug!("Rejected websocket upgrade: unknown token");
            return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
        }
        Err(e) => {
            tracing::error!(error = %e, "Token lookup failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "auth backend error").into_response();
        }
    };

    let user = UserSnapshot {
        user_id: auth.user_id,
        username: auth.username,
        role_id: auth.role_id,
    };
    info!(user_id = user.user_id, username = %user.username, "Websocket upgrade authorized");

    ws.on_upgrade(move |socket| run_session(hub, user, socket))
}

/// GET /metrics - Prometheus text format.
async fn metrics_handler() -> String {
    crate::metrics::gather_metrics()
}

/// GET /healthz - database ping plus session count.
async fn healthz_handler(State(hub): State<Arc<Hub>>) -> Response {
    let db_ok = sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(hub.db.pool())
        .await
        .is_ok();

    let body = Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "database": db_ok,
        "sessions": hub.registry.len(),
    }));
    if db_ok {
        (StatusCode::OK, body).into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, body).into_response()
    }
}
