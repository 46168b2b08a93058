// HTTP + WebSocket routes

mod http;
mod ws;

use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tower_http::cors::{Any, CorsLayer};

use crate::config::DisplayConfig;
use crate::monitor::MonitorHandle;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) monitor: MonitorHandle,
    pub(crate) display: Arc<DisplayConfig>,
    pub(crate) ws_connections: Arc<AtomicUsize>,
}

pub fn app(
    monitor: MonitorHandle,
    display: DisplayConfig,
    ws_connections: Arc<AtomicUsize>,
) -> Router {
    let state = AppState {
        monitor,
        display: Arc::new(display),
        ws_connections,
    };
    Router::new()
        .route("/", get(|| async { "Netfluss network monitor" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/snapshot", get(http::snapshot_handler)) // GET /api/snapshot
        .route("/api/summary", get(http::summary_handler)) // GET /api/summary
        .route("/api/interval", put(http::interval_handler)) // PUT /api/interval
        .route("/api/process-traffic", put(http::process_traffic_handler)) // PUT /api/process-traffic
        .route("/api/adapters/{id}/reconnect", post(http::reconnect_handler)) // POST /api/adapters/{id}/reconnect
        .route("/ws/snapshot", get(ws::ws_snapshot)) // WS /ws/snapshot
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
