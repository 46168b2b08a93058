// HTTP handlers: version, snapshot, summary and monitor commands

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::config::DisplayConfig;
use crate::models::{AdapterType, IpAddresses, NetworkSnapshot, TopApps};
use crate::monitor::{ReconnectRejected, clamp_interval};
use crate::rate::{format_link_speed, format_mbps, format_rate};
use crate::reconnect::is_valid_adapter_id;
use crate::version::{NAME, VERSION};

fn error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

fn monitor_down(e: anyhow::Error) -> Response {
    tracing::warn!(error = %e, "monitor command rejected");
    error(StatusCode::SERVICE_UNAVAILABLE, "monitor is not running")
}

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/snapshot: latest published snapshot, 503 until the first tick.
pub(super) async fn snapshot_handler(State(state): State<AppState>) -> Response {
    match state.monitor.latest() {
        Some(snapshot) => Json(snapshot).into_response(),
        None => error(StatusCode::SERVICE_UNAVAILABLE, "no sample taken yet"),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AdapterSummary {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: AdapterType,
    is_up: bool,
    download: String,
    upload: String,
    link_speed: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    wifi_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    wifi_tx_rate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ssid: Option<String>,
    reconnecting: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AppSummary {
    name: String,
    download: String,
    upload: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Summary {
    tick: u64,
    download: String,
    upload: String,
    adapters: Vec<AdapterSummary>,
    apps: Vec<AppSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    apps_error: Option<String>,
    ips: IpAddresses,
}

pub(crate) fn summarize(snapshot: &NetworkSnapshot, display: &DisplayConfig) -> Summary {
    let filter = display.adapter_filter();
    let bits = display.use_bits;
    let totals = snapshot.display_totals(&filter, display.totals_only_visible);
    let adapters = snapshot
        .visible_adapters(&filter)
        .map(|a| AdapterSummary {
            id: a.id.clone(),
            name: a.display_name.clone(),
            kind: a.kind,
            is_up: a.is_up,
            download: format_rate(a.rx_rate_bps, bits),
            upload: format_rate(a.tx_rate_bps, bits),
            link_speed: format_link_speed(a.link_speed_bps, bits),
            wifi_mode: a.wifi_mode.clone(),
            wifi_tx_rate: a.wifi_tx_rate_mbps.map(|r| format_mbps(Some(r))),
            ssid: a.wifi_ssid.clone(),
            reconnecting: snapshot.reconnecting.contains(&a.id),
        })
        .collect();
    let (apps, apps_error) = match &snapshot.top_apps {
        TopApps::Ready(apps) => (
            apps.iter()
                .map(|app| AppSummary {
                    name: app.name.clone(),
                    download: format_rate(app.rx_rate_bps, bits),
                    upload: format_rate(app.tx_rate_bps, bits),
                })
                .collect(),
            None,
        ),
        TopApps::Unavailable(reason) => (Vec::new(), Some(reason.clone())),
        TopApps::Disabled | TopApps::Pending => (Vec::new(), None),
    };
    Summary {
        tick: snapshot.tick,
        download: format_rate(totals.rx_rate_bps, bits),
        upload: format_rate(totals.tx_rate_bps, bits),
        adapters,
        apps,
        apps_error,
        ips: snapshot.ips.clone(),
    }
}

/// GET /api/summary: formatted totals and visible adapters for a menu-bar view.
pub(super) async fn summary_handler(State(state): State<AppState>) -> Response {
    match state.monitor.latest() {
        Some(snapshot) => Json(summarize(&snapshot, &state.display)).into_response(),
        None => error(StatusCode::SERVICE_UNAVAILABLE, "no sample taken yet"),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct IntervalRequest {
    seconds: f64,
}

/// PUT /api/interval: reschedules the poll loop (clamped to 0.2..10 s).
pub(super) async fn interval_handler(
    State(state): State<AppState>,
    Json(req): Json<IntervalRequest>,
) -> Response {
    if !req.seconds.is_finite() || req.seconds <= 0.0 {
        return error(StatusCode::BAD_REQUEST, "seconds must be a positive number");
    }
    if let Err(e) = state.monitor.start(req.seconds).await {
        return monitor_down(e);
    }
    Json(serde_json::json!({
        "intervalSecs": clamp_interval(req.seconds).as_secs_f64(),
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct ProcessTrafficRequest {
    enabled: bool,
    limit: usize,
}

/// PUT /api/process-traffic: turns per-process sampling on/off.
pub(super) async fn process_traffic_handler(
    State(state): State<AppState>,
    Json(req): Json<ProcessTrafficRequest>,
) -> Response {
    if req.limit == 0 {
        return error(StatusCode::BAD_REQUEST, "limit must be > 0");
    }
    match state
        .monitor
        .configure_process_traffic(req.enabled, req.limit)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => monitor_down(e),
    }
}

/// POST /api/adapters/{id}/reconnect: start a power-cycle of one adapter.
/// 202 once it is under way; the `reconnecting` list tracks completion.
pub(super) async fn reconnect_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    if !is_valid_adapter_id(&id) {
        return error(StatusCode::BAD_REQUEST, "adapter id must be alphanumeric");
    }
    match state.monitor.reconnect(id).await {
        Ok(Ok(())) => StatusCode::ACCEPTED.into_response(),
        Ok(Err(rejected)) => {
            let status = match rejected {
                ReconnectRejected::InvalidId => StatusCode::BAD_REQUEST,
                ReconnectRejected::UnknownAdapter => StatusCode::NOT_FOUND,
                ReconnectRejected::NotReconnectable => StatusCode::UNPROCESSABLE_ENTITY,
                ReconnectRejected::InProgress => StatusCode::CONFLICT,
            };
            error(status, rejected.to_string())
        }
        Err(e) => monitor_down(e),
    }
}
