// WebSocket snapshot stream

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::models::NetworkSnapshot;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Decrements the snapshot stream connection count on drop (connect = +1, drop = -1).
struct WsConnectionGuard(Arc<AtomicUsize>);

impl Drop for WsConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

pub(super) async fn ws_snapshot(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let monitor = state.monitor.clone();
    let conn_count = state.ws_connections.clone();
    ws.on_upgrade(move |socket| async move {
        // Subscribe before reading the latest value so no tick falls in between.
        let mut rx = monitor.subscribe();
        let initial = monitor.latest();
        if let Err(e) = stream_snapshots(socket, initial, &mut rx, conn_count).await {
            tracing::info!(error = %e, "Snapshot stream error");
        }
    })
}

/// Sends `text`; false when the client is gone or too slow.
async fn send_text(socket: &mut WebSocket, text: String) -> bool {
    matches!(
        timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(text.into()))).await,
        Ok(Ok(()))
    )
}

async fn stream_snapshots(
    mut socket: WebSocket,
    initial: Option<NetworkSnapshot>,
    rx: &mut broadcast::Receiver<NetworkSnapshot>,
    conn_count: Arc<AtomicUsize>,
) -> anyhow::Result<()> {
    conn_count.fetch_add(1, Ordering::Relaxed);
    let _guard = WsConnectionGuard(conn_count);
    tracing::info!("Client connected to snapshot stream");

    if let Some(snapshot) = initial
        && !send_text(&mut socket, serde_json::to_string(&snapshot)?).await
    {
        return Ok(());
    }

    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            result = rx.recv() => {
                let snapshot = match result {
                    Ok(s) => s,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Snapshot stream lagging; skipping ahead");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if !send_text(&mut socket, serde_json::to_string(&snapshot)?).await {
                    break;
                }
            }
            _ = ping_interval.tick() => {
                let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Ping(Bytes::new()))).await;
                if !matches!(r, Ok(Ok(()))) {
                    break;
                }
            }
        }
    }
    Ok(())
}
