use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use snapdash_core::sync::{DashboardState, SnapshotStore};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::state::AppState;

const BROADCAST_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct UiBroadcaster {
    tx: broadcast::Sender<String>,
}

impl Default for UiBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl UiBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn broadcast(&self, event_type: &str, payload: Value) {
        let msg = json!({
            "type": event_type,
            "payload": payload,
        });
        // No connected clients is fine.
        let _ = self.tx.send(msg.to_string());
    }
}

/// Events describing what changed between two store states
fn store_events(prev: &DashboardState, next: &DashboardState) -> Vec<(&'static str, Value)> {
    let mut events = Vec::new();

    if !Arc::ptr_eq(&prev.configs, &next.configs) {
        events.push((
            "configs:updated",
            json!({
                "configs": next.config_names(),
                "generation": next.generation,
            }),
        ));
    }

    for (name, subvolume) in &next.subvolumes {
        let changed = match prev.subvolume(name) {
            Some(before) => {
                !Arc::ptr_eq(&before.snapshots, &subvolume.snapshots)
                    || before.status != subvolume.status
            }
            None => false,
        };
        if changed {
            events.push((
                "snapshots:updated",
                json!({
                    "config": name,
                    "generation": next.generation,
                }),
            ));
        }
    }

    events
}

/// Push store changes to connected clients until cancelled
pub fn spawn_store_forwarder(
    store: &SnapshotStore,
    ui: UiBroadcaster,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let mut rx = store.subscribe();
    tokio::spawn(async move {
        let mut prev = rx.borrow_and_update().clone();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let next = rx.borrow_and_update().clone();
                    for (event_type, payload) in store_events(&prev, &next) {
                        ui.broadcast(event_type, payload);
                    }
                    prev = next;
                }
            }
        }
    })
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ui_socket(socket, state))
}

async fn handle_ui_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut rx = state.ui.subscribe();

    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    if sender.send(Message::Text(msg.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!("UI socket lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Clients only listen; drain until they go away.
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }
}
