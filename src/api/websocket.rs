//! WebSocket handler for real-time state updates
//!
//! Provides a WebSocket endpoint at `/ws`. Each client first receives a
//! `snapshot` of the gallery state, then every change the store publishes.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use super::shared::SharedStateHandle;
use crate::gallery::StateSnapshot;

#[derive(Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
enum InitialMessage {
    Snapshot(StateSnapshot),
}

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedStateHandle>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedStateHandle) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the snapshot so no change falls between the two
    let mut rx = state.gallery.subscribe();

    let initial = InitialMessage::Snapshot(state.gallery.snapshot());
    match serde_json::to_string(&initial) {
        Ok(json) => {
            if sender.send(Message::Text(json)).await.is_err() {
                return;
            }
        }
        Err(e) => {
            tracing::error!("Failed to serialize snapshot: {}", e);
            return;
        }
    }

    tracing::info!("WebSocket client connected");

    // Clients only listen; drain input until they close
    let recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    tracing::debug!("WebSocket client requested close");
                    break;
                }
                Err(e) => {
                    tracing::warn!("WebSocket receive error: {}", e);
                    break;
                }
                Ok(other) => tracing::trace!("Ignoring WebSocket message: {:?}", other),
            }
        }
    });

    let send_task = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let Ok(json) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("WebSocket client lagged, skipped {} events", n);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    tokio::select! {
        _ = recv_task => {},
        _ = send_task => {},
    }

    tracing::info!("WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_message_shape() {
        let json = serde_json::to_value(InitialMessage::Snapshot(StateSnapshot::default())).unwrap();
        assert_eq!(json["type"], "snapshot");
        assert_eq!(json["data"]["currentImage"], serde_json::Value::Null);
        assert!(json["data"]["gallery"].as_array().unwrap().is_empty());
        assert_eq!(json["data"]["settings"]["gridCountX"], 8);
    }

    #[test]
    fn test_store_changes_become_frames() {
        use crate::border::BorderSettingsUpdate;
        use crate::gallery::{GalleryStore, MemoryStorage, StateEvent};
        use std::sync::Arc;

        let store = GalleryStore::load(Arc::new(MemoryStorage::new()));
        let mut rx = store.subscribe();
        store.set_uploaded_image(Some("/uploads/a.png".into())).unwrap();
        store.update_settings(&BorderSettingsUpdate {
            is_reversed: Some(true),
            ..Default::default()
        });

        let frame = |rx: &mut tokio::sync::broadcast::Receiver<StateEvent>| {
            serde_json::to_value(rx.try_recv().unwrap()).unwrap()
        };

        let current = frame(&mut rx);
        assert_eq!(current["type"], "current_image");
        assert_eq!(current["data"]["image"], "/uploads/a.png");

        let gallery = frame(&mut rx);
        assert_eq!(gallery["type"], "gallery");
        assert_eq!(gallery["data"]["images"], serde_json::json!(["/uploads/a.png"]));

        let settings = frame(&mut rx);
        assert_eq!(settings["type"], "settings");
        assert_eq!(settings["data"]["isReversed"], true);
        assert_eq!(settings["data"]["borderWidth"], 40);
    }
}
