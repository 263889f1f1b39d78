//! services/scanner/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! One connection drives one `ScanController`; client commands flow in,
//! status/overlay/navigation events flow out.

use crate::{
    scan::{AppState, ScanController},
    web::protocol::{ClientMessage, ServerMessage},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use veritrace_core::ports::NavigationSink;

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

/// A per-connection navigation sink: resolved record ids are forwarded to
/// the client as `navigate` messages by the connection loop.
struct ChannelNavigationSink {
    tx: mpsc::UnboundedSender<String>,
}

impl NavigationSink for ChannelNavigationSink {
    fn navigate_to_record(&self, record_id: &str) {
        let _ = self.tx.send(record_id.to_string());
    }
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    info!("New WebSocket connection established.");

    let (mut sender, mut receiver) = socket.split();

    let (nav_tx, mut nav_rx) = mpsc::unbounded_channel::<String>();
    let navigator: Arc<dyn NavigationSink> = Arc::new(ChannelNavigationSink { tx: nav_tx });
    let controller = ScanController::new(app_state, navigator);

    let mut status_rx = controller.status();
    let mut overlay_rx = controller.overlay();

    loop {
        let outbound = tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_text_message(text.to_string(), &controller).await;
                        continue;
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client sent close message.");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        warn!("WebSocket receive error: {e}");
                        break;
                    }
                    None => {
                        info!("Client disconnected.");
                        break;
                    }
                }
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = status_rx.borrow_and_update().clone();
                ServerMessage::status(&snapshot)
            }
            changed = overlay_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let corners = *overlay_rx.borrow_and_update();
                ServerMessage::overlay(corners.as_ref())
            }
            Some(record_id) = nav_rx.recv() => {
                ServerMessage::navigate(&record_id)
            }
        };

        let json = match serde_json::to_string(&outbound) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize server message: {e}");
                continue;
            }
        };
        if sender.send(Message::Text(json.into())).await.is_err() {
            warn!("Failed to send message to client. Closing connection.");
            break;
        }
    }

    // The unmount path: never leak an open camera past the connection.
    controller.deactivate().await;
    info!("WebSocket connection closed.");
}

/// Helper function to handle the logic for different `ClientMessage` variants.
async fn handle_text_message(text: String, controller: &ScanController) {
    match serde_json::from_str::<ClientMessage>(&text) {
        Ok(ClientMessage::Activate) => {
            info!("Activate message received. Starting scan session.");
            if let Err(e) = controller.activate().await {
                warn!("Camera activation failed: {e}");
            }
        }
        Ok(ClientMessage::Deactivate) => {
            info!("Deactivate message received. Stopping scan session.");
            controller.deactivate().await;
        }
        Err(e) => {
            warn!("Failed to deserialize client message: {}", e);
        }
    }
}
