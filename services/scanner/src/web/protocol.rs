//! services/scanner/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the
//! scanner service for driving a live scan session.

use serde::{Deserialize, Serialize};
use veritrace_core::domain::{CodeCorners, StatusSnapshot};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Requests the camera and starts the sampling loop.
    Activate,

    /// Stops the sampling loop and releases the camera.
    Deactivate,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The current state machine value plus the latest error annotation.
    /// The UI renders camera prompts, spinners and error banners from this.
    Status {
        state: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// The bounding quad of the last detected code, as
    /// `[top_left, top_right, bottom_right, bottom_left]` pixel pairs,
    /// or `null` when nothing is detected.
    Overlay { corners: Option<[[f32; 2]; 4]> },

    /// A scanned code resolved to a record; the UI should transition to it.
    Navigate { record_id: String },
}

impl ServerMessage {
    pub fn status(snapshot: &StatusSnapshot) -> Self {
        ServerMessage::Status {
            state: snapshot.state.as_str().to_string(),
            message: snapshot.message.clone(),
        }
    }

    pub fn overlay(corners: Option<&CodeCorners>) -> Self {
        ServerMessage::Overlay {
            corners: corners.map(|c| {
                [
                    [c.top_left.x, c.top_left.y],
                    [c.top_right.x, c.top_right.y],
                    [c.bottom_right.x, c.bottom_right.y],
                    [c.bottom_left.x, c.bottom_left.y],
                ]
            }),
        }
    }

    pub fn navigate(record_id: &str) -> Self {
        ServerMessage::Navigate {
            record_id: record_id.to_string(),
        }
    }
}
