//! WebSocket transport for live sessions.
//!
//! The gateway only relays bytes: inbound frames are decoded into
//! `post_message` calls on the session manager, and every appended log entry
//! is encoded back out in append order. Session state lives entirely in the
//! manager; when the transport drops, the gateway reports the disconnect and
//! the manager decides what it means.

use crate::live::session::LiveSessionManager;
use crate::types::{MessageType, Sender};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;

/// Inbound frame shape. Clients may label the payload kind with either
/// `message_type` or `type`; anything that is not valid JSON is treated as a
/// plain text message.
#[derive(Debug, Default, Deserialize)]
struct InboundFrame {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    message_type: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

/// Decode one inbound text frame into a message kind and content.
fn decode_frame(raw: &str) -> (MessageType, String) {
    let frame: InboundFrame = serde_json::from_str(raw).unwrap_or_else(|_| InboundFrame {
        content: Some(raw.to_string()),
        ..Default::default()
    });

    let label = frame
        .message_type
        .or(frame.kind)
        .unwrap_or_default()
        .to_lowercase();
    let message_type = if label == "audio" {
        MessageType::Audio
    } else {
        MessageType::Text
    };

    (message_type, frame.content.unwrap_or_default())
}

/// Drive one accepted WebSocket connection for `session_id` until either
/// side goes away.
pub async fn serve(socket: WebSocket, sessions: Arc<LiveSessionManager>, session_id: String) {
    // Subscribe before the greeting so the replay/live handoff has no gap.
    let (replay, mut updates) = match sessions.subscribe(&session_id) {
        Ok(subscription) => subscription,
        Err(err) => {
            tracing::warn!(session_id, %err, "rejecting connection to unknown session");
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();

    let outbound_session = session_id.clone();
    let mut outbound = tokio::spawn(async move {
        for entry in replay {
            let Ok(frame) = serde_json::to_string(&entry) else {
                continue;
            };
            if sink.send(WsMessage::Text(frame.into())).await.is_err() {
                return;
            }
        }
        loop {
            match updates.recv().await {
                Ok(entry) => {
                    let Ok(frame) = serde_json::to_string(&entry) else {
                        continue;
                    };
                    if sink.send(WsMessage::Text(frame.into())).await.is_err() {
                        return;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(
                        session_id = %outbound_session,
                        missed,
                        "outbound channel lagged, client missed entries"
                    );
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
            }
        }
    });

    let greeting = format!(
        "Connected to live research session {session_id}. Ask a question to begin."
    );
    if let Err(err) = sessions
        .post_message(&session_id, Sender::System, greeting, MessageType::Text)
        .await
    {
        tracing::debug!(session_id, %err, "could not post connection greeting");
    }

    // Inbound frames are processed strictly sequentially, which preserves
    // per-session FIFO ordering by construction.
    while let Some(message) = stream.next().await {
        match message {
            Ok(WsMessage::Text(raw)) => {
                let (message_type, content) = decode_frame(raw.as_str());
                match sessions
                    .post_message(&session_id, Sender::User, content, message_type)
                    .await
                {
                    Ok(_) => {}
                    Err(err) => {
                        tracing::info!(session_id, %err, "closing channel after rejected message");
                        break;
                    }
                }
            }
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {
                // Binary/ping/pong frames carry no session payload.
            }
            Err(err) => {
                tracing::warn!(session_id, %err, "transport error on session channel");
                break;
            }
        }
    }

    outbound.abort();
    let _ = (&mut outbound).await;

    // A clean endSession keeps its state; anything else is a transport loss.
    sessions.mark_disconnected(&session_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_json_text_frame() {
        let (message_type, content) =
            decode_frame(r#"{"type": "message", "content": "what changed?"}"#);
        assert_eq!(message_type, MessageType::Text);
        assert_eq!(content, "what changed?");
    }

    #[test]
    fn test_decode_prefers_message_type_over_type() {
        let (message_type, _) =
            decode_frame(r#"{"type": "message", "message_type": "audio", "content": ""}"#);
        assert_eq!(message_type, MessageType::Audio);
    }

    #[test]
    fn test_decode_audio_via_type_label() {
        let (message_type, content) = decode_frame(r#"{"type": "AUDIO", "content": "blob"}"#);
        assert_eq!(message_type, MessageType::Audio);
        assert_eq!(content, "blob");
    }

    #[test]
    fn test_decode_raw_text_falls_back_to_plain_message() {
        let (message_type, content) = decode_frame("just a question");
        assert_eq!(message_type, MessageType::Text);
        assert_eq!(content, "just a question");
    }

    #[test]
    fn test_decode_missing_content_is_empty() {
        let (message_type, content) = decode_frame(r#"{"type": "message"}"#);
        assert_eq!(message_type, MessageType::Text);
        assert_eq!(content, "");
    }
}
