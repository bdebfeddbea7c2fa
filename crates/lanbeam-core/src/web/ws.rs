//! WebSocket transport for device sessions.

use std::net::SocketAddr;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::HeaderMap,
    response::Response,
};
use futures::StreamExt;

use crate::endpoint::write_frames;
use crate::protocol::{InboundMessage, WireMessage};
use crate::session::Connection;

use super::handlers::caller_address;
use super::state::SharedState;

impl From<WireMessage> for Message {
    fn from(message: WireMessage) -> Self {
        match message {
            WireMessage::Text(text) => Self::Text(text.into()),
            WireMessage::Binary(data) => Self::Binary(data.into()),
        }
    }
}

/// Decode one WebSocket message for the session loop.
fn inbound(message: Message) -> InboundMessage {
    match message {
        Message::Text(text) => InboundMessage::parse_text(text.as_str()),
        Message::Close(_) => InboundMessage::Close,
        Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => InboundMessage::Other,
    }
}

/// GET /ws/connect - Open a device session.
pub async fn connect(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let address = caller_address(&headers, peer);
    ws.on_upgrade(move |socket| serve_device(state, address, socket))
}

async fn serve_device(state: SharedState, address: String, socket: WebSocket) {
    let (sink, stream) = socket.split();
    let (conn, frames) = Connection::channel(&address, state.config.transfer.frame_buffer);

    let writer = tokio::spawn(write_frames::<_, Message>(frames, sink));

    let inbound = stream.map(|result| match result {
        Ok(message) => inbound(message),
        Err(e) => {
            tracing::debug!("WebSocket read failed: {}", e);
            InboundMessage::Close
        }
    });

    let end = state.endpoint.run(&address, conn, inbound).await;
    tracing::debug!("Session for {} ended: {:?}", address, end);

    writer.abort();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_to_ws_message() {
        let text: Message = WireMessage::Text("file_request:a.txt:10.0.0.1".into()).into();
        assert!(matches!(text, Message::Text(t) if t.as_str() == "file_request:a.txt:10.0.0.1"));

        let binary: Message = WireMessage::Binary(vec![1, 2, 3]).into();
        assert!(matches!(binary, Message::Binary(b) if b[..] == [1, 2, 3]));
    }

    #[test]
    fn test_inbound_decoding() {
        assert_eq!(
            inbound(Message::Text("file_response:10.0.0.1:reject".into())),
            InboundMessage::Decision {
                token: "10.0.0.1".into(),
                decision: crate::protocol::Decision::Reject,
            }
        );
        assert_eq!(inbound(Message::Close(None)), InboundMessage::Close);
        assert_eq!(
            inbound(Message::Binary(vec![0u8; 4].into())),
            InboundMessage::Other
        );
    }
}
