//! Per-connection session loop.
//!
//! Each open device connection is served by two tasks:
//!
//! - the **session loop** ([`SessionEndpoint::run`]) registers the device,
//!   reads its messages in order and applies decisions to the handshake;
//! - the **frame writer** ([`write_frames`]) owns the sending half of the
//!   socket and drains the connection's frame queue onto it.
//!
//! When the socket write fails the writer stops and drops the queue, so
//! anything still trying to send observes [`Error::ConnectionLost`]. A frame
//! sent with [`Connection::send_confirmed`] is only confirmed after the sink
//! has accepted it; frames dropped with the queue are never confirmed.
//!
//! Both halves are generic over [`Stream`]/[`Sink`] so the loop runs the
//! same over a WebSocket or an in-memory channel.

use futures::{Sink, SinkExt, Stream, StreamExt};
use crate::error::Error;
use crate::handshake::Handshake;
use crate::protocol::{InboundMessage, WireMessage};
use crate::session::{Connection, FrameQueue};

/// Why a session loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The device closed the connection or the inbound stream ended
    Closed,
    /// Writing to the device failed
    ConnectionLost,
}

/// Runs the session loop for device connections.
#[derive(Debug, Clone)]
pub struct SessionEndpoint {
    handshake: Handshake,
}

impl SessionEndpoint {
    /// Create an endpoint that feeds decisions into `handshake`.
    #[must_use]
    pub const fn new(handshake: Handshake) -> Self {
        Self { handshake }
    }

    /// The handshake decisions are delivered to.
    #[must_use]
    pub const fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// Serve one device connection until it closes.
    ///
    /// Registers `conn` under `address`, processes `inbound` in arrival
    /// order, and unregisters the session on the way out (unless a newer
    /// connection has replaced it in the meantime).
    pub async fn run<S>(&self, address: &str, conn: Connection, mut inbound: S) -> SessionEnd
    where
        S: Stream<Item = InboundMessage> + Unpin,
    {
        let registry = self.handshake.registry();
        let connection_id = conn.id();

        registry.register(address, conn).await;
        tracing::info!("Device connected: {}", address);

        let end = loop {
            let Some(message) = inbound.next().await else {
                break SessionEnd::Closed;
            };

            match message {
                InboundMessage::Decision { token, decision } => {
                    tracing::debug!("Decision from {} (token {:?}): {}", address, token, decision);
                    match self.handshake.on_decision(address, decision).await {
                        Ok(_) => {}
                        Err(e) if e.is_connection_fatal() => break SessionEnd::ConnectionLost,
                        Err(e @ Error::StaleDecision(_)) => tracing::warn!("{}", e),
                        Err(e) => tracing::warn!("Transfer to {} aborted: {}", address, e),
                    }
                }
                InboundMessage::Close => break SessionEnd::Closed,
                InboundMessage::Other => {
                    tracing::debug!("Ignoring unrecognized message from {}", address);
                }
            }
        };

        registry.unregister_connection(address, connection_id).await;
        tracing::info!("Device disconnected: {} ({:?})", address, end);
        end
    }
}

/// Drain `frames` onto `sink` until either side closes.
///
/// Returns the number of messages written. The frame queue is dropped on
/// return, which makes every later send on its [`Connection`] fail.
pub async fn write_frames<W, M>(mut frames: FrameQueue, mut sink: W) -> usize
where
    W: Sink<M> + Unpin,
    W::Error: std::fmt::Display,
    M: From<WireMessage>,
{
    let mut written = 0;

    while let Some(queued) = frames.next_queued().await {
        let (frame, receipt) = queued.into_parts();
        let message = match frame.encode() {
            Ok(message) => message,
            Err(e) => {
                tracing::error!("Failed to encode frame: {}", e);
                continue;
            }
        };

        if let Err(e) = sink.send(M::from(message)).await {
            tracing::debug!("Socket write failed: {}", e);
            break;
        }
        receipt.confirm();
        written += 1;
    }

    drop(frames);
    let _ = sink.close().await;
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handshake::{HandshakeConfig, OfferOutcome};
    use crate::protocol::{Decision, Frame};
    use crate::session::SessionRegistry;
    use futures::channel::mpsc as fmpsc;
    use std::sync::Arc;
    use std::time::Duration;

    fn endpoint() -> (SessionEndpoint, Arc<SessionRegistry>) {
        let registry = Arc::new(SessionRegistry::new());
        let handshake = Handshake::new(
            registry.clone(),
            "192.168.1.2",
            HandshakeConfig {
                offer_timeout: Duration::ZERO,
                chunk_size: 4,
            },
        );
        (SessionEndpoint::new(handshake), registry)
    }

    #[tokio::test]
    async fn test_session_registers_and_unregisters() {
        let (endpoint, registry) = endpoint();
        let (conn, _frames) = Connection::channel("10.0.0.4", 8);
        let (tx, rx) = fmpsc::unbounded();

        let task = {
            let endpoint = endpoint.clone();
            tokio::spawn(async move { endpoint.run("10.0.0.4", conn, rx).await })
        };

        while !registry.contains("10.0.0.4").await {
            tokio::task::yield_now().await;
        }

        tx.unbounded_send(InboundMessage::Close).unwrap();
        assert_eq!(task.await.unwrap(), SessionEnd::Closed);
        assert!(!registry.contains("10.0.0.4").await);
    }

    #[tokio::test]
    async fn test_stale_decision_keeps_loop_running() {
        let (endpoint, registry) = endpoint();
        let (conn, _frames) = Connection::channel("10.0.0.4", 8);
        let (tx, rx) = fmpsc::unbounded();

        tx.unbounded_send(InboundMessage::Decision {
            token: "t".into(),
            decision: Decision::Accept,
        })
        .unwrap();
        tx.unbounded_send(InboundMessage::Other).unwrap();
        drop(tx);

        assert_eq!(endpoint.run("10.0.0.4", conn, rx).await, SessionEnd::Closed);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_accept_through_loop() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("a.bin");
        std::fs::write(&path, b"0123456789").unwrap();

        let (endpoint, registry) = endpoint();
        let (conn, mut frames) = Connection::channel("10.0.0.4", 32);
        let (tx, rx) = fmpsc::unbounded();

        let task = {
            let endpoint = endpoint.clone();
            tokio::spawn(async move { endpoint.run("10.0.0.4", conn, rx).await })
        };
        while !registry.contains("10.0.0.4").await {
            tokio::task::yield_now().await;
        }

        let ticket = endpoint
            .handshake()
            .offer("10.0.0.4", "a.bin", &path)
            .await
            .unwrap();
        assert!(matches!(frames.recv().await, Some(Frame::Offer { .. })));

        let (sink, out) = fmpsc::unbounded::<WireMessage>();
        let writer = tokio::spawn(write_frames(frames, sink));

        tx.unbounded_send(InboundMessage::Decision {
            token: "192.168.1.2".into(),
            decision: Decision::Accept,
        })
        .unwrap();

        let OfferOutcome::Completed(report) = ticket.outcome().await else {
            panic!("transfer should complete");
        };
        assert_eq!(report.chunks_sent, 3);

        drop(tx);
        assert_eq!(task.await.unwrap(), SessionEnd::Closed);
        assert_eq!(writer.await.unwrap(), 5);

        let written: Vec<WireMessage> = out.collect().await;
        assert_eq!(
            written.last(),
            Some(&WireMessage::Text(r#"{"type":"transfer_complete"}"#.into()))
        );
    }

    #[tokio::test]
    async fn test_peer_gone_before_marker_is_written() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("a.bin");
        std::fs::write(&path, b"0123456789").unwrap();

        let (endpoint, registry) = endpoint();
        let (conn, frames) = Connection::channel("10.0.0.4", crate::DEFAULT_FRAME_BUFFER);
        let (tx, rx) = fmpsc::unbounded();

        // The socket takes the offer, then the peer goes away.
        let written = Arc::new(std::sync::Mutex::new(Vec::<WireMessage>::new()));
        let sink = futures::sink::unfold(Arc::clone(&written), |log, message: WireMessage| async move {
            let accepted = {
                let mut log_guard = log.lock().unwrap();
                if log_guard.is_empty() {
                    log_guard.push(message);
                    true
                } else {
                    false
                }
            };
            if accepted {
                Ok(log)
            } else {
                Err("connection reset by peer".to_string())
            }
        });
        let writer = tokio::spawn(write_frames::<_, WireMessage>(frames, Box::pin(sink)));

        let task = {
            let endpoint = endpoint.clone();
            tokio::spawn(async move { endpoint.run("10.0.0.4", conn, rx).await })
        };
        while !registry.contains("10.0.0.4").await {
            tokio::task::yield_now().await;
        }

        let ticket = endpoint
            .handshake()
            .offer("10.0.0.4", "a.bin", &path)
            .await
            .unwrap();
        tx.unbounded_send(InboundMessage::Decision {
            token: "192.168.1.2".into(),
            decision: Decision::Accept,
        })
        .unwrap();

        assert!(matches!(ticket.outcome().await, OfferOutcome::Failed { .. }));
        assert_eq!(task.await.unwrap(), SessionEnd::ConnectionLost);
        assert!(!registry.contains("10.0.0.4").await);

        assert_eq!(writer.await.unwrap(), 1);
        assert_eq!(
            *written.lock().unwrap(),
            vec![WireMessage::Text("file_request:a.bin:192.168.1.2".into())]
        );
    }

    #[tokio::test]
    async fn test_write_frames_encodes_messages() {
        let (conn, frames) = Connection::channel("10.0.0.4", 8);
        let (sink, mut out) = fmpsc::unbounded::<WireMessage>();

        conn.send(Frame::Chunk(vec![9, 9])).await.unwrap();
        conn.send(Frame::Complete).await.unwrap();
        drop(conn);

        assert_eq!(write_frames(frames, sink).await, 2);
        assert_eq!(out.next().await, Some(WireMessage::Binary(vec![9, 9])));
        assert_eq!(
            out.next().await,
            Some(WireMessage::Text(r#"{"type":"transfer_complete"}"#.into()))
        );
    }

    #[tokio::test]
    async fn test_write_failure_closes_connection() {
        let (conn, frames) = Connection::channel("10.0.0.4", 8);
        let (sink, out) = fmpsc::unbounded::<WireMessage>();
        drop(out);

        let writer = tokio::spawn(write_frames(frames, sink));
        conn.send(Frame::Complete).await.unwrap();
        assert_eq!(writer.await.unwrap(), 0);

        let err = conn.send(Frame::Complete).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionLost(_)));
    }
}
