//! Registry of live device sessions.
//!
//! Every peer that holds an open connection to the host has exactly one
//! [`DeviceSession`], keyed by its network address. The registry is the only
//! structure shared between connection tasks, so all of its state, including
//! each session's pending [`TransferOffer`], sits behind a single lock.
//!
//! Connection handles are cloned out of the lock before anything is written
//! to them; no I/O ever happens while the lock is held.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, Mutex};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::handshake::OfferOutcome;
use crate::protocol::Frame;

/// Handle for writing frames to one device connection.
///
/// The handle feeds a bounded channel drained by the task that owns the
/// socket. Once that task stops, every send fails with
/// [`Error::ConnectionLost`].
#[derive(Debug, Clone)]
pub struct Connection {
    id: Uuid,
    address: String,
    tx: mpsc::Sender<QueuedFrame>,
}

impl Connection {
    /// Create a handle and the queue the socket writer drains.
    ///
    /// `buffer` bounds how many frames may queue before senders wait.
    #[must_use]
    pub fn channel(address: impl Into<String>, buffer: usize) -> (Self, FrameQueue) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let conn = Self {
            id: Uuid::new_v4(),
            address: address.into(),
            tx,
        };
        (conn, FrameQueue { rx })
    }

    /// Unique id of the underlying connection.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Address of the device on the other end.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether the socket writer has gone away.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Queue a frame for the device, waiting if the buffer is full.
    ///
    /// Returning `Ok` only means the frame is queued; see
    /// [`Connection::send_confirmed`] for a delivered write.
    pub async fn send(&self, frame: Frame) -> Result<()> {
        self.enqueue(QueuedFrame {
            frame,
            written: None,
        })
        .await
    }

    /// Queue a frame and wait until the socket writer has written it.
    ///
    /// Frames are written in order, so once this returns every frame queued
    /// before it has been written too.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionLost`] if the writer stops before the frame is
    /// written.
    pub async fn send_confirmed(&self, frame: Frame) -> Result<()> {
        let (written, confirmation) = oneshot::channel();
        self.enqueue(QueuedFrame {
            frame,
            written: Some(written),
        })
        .await?;
        confirmation.await.map_err(|_| self.lost())
    }

    async fn enqueue(&self, queued: QueuedFrame) -> Result<()> {
        self.tx.send(queued).await.map_err(|_| self.lost())
    }

    fn lost(&self) -> Error {
        Error::ConnectionLost(self.address.clone())
    }
}

/// A frame waiting in a connection's queue.
#[derive(Debug)]
pub struct QueuedFrame {
    frame: Frame,
    written: Option<oneshot::Sender<()>>,
}

impl QueuedFrame {
    /// Split into the frame and its write receipt.
    #[must_use]
    pub fn into_parts(self) -> (Frame, WriteReceipt) {
        (self.frame, WriteReceipt(self.written))
    }
}

/// Confirms a frame reached the socket.
///
/// Dropping the receipt without calling [`WriteReceipt::confirm`] makes a
/// waiting [`Connection::send_confirmed`] fail with
/// [`Error::ConnectionLost`].
#[derive(Debug)]
pub struct WriteReceipt(Option<oneshot::Sender<()>>);

impl WriteReceipt {
    /// Report the frame as written.
    pub fn confirm(self) {
        if let Some(tx) = self.0 {
            let _ = tx.send(());
        }
    }
}

/// Receiving end of a [`Connection`], owned by whatever writes to the socket.
#[derive(Debug)]
pub struct FrameQueue {
    rx: mpsc::Receiver<QueuedFrame>,
}

impl FrameQueue {
    /// Take the next frame along with its write receipt.
    pub async fn next_queued(&mut self) -> Option<QueuedFrame> {
        self.rx.recv().await
    }

    /// Take the next frame, counting it as written.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.next_queued().await.map(take_written)
    }

    /// Take a frame if one is queued, counting it as written.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue is empty or every handle is gone.
    pub fn try_recv(&mut self) -> std::result::Result<Frame, mpsc::error::TryRecvError> {
        self.rx.try_recv().map(take_written)
    }
}

fn take_written(queued: QueuedFrame) -> Frame {
    let (frame, receipt) = queued.into_parts();
    receipt.confirm();
    frame
}

/// A proposed transfer waiting for the device's decision.
#[derive(Debug)]
pub struct TransferOffer {
    /// Offer id, reported to the initiator
    pub id: Uuid,
    /// File name announced to the device
    pub filename: String,
    /// File size at offer time
    pub filesize: u64,
    /// File to stream once accepted
    pub source_path: PathBuf,
    /// When the offer was made
    pub offered_at: Instant,
    reply: Option<oneshot::Sender<OfferOutcome>>,
}

impl TransferOffer {
    /// Create an offer along with the receiver for its outcome.
    #[must_use]
    pub fn new(
        filename: impl Into<String>,
        filesize: u64,
        source_path: impl Into<PathBuf>,
    ) -> (Self, oneshot::Receiver<OfferOutcome>) {
        let (reply, rx) = oneshot::channel();
        let offer = Self {
            id: Uuid::new_v4(),
            filename: filename.into(),
            filesize,
            source_path: source_path.into(),
            offered_at: Instant::now(),
            reply: Some(reply),
        };
        (offer, rx)
    }

    /// Report the outcome to whoever made the offer.
    ///
    /// The initiator may have stopped listening; that is not an error.
    pub fn resolve(mut self, outcome: OfferOutcome) {
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(outcome);
        }
    }

    /// Serializable view of the offer.
    #[must_use]
    pub fn info(&self) -> OfferInfo {
        OfferInfo {
            id: self.id,
            filename: self.filename.clone(),
            filesize: self.filesize,
            source_path: self.source_path.clone(),
            pending_secs: self.offered_at.elapsed().as_secs(),
        }
    }
}

/// Snapshot of a pending offer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfferInfo {
    /// Offer id
    pub id: Uuid,
    /// File name announced to the device
    pub filename: String,
    /// File size at offer time
    pub filesize: u64,
    /// File to stream once accepted
    pub source_path: PathBuf,
    /// Seconds since the offer was made
    pub pending_secs: u64,
}

/// Snapshot of a registered session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    /// Device address
    pub address: String,
    /// Seconds since the device connected
    pub connected_secs: u64,
    /// Pending offer, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_offer: Option<OfferInfo>,
}

/// A live device session: one connection and at most one pending offer.
#[derive(Debug)]
pub struct DeviceSession {
    connection: Connection,
    connected_at: Instant,
    pending: Option<TransferOffer>,
}

impl DeviceSession {
    fn new(connection: Connection) -> Self {
        Self {
            connection,
            connected_at: Instant::now(),
            pending: None,
        }
    }

    /// How long the device has been connected.
    #[must_use]
    pub fn connected_for(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

/// Maps device addresses to their live sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, DeviceSession>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for `address`.
    ///
    /// A session already registered under the same address is replaced and
    /// its connection abandoned; any offer pending on it is dropped, which
    /// its initiator observes as a failure.
    pub async fn register(&self, address: impl Into<String>, connection: Connection) {
        let address = address.into();
        let replaced = self
            .sessions
            .lock()
            .await
            .insert(address.clone(), DeviceSession::new(connection));

        if let Some(old) = replaced {
            tracing::debug!(
                "Replaced session for {} (previous connection {})",
                address,
                old.connection.id()
            );
        }
    }

    /// Remove the session for `address`. No-op if absent.
    pub async fn unregister(&self, address: &str) -> bool {
        self.sessions.lock().await.remove(address).is_some()
    }

    /// Remove the session for `address` only if it still belongs to
    /// `connection_id`.
    ///
    /// Endpoint loops use this so that an abandoned connection closing late
    /// does not evict the session that replaced it.
    pub async fn unregister_connection(&self, address: &str, connection_id: Uuid) -> bool {
        let mut sessions = self.sessions.lock().await;
        match sessions.get(address) {
            Some(session) if session.connection.id() == connection_id => {
                sessions.remove(address);
                true
            }
            _ => false,
        }
    }

    /// Connection handle for `address`, if registered.
    pub async fn lookup(&self, address: &str) -> Option<Connection> {
        self.sessions
            .lock()
            .await
            .get(address)
            .map(|s| s.connection.clone())
    }

    /// Whether a session is registered for `address`.
    pub async fn contains(&self, address: &str) -> bool {
        self.sessions.lock().await.contains_key(address)
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Whether no sessions are registered.
    pub async fn is_empty(&self) -> bool {
        self.sessions.lock().await.is_empty()
    }

    /// Registered addresses, sorted.
    pub async fn addresses(&self) -> Vec<String> {
        let mut addrs: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        addrs.sort();
        addrs
    }

    /// Snapshot of all sessions, sorted by address.
    pub async fn snapshot(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> = self
            .sessions
            .lock()
            .await
            .iter()
            .map(|(address, session)| SessionInfo {
                address: address.clone(),
                connected_secs: session.connected_for().as_secs(),
                pending_offer: session.pending.as_ref().map(TransferOffer::info),
            })
            .collect();
        infos.sort_by(|a, b| a.address.cmp(&b.address));
        infos
    }

    /// The offer pending for `address`, if any.
    pub async fn pending_offer(&self, address: &str) -> Option<OfferInfo> {
        self.sessions
            .lock()
            .await
            .get(address)
            .and_then(|s| s.pending.as_ref().map(TransferOffer::info))
    }

    /// Attach `offer` to the session for `address`.
    ///
    /// Returns the connection to notify and whichever offer was displaced.
    /// Fails with [`Error::DeviceOffline`] if no session is registered; the
    /// offer is dropped in that case.
    pub async fn set_offer(
        &self,
        address: &str,
        offer: TransferOffer,
    ) -> Result<(Connection, Option<TransferOffer>)> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions
            .get_mut(address)
            .ok_or_else(|| Error::DeviceOffline(address.to_string()))?;
        let previous = session.pending.replace(offer);
        Ok((session.connection.clone(), previous))
    }

    /// Take the pending offer for `address` together with its connection.
    pub async fn take_offer(&self, address: &str) -> Option<(TransferOffer, Connection)> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(address)?;
        let offer = session.pending.take()?;
        Some((offer, session.connection.clone()))
    }

    /// Take the pending offer for `address` only if it is still `offer_id`.
    pub async fn take_offer_if(&self, address: &str, offer_id: Uuid) -> Option<TransferOffer> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(address)?;
        if session.pending.as_ref().is_some_and(|o| o.id == offer_id) {
            session.pending.take()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(address: &str) -> (Connection, FrameQueue) {
        Connection::channel(address, 4)
    }

    #[tokio::test]
    async fn test_register_then_unregister() {
        let registry = SessionRegistry::new();
        let (c, _rx) = conn("192.168.1.5");

        registry.register("192.168.1.5", c).await;
        assert!(registry.lookup("192.168.1.5").await.is_some());
        assert_eq!(registry.len().await, 1);

        assert!(registry.unregister("192.168.1.5").await);
        assert!(registry.lookup("192.168.1.5").await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_unregister_absent_is_noop() {
        let registry = SessionRegistry::new();
        assert!(!registry.unregister("10.0.0.1").await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_reconnect_replaces_session() {
        let registry = SessionRegistry::new();
        let (first, _rx1) = conn("10.0.0.7");
        let (second, _rx2) = conn("10.0.0.7");
        let second_id = second.id();

        registry.register("10.0.0.7", first).await;
        registry.register("10.0.0.7", second).await;

        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.lookup("10.0.0.7").await.unwrap().id(), second_id);
    }

    #[tokio::test]
    async fn test_stale_connection_cannot_unregister_replacement() {
        let registry = SessionRegistry::new();
        let (first, _rx1) = conn("10.0.0.7");
        let (second, _rx2) = conn("10.0.0.7");
        let first_id = first.id();
        let second_id = second.id();

        registry.register("10.0.0.7", first).await;
        registry.register("10.0.0.7", second).await;

        assert!(!registry.unregister_connection("10.0.0.7", first_id).await);
        assert!(registry.contains("10.0.0.7").await);

        assert!(registry.unregister_connection("10.0.0.7", second_id).await);
        assert!(!registry.contains("10.0.0.7").await);
    }

    #[tokio::test]
    async fn test_set_offer_requires_session() {
        let registry = SessionRegistry::new();
        let (offer, _rx) = TransferOffer::new("a.txt", 3, "/tmp/a.txt");

        let err = registry.set_offer("10.0.0.9", offer).await.unwrap_err();
        assert!(matches!(err, Error::DeviceOffline(addr) if addr == "10.0.0.9"));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_offer_is_last_writer_wins() {
        let registry = SessionRegistry::new();
        let (c, _rx) = conn("10.0.0.2");
        registry.register("10.0.0.2", c).await;

        let (first, _r1) = TransferOffer::new("one.txt", 1, "/tmp/one.txt");
        let (second, _r2) = TransferOffer::new("two.txt", 2, "/tmp/two.txt");
        let second_id = second.id;

        let (_, displaced) = registry.set_offer("10.0.0.2", first).await.unwrap();
        assert!(displaced.is_none());
        let (_, displaced) = registry.set_offer("10.0.0.2", second).await.unwrap();
        assert_eq!(displaced.unwrap().filename, "one.txt");

        let pending = registry.pending_offer("10.0.0.2").await.unwrap();
        assert_eq!(pending.id, second_id);
        assert_eq!(pending.filename, "two.txt");
        assert_eq!(pending.source_path, PathBuf::from("/tmp/two.txt"));
    }

    #[tokio::test]
    async fn test_take_offer_consumes() {
        let registry = SessionRegistry::new();
        let (c, _rx) = conn("10.0.0.2");
        registry.register("10.0.0.2", c).await;

        let (offer, _r) = TransferOffer::new("a.txt", 1, "/tmp/a.txt");
        registry.set_offer("10.0.0.2", offer).await.unwrap();

        assert!(registry.take_offer("10.0.0.2").await.is_some());
        assert!(registry.take_offer("10.0.0.2").await.is_none());
        assert!(registry.pending_offer("10.0.0.2").await.is_none());
    }

    #[tokio::test]
    async fn test_take_offer_if_matches_id() {
        let registry = SessionRegistry::new();
        let (c, _rx) = conn("10.0.0.2");
        registry.register("10.0.0.2", c).await;

        let (offer, _r) = TransferOffer::new("a.txt", 1, "/tmp/a.txt");
        let id = offer.id;
        registry.set_offer("10.0.0.2", offer).await.unwrap();

        assert!(registry.take_offer_if("10.0.0.2", Uuid::new_v4()).await.is_none());
        assert!(registry.pending_offer("10.0.0.2").await.is_some());
        assert!(registry.take_offer_if("10.0.0.2", id).await.is_some());
        assert!(registry.pending_offer("10.0.0.2").await.is_none());
    }

    #[tokio::test]
    async fn test_send_on_closed_connection_fails() {
        let (c, rx) = conn("10.0.0.3");
        drop(rx);

        assert!(c.is_closed());
        let err = c.send(Frame::Complete).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionLost(addr) if addr == "10.0.0.3"));
    }

    #[tokio::test]
    async fn test_send_confirmed_waits_for_write() {
        let (c, mut rx) = conn("10.0.0.3");

        let sender = tokio::spawn(async move { c.send_confirmed(Frame::Complete).await });
        let queued = rx.next_queued().await.unwrap();
        assert!(!sender.is_finished());

        let (frame, receipt) = queued.into_parts();
        assert_eq!(frame, Frame::Complete);
        receipt.confirm();
        sender.await.unwrap().expect("confirmed");
    }

    #[tokio::test]
    async fn test_unwritten_frame_is_connection_lost() {
        let (c, mut rx) = conn("10.0.0.3");

        let sender = tokio::spawn(async move { c.send_confirmed(Frame::Complete).await });
        let queued = rx.next_queued().await.unwrap();
        drop(queued);

        let err = sender.await.unwrap().unwrap_err();
        assert!(matches!(err, Error::ConnectionLost(addr) if addr == "10.0.0.3"));
    }

    #[tokio::test]
    async fn test_dropped_queue_fails_pending_confirmation() {
        let (c, rx) = conn("10.0.0.3");
        c.send(Frame::Chunk(vec![1])).await.unwrap();

        let sender = tokio::spawn(async move { c.send_confirmed(Frame::Complete).await });
        while rx.rx.len() < 2 {
            tokio::task::yield_now().await;
        }
        drop(rx);

        assert!(matches!(
            sender.await.unwrap().unwrap_err(),
            Error::ConnectionLost(_)
        ));
    }

    #[tokio::test]
    async fn test_snapshot_is_sorted() {
        let registry = SessionRegistry::new();
        let (a, _ra) = conn("10.0.0.9");
        let (b, _rb) = conn("10.0.0.1");
        registry.register("10.0.0.9", a).await;
        registry.register("10.0.0.1", b).await;

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].address, "10.0.0.1");
        assert!(snapshot[0].pending_offer.is_none());
        assert_eq!(registry.addresses().await, vec!["10.0.0.1", "10.0.0.9"]);
    }
}
