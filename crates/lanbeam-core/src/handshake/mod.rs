//! Offer / accept / reject exchange that gates every transfer.
//!
//! An initiator (the operator, through the HTTP API or the CLI) calls
//! [`Handshake::offer`]. The offer is parked on the device's session and a
//! `file_request` notification goes out on its connection; the call returns
//! right away with an [`OfferTicket`]. The device's answer arrives later on
//! its own endpoint loop, which hands it to [`Handshake::on_decision`].
//!
//! Offers that nobody answers expire after the configured timeout. Whatever
//! happens to an offer, its ticket resolves to exactly one [`OfferOutcome`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::protocol::{Decision, Frame};
use crate::session::{SessionRegistry, TransferOffer};
use crate::transport::{ChunkedSender, TransferReport};

/// Final state of an offer, as seen by its initiator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OfferOutcome {
    /// The device accepted and the file was streamed completely
    Completed(TransferReport),
    /// The device rejected the offer
    Rejected,
    /// The device did not answer in time
    Expired,
    /// A newer offer to the same device replaced this one
    Superseded,
    /// The device accepted but the transfer did not finish
    Failed {
        /// What went wrong
        reason: String,
    },
}

/// Receipt for an offer that has been sent to a device.
#[derive(Debug)]
pub struct OfferTicket {
    offer_id: Uuid,
    address: String,
    rx: oneshot::Receiver<OfferOutcome>,
}

impl OfferTicket {
    /// Id of the offer.
    #[must_use]
    pub const fn offer_id(&self) -> Uuid {
        self.offer_id
    }

    /// Address of the device the offer went to.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Wait for the offer to resolve.
    ///
    /// If the device's session goes away while the offer is pending, the
    /// outcome is [`OfferOutcome::Failed`].
    pub async fn outcome(self) -> OfferOutcome {
        self.rx.await.unwrap_or_else(|_| OfferOutcome::Failed {
            reason: "device disconnected before the offer resolved".to_string(),
        })
    }
}

/// Tunables for the handshake.
#[derive(Debug, Clone)]
pub struct HandshakeConfig {
    /// How long a device has to answer; `Duration::ZERO` waits forever
    pub offer_timeout: Duration,
    /// Chunk size used once an offer is accepted
    pub chunk_size: usize,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            offer_timeout: Duration::from_secs(crate::DEFAULT_OFFER_TIMEOUT_SECS),
            chunk_size: crate::DEFAULT_CHUNK_SIZE,
        }
    }
}

impl From<&crate::config::TransferConfig> for HandshakeConfig {
    fn from(config: &crate::config::TransferConfig) -> Self {
        Self {
            offer_timeout: config.offer_timeout,
            chunk_size: config.chunk_size,
        }
    }
}

/// Mediates offers between initiators and registered devices.
#[derive(Debug, Clone)]
pub struct Handshake {
    registry: Arc<SessionRegistry>,
    initiator: String,
    sender: ChunkedSender,
    offer_timeout: Duration,
}

impl Handshake {
    /// Create a handshake over `registry`.
    ///
    /// `initiator` is the host address shown to devices in offer
    /// notifications.
    #[must_use]
    pub fn new(
        registry: Arc<SessionRegistry>,
        initiator: impl Into<String>,
        config: HandshakeConfig,
    ) -> Self {
        Self {
            registry,
            initiator: initiator.into(),
            sender: ChunkedSender::new(config.chunk_size),
            offer_timeout: config.offer_timeout,
        }
    }

    /// The registry this handshake works on.
    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Address announced to devices as the sender.
    #[must_use]
    pub fn initiator(&self) -> &str {
        &self.initiator
    }

    /// Offer `source_path` to the device at `address` as `filename`.
    ///
    /// `:` separates the fields of the offer notification, so any `:` in
    /// `filename` is announced as `_`.
    ///
    /// Returns once the notification is queued on the device's connection.
    /// Any offer still pending for the device is replaced and resolves as
    /// [`OfferOutcome::Superseded`].
    ///
    /// # Errors
    ///
    /// - [`Error::DeviceOffline`] if the device has no session.
    /// - [`Error::FileNotFound`], [`Error::InvalidPath`] or [`Error::Io`] if
    ///   the file cannot be offered; the session is left alone.
    /// - [`Error::ConnectionLost`] if the notification cannot be written; the
    ///   session is unregistered.
    pub async fn offer(
        &self,
        address: &str,
        filename: &str,
        source_path: impl AsRef<Path>,
    ) -> Result<OfferTicket> {
        let source_path = source_path.as_ref();

        if !self.registry.contains(address).await {
            return Err(Error::DeviceOffline(address.to_string()));
        }

        let filesize = stat_file(source_path).await?;
        let filename = announced_name(filename);
        let (offer, rx) = TransferOffer::new(filename.as_str(), filesize, source_path);
        let offer_id = offer.id;

        let (conn, displaced) = self.registry.set_offer(address, offer).await?;
        if let Some(displaced) = displaced {
            tracing::debug!(
                "Offer of '{}' to {} replaced by a newer offer",
                displaced.filename,
                address
            );
            displaced.resolve(OfferOutcome::Superseded);
        }

        let notification = Frame::Offer {
            filename: filename.clone(),
            initiator: self.initiator.clone(),
        };
        if let Err(e) = conn.send(notification).await {
            tracing::warn!("Could not deliver offer to {}: {}", address, e);
            self.registry.take_offer_if(address, offer_id).await;
            self.registry.unregister_connection(address, conn.id()).await;
            return Err(e);
        }

        tracing::info!(
            "Offered '{}' ({} bytes) to {}",
            filename,
            filesize,
            address
        );

        if !self.offer_timeout.is_zero() {
            self.spawn_expiry(address.to_string(), offer_id);
        }

        Ok(OfferTicket {
            offer_id,
            address: address.to_string(),
            rx,
        })
    }

    fn spawn_expiry(&self, address: String, offer_id: Uuid) {
        let registry = Arc::clone(&self.registry);
        let timeout = self.offer_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(offer) = registry.take_offer_if(&address, offer_id).await {
                tracing::warn!(
                    "{}",
                    Error::OfferExpired(format!("{address} ('{}')", offer.filename))
                );
                offer.resolve(OfferOutcome::Expired);
            }
        });
    }

    /// Apply a device's decision to its pending offer.
    ///
    /// The pending offer is consumed whatever the decision. On accept the
    /// file is streamed before this returns, so a device's decisions are
    /// handled strictly one after another.
    ///
    /// Returns the transfer report for a completed transfer, `None` for a
    /// rejection.
    ///
    /// # Errors
    ///
    /// - [`Error::StaleDecision`] if nothing is pending; nothing happens.
    /// - [`Error::ConnectionLost`] if the stream broke; the session is
    ///   unregistered and no completion marker was sent.
    /// - [`Error::FileNotFound`], [`Error::FileChanged`] or [`Error::Io`] for
    ///   local read failures; the session stays registered.
    pub async fn on_decision(
        &self,
        address: &str,
        decision: Decision,
    ) -> Result<Option<TransferReport>> {
        let Some((offer, conn)) = self.registry.take_offer(address).await else {
            return Err(Error::StaleDecision(address.to_string()));
        };

        match decision {
            Decision::Reject => {
                tracing::info!("{} rejected '{}'", address, offer.filename);
                offer.resolve(OfferOutcome::Rejected);
                Ok(None)
            }
            Decision::Accept => {
                tracing::info!("{} accepted '{}'", address, offer.filename);
                let source_path: PathBuf = offer.source_path.clone();
                match self.sender.send(&conn, &source_path).await {
                    Ok(report) => {
                        offer.resolve(OfferOutcome::Completed(report.clone()));
                        Ok(Some(report))
                    }
                    Err(e) => {
                        tracing::error!("Transfer of '{}' to {} failed: {}", offer.filename, address, e);
                        offer.resolve(OfferOutcome::Failed {
                            reason: e.to_string(),
                        });
                        if e.is_connection_fatal() {
                            self.registry.unregister_connection(address, conn.id()).await;
                        }
                        Err(e)
                    }
                }
            }
        }
    }
}

fn announced_name(filename: &str) -> String {
    filename.replace(':', "_")
}

async fn stat_file(path: &Path) -> Result<u64> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.display().to_string())
        } else {
            Error::Io(e)
        }
    })?;

    if !metadata.is_file() {
        return Err(Error::InvalidPath(format!(
            "{} is not a regular file",
            path.display()
        )));
    }

    Ok(metadata.len())
}
