//! Application state shared by all HTTP handlers.

use std::net::IpAddr;
use std::sync::Arc;

use crate::endpoint::SessionEndpoint;
use crate::handshake::Handshake;
use crate::net;
use crate::presence::PresenceSet;
use crate::session::SessionRegistry;

use super::WebServerConfig;

/// Shared application state for all HTTP handlers.
#[derive(Debug)]
pub struct AppState {
    /// Live device sessions
    pub registry: Arc<SessionRegistry>,

    /// Devices that announced themselves through the presence endpoints
    pub presence: PresenceSet,

    /// Session loop run for every device connection
    pub endpoint: SessionEndpoint,

    /// Server configuration
    pub config: WebServerConfig,

    /// Address of this host on the local network
    pub local_ip: IpAddr,
}

impl AppState {
    /// Create state for a server on this host's detected address.
    #[must_use]
    pub fn new(config: WebServerConfig) -> Self {
        Self::with_local_ip(config, net::local_ip())
    }

    /// Create state announcing `local_ip` as the initiator of offers.
    #[must_use]
    pub fn with_local_ip(config: WebServerConfig, local_ip: IpAddr) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let handshake = Handshake::new(
            Arc::clone(&registry),
            local_ip.to_string(),
            (&config.transfer).into(),
        );

        Self {
            registry,
            presence: PresenceSet::new(),
            endpoint: SessionEndpoint::new(handshake),
            config,
            local_ip,
        }
    }

    /// The handshake offers are made through.
    #[must_use]
    pub const fn handshake(&self) -> &Handshake {
        self.endpoint.handshake()
    }

    /// URL devices open to reach the upload page.
    #[must_use]
    pub fn upload_page_url(&self) -> String {
        net::upload_page_url(self.local_ip, self.config.port)
    }
}

/// Type alias for shared state wrapped in Arc.
pub type SharedState = Arc<AppState>;
