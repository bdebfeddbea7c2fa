//! # Lanbeam Core Library
//!
//! `lanbeam-core` provides the device session and file transfer protocol
//! behind Lanbeam: a desktop host pushes files to phones on the same local
//! network, which connect with nothing more than a browser.
//!
//! ## Protocol at a glance
//!
//! 1. A peer opens a WebSocket to `/ws/connect` and is registered in the
//!    [`session::SessionRegistry`] under its network address.
//! 2. The operator offers a file; the [`handshake::Handshake`] writes
//!    `file_request:<filename>:<host-ip>` to the peer.
//! 3. The peer answers `file_response:<token>:accept|reject`.
//! 4. On accept the [`transport`] streams a `file_metadata` record, the file
//!    bytes in binary chunks, and a `transfer_complete` marker.
//!
//! ## Modules
//!
//! - [`config`] - Configuration management
//! - [`endpoint`] - Per-connection session loop
//! - [`handshake`] - Offer / accept / reject exchange
//! - [`net`] - Local address detection and client address derivation
//! - [`presence`] - Best-effort list of reachable devices
//! - [`protocol`] - Wire messages exchanged with peers
//! - [`qr`] - QR codes for the upload page
//! - [`session`] - Registry of live device sessions
//! - [`transport`] - Chunked file streaming
//! - [`web`] - HTTP and WebSocket server
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lanbeam_core::{handshake::Handshake, session::SessionRegistry};
//!
//! let registry = Arc::new(SessionRegistry::new());
//! let handshake = Handshake::new(registry.clone(), "192.168.1.2", Default::default());
//! let ticket = handshake.offer("192.168.1.5", "report.pdf", "/tmp/report.pdf").await?;
//! let outcome = ticket.outcome().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::unused_async)]
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod endpoint;
pub mod error;
pub mod handshake;
pub mod net;
pub mod presence;
pub mod protocol;
pub mod qr;
pub mod session;
pub mod transport;

#[cfg(feature = "web")]
pub mod web;

pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default HTTP/WebSocket port
pub const DEFAULT_PORT: u16 = 8000;

/// Default chunk size for file transfers (64 KiB)
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Default time a device has to answer an offer, in seconds
pub const DEFAULT_OFFER_TIMEOUT_SECS: u64 = 60;

/// Default number of outbound frames buffered per connection
pub const DEFAULT_FRAME_BUFFER: usize = 16;

/// Default directory for files uploaded by peers
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";

/// Default upload size limit (1 GiB)
pub const DEFAULT_MAX_UPLOAD_SIZE: usize = 1024 * 1024 * 1024;
