//! Common test utilities for `Lanbeam` integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use lanbeam_core::protocol::Frame;
use lanbeam_core::session::{Connection, FrameQueue, SessionRegistry};

/// Create a temporary directory for test files.
///
/// The directory will be automatically cleaned up when the returned
/// `TempDir` is dropped.
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Create a test file with the given content.
pub fn create_test_file(dir: &std::path::Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).expect("Failed to write test file");
    path
}

/// Generate random bytes for testing.
pub fn random_bytes(size: usize) -> Vec<u8> {
    use rand::RngCore;
    let mut bytes = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// Register a fake device and return the frames written to it.
pub async fn connect_device(
    registry: &SessionRegistry,
    address: &str,
    buffer: usize,
) -> FrameQueue {
    let (conn, rx) = Connection::channel(address, buffer);
    registry.register(address, conn).await;
    rx
}

/// Frames of one transfer as seen by the device.
#[derive(Debug, Default)]
pub struct ReceivedTransfer {
    pub metadata: Vec<(String, u64)>,
    pub chunks: Vec<Vec<u8>>,
    pub completions: usize,
}

impl ReceivedTransfer {
    /// All payload bytes, concatenated.
    pub fn payload(&self) -> Vec<u8> {
        self.chunks.concat()
    }
}

/// Read frames until the completion marker or until the channel closes.
pub async fn receive_transfer(rx: &mut FrameQueue) -> ReceivedTransfer {
    let mut received = ReceivedTransfer::default();
    while let Some(frame) = rx.recv().await {
        match frame {
            Frame::Metadata { filename, filesize } => received.metadata.push((filename, filesize)),
            Frame::Chunk(data) => received.chunks.push(data),
            Frame::Complete => {
                received.completions += 1;
                break;
            }
            Frame::Offer { .. } => panic!("unexpected offer during transfer"),
        }
    }
    received
}
