//! HTTP endpoint handlers for the Lanbeam web interface.

#![allow(clippy::missing_errors_doc)]

use std::net::SocketAddr;
use std::path::PathBuf;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    Json,
};
use axum_extra::extract::multipart::{Multipart, MultipartError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::handshake::OfferOutcome;
use crate::net::{self, FORWARDED_FOR_HEADER, REAL_IP_HEADER};
use crate::session::SessionInfo;

use super::error::{ApiError, ApiResult};
use super::state::SharedState;

/// Multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "file";

// ============================================================================
// Request / response types
// ============================================================================

/// Body of `POST /send_file`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendFileRequest {
    /// Address of the receiving device
    pub client_ip: String,
    /// Name shown to the device
    pub filename: String,
    /// Path of the file on this host
    pub filepath: PathBuf,
}

/// Whether an offer reached the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    /// The offer notification went out
    RequestSent,
    /// No session is registered for the device
    DeviceOffline,
}

/// Response of `POST /send_file`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendFileResponse {
    /// Result of the offer
    pub status: SendStatus,
    /// Id of the offer, when it was sent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offer_id: Option<Uuid>,
}

/// Response of `POST /upload`.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    info: String,
    filename: String,
}

/// Response of the presence endpoints.
#[derive(Debug, Serialize)]
pub struct PresenceResponse {
    status: &'static str,
    ip: Option<String>,
}

/// Response of `GET /get_ips`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DevicesResponse {
    /// Announced device addresses
    pub devices: Vec<String>,
}

/// Response of `GET /detect_ip`.
#[derive(Debug, Serialize)]
pub struct DetectIpResponse {
    ip: String,
}

/// Response of `GET /api/sessions`.
#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    sessions: Vec<SessionInfo>,
}

/// Address of the caller, honouring reverse proxy headers.
pub(crate) fn caller_address(headers: &HeaderMap, peer: SocketAddr) -> String {
    let header = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
    net::client_address(header(REAL_IP_HEADER), header(FORWARDED_FOR_HEADER), peer.ip())
}

// ============================================================================
// Transfer handlers
// ============================================================================

/// POST /send_file - Offer a host file to a connected device.
///
/// Returns as soon as the offer is on its way; the outcome is logged when
/// the device answers.
pub async fn send_file(
    State(state): State<SharedState>,
    Json(request): Json<SendFileRequest>,
) -> ApiResult<Json<SendFileResponse>> {
    let ticket = match state
        .handshake()
        .offer(&request.client_ip, &request.filename, &request.filepath)
        .await
    {
        Ok(ticket) => ticket,
        Err(Error::DeviceOffline(address)) => {
            tracing::info!("Cannot offer '{}': {} is offline", request.filename, address);
            return Ok(Json(SendFileResponse {
                status: SendStatus::DeviceOffline,
                offer_id: None,
            }));
        }
        Err(e) => return Err(e.into()),
    };

    let offer_id = ticket.offer_id();
    let filename = request.filename;
    tokio::spawn(async move {
        let address = ticket.address().to_string();
        match ticket.outcome().await {
            OfferOutcome::Completed(report) => tracing::info!(
                "Sent '{}' to {}: {} bytes in {} chunks ({} B/s)",
                filename,
                address,
                report.bytes_sent,
                report.chunks_sent,
                report.throughput_bps()
            ),
            OfferOutcome::Failed { reason } => {
                tracing::warn!("Sending '{}' to {} failed: {}", filename, address, reason);
            }
            outcome => tracing::info!("Offer of '{}' to {}: {:?}", filename, address, outcome),
        }
    });

    Ok(Json(SendFileResponse {
        status: SendStatus::RequestSent,
        offer_id: Some(offer_id),
    }))
}

/// Reduce a client-supplied file name to a safe basename.
///
/// Both `/` and `\` count as separators. Returns `None` when nothing usable
/// is left.
fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    match base {
        "" | "." | ".." => None,
        base => Some(base.to_string()),
    }
}

fn multipart_error(context: &str, err: &MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(format!("Upload too large: {err}"))
    } else {
        ApiError::bad_request(format!("{context}: {err}"))
    }
}

/// POST /upload - Save a file sent by a device into the upload directory.
pub async fn upload(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let upload_dir = &state.config.upload_dir;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Failed to read multipart field", &e))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .and_then(sanitize_filename)
            .ok_or_else(|| ApiError::bad_request("Upload has no usable file name"))?;

        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error("Failed to read file data", &e))?;

        tokio::fs::create_dir_all(upload_dir).await?;
        tokio::fs::write(upload_dir.join(&file_name), &data)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to write file: {e}")))?;

        tracing::info!("Saved uploaded file: {} ({} bytes)", file_name, data.len());

        return Ok(Json(UploadResponse {
            info: format!("File '{file_name}' uploaded successfully"),
            filename: file_name,
        }));
    }

    Err(ApiError::bad_request("No file uploaded"))
}

// ============================================================================
// Presence handlers
// ============================================================================

/// GET /record_ip - Announce the caller.
pub async fn record_ip(
    State(state): State<SharedState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Json<PresenceResponse> {
    let address = caller_address(&headers, peer);
    if state.presence.add(address.clone()).await {
        tracing::debug!("Device announced: {}", address);
    }

    Json(PresenceResponse {
        status: "recorded",
        ip: Some(address),
    })
}

/// GET /remove_ip - Withdraw the caller.
pub async fn remove_ip(
    State(state): State<SharedState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Json<PresenceResponse> {
    let address = caller_address(&headers, peer);
    if state.presence.remove(&address).await {
        tracing::debug!("Device withdrawn: {}", address);
    }

    Json(PresenceResponse {
        status: "removed",
        ip: None,
    })
}

/// GET /get_ips - List announced devices.
pub async fn get_ips(State(state): State<SharedState>) -> Json<DevicesResponse> {
    Json(DevicesResponse {
        devices: state.presence.list().await,
    })
}

/// GET /detect_ip - Report the caller's address as the host sees it.
pub async fn detect_ip(
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Json<DetectIpResponse> {
    Json(DetectIpResponse {
        ip: caller_address(&headers, peer),
    })
}

// ============================================================================
// Status handlers
// ============================================================================

/// GET /api/sessions - Registered sessions and their pending offers.
pub async fn get_sessions(State(state): State<SharedState>) -> Json<SessionsResponse> {
    Json(SessionsResponse {
        sessions: state.registry.snapshot().await,
    })
}

/// GET /api/qr - QR code of the upload page URL.
pub async fn get_qr(State(state): State<SharedState>) -> ApiResult<Response> {
    let svg = crate::qr::generate_svg(&state.upload_page_url())?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/svg+xml")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from(svg))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {e}")))
}
