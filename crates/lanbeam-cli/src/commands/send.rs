//! Send command implementation.
//!
//! Talks to a running `lanbeam serve` over its HTTP API; the server owns the
//! device sessions, so the offer has to go through it.

use anyhow::{bail, Context, Result};
use lanbeam_core::web::handlers::{SendFileRequest, SendFileResponse, SendStatus};

use super::SendArgs;

/// Run the send command.
pub async fn run(args: SendArgs) -> Result<()> {
    let filepath = std::fs::canonicalize(&args.path)
        .with_context(|| format!("cannot read {}", args.path.display()))?;
    if !filepath.is_file() {
        bail!("{} is not a regular file", filepath.display());
    }

    let filename = match args.name {
        Some(name) => name,
        None => filepath
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .context("file has no name")?,
    };

    let server = args.server.unwrap_or_else(super::default_server_url);
    let request = SendFileRequest {
        client_ip: args.device.clone(),
        filename: filename.clone(),
        filepath,
    };

    let response = reqwest::Client::new()
        .post(format!("{}/send_file", server.trim_end_matches('/')))
        .json(&request)
        .send()
        .await
        .with_context(|| format!("cannot reach the Lanbeam server at {server}"))?;

    if !response.status().is_success() {
        let status = response.status();
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        let message = body["message"].as_str().unwrap_or("request failed");
        bail!("server returned {status}: {message}");
    }

    let result: SendFileResponse = response.json().await.context("unexpected server response")?;

    match result.status {
        SendStatus::RequestSent => {
            println!("Offered '{}' to {}", filename, args.device);
            if let Some(offer_id) = result.offer_id {
                println!("  Offer id: {}", offer_id);
            }
            println!("  Waiting for the device to accept; progress is logged by the server.");
        }
        SendStatus::DeviceOffline => {
            bail!("{} is offline (is the upload page open on it?)", args.device);
        }
    }

    Ok(())
}
