//! Devices command implementation.

use anyhow::{Context, Result};
use lanbeam_core::web::handlers::DevicesResponse;

use super::DevicesArgs;

/// Run the devices command.
pub async fn run(args: DevicesArgs) -> Result<()> {
    let server = args.server.unwrap_or_else(super::default_server_url);

    let response: DevicesResponse = reqwest::get(format!("{}/get_ips", server.trim_end_matches('/')))
        .await
        .with_context(|| format!("cannot reach the Lanbeam server at {server}"))?
        .error_for_status()?
        .json()
        .await
        .context("unexpected server response")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if response.devices.is_empty() {
        println!("No devices have announced themselves.");
        return Ok(());
    }

    println!();
    println!("Devices ({})", response.devices.len());
    println!("{}", "─".repeat(40));
    for device in &response.devices {
        println!("  {}", device);
    }
    println!();

    Ok(())
}
