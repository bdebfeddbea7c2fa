//! Serve command implementation.

use anyhow::{Context, Result};
use lanbeam_core::web::{WebServer, WebServerConfig};

use super::ServeArgs;

/// Run the serve command.
pub async fn run(args: ServeArgs) -> Result<()> {
    let global_config = super::load_config();

    let mut config = WebServerConfig::from(&global_config);
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(upload_dir) = args.upload_dir {
        config.upload_dir = upload_dir;
    }
    config.localhost_only |= args.localhost_only;
    let show_qr = global_config.ui.show_qr && !args.no_qr;

    let server = WebServer::new(config);
    let url = server.upload_page_url();

    println!();
    println!("Lanbeam");
    println!("{}", "─".repeat(40));
    println!();
    println!("  Open on your phone: {}", url);
    println!("  Uploads are saved to: {}", server.config().upload_dir.display());

    if show_qr && !server.config().localhost_only {
        match lanbeam_core::qr::generate_ascii(&url) {
            Ok(qr) => {
                println!();
                for line in qr.lines() {
                    println!("  {}", line);
                }
            }
            Err(e) => tracing::warn!("Could not render QR code: {}", e),
        }
    }

    println!();
    println!("Press Ctrl+C to stop the server.");

    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
            }
        })
        .await
        .context("web server failed")?;

    println!();
    println!("Server stopped.");

    Ok(())
}
