//! Lanbeam CLI - send files from a desktop to phones on the same network
//!
//! Phones open the upload page in a browser and stay connected; the desktop
//! offers files to them and they accept or reject each one.
//!
//! ## Quick Start
//!
//! ```bash
//! # Start the server and scan the QR code with a phone
//! lanbeam serve
//!
//! # Offer a file to a connected phone
//! lanbeam send 192.168.1.5 ./report.pdf
//! ```

#![allow(clippy::doc_markdown)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

use anyhow::Result;
use clap::Parser;

mod commands;

use commands::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match cli.command {
        Command::Serve(args) => commands::serve::run(args).await,
        Command::Send(args) => commands::send::run(args).await,
        Command::Devices(args) => commands::devices::run(args).await,
        Command::Config(args) => commands::config::run(args).await,
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = if verbose {
        "info,lanbeam=debug,lanbeam_core=debug"
    } else {
        "warn,lanbeam=info,lanbeam_core=info"
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
