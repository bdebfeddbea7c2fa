//! CLI command definitions and handlers.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Load configuration with graceful fallback to defaults.
///
/// A missing or unreadable config file is not fatal for commands that only
/// need defaults.
pub fn load_config() -> lanbeam_core::config::Config {
    lanbeam_core::config::Config::load().unwrap_or_else(|e| {
        tracing::warn!("Ignoring configuration file: {}", e);
        lanbeam_core::config::Config::default()
    })
}

/// Base URL of the local server described by the configuration.
pub fn default_server_url() -> String {
    format!("http://127.0.0.1:{}", load_config().server.port)
}

pub mod config;
pub mod devices;
pub mod send;
pub mod serve;

/// Lanbeam - send files from a desktop to phones on the same network
#[derive(Parser)]
#[command(name = "lanbeam")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand)]
pub enum Command {
    /// Start the server devices connect to
    Serve(ServeArgs),

    /// Offer a file to a connected device
    Send(SendArgs),

    /// List devices that announced themselves
    Devices(DevicesArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for the serve command
#[derive(Parser)]
pub struct ServeArgs {
    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Directory uploaded files are saved to
    #[arg(short, long)]
    pub upload_dir: Option<PathBuf>,

    /// Bind to localhost only
    #[arg(long)]
    pub localhost_only: bool,

    /// Don't print the QR code
    #[arg(long)]
    pub no_qr: bool,
}

/// Arguments for the send command
#[derive(Parser)]
pub struct SendArgs {
    /// Address of the receiving device
    pub device: String,

    /// File to offer
    pub path: PathBuf,

    /// Name shown to the device (defaults to the file name)
    #[arg(short, long)]
    pub name: Option<String>,

    /// URL of the running server
    #[arg(short, long, env = "LANBEAM_SERVER")]
    pub server: Option<String>,
}

/// Arguments for the devices command
#[derive(Parser)]
pub struct DevicesArgs {
    /// URL of the running server
    #[arg(short, long, env = "LANBEAM_SERVER")]
    pub server: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the config command
#[derive(Parser)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,

        /// Value to set
        value: String,
    },

    /// Show all configuration
    Show,

    /// Show the configuration file path
    Path,

    /// Reset to defaults
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_send() {
        let cli = Cli::parse_from(["lanbeam", "send", "192.168.1.5", "report.pdf", "--name", "Q3.pdf"]);
        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.device, "192.168.1.5");
        assert_eq!(args.path, PathBuf::from("report.pdf"));
        assert_eq!(args.name.as_deref(), Some("Q3.pdf"));
    }

    #[test]
    fn test_parse_serve_flags() {
        let cli = Cli::parse_from(["lanbeam", "-v", "serve", "--port", "9000", "--no-qr"]);
        assert!(cli.verbose);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, Some(9000));
        assert!(args.no_qr);
        assert!(!args.localhost_only);
    }
}
