//! Config command implementation.

use anyhow::{Context, Result};
use lanbeam_core::config::Config;

use super::{ConfigAction, ConfigArgs};

/// Run the config command.
pub async fn run(args: ConfigArgs) -> Result<()> {
    match args.action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            match get_config_value(&config, &key) {
                Some(v) => println!("{}: {}", key, v),
                None => println!("Unknown configuration key: {}", key),
            }
        }

        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            if set_config_value(&mut config, &key, &value)? {
                config.validate()?;
                config.save()?;
                println!("Set {} = {}", key, value);
            } else {
                println!("Unknown configuration key: {}", key);
            }
        }

        ConfigAction::Show => {
            let config = Config::load()?;
            println!();
            println!("Lanbeam Configuration");
            println!("{}", "─".repeat(50));
            println!();
            print!("{}", config.to_toml()?);
            println!();
        }

        ConfigAction::Path => {
            println!("{}", Config::config_path().display());
        }

        ConfigAction::Reset => {
            Config::default().save()?;
            println!("Configuration reset to defaults.");
        }
    }

    Ok(())
}

fn get_config_value(config: &Config, key: &str) -> Option<String> {
    match key {
        "server.port" => Some(config.server.port.to_string()),
        "server.localhost_only" => Some(config.server.localhost_only.to_string()),
        "server.upload_dir" => Some(config.server.upload_dir.display().to_string()),
        "server.max_upload_size" => Some(config.server.max_upload_size.to_string()),
        "transfer.chunk_size" => Some(config.transfer.chunk_size.to_string()),
        "transfer.offer_timeout" => Some(format!("{}s", config.transfer.offer_timeout.as_secs())),
        "transfer.frame_buffer" => Some(config.transfer.frame_buffer.to_string()),
        "ui.show_qr" => Some(config.ui.show_qr.to_string()),
        _ => None,
    }
}

fn set_config_value(config: &mut Config, key: &str, value: &str) -> Result<bool> {
    let invalid = || format!("invalid value for {key}: {value}");

    match key {
        "server.port" => config.server.port = value.parse().with_context(invalid)?,
        "server.localhost_only" => config.server.localhost_only = value.parse().with_context(invalid)?,
        "server.upload_dir" => config.server.upload_dir = value.into(),
        "server.max_upload_size" => {
            config.server.max_upload_size = value.parse().with_context(invalid)?;
        }
        "transfer.chunk_size" => config.transfer.chunk_size = value.parse().with_context(invalid)?,
        "transfer.offer_timeout" => {
            let secs: u64 = value
                .trim_end_matches('s')
                .parse()
                .with_context(invalid)?;
            config.transfer.offer_timeout = std::time::Duration::from_secs(secs);
        }
        "transfer.frame_buffer" => {
            config.transfer.frame_buffer = value.parse().with_context(invalid)?;
        }
        "ui.show_qr" => config.ui.show_qr = value.parse().with_context(invalid)?,
        _ => return Ok(false),
    }

    Ok(true)
}
