//! cc3000 - Talk to a TI CC3000 over SPI
//!
//! Opens an SPI transport to the chip through one of the backends (an
//! emulated chip, or Linux spidev plus GPIO lines), powers it up and either
//! prints the frames it sends or writes HCI packets and prints the replies.

mod backends;
mod cli;
mod commands;
mod config;

use clap::Parser;
use cli::{Cli, Commands};
use config::FileConfig;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let file_config = match FileConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Listen {
            backend,
            count,
            duration,
        } => {
            let link = backends::open_link(
                file_config.backend(backend.as_deref()),
                file_config.transport.clone(),
            )?;
            commands::run_listen(link, count, duration.map(Duration::from_secs))
        }
        Commands::Send {
            backend,
            wait_ms,
            packets,
        } => {
            let link = backends::open_link(
                file_config.backend(backend.as_deref()),
                file_config.transport.clone(),
            )?;
            let packets: Vec<Vec<u8>> = packets.into_iter().map(|p| p.0).collect();
            commands::run_send(link, &packets, Duration::from_millis(wait_ms))
        }
        Commands::ListBackends => {
            commands::list_backends();
            Ok(())
        }
    };

    result
}
