//! CLI argument parsing

use crate::backends;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// A packet given on the command line as hex
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

fn parse_hex_packet(s: &str) -> Result<HexBytes, String> {
    parse_hex_bytes(s).map(HexBytes)
}

/// Parse a hex string such as `01 0b40 00` or `0x01,0x0b` into bytes
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, String> {
    let mut digits = String::with_capacity(s.len());
    for token in s.split(|c: char| c.is_whitespace() || c == ',' || c == ':') {
        let token = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        digits.push_str(token);
    }

    if digits.is_empty() {
        return Err("Empty payload".to_string());
    }
    if digits.len() % 2 != 0 {
        return Err(format!("Odd number of hex digits in '{}'", s));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|e| format!("Invalid hex byte '{}': {}", &digits[i..i + 2], e))
        })
        .collect()
}

/// Generate dynamic help text for the backend argument
fn backend_help() -> String {
    format!("Backend to use [available: {}]", backends::backend_names_short())
}

#[derive(Parser)]
#[command(name = "cc3000")]
#[command(author, version, about = "CC3000 SPI transport tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (TOML, with a [transport] table)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Power the chip up and print every frame it sends
    Listen {
        /// Backend to use
        #[arg(short, long, help = backend_help())]
        backend: Option<String>,

        /// Stop after this many frames
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Stop after this many seconds
        #[arg(short, long)]
        duration: Option<u64>,
    },

    /// Power the chip up, send HCI packets and print the replies
    Send {
        /// Backend to use
        #[arg(short, long, help = backend_help())]
        backend: Option<String>,

        /// Time to collect replies after each packet, in milliseconds
        #[arg(short, long, default_value_t = 500)]
        wait_ms: u64,

        /// HCI packets as hex (e.g. "01 0b40 00")
        #[arg(required = true, value_parser = parse_hex_packet)]
        packets: Vec<HexBytes>,
    },

    /// List available backends
    ListBackends,
}
