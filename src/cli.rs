//! Command-line interface definition using clap
//!
//! Provides structured argument parsing with automatic help generation.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

// =============================================================================
// CLI Definition
// =============================================================================

/// Callback bridge over a RadioHead reliable-datagram transport
#[derive(Parser, Debug)]
#[command(name = "rh-bridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file (default: rh-bridge.toml in the working directory)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// List serial ports
    Ports,

    /// Print the effective configuration as TOML
    Config,

    /// Exchange messages between two bridges over a simulated air
    Demo {
        /// Number of messages to send
        #[arg(long, default_value_t = 5)]
        count: u32,

        /// Address of the receiving node
        #[arg(long, value_name = "ADDR", default_value_t = 0x02, value_parser = parse_address)]
        peer: u8,
    },
}

/// Accept decimal or 0x-prefixed hex
fn parse_address(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid address '{}': {}", s, e))
}

// =============================================================================
// Tests
// =============================================================================
