//! rh-bridge - RadioHead bridge utility
//!
//! Usage:
//!   rh-bridge ports                   List serial ports
//!   rh-bridge config                  Print effective configuration
//!   rh-bridge demo [--count N]        Two bridges over a simulated air

mod cli;

use clap::Parser;
use cli::{Cli, Command};
use radiohead_bridge::config::{self, Config};
use radiohead_bridge::constants::BROADCAST_ADDRESS;
use radiohead_bridge::sim::SimAir;
use radiohead_bridge::{logging, serial};
use radiohead_bridge::{BridgeError, BridgeOptions, ClientEvent, RadioClient, Result};
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{debug, info};

/// How long the demo waits for each datagram to reach the peer
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(2);

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Ports => list_ports(),
        Command::Config => print_config(&config, &config::config_path(cli.config.as_deref())),
        Command::Demo { count, peer } => {
            let rt = tokio::runtime::Runtime::new()
                .map_err(|source| BridgeError::Runtime { source })?;
            rt.block_on(run_demo(config, count, peer))
        }
    }
}

fn list_ports() -> Result<()> {
    let ports = serial::available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in ports {
        println!("{}", port);
    }
    Ok(())
}

fn print_config(config: &Config, path: &Path) -> Result<()> {
    config.validate()?;
    let text = config::to_toml(config).map_err(|reason| BridgeError::ConfigParse {
        path: path.to_path_buf(),
        reason,
    })?;
    print!("{}", text);
    Ok(())
}

async fn run_demo(config: Config, count: u32, peer: u8) -> Result<()> {
    if peer == config.link.address || peer == BROADCAST_ADDRESS {
        return Err(BridgeError::ConfigValidation {
            field: "peer",
            reason: format!(
                "0x{:02X} must differ from own address and broadcast",
                peer
            ),
        });
    }

    let air = SimAir::new();
    let options = BridgeOptions {
        poll_interval: config.worker.poll_interval(),
    };

    let (local, _local_events) = RadioClient::with_options(air.connector(), options);
    let (remote, mut remote_events) = RadioClient::with_options(air.connector(), options);

    let mut remote_config = config.clone();
    remote_config.link.address = peer;
    local.configure(&config)?;
    remote.configure(&remote_config)?;

    remote.start()?;
    local.start()?;
    info!(from = config.link.address, to = peer, count, "Demo started");

    for i in 0..count {
        let message = format!("ping {}", i);
        match local.send(peer, message.as_bytes()).await {
            Ok(()) => println!("-> 0x{:02X}  {}", peer, message),
            Err(e) => println!("-> 0x{:02X}  {} ({})", peer, message, e),
        }
    }

    let mut delivered = 0;
    while delivered < count {
        let event = match tokio::time::timeout(DELIVERY_TIMEOUT, remote_events.recv()).await {
            Ok(Some(event)) => event,
            _ => break,
        };
        match event {
            ClientEvent::Data(datagram) => {
                delivered += 1;
                println!(
                    "<- 0x{:02X}  {} (id {})",
                    datagram.from,
                    String::from_utf8_lossy(&datagram.data),
                    datagram.id
                );
            }
            ClientEvent::ReceiveError(e) => println!("<- {}", e),
            other => debug!(?other, "remote event"),
        }
    }

    local.stop().await?;
    remote.stop().await?;

    println!();
    println!("local  0x{:02X}: {}", config.link.address, local.stats().snapshot());
    println!("remote 0x{:02X}: {}", peer, remote.stats().snapshot());

    local.close()?;
    remote.close()?;
    Ok(())
}
