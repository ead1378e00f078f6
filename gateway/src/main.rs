//! `mb-gateway`: a Modbus TCP/RTU server that republishes readings
//! ingested over LoRa and UDP as 16-bit holding registers.
//!
//! Consolidates the original's `mb-master`/`mb-server` pair into the
//! single "gateway server" spec.md describes (§2, §6) — both spoke the
//! same protocol against the same kind of flat device map, differing only
//! in whether the remote side was itself another Modbus slave (mb-master)
//! or a bare id->register mapping (mb-server); the latter is what the
//! LoRa/UDP demultiplexing contract in §6 actually calls for.

mod ingest;
mod registers;
mod service;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use registers::Registers;

#[derive(Parser)]
#[clap(name = "mb-gateway", about = "Serves ingested readings over Modbus TCP/RTU.")]
struct Args {
    /// Mapping of device id -> local holding-register address, e.g.
    /// "coruscant:4,geonosis:5".
    #[clap(long, default_value = "coruscant:4,geonosis:5")]
    device_map: String,

    #[clap(long, default_value = "127.0.0.1")]
    mb_bind_address: String,
    #[clap(long, default_value_t = 1502)]
    mb_bind_port: u16,
    #[clap(long, default_value_t = 1)]
    slave_id: u8,

    /// Serial device for the RTU-over-serial Modbus server, or "none".
    #[clap(long, default_value = "none")]
    serial_device: String,
    #[clap(long, default_value_t = 115_200)]
    baud_rate: u32,

    #[clap(long)]
    udp_enable: bool,
    #[clap(long, default_value = "127.0.0.1")]
    udp_bind_address: String,
    #[clap(long, default_value_t = 1503)]
    udp_bind_port: u16,

    #[clap(long)]
    lora_enable: bool,
    #[clap(long, default_value = "/dev/spidev0.1")]
    lora_spi_port: String,
    #[clap(long, default_value_t = 25)]
    lora_reset_pin: u64,
    #[clap(long, default_value_t = 915)]
    lora_freq_mhz: i64,

    #[clap(long, default_value_t = log::LevelFilter::Info)]
    log_level: log::LevelFilter,
}

/// Number of 16-bit holding registers the gateway exposes.
const REGISTER_COUNT: usize = 1024;

/// Malformed `--device-map` entries, kept distinct from the `anyhow::Error`
/// used everywhere else in this binary so a future caller parsing the map
/// programmatically (rather than off argv) can match on the failure kind.
#[derive(Debug, thiserror::Error)]
enum DeviceMapError {
    #[error("device-map entry {0:?} is not an id:addr pair")]
    MissingColon(String),
    #[error("device-map entry {entry:?} has a non-numeric register address")]
    BadAddress { entry: String },
}

/// Reuses the binary's own `--log-level`/`env_logger` verbosity for the
/// radio's internal log sink, rather than leaving it at the default.
fn level_filter_to_log_level(filter: log::LevelFilter) -> sx1276::LogLevel {
    match filter {
        log::LevelFilter::Off | log::LevelFilter::Error => sx1276::LogLevel::Error,
        log::LevelFilter::Warn => sx1276::LogLevel::Warn,
        log::LevelFilter::Info => sx1276::LogLevel::Info,
        log::LevelFilter::Debug => sx1276::LogLevel::Debug,
        log::LevelFilter::Trace => sx1276::LogLevel::RegIo,
    }
}

fn parse_device_map(raw: &str) -> std::result::Result<HashMap<String, u16>, DeviceMapError> {
    let mut map = HashMap::new();
    for mapping in raw.split(',') {
        let (id, addr) = mapping
            .split_once(':')
            .ok_or_else(|| DeviceMapError::MissingColon(mapping.to_string()))?;
        let addr: u16 = addr
            .parse()
            .map_err(|_| DeviceMapError::BadAddress { entry: mapping.to_string() })?;
        map.insert(id.to_string(), addr);
    }
    Ok(map)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::new().filter_level(args.log_level).init();

    let device_map = Arc::new(parse_device_map(&args.device_map).context("parsing --device-map")?);
    log::info!("parsed device map: {:?}", device_map);

    let registers = Arc::new(Registers::new(REGISTER_COUNT));

    let tcp_addr: SocketAddr = format!("{}:{}", args.mb_bind_address, args.mb_bind_port)
        .parse()
        .context("invalid mb-bind-address/mb-bind-port")?;
    let tcp_task = tokio::spawn(service::serve_tcp(tcp_addr, registers.clone()));

    let rtu_task = if args.serial_device.to_lowercase() != "none" {
        Some(tokio::spawn(service::serve_rtu(
            args.serial_device.clone(),
            args.baud_rate,
            args.slave_id,
            registers.clone(),
        )))
    } else {
        None
    };

    if args.udp_enable {
        let udp_addr: SocketAddr = format!("{}:{}", args.udp_bind_address, args.udp_bind_port)
            .parse()
            .context("invalid udp-bind-address/udp-bind-port")?;
        tokio::spawn(ingest::udp_loop(udp_addr, device_map.clone(), registers.clone()));
    }

    if args.lora_enable {
        let bus = sx1276_linux_bus::LinuxBus::open(&args.lora_spi_port, 5_000_000, args.lora_reset_pin)
            .context("opening the LoRa radio's SPI/reset lines")?;
        let options = sx1276::RadioOptions {
            carrier_frequency_mhz: args.lora_freq_mhz,
            log_level: level_filter_to_log_level(args.log_level),
            ..sx1276::RadioOptions::default()
        };
        let radio = sx1276::RadioDevice::new(bus, options, sx1276_linux_bus::EnvLoggerSink, sx1276_linux_bus::StdClock)
            .map_err(|e| anyhow::anyhow!("{}", e))
            .context("initialising the LoRa radio")?;
        tokio::task::spawn_blocking({
            let device_map = device_map.clone();
            let registers = registers.clone();
            move || ingest::lora_loop(radio, device_map, registers)
        });
    }

    log::info!("gateway up: Modbus TCP on {}", tcp_addr);
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    log::info!("shutting down");

    tcp_task.abort();
    if let Some(t) = rtu_task {
        t.abort();
    }
    Ok(())
}
