//! `mb-emitter`: reads a 4-20 mA transducer over Modbus RTU on a cron
//! schedule and forwards each reading over LoRa to a `mb-gateway`.
//!
//! This binary is one of the "external collaborators" spec.md describes
//! only at its interface (§2, §6): it is a thin consumer of the
//! [`sx1276`] Radio Facade, not part of the specified core.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_modbus::prelude::*;

use sx1276::{RadioDevice, RadioOptions};
use sx1276_linux_bus::{EnvLoggerSink, LinuxBus, StdClock};

/// Parameter name -> local holding-register address, mirroring the
/// original's `param_to_addr` table.
fn param_table() -> HashMap<&'static str, u16> {
    [("v_1", 0), ("v_2", 1), ("c_1", 2), ("c_2", 3)].into_iter().collect()
}

/// Reuses the binary's own `--log-level`/`env_logger` verbosity for the
/// radio's internal log sink, rather than hardcoding a separate threshold.
fn level_filter_to_log_level(filter: log::LevelFilter) -> sx1276::LogLevel {
    match filter {
        log::LevelFilter::Off | log::LevelFilter::Error => sx1276::LogLevel::Error,
        log::LevelFilter::Warn => sx1276::LogLevel::Warn,
        log::LevelFilter::Info => sx1276::LogLevel::Info,
        log::LevelFilter::Debug => sx1276::LogLevel::Debug,
        log::LevelFilter::Trace => sx1276::LogLevel::RegIo,
    }
}

#[derive(Serialize)]
struct DataPoint {
    id: String,
    data: i64,
}

#[derive(Parser)]
#[clap(name = "mb-emitter", about = "Reads 4-20 mA data over Modbus and sends it over LoRa.")]
struct Args {
    /// Cron expression (with seconds) controlling the poll cadence.
    #[clap(long, default_value = "0 * * * * *")]
    poll_interval: String,

    /// Which transducer channel to read.
    #[clap(long, default_value = "c_1")]
    read_param: String,

    #[clap(long, default_value = "/dev/ttyUSB0")]
    serial_device: String,
    #[clap(long, default_value_t = 1)]
    slave_id: u8,
    #[clap(long, default_value_t = 9600)]
    baud_rate: u32,
    #[clap(long, default_value_t = 5)]
    timeout_secs: u64,

    #[clap(long, default_value = "/dev/spidev0.1")]
    lora_spi_port: String,
    #[clap(long, default_value_t = 25)]
    lora_reset_pin: u64,
    #[clap(long, default_value_t = 915)]
    lora_freq_mhz: i64,
    #[clap(long)]
    high_power: bool,

    #[clap(long, default_value_t = log::LevelFilter::Info)]
    log_level: log::LevelFilter,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::new().filter_level(args.log_level).init();

    let params = param_table();
    let addr = *params
        .get(args.read_param.as_str())
        .with_context(|| format!("unknown read-param {:?}", args.read_param))?;

    let builder = tokio_serial::new(&args.serial_device, args.baud_rate);
    let port = tokio_serial::SerialStream::open(&builder)
        .with_context(|| format!("opening serial device {}", args.serial_device))?;
    let mut mb_ctx = rtu::attach_slave(port, Slave(args.slave_id));

    let bus = LinuxBus::open(&args.lora_spi_port, 5_000_000, args.lora_reset_pin)
        .context("opening the LoRa radio's SPI/reset lines")?;
    let mut options = RadioOptions {
        carrier_frequency_mhz: args.lora_freq_mhz,
        high_power: args.high_power,
        ..RadioOptions::default()
    };
    options.log_level = level_filter_to_log_level(args.log_level);
    let radio = RadioDevice::new(bus, options, EnvLoggerSink, StdClock)
        .map_err(|e| anyhow::anyhow!("{}", e))
        .context("initialising the LoRa radio")?;

    let hostname = hostname::get()
        .context("reading hostname")?
        .into_string()
        .map_err(|_| anyhow::anyhow!("hostname is not valid UTF-8"))?;

    // Shared across every job tick: the Modbus context and radio each see
    // exactly one call in flight at a time (spec §5's single-writer rule),
    // enforced here by the mutex rather than relying on the scheduler never
    // overlapping runs.
    let mb_ctx = Arc::new(Mutex::new(mb_ctx));
    let radio = Arc::new(Mutex::new(radio));

    let scheduler = JobScheduler::new().await?;
    let read_timeout = Duration::from_secs(args.timeout_secs);

    scheduler
        .add(Job::new_async(args.poll_interval.as_str(), move |_uuid, _l| {
            let hostname = hostname.clone();
            let mb_ctx = mb_ctx.clone();
            let radio = radio.clone();
            Box::pin(async move {
                let mut mb_ctx = mb_ctx.lock().await;
                let reading = match tokio::time::timeout(read_timeout, mb_ctx.read_holding_registers(addr, 1)).await {
                    Ok(Ok(words)) => words[0] as i64,
                    Ok(Err(e)) => {
                        log::error!("error reading 4-20 mA data: {}", e);
                        return;
                    }
                    Err(_) => {
                        log::error!("timed out reading 4-20 mA data");
                        return;
                    }
                };
                drop(mb_ctx);

                let dp = DataPoint { id: hostname, data: reading };
                log::info!("sending {:?}", serde_json::to_string(&dp).unwrap_or_default());

                let payload = match serde_json::to_vec(&dp) {
                    Ok(p) => p,
                    Err(e) => {
                        log::error!("error marshalling data: {}", e);
                        return;
                    }
                };

                if let Err(e) = radio.lock().await.engine(StdClock).send(&payload) {
                    log::error!("error sending data over LoRa: {}", e);
                }
            })
        })?)
        .await?;

    scheduler.start().await?;
    std::future::pending::<()>().await;
    Ok(())
}
