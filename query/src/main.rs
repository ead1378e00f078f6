//! `mb-query`: an ad-hoc diagnostic client for reading or writing a single
//! Modbus holding register over TCP or RTU-over-serial. One of the
//! "external collaborators" spec.md names but does not itself specify
//! beyond its role (§2).

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_modbus::prelude::*;

#[derive(Parser)]
#[clap(name = "mb-query", about = "Query a Modbus slave over TCP or serial.")]
struct Cli {
    #[clap(subcommand)]
    transport: Transport,
}

#[derive(Subcommand)]
enum Transport {
    /// Query a Modbus slave over TCP.
    Tcp {
        #[clap(long, default_value = "127.0.0.1")]
        host: String,
        #[clap(long, default_value_t = 1502)]
        port: u16,
        #[clap(flatten)]
        op: Op,
    },
    /// Query a Modbus slave over serial.
    Serial {
        #[clap(long, default_value = "/dev/ttyUSB0")]
        serial_dev: String,
        #[clap(long, default_value_t = 9600)]
        baud_rate: u32,
        #[clap(flatten)]
        op: Op,
    },
}

#[derive(Parser)]
struct Op {
    /// Slave ID, in [1, 247].
    slave_id: u8,
    /// Register address, in hex (e.g. 0x04).
    #[clap(parse(try_from_str = parse_hex_u16))]
    address: u16,
    /// Value to write, in hex; omit to read instead.
    #[clap(parse(try_from_str = parse_hex_u16))]
    data: Option<u16>,
}

fn parse_hex_u16(s: &str) -> Result<u16, std::num::ParseIntError> {
    u16::from_str_radix(s.trim_start_matches("0x"), 16)
}

async fn run(op: &Op, mut ctx: client::Context) -> Result<()> {
    if !(1..=247).contains(&op.slave_id) {
        bail!("invalid slave ID {}: must be in [1, 247]", op.slave_id);
    }

    match op.data {
        None => {
            let words = ctx
                .read_holding_registers(op.address, 1)
                .await
                .context("couldn't read data from the Modbus slave")?;
            let value = words[0];
            println!(
                "Data for address {:#x}:\n\tDecimal -> {}\n\tHex -> {:#x}\n\tOctal -> {:#o}",
                op.address, value, value, value
            );
        }
        Some(data) => {
            ctx.write_single_register(op.address, data)
                .await
                .context("couldn't write the data to the Modbus slave")?;
            println!("Correctly wrote {:#x} at address {:#x} on the Modbus slave", data, op.address);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.transport {
        Transport::Tcp { host, port, op } => {
            let socket_addr = format!("{}:{}", host, port)
                .parse()
                .context("invalid host/port")?;
            let ctx = tcp::connect(socket_addr)
                .await
                .with_context(|| format!("couldn't connect to the Modbus slave at {}:{}", host, port))?;
            run(&op, ctx).await
        }
        Transport::Serial {
            serial_dev,
            baud_rate,
            op,
        } => {
            let builder = tokio_serial::new(&serial_dev, baud_rate);
            let port = tokio_serial::SerialStream::open(&builder)
                .with_context(|| format!("couldn't connect to the Modbus slave @ {}", serial_dev))?;
            let ctx = rtu::attach_slave(port, Slave(op.slave_id));
            run(&op, ctx).await
        }
    }
}
