//! The two ingest paths demultiplexing `{"id": string, "data": int}`
//! payloads into the register bank (spec §6).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use serde::Deserialize;
use sx1276_linux_bus::StdClock;

use crate::registers::Registers;

#[derive(Deserialize, Debug)]
pub struct DataPoint {
    pub id: String,
    pub data: i64,
}

/// UDP ingest (spec §6): no "data==0 is suspect" filtering — this is the
/// asymmetry spec §9 calls out and directs implementers to replicate
/// rather than silently harmonize.
pub async fn udp_loop(bind_addr: SocketAddr, device_map: Arc<HashMap<String, u16>>, registers: Arc<Registers>) {
    let socket = match tokio::net::UdpSocket::bind(bind_addr).await {
        Ok(s) => s,
        Err(e) => {
            log::error!("UDP: couldn't bind {}: {}", bind_addr, e);
            return;
        }
    };
    log::info!("UDP: listening on {}", bind_addr);

    let mut buf = [0u8; 1024];
    loop {
        let (n, _from) = match socket.recv_from(&mut buf).await {
            Ok(v) => v,
            Err(e) => {
                log::warn!("UDP: recv error: {}", e);
                continue;
            }
        };

        let dp: DataPoint = match serde_json::from_slice(&buf[..n]) {
            Ok(dp) => dp,
            Err(e) => {
                log::warn!("UDP: error decoding JSON: {}", e);
                continue;
            }
        };
        log::info!("UDP: received -> {:?}", dp);

        apply(&device_map, &registers, "UDP", &dp);
    }
}

/// LoRa ingest (spec §6, §4.4): runs on a blocking thread since
/// [`sx1276::engine::Engine::receive`] blocks the calling thread while
/// polling. Treats `data == 0` as suspect and skips it, "sticking to
/// last" (spec §9's documented asymmetry with the UDP path above).
pub fn lora_loop<B: sx1276::Bus>(
    mut radio: sx1276::RadioDevice<B, sx1276_linux_bus::EnvLoggerSink>,
    device_map: Arc<HashMap<String, u16>>,
    registers: Arc<Registers>,
) {
    loop {
        let packet = match radio.engine(StdClock).receive(500, 0) {
            Ok(p) => p,
            Err(e) => {
                log::warn!("LoRa: error receiving data: {}", e);
                continue;
            }
        };

        // Strip the 4-byte compatibility header (spec §4.4).
        if packet.len() <= 4 {
            log::warn!("LoRa: received a packet with no payload past the header");
            continue;
        }
        let dp: DataPoint = match serde_json::from_slice(&packet[4..]) {
            Ok(dp) => dp,
            Err(e) => {
                log::warn!("LoRa: error unmarshalling data: {}", e);
                continue;
            }
        };
        log::info!("LoRa: received -> {:?}", dp);

        if dp.data == 0 {
            log::info!("LoRa: data==0 for {:?}, sticking to last value", dp.id);
            continue;
        }

        apply(&device_map, &registers, "LoRa", &dp);
    }
}

fn apply(device_map: &HashMap<String, u16>, registers: &Registers, transport: &str, dp: &DataPoint) {
    let addr = match device_map.get(&dp.id) {
        Some(addr) => *addr,
        None => {
            log::warn!("{}: received a nonexistent ID: {}", transport, dp.id);
            return;
        }
    };

    if registers.write_single(addr, dp.data as u16) {
        log::info!("{}: sent data to Modbus server @ {}", transport, addr);
    } else {
        log::warn!("{}: register address {} is out of range", transport, addr);
    }
}
