//! `RadioOptions` (spec §3) and its documented defaults.
//!
//! Two fields named in spec.md -- serial baud and the reset-pin handle --
//! are bus-construction details in this crate's design: opening the SPI
//! device and owning the reset pin is the job of the concrete [`crate::bus::Bus`]
//! adapter (`linux-bus`, or [`crate::bus::ehal`]), constructed *before*
//! [`crate::RadioDevice::new`] is called, rather than something `new` opens
//! itself. `serial_baud_hz` is kept here anyway since the binaries read it
//! out of the same CLI-parsed config struct that becomes `RadioOptions`
//! when they open their bus adapter (see `DESIGN.md`).

use crate::log::LogLevel;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadioOptions {
    /// SPI bus speed, consumed by the bus adapter at open time.
    pub serial_baud_hz: u32,
    /// Carrier frequency in MHz, valid range `[240, 920]`.
    pub carrier_frequency_mhz: i64,
    pub preamble_length: u16,
    /// Whether to use the PA_BOOST high-power TX path (§4.3).
    pub high_power: bool,
    pub agc: bool,
    pub crc: bool,
    pub bandwidth_hz: u32,
    /// Coding rate id, valid range `[5, 8]`.
    pub coding_rate: u8,
    /// Spreading factor, valid range `[6, 12]`.
    pub spreading_factor: u8,
    /// TX power in dBm; valid range depends on `high_power` (§4.3).
    pub tx_power_dbm: i8,
    pub log_level: LogLevel,
}

impl Default for RadioOptions {
    fn default() -> Self {
        RadioOptions {
            serial_baud_hz: 5_000_000,
            carrier_frequency_mhz: 915,
            preamble_length: 8,
            high_power: true,
            agc: false,
            crc: true,
            bandwidth_hz: 125_000,
            coding_rate: 5,
            spreading_factor: 7,
            tx_power_dbm: 13,
            log_level: LogLevel::Info,
        }
    }
}
