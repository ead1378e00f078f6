//! Register-level driver for the Semtech SX1276/77/78/79 family of LoRa
//! transceivers.
//!
//! The crate is split along the five components of the driver: [`bus`]
//! (Bus Transport), [`rio`] (Register I/O), [`config`] (Radio
//! Configuration), [`engine`] (Transceiver Engine), and this module's
//! [`RadioDevice`] (Radio Facade), which wires the rest together into the
//! construction/reset/validation pipeline a caller actually uses.
//!
//! ```ignore
//! use linux_embedded_hal as hal;
//! use sx1276::{RadioDevice, RadioOptions};
//! use sx1276_linux_bus::{LinuxBus, StdClock};
//!
//! let bus = LinuxBus::open("/dev/spidev0.0", 5_000_000, 25)?;
//! let mut radio = RadioDevice::new(bus, RadioOptions::default(), sx1276::NullSink, StdClock)?;
//! radio.engine(StdClock).send(b"hello")?;
//! ```

#![cfg_attr(not(test), no_std)]

pub mod bus;
pub mod config;
pub mod engine;
pub mod error;
pub mod log;
pub mod options;
pub mod regs;
pub mod rio;

pub use bus::Bus;
pub use engine::Clock;
pub use error::{
    BusError, EmptyPacketError, Error, InitError, RangeError, ReceiveError, SendError, TimeoutError,
};
pub use log::{LogLevel, LogSink, NullSink};
pub use options::RadioOptions;
pub use regs::OperatingMode;

use config::Config;
use engine::Engine;
use rio::Rio;

/// A constructed, reset, and configured radio (spec §3 `RadioDevice`).
///
/// Owns the bus handle (through [`Rio`]), a cached copy of the one
/// `RadioOptions` flag that changes later decisions (`high_power`, see
/// [`config::Config::set_tx_power`]), and the log sink passed to
/// [`RadioDevice::new`]. The small bit-banging scratch buffer the data
/// model calls out lives on [`Rio`] itself, next to the bus it serves.
pub struct RadioDevice<B, L = NullSink> {
    rio: Rio<B>,
    high_power: bool,
    log: L,
    log_level: LogLevel,
}

impl<B: Bus, L: LogSink> RadioDevice<B, L> {
    /// Spec §4.5 construction pipeline. Steps 1-2 (bus already open by the
    /// time it is handed in here, then `reset_pulse`) are fatal on failure;
    /// everything from the version check onward is logged but non-fatal —
    /// the device is still returned, possibly at degraded settings.
    ///
    /// Takes a [`Clock`] (consumed only here, not stored) so step 4's
    /// mandatory ≥10ms settle between `SetMode(Sleep)` and `SetLoRa(true)`
    /// can actually be observed, rather than relying on bus latency alone.
    pub fn new<C: Clock>(bus: B, options: RadioOptions, mut log: L, clock: C) -> Result<Self, InitError<B::Error>> {
        let mut rio = Rio::new(bus);
        rio.bus_mut().reset_pulse().map_err(InitError)?;

        let mut high_power = options.high_power;
        let log_level = options.log_level;

        if let Ok(version) = Config::new(&mut rio, &mut high_power).version() {
            if version != regs::EXPECTED_VERSION && log_level <= LogLevel::Warn {
                log.log(LogLevel::Warn, "unexpected version register value");
            }
        } else if log_level <= LogLevel::Warn {
            log.log(LogLevel::Warn, "failed to read version register");
        }

        let mut device = RadioDevice { rio, high_power, log, log_level };
        device.configure(&options, clock);
        Ok(device)
    }

    /// Gates every internal log call on [`RadioOptions::log_level`] (spec
    /// §9: "a verbosity field on the device"), since `no_std` sinks like
    /// [`NullSink`] have no filtering of their own.
    fn warn(&mut self, msg: &'static str) {
        if self.log_level <= LogLevel::Warn {
            self.log.log(LogLevel::Warn, msg);
        }
    }

    /// Spec §4.5 steps 4-9. Any single step's failure is logged and the
    /// pipeline continues, per the non-fatal contract on steps 3-9.
    fn configure(&mut self, options: &RadioOptions, mut clock: impl Clock) {
        if self.config().set_mode(OperatingMode::Sleep).is_err() {
            self.warn("failed to enter sleep for configuration");
        }
        // Mode changes to/from Sleep are the only ones needing a settle
        // delay on real hardware (spec §4.5 step 4).
        clock.delay_ms(10);
        self.config_step(|c| c.set_lora(true), "set_lora");

        if options.carrier_frequency_mhz > 525 {
            self.config_step(|c| c.set_low_freq_mode(false), "set_low_freq_mode");
        }
        self.config_step(|c| c.set_fifo_base_addrs(0, 0), "set_fifo_base_addrs");
        self.config_step_ranged(
            |c| c.set_carrier_frequency_mhz(options.carrier_frequency_mhz),
            "set_carrier_frequency_mhz",
        );
        self.config_step(|c| c.set_preamble_length(options.preamble_length), "set_preamble_length");
        self.config_step(|c| c.set_bw_hz(options.bandwidth_hz), "set_bw_hz");
        self.config_step_ranged(|c| c.set_coding_rate(options.coding_rate), "set_coding_rate");
        self.config_step_ranged(
            |c| c.set_spreading_factor(options.spreading_factor),
            "set_spreading_factor",
        );
        self.config_step(|c| c.set_crc(options.crc), "set_crc");
        self.config_step(|c| c.set_agc(options.agc), "set_agc");
        self.config_step_ranged(|c| c.set_tx_power(options.tx_power_dbm), "set_tx_power");

        if self.config().set_mode(OperatingMode::Standby).is_err() {
            self.warn("failed to return to standby after configuration");
        }
    }

    fn config_step(
        &mut self,
        f: impl FnOnce(&mut Config<'_, B>) -> Result<(), BusError<B::Error>>,
        what: &'static str,
    ) {
        if f(&mut self.config()).is_err() {
            self.warn(what);
        }
    }

    fn config_step_ranged(
        &mut self,
        f: impl FnOnce(&mut Config<'_, B>) -> Result<(), Error<B::Error>>,
        what: &'static str,
    ) {
        if f(&mut self.config()).is_err() {
            self.warn(what);
        }
    }

    fn config(&mut self) -> Config<'_, B> {
        Config::new(&mut self.rio, &mut self.high_power)
    }

    /// Typed-accessor access (spec §4.3), without going through `send`/
    /// `receive`. Useful for diagnostics (RSSI/SNR readback, `dump_registers`
    /// in the host binaries) outside the engine's mode transitions.
    pub fn config_mut(&mut self) -> Config<'_, B> {
        self.config()
    }

    /// Transceiver Engine access, parameterised over the caller's clock
    /// (spec §5: suspension only happens inside `send`/`receive`).
    pub fn engine<C: Clock>(&mut self, clock: C) -> Engine<'_, B, C> {
        Engine::new(&mut self.rio, &mut self.high_power, clock)
    }

    pub fn log_sink_mut(&mut self) -> &mut L {
        &mut self.log
    }

    /// Releases the underlying bus, ending the device's lifecycle (spec
    /// §3's "destroyed on Close of the underlying bus").
    pub fn into_bus(self) -> B {
        self.rio.into_bus()
    }

    /// Reads back the main configuration registers and logs each one at
    /// [`LogLevel::RegIo`] (supplemented, SPEC_FULL.md §2: the original
    /// driver's `Print_registers`). A register that fails to read is
    /// simply skipped rather than aborting the rest of the dump.
    pub fn dump_registers(&mut self) {
        use core::fmt::Write;

        let mut line: heapless::String<32> = heapless::String::new();
        macro_rules! dump {
            ($name:expr, $addr:expr) => {
                if let Ok(v) = self.rio.read_byte($addr) {
                    line.clear();
                    let _ = write!(line, "{} = {:#04x}", $name, v);
                    self.log.log(LogLevel::RegIo, line.as_str());
                }
            };
        }

        dump!("OpMode", regs::OP_MODE);
        dump!("FrfMsb", regs::FRF_MSB);
        dump!("FrfMid", regs::FRF_MID);
        dump!("FrfLsb", regs::FRF_LSB);
        dump!("PaConfig", regs::PA_CONFIG);
        dump!("PaDac", regs::PA_DAC);
        dump!("Ocp", regs::OCP);
        dump!("ModemConfigA", regs::MODEM_CONFIG_A);
        dump!("ModemConfigB", regs::MODEM_CONFIG_B);
        dump!("ModemConfigC", regs::MODEM_CONFIG_C);
        dump!("PreambleMsb", regs::PREAMBLE_MSB);
        dump!("PreambleLsb", regs::PREAMBLE_LSB);
        dump!("Version", regs::VERSION);
    }
}
