//! Linux userspace Bus Transport for [`sx1276`]: `/dev/spidev*` for the
//! serial link, sysfs GPIO for the reset line. Grounded directly in the
//! `sx1276` crate's own "Raspberry Pi Basic Send" example, which opens
//! exactly this pair of `linux_embedded_hal` handles.

use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::sysfs_gpio::Direction;
use linux_embedded_hal::{Pin as SysfsPin, Spidev};
use std::io;
use std::time::Duration;

use sx1276::engine::Clock;
use sx1276::log::{LogLevel, LogSink};
use sx1276::Bus;

/// Bus Transport backed by a Linux `spidev` character device and a sysfs
/// GPIO line driving the chip's active-low reset.
pub struct LinuxBus {
    spi: Spidev,
    reset: SysfsPin,
}

impl LinuxBus {
    /// Opens `spi_path` in SPI mode 0, MSB-first, 8 bits/word at
    /// `speed_hz` (spec §4.5 step 1), and exports `reset_gpio` as an
    /// output (spec §4.1's reset line). Chip-select is left to the
    /// kernel's spidev driver, not bit-banged (spec §9's open question on
    /// chip-select semantics — the SBC target relies on the bus
    /// peripheral).
    pub fn open(spi_path: &str, speed_hz: u32, reset_gpio: u64) -> io::Result<Self> {
        let mut spi = Spidev::open(spi_path)?;
        let options = SpidevOptions::new()
            .bits_per_word(8)
            .max_speed_hz(speed_hz)
            .mode(SpiModeFlags::SPI_MODE_0)
            .build();
        spi.configure(&options)?;

        let reset = SysfsPin::new(reset_gpio);
        reset.export()?;
        reset.set_direction(Direction::Out)?;

        Ok(LinuxBus { spi, reset })
    }
}

impl Bus for LinuxBus {
    type Error = io::Error;

    fn xfer(&mut self, tx: &[u8], rx: Option<&mut [u8]>) -> Result<(), Self::Error> {
        use linux_embedded_hal::spidev::SpidevTransfer;
        match rx {
            Some(out) => {
                let mut transfer = SpidevTransfer::read_write(tx, out);
                self.spi.transfer(&mut transfer)
            }
            None => {
                let mut transfer = SpidevTransfer::write(tx);
                self.spi.transfer(&mut transfer)
            }
        }
    }

    fn reset_pulse(&mut self) -> Result<(), Self::Error> {
        self.reset
            .set_value(0)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        std::thread::sleep(Duration::from_micros(100));
        self.reset
            .set_value(1)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        std::thread::sleep(Duration::from_millis(5));
        Ok(())
    }
}

/// `Engine::send`/`receive` clock backed by `std::thread::sleep`, for
/// hosts running on a real OS scheduler.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdClock;

impl Clock for StdClock {
    fn delay_ms(&mut self, millis: u32) {
        std::thread::sleep(Duration::from_millis(millis as u64));
    }
}

/// Forwards [`sx1276`]'s injectable log sink into the `log` facade, for
/// hosts that already run `env_logger` or similar (spec §9: "replace
/// [the original's] package-scoped logger with a verbosity field on the
/// device (or an injected log sink)").
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvLoggerSink;

impl LogSink for EnvLoggerSink {
    fn log(&mut self, level: LogLevel, msg: &str) {
        match level {
            LogLevel::RegIo | LogLevel::Debug => log::debug!("{}", msg),
            LogLevel::Info => log::info!("{}", msg),
            LogLevel::Warn => log::warn!("{}", msg),
            LogLevel::Error => log::error!("{}", msg),
        }
    }
}
