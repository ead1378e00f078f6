//! End-to-end scenarios against a mock Bus Transport (spec §8).

use sx1276::bus::mock::MockBus;
use sx1276::engine::Clock;
use sx1276::{NullSink, OperatingMode, RadioDevice, RadioOptions};

struct NullClock;

impl Clock for NullClock {
    fn delay_ms(&mut self, _millis: u32) {}
}

fn op_mode(bus: &MockBus) -> u8 {
    bus.register_file[sx1276::regs::OP_MODE as usize] & 0x7
}

/// Scenario 1: construction at 915 MHz defaults lands every register the
/// spec calls out at its documented value, and leaves the chip in
/// Standby.
#[test]
fn construction_at_915mhz_defaults() {
    let bus = MockBus::new();
    let device = RadioDevice::new(bus, RadioOptions::default(), NullSink, NullClock).unwrap();
    let bus = device.into_bus();

    assert_eq!(op_mode(&bus), OperatingMode::Standby as u8);
    assert_eq!(bus.register_file[sx1276::regs::OP_MODE as usize] & 0x80, 0x80, "LoRa bit must be set");
    assert_eq!(bus.register_file[sx1276::regs::OP_MODE as usize] & 0x08, 0x00, "915 MHz is above 525, so low-freq mode is off");

    let frf = ((bus.register_file[sx1276::regs::FRF_MSB as usize] as u32) << 16)
        | ((bus.register_file[sx1276::regs::FRF_MID as usize] as u32) << 8)
        | bus.register_file[sx1276::regs::FRF_LSB as usize] as u32;
    assert_eq!(frf, 0xE4C000, "raw FRF for 915 MHz");

    let preamble = ((bus.register_file[sx1276::regs::PREAMBLE_MSB as usize] as u16) << 8)
        | bus.register_file[sx1276::regs::PREAMBLE_LSB as usize] as u16;
    assert_eq!(preamble, 8);

    let modem_a = bus.register_file[sx1276::regs::MODEM_CONFIG_A as usize];
    assert_eq!((modem_a >> 4) & 0xF, 7, "125 kHz is bandwidth id 7");
    assert_eq!((modem_a >> 1) & 0x7, 1, "CR=5 stores raw id cr-4=1");
    assert_eq!(bus.register_file[sx1276::regs::BW_CALIB_C as usize], 0x03);
    assert_eq!(bus.register_file[sx1276::regs::BW_CALIB_B as usize], 0x00);
    assert_eq!(bus.register_file[sx1276::regs::BW_CALIB_A as usize], 0x40, "bw >= 62500 branch");

    let modem_b = bus.register_file[sx1276::regs::MODEM_CONFIG_B as usize];
    assert_eq!((modem_b >> 4) & 0xF, 7, "SF=7");
    assert_eq!((modem_b >> 2) & 0x1, 1, "CRC on");
    assert_eq!(bus.register_file[sx1276::regs::DETECTION_OPTIMIZE as usize] & 0x7, 0x3);
    assert_eq!(bus.register_file[sx1276::regs::DETECTION_THRESHOLD as usize], 0x0A);

    let modem_c = bus.register_file[sx1276::regs::MODEM_CONFIG_C as usize];
    assert_eq!((modem_c >> 2) & 0x1, 0, "AGC off");

    assert_eq!(bus.register_file[sx1276::regs::PA_DAC as usize], 0x04, "13 dBm does not need the PA DAC");
    let pa_config = bus.register_file[sx1276::regs::PA_CONFIG as usize];
    assert_eq!(pa_config & 0x80, 0x80, "PA_BOOST");
    assert_eq!((pa_config >> 4) & 0x7, 0x4);
    assert_eq!(pa_config & 0xF, 8, "(13 - 5) & 0xF");
}

/// Scenario 2: sending "hello" produces the exact header+payload write and
/// returns the chip to Standby with IRQs cleared.
#[test]
fn send_hello_produces_the_compat_framed_payload() {
    let bus = MockBus::new();
    let mut device = RadioDevice::new(bus, RadioOptions::default(), NullSink, NullClock).unwrap();

    device.engine(NullClock).send(b"hello").unwrap();

    let bus = device.into_bus();
    let frame = bus
        .transfers
        .iter()
        .find(|t| t.len() == 1 + 9)
        .expect("expected a single write_payload transfer of header+data");
    assert_eq!(
        frame.as_slice(),
        &[sx1276::regs::FIFO | 0x80, 0xFF, 0xFF, 0x00, 0x00, b'h', b'e', b'l', b'l', b'o']
    );
    assert_eq!(bus.register_file[sx1276::regs::PAYLOAD_LENGTH as usize], 9);
    assert_eq!(op_mode(&bus), OperatingMode::Standby as u8);
}

/// Scenario 3: receive without the chip ever raising RxDone times out and
/// leaves the chip cleaned up.
#[test]
fn receive_times_out_when_rx_done_never_fires() {
    let bus = MockBus::new();
    let mut device = RadioDevice::new(bus, RadioOptions::default(), NullSink, NullClock).unwrap();

    let result = device.engine(NullClock).receive(50, 200);
    assert!(result.is_err());

    let bus = device.into_bus();
    assert_eq!(op_mode(&bus), OperatingMode::Standby as u8);
    assert_eq!(bus.register_file[sx1276::regs::IRQ_FLAGS as usize], 0xFF);
}

/// Scenario 5: SetBwHz(500000) in low-frequency mode applies the documented
/// calibration register values.
#[test]
fn bandwidth_500khz_low_freq_mode() {
    let bus = MockBus::new();
    let mut device = RadioDevice::new(bus, RadioOptions::default(), NullSink, NullClock).unwrap();

    {
        let mut cfg = device.config_mut();
        cfg.set_low_freq_mode(true).unwrap();
        cfg.set_bw_hz(500_000).unwrap();
    }

    let bus = device.into_bus();
    assert_eq!(bus.register_file[sx1276::regs::BW_CALIB_D as usize], 0x7F);
    assert_eq!(bus.register_file[sx1276::regs::BW_CALIB_C as usize], 0x02);
    assert_eq!(bus.register_file[sx1276::regs::DETECTION_OPTIMIZE as usize] & 0x80, 0x80);
}

/// Scenario 6: SetTxPower(22) in high-power mode enables the PA DAC and
/// costs 3 dBm off the raw value.
#[test]
fn tx_power_22_high_power() {
    let bus = MockBus::new();
    let mut device = RadioDevice::new(bus, RadioOptions::default(), NullSink, NullClock).unwrap();

    device.config_mut().set_tx_power(22).unwrap();

    let bus = device.into_bus();
    assert_eq!(bus.register_file[sx1276::regs::PA_DAC as usize], 0x07);
    assert_eq!(bus.register_file[sx1276::regs::PA_CONFIG as usize] & 0xF, 14);
}
