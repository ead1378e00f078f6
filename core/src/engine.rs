//! Transceiver Engine (spec §4.4): packet send/receive, mode transitions,
//! IRQ-flag polling, FIFO cursor management, compatibility framing.

use crate::bus::Bus;
use crate::config::Config;
use crate::error::{BusError, EmptyPacketError, RangeError, ReceiveError, SendError, TimeoutError};
use crate::regs::{self, OperatingMode};
use crate::rio::Rio;

/// Destination/source/flags/id header prepended to every outbound payload
/// (spec §6); upstream consumers skip these 4 bytes.
pub const COMPAT_HEADER: [u8; 4] = [0xFF, 0xFF, 0x00, 0x00];

const IRQ_TX_DONE: u8 = 1 << 3;
const IRQ_RX_DONE: u8 = 1 << 6;

/// Blocks a suspended call for roughly `millis`. Implementations inject
/// their own notion of time (a hardware timer tick count, `std::thread::sleep`,
/// ...) by implementing this trait rather than the engine depending on any
/// one clock source -- the core stays `no_std` either way.
pub trait Clock {
    fn delay_ms(&mut self, millis: u32);
}

pub struct Engine<'a, B, C> {
    rio: &'a mut Rio<B>,
    high_power: &'a mut bool,
    clock: C,
}

impl<'a, B: Bus, C: Clock> Engine<'a, B, C> {
    pub fn new(rio: &'a mut Rio<B>, high_power: &'a mut bool, clock: C) -> Self {
        Engine { rio, high_power, clock }
    }

    fn config(&mut self) -> Config<'_, B> {
        Config::new(self.rio, self.high_power)
    }

    /// Spec §4.4 `Send(data)`. Rejects payloads that would overflow the
    /// 256-byte FIFO once the compatibility header is prepended (spec §9
    /// open question, resolved in favor of rejecting). The ceiling is 255,
    /// not 256: `PayloadLength` is a single 8-bit register, so a total of
    /// 256 would silently wrap to 0 on the chip rather than actually fit.
    pub fn send(&mut self, data: &[u8]) -> Result<(), SendError<B::Error>> {
        let total_len = COMPAT_HEADER.len() + data.len();
        if total_len > 255 {
            return Err(RangeError::new("payload exceeds the 255-byte PayloadLength register").into());
        }

        self.config().set_mode(OperatingMode::Standby)?;
        self.rio.write_byte(regs::FIFO_ADDR_PTR, 0x00)?;

        let mut framed: heapless::Vec<u8, 256> = heapless::Vec::new();
        framed.extend_from_slice(&COMPAT_HEADER).expect("fits 256-byte FIFO");
        framed.extend_from_slice(data).expect("checked above");
        self.rio.write_payload(regs::FIFO, &framed)?;

        self.rio.write_byte(regs::PAYLOAD_LENGTH, total_len as u8)?;
        self.config().set_mode(OperatingMode::Tx)?;
        // DIO0 -> TxDone.
        self.rio.write_field(crate::regs::BitField::new(regs::DIO_MAPPING_A, 2, 6), 0b01)?;

        loop {
            let flags = self.rio.read_byte(regs::IRQ_FLAGS)?;
            if flags & IRQ_TX_DONE != 0 {
                break;
            }
            self.clock.delay_ms(1_000);
        }

        self.config().set_mode(OperatingMode::Standby)?;
        self.rio.write_byte(regs::IRQ_FLAGS, 0xFF)?;
        Ok(())
    }

    /// Spec §4.4 `Receive(poll_interval, timeout)`. `timeout_ms == 0` means
    /// wait forever, matching the base contract's "no timeout" case for
    /// `poll_interval` reuse on `Send`.
    pub fn receive(
        &mut self,
        poll_interval_ms: u32,
        timeout_ms: u32,
    ) -> Result<heapless::Vec<u8, 252>, ReceiveError<B::Error>> {
        self.config().set_mode(OperatingMode::Rx)?;

        let mut waited_ms: u32 = 0;
        loop {
            self.clock.delay_ms(poll_interval_ms);
            waited_ms = waited_ms.saturating_add(poll_interval_ms);
            let flags = self.rio.read_byte(regs::IRQ_FLAGS)?;
            if flags & IRQ_RX_DONE != 0 {
                break;
            }
            if timeout_ms > 0 && waited_ms >= timeout_ms {
                self.cleanup_to_standby()?;
                return Err(TimeoutError.into());
            }
        }

        let nb_bytes = self.rio.read_byte(regs::RX_NB_BYTES)?;
        if nb_bytes == 0 {
            self.cleanup_to_standby()?;
            return Err(EmptyPacketError.into());
        }

        let current_addr = self.rio.read_byte(regs::FIFO_RX_CURRENT_ADDR)?;
        self.rio.write_byte(regs::FIFO_ADDR_PTR, current_addr)?;

        let mut payload: heapless::Vec<u8, 252> = heapless::Vec::new();
        for _ in 0..nb_bytes {
            let byte = self.rio.read_byte(regs::FIFO)?;
            // RxNbBytes can read back up to 255 on a misbehaving chip; the
            // FIFO itself never holds more than 252 bytes of payload once
            // the 4-byte header is accounted for, so silently truncating
            // here is safe.
            let _ = payload.push(byte);
        }

        self.cleanup_to_standby()?;
        Ok(payload)
    }

    fn cleanup_to_standby(&mut self) -> Result<(), BusError<B::Error>> {
        self.rio.write_byte(regs::IRQ_FLAGS, 0xFF)?;
        self.config().set_mode(OperatingMode::Standby)
    }

    /// Masks bus errors to `false` (spec §4.4), a safe default for polling
    /// loops.
    pub fn tx_done(&mut self) -> bool {
        self.rio
            .read_byte(regs::IRQ_FLAGS)
            .map(|v| v & IRQ_TX_DONE != 0)
            .unwrap_or(false)
    }

    pub fn rx_done(&mut self) -> bool {
        self.rio
            .read_byte(regs::IRQ_FLAGS)
            .map(|v| v & IRQ_RX_DONE != 0)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::MockBus;

    /// A clock that never actually waits -- tests only care that it's
    /// called the expected number of times, not about wall-clock time.
    struct NullClock(u32);

    impl Clock for NullClock {
        fn delay_ms(&mut self, _millis: u32) {
            self.0 += 1;
        }
    }

    #[test]
    fn send_writes_the_compat_header_and_reaches_standby() {
        let mut rio = Rio::new(MockBus::new());
        // Pre-arm TxDone so the poll loop exits on its first check.
        rio.bus_mut().register_file[regs::IRQ_FLAGS as usize] = IRQ_TX_DONE;

        let mut high_power = true;
        let mut engine = Engine::new(&mut rio, &mut high_power, NullClock(0));
        engine.send(b"hello").unwrap();

        let payload_write = engine
            .rio
            .bus_mut()
            .transfers
            .iter()
            .find(|t| t.len() == 1 + 4 + 5)
            .expect("expected one write_payload transfer of header+data");
        assert_eq!(payload_write.as_slice(), &[regs::FIFO | 0x80, 0xFF, 0xFF, 0x00, 0x00, b'h', b'e', b'l', b'l', b'o']);

        assert_eq!(engine.rio.read_byte(regs::OP_MODE).unwrap() & 0x7, OperatingMode::Standby as u8);
    }

    #[test]
    fn send_rejects_oversized_payload() {
        let mut rio = Rio::new(MockBus::new());
        let mut high_power = true;
        let mut engine = Engine::new(&mut rio, &mut high_power, NullClock(0));
        let data = [0u8; 253];
        assert!(engine.send(&data).is_err());
    }

    #[test]
    fn receive_times_out_and_restores_standby() {
        let mut rio = Rio::new(MockBus::new());
        let mut high_power = true;
        let mut engine = Engine::new(&mut rio, &mut high_power, NullClock(0));

        let result = engine.receive(50, 200);
        assert!(matches!(result, Err(ReceiveError::Timeout(_))));
        assert_eq!(engine.rio.read_byte(regs::OP_MODE).unwrap() & 0x7, OperatingMode::Standby as u8);
        assert_eq!(engine.rio.read_byte(regs::IRQ_FLAGS).unwrap(), 0xFF);
    }

    #[test]
    fn receive_returns_the_payload_on_rx_done() {
        let mut rio = Rio::new(MockBus::new());
        {
            let bus = rio.bus_mut();
            bus.register_file[regs::IRQ_FLAGS as usize] = IRQ_RX_DONE;
            bus.register_file[regs::RX_NB_BYTES as usize] = 9;
        }
        let mut high_power = true;
        let mut engine = Engine::new(&mut rio, &mut high_power, NullClock(0));

        let packet = engine.receive(10, 0).unwrap();
        assert_eq!(packet.len(), 9);
    }

    #[test]
    fn receive_fails_on_empty_packet() {
        let mut rio = Rio::new(MockBus::new());
        rio.bus_mut().register_file[regs::IRQ_FLAGS as usize] = IRQ_RX_DONE;
        let mut high_power = true;
        let mut engine = Engine::new(&mut rio, &mut high_power, NullClock(0));

        assert!(matches!(engine.receive(10, 0), Err(ReceiveError::EmptyPacket(_))));
    }
}
