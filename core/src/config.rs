//! Radio Configuration (spec §4.3): typed accessors over [`crate::rio::Rio`].
//! Each setter is fallible (`BusError` on a failed transaction, `RangeError`
//! on an out-of-domain argument); each getter is infallible and masks bus
//! failure behind a documented sentinel, since getters feed tight polling
//! loops (spec §9 "error-masking getters").

use crate::error::{BusError, Error, RangeError};
use crate::regs::{self, BitField, OperatingMode};
use crate::rio::Rio;

const MODE: BitField = BitField::new(regs::OP_MODE, 3, 0);
const LOW_FREQ_MODE: BitField = BitField::new(regs::OP_MODE, 1, 3);
const LORA_MODE: BitField = BitField::new(regs::OP_MODE, 1, 7);
const CODING_RATE: BitField = BitField::new(regs::MODEM_CONFIG_A, 3, 1);
const BANDWIDTH: BitField = BitField::new(regs::MODEM_CONFIG_A, 4, 4);
const SPREADING_FACTOR: BitField = BitField::new(regs::MODEM_CONFIG_B, 4, 4);
const CRC: BitField = BitField::new(regs::MODEM_CONFIG_B, 1, 2);
const AGC: BitField = BitField::new(regs::MODEM_CONFIG_C, 1, 2);

/// The set of typed accessors named in spec §4.3, generic over any [`Bus`]
/// through [`Rio`]. `high_power` is the one cached `RadioOptions` flag the
/// data model calls out (spec §3): it decides which branch `SetTxPower` and
/// `TxPower` take and is never re-read from the chip.
pub struct Config<'a, B> {
    rio: &'a mut Rio<B>,
    high_power: &'a mut bool,
}

impl<'a, B: crate::bus::Bus> Config<'a, B> {
    pub fn new(rio: &'a mut Rio<B>, high_power: &'a mut bool) -> Self {
        Config { rio, high_power }
    }

    /// Raw 3-bit operating mode. Sentinel on bus error: `0b111` (§4.3),
    /// which names no real mode.
    pub fn mode(&mut self) -> u8 {
        self.rio.read_field(MODE).unwrap_or(OperatingMode::SENTINEL)
    }

    pub fn set_mode(&mut self, mode: OperatingMode) -> Result<(), BusError<B::Error>> {
        self.rio.write_field(MODE, mode.as_raw())
    }

    pub fn low_freq_mode(&mut self) -> bool {
        self.rio.read_field(LOW_FREQ_MODE).unwrap_or(0) != 0
    }

    pub fn set_low_freq_mode(&mut self, on: bool) -> Result<(), BusError<B::Error>> {
        self.rio.write_field(LOW_FREQ_MODE, on as u8)
    }

    pub fn lora(&mut self) -> bool {
        self.rio.read_field(LORA_MODE).unwrap_or(0) != 0
    }

    /// Must be written before carrier programming (spec §4.3).
    pub fn set_lora(&mut self, on: bool) -> Result<(), BusError<B::Error>> {
        self.rio.write_field(LORA_MODE, on as u8)
    }

    /// `raw_frf / F_STEP_HZ`, truncated, read back from the three FRF bytes.
    /// Sentinel on bus error: `0`.
    pub fn carrier_frequency_mhz(&mut self) -> i64 {
        self.read_frf()
            .map(|frf| (frf as u64 * regs::F_STEP_HZ / 1_000_000) as i64)
            .unwrap_or(0)
    }

    fn read_frf(&mut self) -> Result<u32, BusError<B::Error>> {
        let msb = self.rio.read_byte(regs::FRF_MSB)?;
        let mid = self.rio.read_byte(regs::FRF_MID)?;
        let lsb = self.rio.read_byte(regs::FRF_LSB)?;
        Ok(((msb as u32) << 16) | ((mid as u32) << 8) | (lsb as u32))
    }

    /// `raw FRF = (f_MHz * 1e6 * 2^19) / F_OSC`, truncated to 24 bits (§3).
    /// Rejects `f_mhz` outside `[240, 920]`.
    pub fn set_carrier_frequency_mhz(&mut self, f_mhz: i64) -> Result<(), Error<B::Error>> {
        if !(240..=920).contains(&f_mhz) {
            return Err(RangeError::new("carrier_frequency_mhz not in [240, 920]").into());
        }
        let hz = (f_mhz as u64) * 1_000_000;
        let frf = ((hz << 19) / regs::F_OSC_HZ) as u32 & 0x00FF_FFFF;
        self.rio.write_byte(regs::FRF_MSB, (frf >> 16) as u8)?;
        self.rio.write_byte(regs::FRF_MID, (frf >> 8) as u8)?;
        self.rio.write_byte(regs::FRF_LSB, frf as u8)?;
        Ok(())
    }

    /// 16-bit big-endian preamble length. Sentinel on bus error: `0`.
    pub fn preamble_length(&mut self) -> u16 {
        (|| -> Result<u16, BusError<B::Error>> {
            let msb = self.rio.read_byte(regs::PREAMBLE_MSB)?;
            let lsb = self.rio.read_byte(regs::PREAMBLE_LSB)?;
            Ok(((msb as u16) << 8) | lsb as u16)
        })()
        .unwrap_or(0)
    }

    pub fn set_preamble_length(&mut self, len: u16) -> Result<(), BusError<B::Error>> {
        self.rio.write_byte(regs::PREAMBLE_MSB, (len >> 8) as u8)?;
        self.rio.write_byte(regs::PREAMBLE_LSB, len as u8)?;
        Ok(())
    }

    /// Stored raw id is `cr-4`; reported value adds it back. Sentinel on bus
    /// error: `0`.
    pub fn coding_rate(&mut self) -> u8 {
        self.rio
            .read_field(CODING_RATE)
            .map(|raw| raw + 4)
            .unwrap_or(0)
    }

    pub fn set_coding_rate(&mut self, cr: u8) -> Result<(), Error<B::Error>> {
        if !(5..=8).contains(&cr) {
            return Err(RangeError::new("coding_rate not in [5, 8]").into());
        }
        self.rio.write_field(CODING_RATE, cr - 4)?;
        Ok(())
    }

    /// Sentinel on bus error: `0`.
    pub fn spreading_factor(&mut self) -> u8 {
        self.rio.read_field(SPREADING_FACTOR).unwrap_or(0)
    }

    /// Side effects on DetectionOptimize/DetectionThreshold per the
    /// datasheet's SF=6 special case (spec §3).
    pub fn set_spreading_factor(&mut self, sf: u8) -> Result<(), Error<B::Error>> {
        if !(6..=12).contains(&sf) {
            return Err(RangeError::new("spreading_factor not in [6, 12]").into());
        }
        self.rio.write_field(SPREADING_FACTOR, sf)?;
        let (detection_optimize, detection_threshold) = if sf == 6 { (0x5, 0x0C) } else { (0x3, 0x0A) };
        // Bits 2..0 only: bit 7 ("Auto IF on") is independently owned by the
        // bandwidth calibration path (`set_bw_hz`) and must not be disturbed
        // from here.
        self.rio
            .write_field(BitField::new(regs::DETECTION_OPTIMIZE, 3, 0), detection_optimize)?;
        self.rio.write_byte(regs::DETECTION_THRESHOLD, detection_threshold)?;
        Ok(())
    }

    pub fn crc(&mut self) -> bool {
        self.rio.read_field(CRC).unwrap_or(0) != 0
    }

    pub fn set_crc(&mut self, on: bool) -> Result<(), BusError<B::Error>> {
        self.rio.write_field(CRC, on as u8)
    }

    pub fn agc(&mut self) -> bool {
        self.rio.read_field(AGC).unwrap_or(0) != 0
    }

    pub fn set_agc(&mut self, on: bool) -> Result<(), BusError<B::Error>> {
        self.rio.write_field(AGC, on as u8)
    }

    /// Reported TxPower depends on the cached high-power branch (spec
    /// §4.3). In high power, `raw` alone can't be inverted back to the
    /// dBm value passed to `set_tx_power` when the PA DAC is engaged
    /// (`pow > 20`): that branch subtracts 3 dBm from `pow` before storing
    /// it, so the 3 dBm must be added back whenever `PaDac` reads `0x7`.
    /// Sentinel on bus error: `0`.
    pub fn tx_power(&mut self) -> i8 {
        let raw = match self.rio.read_field(BitField::new(regs::PA_CONFIG, 4, 0)) {
            Ok(v) => v as i8,
            Err(_) => return 0,
        };
        if *self.high_power {
            let pa_dac_boosted = self.rio.read_byte(regs::PA_DAC).map(|v| v == 0x7).unwrap_or(false);
            if pa_dac_boosted {
                raw + 5 + 3
            } else {
                raw + 5
            }
        } else {
            raw - 1
        }
    }

    /// High-power: `[5, 23]`, `>20` enables the PA DAC and costs 3 dBm.
    /// Standard-power: `[0, 14]`.
    pub fn set_tx_power(&mut self, pow: i8) -> Result<(), Error<B::Error>> {
        if *self.high_power {
            if !(5..=23).contains(&pow) {
                return Err(RangeError::new("tx_power_dbm not in [5, 23] (high power)").into());
            }
            let (pa_dac, effective_pow) = if pow > 20 {
                (0x7u8, pow - 3)
            } else {
                (0x4u8, pow)
            };
            self.rio.write_byte(regs::PA_DAC, pa_dac)?;
            let raw = (effective_pow - 5) as u8 & 0x0F;
            let pa_config = 0x80 | (0x4 << 4) | raw;
            self.rio.write_byte(regs::PA_CONFIG, pa_config)?;
        } else {
            if !(0..=14).contains(&pow) {
                return Err(RangeError::new("tx_power_dbm not in [0, 14] (standard power)").into());
            }
            let raw = (pow + 1) as u8 & 0x0F;
            let pa_config = (0x7 << 4) | raw;
            self.rio.write_byte(regs::PA_CONFIG, pa_config)?;
        }
        Ok(())
    }

    /// Sentinel on bus error: `0`.
    pub fn bw_hz(&mut self) -> u32 {
        match self.rio.read_field(BANDWIDTH) {
            Ok(id) if (id as usize) < regs::BANDWIDTHS_HZ.len() => regs::BANDWIDTHS_HZ[id as usize],
            Ok(id) if id == regs::BANDWIDTH_500K_ID => regs::BANDWIDTH_500K_HZ,
            _ => 0,
        }
    }

    /// Selects the smallest canonical id whose value is `>= bw_in`, or the
    /// 500 kHz overflow bucket above 250 kHz, then applies the
    /// datasheet-mandated calibration post-writes (spec §4.3).
    pub fn set_bw_hz(&mut self, bw_in: u32) -> Result<(), BusError<B::Error>> {
        let id = regs::BANDWIDTHS_HZ
            .iter()
            .position(|&hz| hz >= bw_in)
            .map(|i| i as u8)
            .unwrap_or(regs::BANDWIDTH_500K_ID);
        let effective_hz = if id == regs::BANDWIDTH_500K_ID {
            regs::BANDWIDTH_500K_HZ
        } else {
            regs::BANDWIDTHS_HZ[id as usize]
        };

        self.rio.write_field(BANDWIDTH, id)?;

        if effective_hz >= 500_000 {
            self.rio.write_field(BitField::new(regs::DETECTION_OPTIMIZE, 1, 7), 1)?;
            self.rio.write_byte(regs::BW_CALIB_C, 0x02)?;
            let low_freq = self.low_freq_mode();
            self.rio
                .write_byte(regs::BW_CALIB_D, if low_freq { 0x7F } else { 0x64 })?;
        } else {
            self.rio.write_field(BitField::new(regs::DETECTION_OPTIMIZE, 1, 7), 0)?;
            self.rio.write_byte(regs::BW_CALIB_C, 0x03)?;
            self.rio.write_byte(regs::BW_CALIB_B, 0x00)?;
            let calib_a = if effective_hz == 7_800 {
                0x48
            } else if effective_hz >= 62_500 {
                0x40
            } else {
                0x44
            };
            self.rio.write_byte(regs::BW_CALIB_A, calib_a)?;
        }
        Ok(())
    }

    pub fn fifo_base_addrs(&mut self) -> (u8, u8) {
        (|| -> Result<(u8, u8), BusError<B::Error>> {
            let tx = self.rio.read_byte(regs::FIFO_TX_BASE_ADDR)?;
            let rx = self.rio.read_byte(regs::FIFO_RX_BASE_ADDR)?;
            Ok((tx, rx))
        })()
        .unwrap_or((0, 0))
    }

    pub fn set_fifo_base_addrs(&mut self, tx: u8, rx: u8) -> Result<(), BusError<B::Error>> {
        self.rio.write_byte(regs::FIFO_TX_BASE_ADDR, tx)?;
        self.rio.write_byte(regs::FIFO_RX_BASE_ADDR, rx)?;
        Ok(())
    }

    /// Over-current protection trim, supplemented (SPEC_FULL.md §2): not
    /// named by a typed accessor in spec §4.3, but read by `dump_registers`
    /// and set by the original driver's `SetTxPower` path.
    pub fn set_ocp(&mut self, enabled: bool, trim_ma: u8) -> Result<(), BusError<B::Error>> {
        let raw = if trim_ma <= 120 {
            (trim_ma.saturating_sub(45)) / 5
        } else {
            (trim_ma.saturating_sub(30)) / 10 + 30
        };
        let on = if enabled { 0x20 } else { 0x00 };
        self.rio.write_byte(regs::OCP, on | (raw & 0x1F))
    }

    /// RSSI of the last received packet, in dBm (supplemented, SPEC_FULL.md
    /// §2). Sentinel on bus error: `0`.
    pub fn packet_rssi_dbm(&mut self) -> i32 {
        let raw = self.rio.read_byte(regs::PKT_RSSI_VALUE).unwrap_or(0) as i32;
        if self.low_freq_mode() {
            -164 + raw
        } else {
            -157 + raw
        }
    }

    /// SNR of the last received packet, in dB (supplemented). Sentinel on
    /// bus error: `0.0`.
    pub fn packet_snr_db(&mut self) -> f32 {
        let raw = self.rio.read_byte(regs::PKT_SNR_VALUE).unwrap_or(0) as i8;
        raw as f32 / 4.0
    }

    /// Frequency error of the last received packet, in Hz (supplemented).
    /// Sentinel on bus error: `0`.
    pub fn frequency_error_hz(&mut self) -> i32 {
        (|| -> Result<i32, BusError<B::Error>> {
            let msb = self.rio.read_byte(regs::FREQ_ERROR_MSB)?;
            let mid = self.rio.read_byte(regs::FREQ_ERROR_MID)?;
            let lsb = self.rio.read_byte(regs::FREQ_ERROR_LSB)?;
            let mut raw = ((msb as i32 & 0x7) << 16) | ((mid as i32) << 8) | lsb as i32;
            if msb & 0x8 != 0 {
                raw -= 1 << 19;
            }
            let bw_hz = self.bw_hz();
            Ok((raw as i64 * (1i64 << 24) / regs::F_OSC_HZ as i64 * (bw_hz as i64 / 500_000) / 1_000) as i32)
        })()
        .unwrap_or(0)
    }

    pub fn version(&mut self) -> Result<u8, BusError<B::Error>> {
        self.rio.read_byte(regs::VERSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::MockBus;
    use crate::rio::Rio;

    #[test]
    fn carrier_frequency_round_trips_within_1_mhz() {
        for f in [240i64, 433, 868, 915, 920] {
            let mut rio = Rio::new(MockBus::new());
            let mut high_power = true;
            let mut c = Config::new(&mut rio, &mut high_power);
            c.set_carrier_frequency_mhz(f).unwrap();
            assert!((c.carrier_frequency_mhz() - f).abs() <= 1, "f={}", f);
        }
    }

    #[test]
    fn carrier_frequency_rejects_out_of_range() {
        let mut rio = Rio::new(MockBus::new());
        let mut high_power = true;
        let mut c = Config::new(&mut rio, &mut high_power);
        assert!(c.set_carrier_frequency_mhz(239).is_err());
        assert!(c.set_carrier_frequency_mhz(921).is_err());
        assert!(c.set_carrier_frequency_mhz(240).is_ok());
        assert!(c.set_carrier_frequency_mhz(920).is_ok());
    }

    #[test]
    fn preamble_round_trips_exactly() {
        let mut rio = Rio::new(MockBus::new());
        let mut high_power = true;
        let mut c = Config::new(&mut rio, &mut high_power);
        for p in [0u16, 1, 8, 0x1234, 65535] {
            c.set_preamble_length(p).unwrap();
            assert_eq!(c.preamble_length(), p);
        }
    }

    #[test]
    fn coding_rate_round_trips_and_rejects_out_of_range() {
        let mut rio = Rio::new(MockBus::new());
        let mut high_power = true;
        let mut c = Config::new(&mut rio, &mut high_power);
        for cr in 5u8..=8 {
            c.set_coding_rate(cr).unwrap();
            assert_eq!(c.coding_rate(), cr);
        }
        assert!(c.set_coding_rate(4).is_err());
        assert!(c.set_coding_rate(9).is_err());
    }

    #[test]
    fn spreading_factor_sf6_uses_the_documented_special_case() {
        let mut rio = Rio::new(MockBus::new());
        let mut high_power = true;
        let mut c = Config::new(&mut rio, &mut high_power);

        c.set_spreading_factor(6).unwrap();
        assert_eq!(c.spreading_factor(), 6);
        assert_eq!(c.rio.read_byte(regs::DETECTION_OPTIMIZE).unwrap(), 0x5);
        assert_eq!(c.rio.read_byte(regs::DETECTION_THRESHOLD).unwrap(), 0x0C);

        c.set_spreading_factor(7).unwrap();
        assert_eq!(c.rio.read_byte(regs::DETECTION_OPTIMIZE).unwrap(), 0x3);
        assert_eq!(c.rio.read_byte(regs::DETECTION_THRESHOLD).unwrap(), 0x0A);
    }

    #[test]
    fn spreading_factor_rejects_out_of_range() {
        let mut rio = Rio::new(MockBus::new());
        let mut high_power = true;
        let mut c = Config::new(&mut rio, &mut high_power);
        assert!(c.set_spreading_factor(5).is_err());
        assert!(c.set_spreading_factor(13).is_err());
    }

    #[test]
    fn bandwidth_selects_smallest_canonical_ge_input() {
        let mut rio = Rio::new(MockBus::new());
        let mut high_power = true;
        let mut c = Config::new(&mut rio, &mut high_power);

        c.set_bw_hz(0).unwrap();
        assert_eq!(c.bw_hz(), 7_800);

        c.set_bw_hz(100_000).unwrap();
        assert_eq!(c.bw_hz(), 125_000);

        c.set_bw_hz(300_000).unwrap();
        assert_eq!(c.bw_hz(), 500_000);

        c.set_bw_hz(600_000).unwrap();
        assert_eq!(c.bw_hz(), 500_000);
    }

    #[test]
    fn bandwidth_500khz_low_freq_applies_documented_calibration() {
        let mut rio = Rio::new(MockBus::new());
        let mut high_power = true;
        let mut c = Config::new(&mut rio, &mut high_power);
        c.set_low_freq_mode(true).unwrap();

        c.set_bw_hz(500_000).unwrap();

        assert_eq!(c.rio.read_byte(regs::BW_CALIB_D).unwrap(), 0x7F);
        assert_eq!(c.rio.read_byte(regs::BW_CALIB_C).unwrap(), 0x02);
        assert_eq!(
            c.rio.read_field(BitField::new(regs::DETECTION_OPTIMIZE, 1, 7)).unwrap(),
            1
        );
    }

    #[test]
    fn spreading_factor_does_not_clobber_bandwidths_auto_if_bit() {
        let mut rio = Rio::new(MockBus::new());
        let mut high_power = true;
        let mut c = Config::new(&mut rio, &mut high_power);

        // Construction order (spec §4.5 step 8) applies bandwidth before
        // spreading factor; a >=500kHz bandwidth sets DetectionOptimize
        // bit 7, which the SF write must leave alone.
        c.set_bw_hz(500_000).unwrap();
        c.set_spreading_factor(7).unwrap();

        assert_eq!(
            c.rio.read_field(BitField::new(regs::DETECTION_OPTIMIZE, 1, 7)).unwrap(),
            1,
            "set_spreading_factor must not clear bit 7, owned by set_bw_hz"
        );
        assert_eq!(c.rio.read_field(BitField::new(regs::DETECTION_OPTIMIZE, 3, 0)).unwrap(), 0x3);
    }

    #[test]
    fn tx_power_round_trips_high_power() {
        let mut rio = Rio::new(MockBus::new());
        let mut high_power = true;
        let mut c = Config::new(&mut rio, &mut high_power);
        for pow in 5i8..=23 {
            c.set_tx_power(pow).unwrap();
            assert_eq!(c.tx_power(), pow, "pow={}", pow);
        }
    }

    #[test]
    fn tx_power_22_high_power_matches_documented_example() {
        let mut rio = Rio::new(MockBus::new());
        let mut high_power = true;
        let mut c = Config::new(&mut rio, &mut high_power);
        c.set_tx_power(22).unwrap();
        assert_eq!(c.rio.read_byte(regs::PA_DAC).unwrap(), 0x07);
        assert_eq!(c.rio.read_field(BitField::new(regs::PA_CONFIG, 4, 0)).unwrap(), 14);
    }

    #[test]
    fn tx_power_round_trips_standard_power() {
        let mut rio = Rio::new(MockBus::new());
        let mut high_power = false;
        let mut c = Config::new(&mut rio, &mut high_power);
        for pow in 0i8..=14 {
            c.set_tx_power(pow).unwrap();
            assert_eq!(c.tx_power(), pow, "pow={}", pow);
        }
    }

    #[test]
    fn tx_power_rejects_out_of_range() {
        let mut rio = Rio::new(MockBus::new());
        let mut high_power = true;
        let mut c = Config::new(&mut rio, &mut high_power);
        assert!(c.set_tx_power(24).is_err());

        let mut rio2 = Rio::new(MockBus::new());
        let mut high_power2 = false;
        let mut c2 = Config::new(&mut rio2, &mut high_power2);
        assert!(c2.set_tx_power(15).is_err());
    }
}
