//! Suzy's multiply/divide unit.
//!
//! Operands live in 16-bit pairs (`AB`, `CD`, `NP`) and 32-bit quads (`EFGH`,
//! `JKLM`). Writing `MATHA` runs a multiply, writing `MATHE` runs a divide;
//! both finish before the write returns.
//!
//! Signed mode reproduces the chip's sign-magnitude defect: a value is
//! negative when `value - 1` has its top bit set, and is negated with
//! `!value + 1`. So `0x8000` is positive and `0x0000` is negative.

use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

use super::registers::*;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MathUnit {
    pub ab: u16,
    pub cd: u16,
    pub np: u16,
    pub efgh: u32,
    pub jklm: u32,
    pub signed: bool,
    pub accumulate: bool,
    pub overflow: bool,
    pub carry: bool,
}

fn sign_magnitude16(raw: u16) -> (bool, u16) {
    if raw.wrapping_sub(1) & 0x8000 != 0 {
        (true, (!raw).wrapping_add(1))
    } else {
        (false, raw)
    }
}

fn sign_magnitude32(raw: u32) -> (bool, u32) {
    if raw.wrapping_sub(1) & 0x8000_0000 != 0 {
        (true, (!raw).wrapping_add(1))
    } else {
        (false, raw)
    }
}

fn set_byte16(word: &mut u16, index: u32, val: u8) {
    let shift = index * 8;
    *word = (*word & !(0xFF << shift)) | ((val as u16) << shift);
}

fn set_byte32(quad: &mut u32, index: u32, val: u8) {
    let shift = index * 8;
    *quad = (*quad & !(0xFF << shift)) | ((val as u32) << shift);
}

impl MathUnit {
    pub fn new() -> Self {
        Self::default()
    }

    /// `AB * CD -> EFGH`, optionally accumulated into `JKLM`.
    pub fn multiply(&mut self) {
        let product = if self.signed {
            let (neg_a, mag_a) = sign_magnitude16(self.ab);
            let (neg_c, mag_c) = sign_magnitude16(self.cd);
            let magnitude = mag_a as u32 * mag_c as u32;
            if neg_a != neg_c {
                magnitude.wrapping_neg()
            } else {
                magnitude
            }
        } else {
            self.ab as u32 * self.cd as u32
        };
        self.efgh = product;

        // Flags are replaced on every operation, never merged.
        self.overflow = false;
        self.carry = false;
        if self.accumulate {
            let sum = self.jklm as u64 + product as u64;
            if sum > u32::MAX as u64 {
                self.overflow = true;
                self.carry = true;
            }
            self.jklm = sum as u32;
        }

        log(LogCategory::Math, LogLevel::Trace, || {
            format!(
                "multiply {:04X} * {:04X} = {:08X} (signed={}, jklm={:08X})",
                self.ab, self.cd, self.efgh, self.signed, self.jklm
            )
        });
    }

    /// `EFGH / NP`: quotient to `AB:CD`, remainder to `JKLM`.
    pub fn divide(&mut self) {
        self.overflow = false;
        self.carry = false;

        if self.np == 0 {
            self.ab = 0;
            self.cd = 0;
            self.jklm = 0;
            self.overflow = true;
            log(LogCategory::Math, LogLevel::Trace, || {
                format!("divide {:08X} by zero", self.efgh)
            });
            return;
        }

        let (quotient, remainder) = if self.signed {
            let (neg_e, mag_e) = sign_magnitude32(self.efgh);
            let (neg_n, mag_n) = sign_magnitude16(self.np);
            // A zero magnitude is only reachable for np == 0, handled above.
            let divisor = (mag_n as u32).max(1);
            let q = mag_e / divisor;
            let r = mag_e % divisor;
            (if neg_e != neg_n { q.wrapping_neg() } else { q }, r)
        } else {
            let divisor = self.np as u32;
            (self.efgh / divisor, self.efgh % divisor)
        };

        self.ab = (quotient >> 16) as u16;
        self.cd = quotient as u16;
        self.jklm = remainder;

        log(LogCategory::Math, LogLevel::Trace, || {
            format!(
                "divide {:08X} / {:04X} = {:08X} r {:08X} (signed={})",
                self.efgh, self.np, quotient, remainder, self.signed
            )
        });
    }

    pub fn quotient(&self) -> u32 {
        ((self.ab as u32) << 16) | self.cd as u32
    }

    /// Read a byte of the math window. Reserved offsets float high.
    pub fn read(&self, reg: u8) -> u8 {
        match reg {
            MATHD => self.cd as u8,
            MATHC => (self.cd >> 8) as u8,
            MATHB => self.ab as u8,
            MATHA => (self.ab >> 8) as u8,
            MATHP => self.np as u8,
            MATHN => (self.np >> 8) as u8,
            MATHH => self.efgh as u8,
            MATHG => (self.efgh >> 8) as u8,
            MATHF => (self.efgh >> 16) as u8,
            MATHE => (self.efgh >> 24) as u8,
            MATHM => self.jklm as u8,
            MATHL => (self.jklm >> 8) as u8,
            MATHK => (self.jklm >> 16) as u8,
            MATHJ => (self.jklm >> 24) as u8,
            _ => 0xFF,
        }
    }

    /// Write a byte of the math window. Low-byte writes clear the byte
    /// above them; `MATHA` and `MATHE` start an operation.
    pub fn write(&mut self, reg: u8, val: u8) {
        match reg {
            MATHD => self.cd = val as u16,
            MATHC => set_byte16(&mut self.cd, 1, val),
            MATHB => self.ab = val as u16,
            MATHA => {
                set_byte16(&mut self.ab, 1, val);
                self.multiply();
            }
            MATHP => self.np = val as u16,
            MATHN => set_byte16(&mut self.np, 1, val),
            MATHH => {
                set_byte32(&mut self.efgh, 0, val);
                set_byte32(&mut self.efgh, 1, 0);
            }
            MATHG => set_byte32(&mut self.efgh, 1, val),
            MATHF => {
                set_byte32(&mut self.efgh, 2, val);
                set_byte32(&mut self.efgh, 3, 0);
            }
            MATHE => {
                set_byte32(&mut self.efgh, 3, val);
                self.divide();
            }
            MATHM => {
                set_byte32(&mut self.jklm, 0, val);
                set_byte32(&mut self.jklm, 1, 0);
            }
            MATHL => set_byte32(&mut self.jklm, 1, val),
            MATHK => {
                set_byte32(&mut self.jklm, 2, val);
                set_byte32(&mut self.jklm, 3, 0);
            }
            MATHJ => set_byte32(&mut self.jklm, 3, val),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_operands(m: &mut MathUnit, ab: u16, cd: u16) {
        m.write(MATHD, cd as u8);
        m.write(MATHC, (cd >> 8) as u8);
        m.write(MATHB, ab as u8);
        m.write(MATHA, (ab >> 8) as u8);
    }

    fn load_dividend(m: &mut MathUnit, efgh: u32, np: u16) {
        m.write(MATHP, np as u8);
        m.write(MATHN, (np >> 8) as u8);
        m.write(MATHH, efgh as u8);
        m.write(MATHG, (efgh >> 8) as u8);
        m.write(MATHF, (efgh >> 16) as u8);
        m.write(MATHE, (efgh >> 24) as u8);
    }

    fn result(m: &MathUnit) -> u32 {
        u32::from_le_bytes([
            m.read(MATHH),
            m.read(MATHG),
            m.read(MATHF),
            m.read(MATHE),
        ])
    }

    #[test]
    fn unsigned_multiply_matches_native() {
        let mut m = MathUnit::new();
        for &(a, b) in &[
            (0u16, 0u16),
            (1, 0xFFFF),
            (0xFFFF, 0xFFFF),
            (0x1234, 0x5678),
            (0x8000, 2),
            (300, 7),
        ] {
            load_operands(&mut m, a, b);
            assert_eq!(result(&m), a as u32 * b as u32, "{a:04X} * {b:04X}");
            assert!(!m.overflow);
        }
    }

    #[test]
    fn signed_multiply_treats_0x8000_as_positive() {
        let mut m = MathUnit::new();
        m.signed = true;
        load_operands(&mut m, 0x8000, 0x8000);
        assert_eq!(m.efgh, 0x8000u32 * 0x8000u32);
        assert_eq!(m.efgh, 0x4000_0000);
    }

    #[test]
    fn signed_multiply_treats_zero_as_negative() {
        assert_eq!(sign_magnitude16(0x0000), (true, 0x0000));
        assert_eq!(sign_magnitude16(0x8000), (false, 0x8000));
        assert_eq!(sign_magnitude16(0xFFFF), (true, 0x0001));

        let mut m = MathUnit::new();
        m.signed = true;
        load_operands(&mut m, 0x0000, 0x0001);
        // Zero is "negative", one is positive: the zero product is negated.
        assert_eq!(m.efgh, 0u32.wrapping_neg());
        assert_eq!(m.efgh, 0);
    }

    #[test]
    fn signed_multiply_negates_mixed_signs() {
        let mut m = MathUnit::new();
        m.signed = true;
        load_operands(&mut m, (-3i16) as u16, 5);
        assert_eq!(m.efgh as i32, -15);
        load_operands(&mut m, (-3i16) as u16, (-5i16) as u16);
        assert_eq!(m.efgh, 15);
    }

    #[test]
    fn accumulate_sets_and_replaces_flags() {
        let mut m = MathUnit::new();
        m.accumulate = true;
        m.jklm = 0xFFFF_FFF0;
        load_operands(&mut m, 0x10, 0x2);
        assert_eq!(m.jklm, 0x0000_0010);
        assert!(m.overflow);
        assert!(m.carry);

        // Next operation without overflow clears both flags.
        load_operands(&mut m, 1, 1);
        assert_eq!(m.jklm, 0x11);
        assert!(!m.overflow);
        assert!(!m.carry);
    }

    #[test]
    fn divide_by_zero_yields_zero_results() {
        let mut m = MathUnit::new();
        for &dividend in &[0u32, 1, 0xDEAD_BEEF, u32::MAX] {
            m.jklm = 0x1234;
            load_dividend(&mut m, dividend, 0);
            assert_eq!(m.quotient(), 0);
            assert_eq!(m.jklm, 0);
            assert!(m.overflow);
        }
    }

    #[test]
    fn unsigned_divide_splits_quotient_and_remainder() {
        let mut m = MathUnit::new();
        load_dividend(&mut m, 100_003, 10);
        assert_eq!(m.quotient(), 10_000);
        assert_eq!(m.read(MATHA), 0x00);
        assert_eq!(m.read(MATHD), (10_000u32 & 0xFF) as u8);
        assert_eq!(m.jklm, 3);
        assert!(!m.overflow);
    }

    #[test]
    fn signed_divide_keeps_remainder_positive() {
        let mut m = MathUnit::new();
        m.signed = true;
        load_dividend(&mut m, (-7i32) as u32, 2);
        assert_eq!(m.quotient() as i32, -3);
        assert_eq!(m.jklm, 1);
    }

    #[test]
    fn low_byte_writes_clear_high_byte() {
        let mut m = MathUnit::new();
        m.write(MATHC, 0xAA);
        m.write(MATHD, 0x11);
        assert_eq!(m.cd, 0x0011);

        m.efgh = 0xFFFF_FFFF;
        m.write(MATHH, 0x22);
        assert_eq!(m.efgh, 0xFFFF_0022);
        m.write(MATHF, 0x33);
        assert_eq!(m.efgh, 0x0033_0022);

        m.jklm = 0xFFFF_FFFF;
        m.write(MATHK, 0x44);
        assert_eq!(m.jklm, 0x0044_FFFF);
    }

    #[test]
    fn reserved_window_reads_high() {
        let m = MathUnit::new();
        assert_eq!(m.read(0x6E), 0xFF);
        assert_eq!(m.read(0x73), 0xFF);
    }
}
