//! Per-line pixel stream decoding.
//!
//! A sprite line is a run of bytes read MSB first. Literal lines are plain
//! `bpp`-wide indices; packed lines are a sequence of packets, each a 1-bit
//! kind flag and a 4-bit count (biased by one).

/// MSB-first bit cursor over one line's bytes. Reads past the end return 0
/// and consume nothing.
pub struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    shifter: u32,
    available: u32,
    bits_left: u32,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            shifter: 0,
            available: 0,
            bits_left: (data.len() as u32).saturating_mul(8),
        }
    }

    pub fn bits_left(&self) -> u32 {
        self.bits_left
    }

    pub fn read(&mut self, bits: u32) -> u8 {
        if bits == 0 || bits > self.bits_left {
            return 0;
        }
        while self.available < bits {
            let byte = self.data.get(self.pos).copied().unwrap_or(0);
            self.pos += 1;
            self.shifter = (self.shifter << 8) | byte as u32;
            self.available += 8;
        }
        self.available -= bits;
        self.bits_left -= bits;
        let value = (self.shifter >> self.available) & ((1 << bits) - 1);
        self.shifter &= (1 << self.available) - 1;
        value as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Packet {
    None,
    Literal { remaining: u32 },
    Repeat { pixel: u8, remaining: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Literal { remaining: u32 },
    Packed(Packet),
    Finished,
}

/// Yields raw (pre-palette) pixel indices for one sprite line.
pub struct LineDecoder<'a> {
    bits: BitReader<'a>,
    bpp: u32,
    mode: Mode,
}

impl<'a> LineDecoder<'a> {
    pub fn new(data: &'a [u8], bpp: u8, literal: bool) -> Self {
        let bpp = bpp.clamp(1, 4) as u32;
        let bits = BitReader::new(data);
        let mode = if literal {
            Mode::Literal {
                remaining: bits.bits_left() / bpp,
            }
        } else {
            Mode::Packed(Packet::None)
        };
        Self { bits, bpp, mode }
    }

    fn next_literal(&mut self, remaining: u32) -> Option<u8> {
        if remaining == 0 {
            self.mode = Mode::Finished;
            return None;
        }
        let pixel = self.bits.read(self.bpp);
        let remaining = remaining - 1;
        if remaining == 0 && pixel == 0 {
            // Trailing zero pads the line out to a byte boundary.
            self.mode = Mode::Finished;
            return None;
        }
        self.mode = Mode::Literal { remaining };
        Some(pixel)
    }

    fn next_packed(&mut self, packet: Packet) -> Option<u8> {
        match packet {
            Packet::Literal { remaining } if remaining > 0 => {
                self.mode = Mode::Packed(Packet::Literal {
                    remaining: remaining - 1,
                });
                Some(self.bits.read(self.bpp))
            }
            Packet::Repeat { pixel, remaining } if remaining > 0 => {
                self.mode = Mode::Packed(Packet::Repeat {
                    pixel,
                    remaining: remaining - 1,
                });
                Some(pixel)
            }
            _ => {
                let literal = self.bits.read(1) != 0;
                let count = self.bits.read(4) as u32;
                if literal {
                    self.mode = Mode::Packed(Packet::Literal { remaining: count + 1 });
                } else if count == 0 {
                    self.mode = Mode::Finished;
                    return None;
                } else {
                    let pixel = self.bits.read(self.bpp);
                    self.mode = Mode::Packed(Packet::Repeat {
                        pixel,
                        remaining: count + 1,
                    });
                }
                self.next()
            }
        }
    }
}

impl Iterator for LineDecoder<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        match self.mode {
            Mode::Finished => None,
            Mode::Literal { remaining } => self.next_literal(remaining),
            Mode::Packed(packet) => self.next_packed(packet),
        }
    }
}
