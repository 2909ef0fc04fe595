//! Sprite control block (SCB) parsing.

use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

use super::collision::PixelClass;
use super::ports::CountingMemory;
use super::registers::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteType {
    BackgroundShadow,
    Background,
    BoundaryShadow,
    Boundary,
    Normal,
    NonCollidable,
    XorShadow,
    Shadow,
}

impl SpriteType {
    pub fn from_bits(bits: u8) -> Self {
        match bits & SPRCTL0_TYPE {
            0 => Self::BackgroundShadow,
            1 => Self::Background,
            2 => Self::BoundaryShadow,
            3 => Self::Boundary,
            4 => Self::Normal,
            5 => Self::NonCollidable,
            6 => Self::XorShadow,
            _ => Self::Shadow,
        }
    }

    pub fn pixel_class(self) -> PixelClass {
        match self {
            Self::BackgroundShadow | Self::Background => PixelClass::Background,
            Self::Boundary | Self::Normal => PixelClass::Normal,
            Self::NonCollidable => PixelClass::NonCollidable,
            Self::BoundaryShadow | Self::XorShadow | Self::Shadow => PixelClass::Shadow,
        }
    }
}

/// How many of the optional size/stretch/tilt fields this SCB carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReloadDepth {
    None,
    Size,
    SizeStretch,
    SizeStretchTilt,
}

impl ReloadDepth {
    fn from_bits(ctl1: u8) -> Self {
        match (ctl1 & SPRCTL1_RELOAD_DEPTH) >> 4 {
            0 => Self::None,
            1 => Self::Size,
            2 => Self::SizeStretch,
            _ => Self::SizeStretchTilt,
        }
    }

    pub fn has_size(self) -> bool {
        self >= Self::Size
    }

    pub fn has_stretch(self) -> bool {
        self >= Self::SizeStretch
    }

    pub fn has_tilt(self) -> bool {
        self == Self::SizeStretchTilt
    }
}

/// Decoded `SPRCTL0`, `SPRCTL1` and `SPRCOLL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteControl {
    pub sprite_type: SpriteType,
    pub bpp: u8,
    pub hflip: bool,
    pub vflip: bool,
    pub start_left: bool,
    pub start_up: bool,
    pub skip: bool,
    pub reload_palette: bool,
    pub depth: ReloadDepth,
    pub literal: bool,
    pub collision_number: u8,
    pub dont_collide: bool,
}

impl SpriteControl {
    pub fn decode(ctl0: u8, ctl1: u8, coll: u8) -> Self {
        Self {
            sprite_type: SpriteType::from_bits(ctl0),
            bpp: ((ctl0 & SPRCTL0_BPP) >> 6) + 1,
            hflip: ctl0 & SPRCTL0_HFLIP != 0,
            vflip: ctl0 & SPRCTL0_VFLIP != 0,
            start_left: ctl1 & SPRCTL1_START_LEFT != 0,
            start_up: ctl1 & SPRCTL1_START_UP != 0,
            skip: ctl1 & SPRCTL1_SKIP != 0,
            reload_palette: ctl1 & SPRCTL1_REUSE_PALETTE == 0,
            depth: ReloadDepth::from_bits(ctl1),
            literal: ctl1 & SPRCTL1_LITERAL != 0,
            collision_number: coll & SPRCOLL_NUMBER,
            dont_collide: coll & SPRCOLL_DONT_COLLIDE != 0,
        }
    }

    /// Quadrant the sprite is drawn from first (0 = down-right, counting
    /// anticlockwise).
    pub fn start_quadrant(&self) -> usize {
        match (self.start_left, self.start_up) {
            (false, false) => 0,
            (false, true) => 1,
            (true, true) => 2,
            (true, false) => 3,
        }
    }
}

/// Descriptor fields latched by the hardware and inherited by later SCBs
/// whose reload depth leaves them out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpriteLatches {
    pub hpos: u16,
    pub vpos: u16,
    pub hsize: u16,
    pub vsize: u16,
    pub stretch: u16,
    pub tilt: u16,
    pub palette: [u8; 16],
}

impl Default for SpriteLatches {
    fn default() -> Self {
        Self {
            hpos: 0,
            vpos: 0,
            hsize: 0x0100,
            vsize: 0x0100,
            stretch: 0,
            tilt: 0,
            palette: std::array::from_fn(|i| i as u8),
        }
    }
}

/// The per-sprite part of an SCB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpriteDescriptor {
    pub address: u16,
    pub ctl0: u8,
    pub ctl1: u8,
    pub coll: u8,
    pub control: SpriteControl,
    pub next: u16,
    /// Pixel data pointer; zero for skipped sprites, which stop reading
    /// after the link.
    pub data: u16,
}

fn take_word(mem: &mut CountingMemory<'_>, offset: &mut u16) -> u16 {
    let value = mem.read_u16(*offset);
    *offset = offset.wrapping_add(2);
    value
}

/// Read the SCB at `address`, updating the persistent latches it reloads.
pub fn read_descriptor(
    mem: &mut CountingMemory<'_>,
    address: u16,
    latches: &mut SpriteLatches,
) -> SpriteDescriptor {
    let ctl0 = mem.read(address);
    let ctl1 = mem.read(address.wrapping_add(1));
    let coll = mem.read(address.wrapping_add(2));
    let next = mem.read_u16(address.wrapping_add(3));
    let control = SpriteControl::decode(ctl0, ctl1, coll);

    let mut desc = SpriteDescriptor {
        address,
        ctl0,
        ctl1,
        coll,
        control,
        next,
        data: 0,
    };
    if control.skip {
        log(LogCategory::Sprites, LogLevel::Trace, || {
            format!("SCB {:04X} skipped", address)
        });
        return desc;
    }

    desc.data = mem.read_u16(address.wrapping_add(5));
    latches.hpos = mem.read_u16(address.wrapping_add(7));
    latches.vpos = mem.read_u16(address.wrapping_add(9));

    let mut offset = address.wrapping_add(11);
    if control.depth.has_size() {
        latches.hsize = take_word(mem, &mut offset);
        latches.vsize = take_word(mem, &mut offset);
    }
    if control.depth.has_stretch() {
        latches.stretch = take_word(mem, &mut offset);
    }
    if control.depth.has_tilt() {
        latches.tilt = take_word(mem, &mut offset);
    }

    if control.reload_palette {
        for pair in 0..8u16 {
            let byte = mem.read(offset.wrapping_add(pair));
            latches.palette[pair as usize * 2] = byte >> 4;
            latches.palette[pair as usize * 2 + 1] = byte & 0x0F;
        }
    }

    log(LogCategory::Sprites, LogLevel::Trace, || {
        format!(
            "SCB {:04X}: {:?} {}bpp pos=({},{}) size={:04X}x{:04X} data={:04X} next={:04X}",
            address,
            control.sprite_type,
            control.bpp,
            latches.hpos as i16,
            latches.vpos as i16,
            latches.hsize,
            latches.vsize,
            desc.data,
            next
        )
    });
    desc
}
