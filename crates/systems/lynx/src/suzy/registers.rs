//! Suzy register offsets (relative to the `0xFC00` page) and bit layouts.

// Collision depository: two nibble-wide slots per byte.
pub const COLLISION_LOW: std::ops::RangeInclusive<u8> = 0x00..=0x03;
pub const COLLISION_HIGH: std::ops::RangeInclusive<u8> = 0x0C..=0x0F;

pub const HOFFL: u8 = 0x04;
pub const HOFFH: u8 = 0x05;
pub const VOFFL: u8 = 0x06;
pub const VOFFH: u8 = 0x07;
pub const VIDBASL: u8 = 0x08;
pub const VIDBASH: u8 = 0x09;
pub const COLLOFFL: u8 = 0x0A;
pub const COLLOFFH: u8 = 0x0B;

pub const SCBNEXTL: u8 = 0x10;
pub const SCBNEXTH: u8 = 0x11;

// Math unit. Pairs are listed low byte first.
pub const MATHD: u8 = 0x60;
pub const MATHC: u8 = 0x61;
pub const MATHB: u8 = 0x62;
pub const MATHA: u8 = 0x63;
pub const MATHP: u8 = 0x64;
pub const MATHN: u8 = 0x65;
pub const MATHH: u8 = 0x66;
pub const MATHG: u8 = 0x67;
pub const MATHF: u8 = 0x68;
pub const MATHE: u8 = 0x69;
pub const MATHM: u8 = 0x6A;
pub const MATHL: u8 = 0x6B;
pub const MATHK: u8 = 0x6C;
pub const MATHJ: u8 = 0x6D;
pub const MATH_WINDOW: std::ops::RangeInclusive<u8> = 0x60..=0x73;

pub const SPRCTL0: u8 = 0x80;
pub const SPRCTL1: u8 = 0x81;
pub const SPRCOLL: u8 = 0x82;
pub const SPRINIT: u8 = 0x83;
pub const SUZYHREV: u8 = 0x88;
pub const SUZYBUSEN: u8 = 0x90;
pub const SPRGO: u8 = 0x91;
pub const SPRSYS: u8 = 0x92;
pub const JOYSTICK: u8 = 0xB0;
pub const SWITCHES: u8 = 0xB1;
pub const RCART0: u8 = 0xB2;
pub const RCART1: u8 = 0xB3;

pub const HARDWARE_REVISION: u8 = 0x01;

// SPRCTL0
pub const SPRCTL0_TYPE: u8 = 0x07;
pub const SPRCTL0_VFLIP: u8 = 0x10;
pub const SPRCTL0_HFLIP: u8 = 0x20;
pub const SPRCTL0_BPP: u8 = 0xC0;

// SPRCTL1
pub const SPRCTL1_START_LEFT: u8 = 0x01;
pub const SPRCTL1_START_UP: u8 = 0x02;
pub const SPRCTL1_SKIP: u8 = 0x04;
/// Set: keep the current pen map. Clear: reload it from the descriptor.
pub const SPRCTL1_REUSE_PALETTE: u8 = 0x08;
pub const SPRCTL1_RELOAD_DEPTH: u8 = 0x30;
pub const SPRCTL1_LITERAL: u8 = 0x80;

// SPRCOLL
pub const SPRCOLL_NUMBER: u8 = 0x0F;
pub const SPRCOLL_DONT_COLLIDE: u8 = 0x20;

// SPRGO
pub const SPRGO_START: u8 = 0x01;
pub const SPRGO_EVERON: u8 = 0x04;

// SPRSYS, write side
pub const SPRSYS_SIGNED_MATH: u8 = 0x80;
pub const SPRSYS_ACCUMULATE: u8 = 0x40;
pub const SPRSYS_NO_COLLIDE: u8 = 0x20;
pub const SPRSYS_VSTRETCH: u8 = 0x10;
pub const SPRSYS_LEFT_HANDED: u8 = 0x08;
pub const SPRSYS_CLEAR_COLLISION: u8 = 0x04;
pub const SPRSYS_STOP_ON_CURRENT: u8 = 0x02;

// SPRSYS, read side
pub const SPRSYS_MATH_WORKING: u8 = 0x80;
pub const SPRSYS_MATH_OVERFLOW: u8 = 0x40;
pub const SPRSYS_MATH_CARRY: u8 = 0x20;
pub const SPRSYS_SPRITE_COLLISION: u8 = 0x04;
pub const SPRSYS_SPRITE_WORKING: u8 = 0x01;

// JOYSTICK
pub const JOY_UP: u8 = 0x80;
pub const JOY_DOWN: u8 = 0x40;
pub const JOY_LEFT: u8 = 0x20;
pub const JOY_RIGHT: u8 = 0x10;

pub const SCREEN_WIDTH: i32 = 160;
pub const SCREEN_HEIGHT: i32 = 102;
pub const LINE_BYTES: u16 = 80;

/// Initial value of the size accumulators for positively drawn quadrants.
pub const SIZE_ACCUM_OFFSET: u16 = 0x007F;

/// Map a depository register to the pair of slots it exposes.
pub fn collision_pair(offset: u8) -> Option<usize> {
    if COLLISION_LOW.contains(&offset) {
        Some(offset as usize * 2)
    } else if COLLISION_HIGH.contains(&offset) {
        Some((offset as usize - 0x0C + 4) * 2)
    } else {
        None
    }
}
