//! Pixel compositing and the collision buffer.

use serde::{Deserialize, Serialize};

use super::ports::CountingMemory;
use super::registers::{LINE_BYTES, SCREEN_HEIGHT, SCREEN_WIDTH};

/// How a sprite's pixels combine with what is already in the frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelClass {
    Normal,
    /// Only fills transparent pixels; never collides.
    Background,
    NonCollidable,
    /// XORs the pen into the existing nibble.
    Shadow,
}

impl PixelClass {
    pub fn collides(self) -> bool {
        matches!(self, Self::Normal | Self::Shadow)
    }
}

/// Sixteen collision slots plus the sticky sprite-to-sprite flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionBuffer {
    slots: [u8; 16],
    sprite_collision: bool,
}

impl CollisionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: usize) -> u8 {
        self.slots[slot & 0x0F]
    }

    pub fn set(&mut self, slot: usize, value: u8) {
        self.slots[slot & 0x0F] = value;
    }

    pub fn slots(&self) -> &[u8; 16] {
        &self.slots
    }

    /// Depository byte exposing `first` (low nibble) and `first + 1`.
    pub fn read_pair(&self, first: usize) -> u8 {
        (self.get(first) & 0x0F) | ((self.get(first + 1) & 0x0F) << 4)
    }

    pub fn write_pair(&mut self, first: usize, value: u8) {
        self.set(first, value & 0x0F);
        self.set(first + 1, value >> 4);
    }

    pub fn sprite_collision(&self) -> bool {
        self.sprite_collision
    }

    pub fn clear_sticky(&mut self) {
        self.sprite_collision = false;
    }

    /// Mutual update after sprite `number` drew over a pixel holding
    /// `existing`.
    pub fn record(&mut self, number: u8, existing: u8) {
        let number = number & 0x0F;
        let existing = existing & 0x0F;
        if number == 0 {
            return;
        }
        if existing > self.slots[number as usize] {
            self.slots[number as usize] = existing;
            self.sprite_collision = true;
        }
        if existing != 0 && number > self.slots[existing as usize] {
            self.slots[existing as usize] = number;
            self.sprite_collision = true;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelOutcome {
    Clipped,
    Transparent,
    /// Background pixel over a non-zero nibble.
    Blocked,
    Drawn,
}

/// Writes one sprite's pixels into the packed 4bpp frame buffer.
#[derive(Debug, Clone, Copy)]
pub struct PixelWriter {
    pub video_base: u16,
    pub class: PixelClass,
    /// Collision number, or `None` when the sprite does not collide.
    pub collision: Option<u8>,
}

impl PixelWriter {
    pub fn write(
        &self,
        mem: &mut CountingMemory<'_>,
        buffer: &mut CollisionBuffer,
        x: i32,
        y: i32,
        pen: u8,
    ) -> PixelOutcome {
        if !(0..SCREEN_WIDTH).contains(&x) || !(0..SCREEN_HEIGHT).contains(&y) {
            return PixelOutcome::Clipped;
        }
        let pen = pen & 0x0F;
        if pen == 0 {
            return PixelOutcome::Transparent;
        }

        let addr = self
            .video_base
            .wrapping_add(y as u16 * LINE_BYTES)
            .wrapping_add(x as u16 / 2);
        let high = x & 1 == 0;
        let byte = mem.read(addr);
        let existing = if high { byte >> 4 } else { byte & 0x0F };

        let value = match self.class {
            PixelClass::Background if existing != 0 => return PixelOutcome::Blocked,
            PixelClass::Shadow => existing ^ pen,
            _ => pen,
        };
        let merged = if high {
            (byte & 0x0F) | (value << 4)
        } else {
            (byte & 0xF0) | value
        };
        mem.write(addr, merged);

        if let Some(number) = self.collision.filter(|_| self.class.collides()) {
            buffer.record(number, existing);
        }
        PixelOutcome::Drawn
    }
}
