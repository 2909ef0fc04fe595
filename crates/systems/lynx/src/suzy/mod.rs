//! Suzy: the Lynx sprite engine and math coprocessor.
//!
//! Suzy occupies the `0xFC00` page. Most of it is a plain register file;
//! two writes have side effects that run to completion before returning:
//!
//! - `SPRGO` with bit 0 set walks the sprite chain (see [`chain`]), drawing
//!   into RAM and stalling the CPU for every byte it touched.
//! - `MATHA` / `MATHE` run a multiply / divide (see [`math`]).
//!
//! RAM, the CPU stall sink and the cartridge port are borrowed per access
//! through a [`SuzyBus`]; Suzy keeps no handles to them.

pub mod chain;
pub mod collision;
pub mod decoder;
pub mod math;
pub mod ports;
pub mod registers;
pub mod renderer;
pub mod scb;

use emu_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::LynxError;
use chain::RunStats;
use collision::CollisionBuffer;
use math::MathUnit;
use ports::SuzyBus;
use registers::*;
use scb::SpriteLatches;

pub const SAVE_STATE_VERSION: u64 = 1;

/// Host-side tuning for the sprite engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuzyConfig {
    /// Maximum SCBs visited per run. `None` walks the chain like the
    /// hardware does, which never returns on a cyclic chain.
    pub sprite_limit: Option<u32>,
}

impl Default for SuzyConfig {
    fn default() -> Self {
        Self {
            sprite_limit: Some(256),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suzy {
    #[serde(skip)]
    config: SuzyConfig,

    hoff: u16,
    voff: u16,
    video_base: u16,
    collision_offset: u16,
    scb_next: u16,

    sprctl0: u8,
    sprctl1: u8,
    sprcoll: u8,
    sprinit: u8,

    bus_enabled: bool,
    sprite_go: bool,
    everon: bool,
    no_collide: bool,
    vstretch: bool,
    lefthand: bool,
    stop_requested: bool,
    working: bool,

    math: MathUnit,
    collisions: CollisionBuffer,
    latches: SpriteLatches,

    joystick: u8,
    switches: u8,

    #[serde(skip)]
    last_run: Option<RunStats>,
}

impl Default for Suzy {
    fn default() -> Self {
        Self::new()
    }
}

fn set_low(word: &mut u16, val: u8) {
    *word = (*word & 0xFF00) | val as u16;
}

fn set_high(word: &mut u16, val: u8) {
    *word = (*word & 0x00FF) | ((val as u16) << 8);
}

impl Suzy {
    pub fn new() -> Self {
        Self::with_config(SuzyConfig::default())
    }

    pub fn with_config(config: SuzyConfig) -> Self {
        Self {
            config,
            hoff: 0,
            voff: 0,
            video_base: 0,
            collision_offset: 0,
            scb_next: 0,
            sprctl0: 0,
            sprctl1: 0,
            sprcoll: 0,
            sprinit: 0,
            bus_enabled: false,
            sprite_go: false,
            everon: false,
            no_collide: false,
            vstretch: false,
            lefthand: false,
            stop_requested: false,
            working: false,
            math: MathUnit::new(),
            collisions: CollisionBuffer::new(),
            latches: SpriteLatches::default(),
            joystick: 0,
            switches: 0,
            last_run: None,
        }
    }

    /// Power-on state. The configuration and input latches survive.
    pub fn reset(&mut self) {
        let (config, joystick, switches) = (self.config, self.joystick, self.switches);
        *self = Self::with_config(config);
        self.joystick = joystick;
        self.switches = switches;
    }

    pub fn config(&self) -> &SuzyConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: SuzyConfig) {
        self.config = config;
    }

    pub fn math(&self) -> &MathUnit {
        &self.math
    }

    pub fn collisions(&self) -> &CollisionBuffer {
        &self.collisions
    }

    pub fn latches(&self) -> &SpriteLatches {
        &self.latches
    }

    pub fn video_base(&self) -> u16 {
        self.video_base
    }

    pub fn is_working(&self) -> bool {
        self.working
    }

    /// Statistics of the most recent sprite run.
    pub fn last_run(&self) -> Option<RunStats> {
        self.last_run
    }

    /// Latch the button state: b7 up, b6 down, b5 left, b4 right, b3..b0
    /// option 1, option 2, inside, outside.
    pub fn set_joystick(&mut self, value: u8) {
        self.joystick = value;
    }

    pub fn set_switches(&mut self, value: u8) {
        self.switches = value;
    }

    fn sprsys_status(&self) -> u8 {
        let mut status = 0;
        // Math is instantaneous, so SPRSYS_MATH_WORKING never reads set.
        if self.math.overflow {
            status |= SPRSYS_MATH_OVERFLOW;
        }
        if self.math.carry {
            status |= SPRSYS_MATH_CARRY;
        }
        if self.vstretch {
            status |= SPRSYS_VSTRETCH;
        }
        if self.lefthand {
            status |= SPRSYS_LEFT_HANDED;
        }
        if self.collisions.sprite_collision() {
            status |= SPRSYS_SPRITE_COLLISION;
        }
        if self.stop_requested {
            status |= SPRSYS_STOP_ON_CURRENT;
        }
        if self.working {
            status |= SPRSYS_SPRITE_WORKING;
        }
        status
    }

    fn joystick_value(&self) -> u8 {
        if self.lefthand {
            return self.joystick;
        }
        let mut value = self.joystick & 0x0F;
        let swap = [
            (JOY_UP, JOY_DOWN),
            (JOY_DOWN, JOY_UP),
            (JOY_LEFT, JOY_RIGHT),
            (JOY_RIGHT, JOY_LEFT),
        ];
        for (from, to) in swap {
            if self.joystick & from != 0 {
                value |= to;
            }
        }
        value
    }

    /// Read the register at `offset` within the Suzy page.
    pub fn read(&mut self, offset: u8, bus: &mut SuzyBus<'_>) -> u8 {
        if let Some(first) = collision_pair(offset) {
            return self.collisions.read_pair(first);
        }
        match offset {
            HOFFL => self.hoff as u8,
            HOFFH => (self.hoff >> 8) as u8,
            VOFFL => self.voff as u8,
            VOFFH => (self.voff >> 8) as u8,
            VIDBASL => self.video_base as u8,
            VIDBASH => (self.video_base >> 8) as u8,
            COLLOFFL => self.collision_offset as u8,
            COLLOFFH => (self.collision_offset >> 8) as u8,
            SCBNEXTL => self.scb_next as u8,
            SCBNEXTH => (self.scb_next >> 8) as u8,
            o if MATH_WINDOW.contains(&o) => self.math.read(o),
            SPRCTL0 => self.sprctl0,
            SPRCTL1 => self.sprctl1,
            SPRCOLL => self.sprcoll,
            SPRINIT => self.sprinit,
            SUZYHREV => HARDWARE_REVISION,
            SUZYBUSEN => self.bus_enabled as u8,
            SPRGO => {
                (if self.everon { SPRGO_EVERON } else { 0 })
                    | (if self.sprite_go { SPRGO_START } else { 0 })
            }
            SPRSYS => self.sprsys_status(),
            JOYSTICK => {
                let value = self.joystick_value();
                log(LogCategory::Input, LogLevel::Trace, || {
                    format!("JOYSTICK read {:02X} (lefthand={})", value, self.lefthand)
                });
                value
            }
            SWITCHES => {
                log(LogCategory::Input, LogLevel::Trace, || {
                    format!("SWITCHES read {:02X}", self.switches)
                });
                self.switches
            }
            RCART0 | RCART1 => {
                let bank = (offset - RCART0) as usize;
                bus.cart.select_bank(bank);
                let value = bus.cart.read_data();
                log(LogCategory::Input, LogLevel::Trace, || {
                    format!("RCART{} read {:02X}", bank, value)
                });
                value
            }
            _ => {
                log(LogCategory::Stubs, LogLevel::Trace, || {
                    format!("Suzy read from unmapped register FC{:02X}", offset)
                });
                0xFF
            }
        }
    }

    /// Write the register at `offset` within the Suzy page. A start request
    /// on `SPRGO` runs the whole sprite chain before returning.
    pub fn write(&mut self, offset: u8, val: u8, bus: &mut SuzyBus<'_>) {
        if let Some(first) = collision_pair(offset) {
            self.collisions.write_pair(first, val);
            return;
        }
        match offset {
            HOFFL => set_low(&mut self.hoff, val),
            HOFFH => set_high(&mut self.hoff, val),
            VOFFL => set_low(&mut self.voff, val),
            VOFFH => set_high(&mut self.voff, val),
            VIDBASL => set_low(&mut self.video_base, val),
            VIDBASH => set_high(&mut self.video_base, val),
            COLLOFFL => set_low(&mut self.collision_offset, val),
            COLLOFFH => set_high(&mut self.collision_offset, val),
            SCBNEXTL => set_low(&mut self.scb_next, val),
            SCBNEXTH => set_high(&mut self.scb_next, val),
            o if MATH_WINDOW.contains(&o) => self.math.write(o, val),
            SPRCTL0 => self.sprctl0 = val,
            SPRCTL1 => self.sprctl1 = val,
            SPRCOLL => self.sprcoll = val,
            SPRINIT => self.sprinit = val,
            SUZYBUSEN => self.bus_enabled = val & 0x01 != 0,
            SPRGO => {
                self.everon = val & SPRGO_EVERON != 0;
                if val & SPRGO_START != 0 {
                    self.sprite_go = true;
                    self.paint_sprites(bus);
                }
            }
            SPRSYS => {
                self.math.signed = val & SPRSYS_SIGNED_MATH != 0;
                self.math.accumulate = val & SPRSYS_ACCUMULATE != 0;
                self.no_collide = val & SPRSYS_NO_COLLIDE != 0;
                self.vstretch = val & SPRSYS_VSTRETCH != 0;
                self.lefthand = val & SPRSYS_LEFT_HANDED != 0;
                self.stop_requested = val & SPRSYS_STOP_ON_CURRENT != 0;
                if val & SPRSYS_CLEAR_COLLISION != 0 {
                    self.collisions.clear_sticky();
                }
            }
            RCART0 | RCART1 => {
                let bank = (offset - RCART0) as usize;
                log(LogCategory::Input, LogLevel::Trace, || {
                    format!("RCART{} address low {:02X}", bank, val)
                });
                bus.cart.select_bank(bank);
                bus.cart.set_address_low(val);
            }
            _ => {
                log(LogCategory::Stubs, LogLevel::Trace, || {
                    format!("Suzy write {:02X} to read-only or unmapped FC{:02X}", val, offset)
                });
            }
        }
    }

    pub fn save_state(&self) -> Value {
        serde_json::json!({
            "version": SAVE_STATE_VERSION,
            "chip": "suzy",
            "state": self,
        })
    }

    /// Restore registers and latches. The configuration is kept.
    pub fn load_state(&mut self, v: &Value) -> Result<(), LynxError> {
        let version = v["version"].as_u64().unwrap_or(0);
        if version != SAVE_STATE_VERSION {
            return Err(LynxError::UnsupportedVersion(version));
        }
        let chip = v["chip"].as_str().unwrap_or("");
        if chip != "suzy" {
            return Err(LynxError::WrongSystem(chip.to_string()));
        }
        let state = v.get("state").ok_or(LynxError::MissingSection("state"))?;
        let mut restored: Suzy = serde_json::from_value(state.clone())?;
        restored.config = self.config;
        *self = restored;
        Ok(())
    }
}
