//! Sprite list walker.

use emu_core::logging::{log, LogCategory, LogLevel};

use super::collision::CollisionBuffer;
use super::ports::{CountingMemory, SuzyBus};
use super::renderer::{render_sprite, RenderContext, SpriteStats};
use super::scb::{read_descriptor, SpriteDescriptor};
use super::Suzy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    Active(u16),
    Idle,
}

impl ChainState {
    /// Only the high byte of a link decides whether the chain goes on, so
    /// `0x0080` ends it and `0x0100` does not.
    pub fn start(address: u16) -> Self {
        if address & 0xFF00 == 0 {
            Self::Idle
        } else {
            Self::Active(address)
        }
    }
}

/// Summary of one triggered run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub sprites: u32,
    pub pixels: u32,
    /// Byte-wide RAM accesses, charged to the CPU as stall cycles.
    pub accesses: u32,
    /// The walk was cut short by the configured sprite limit.
    pub capped: bool,
}

/// Write the sprite's collision result and ever-on flag into its
/// depository byte.
fn deposit(
    mem: &mut CountingMemory<'_>,
    address: u16,
    collisions: &CollisionBuffer,
    desc: &SpriteDescriptor,
    collidable: bool,
    everon: bool,
    sprite: &SpriteStats,
) {
    if collidable {
        let slot = desc.control.collision_number as usize;
        mem.write(address, collisions.get(slot));
    }
    if everon {
        let byte = mem.read(address);
        let byte = if sprite.ever_on_screen {
            byte & 0x7F
        } else {
            byte | 0x80
        };
        mem.write(address, byte);
    }
}

impl Suzy {
    /// Run the sprite chain from `SCBNEXT` to completion, then report the
    /// RAM traffic to the CPU as a single stall.
    pub(crate) fn paint_sprites(&mut self, bus: &mut SuzyBus<'_>) -> RunStats {
        let mut run = RunStats::default();
        if !self.bus_enabled {
            log(LogCategory::Sprites, LogLevel::Debug, || {
                "sprite engine started with bus disabled, ignoring".to_string()
            });
            return run;
        }

        self.working = true;
        log(LogCategory::Sprites, LogLevel::Debug, || {
            format!("sprite chain start at {:04X}", self.scb_next)
        });

        let mut mem = CountingMemory::new(&mut *bus.memory);
        let mut state = ChainState::start(self.scb_next);

        while let ChainState::Active(address) = state {
            if let Some(limit) = self.config.sprite_limit {
                if run.sprites >= limit {
                    log(LogCategory::Sprites, LogLevel::Warn, || {
                        format!(
                            "sprite chain hit the {} sprite limit at {:04X}, stopping",
                            limit, address
                        )
                    });
                    run.capped = true;
                    break;
                }
            }

            let desc = read_descriptor(&mut mem, address, &mut self.latches);
            self.sprctl0 = desc.ctl0;
            self.sprctl1 = desc.ctl1;
            self.sprcoll = desc.coll;
            run.sprites += 1;

            if !desc.control.skip {
                let collidable = !desc.control.dont_collide
                    && !self.no_collide
                    && desc.control.sprite_type.pixel_class().collides();
                let ctx = RenderContext {
                    screen_h_start: self.hoff as i16 as i32,
                    screen_v_start: self.voff as i16 as i32,
                    video_base: self.video_base,
                    vstretch: self.vstretch,
                    collision: collidable.then_some(desc.control.collision_number),
                };
                let sprite = render_sprite(
                    &mut mem,
                    &desc,
                    &mut self.latches,
                    &ctx,
                    &mut self.collisions,
                );
                run.pixels += sprite.total_pixels();

                let depository = address.wrapping_add(self.collision_offset);
                deposit(
                    &mut mem,
                    depository,
                    &self.collisions,
                    &desc,
                    collidable,
                    self.everon,
                    &sprite,
                );
            }

            self.scb_next = desc.next;
            state = ChainState::start(desc.next);

            if self.stop_requested {
                self.stop_requested = false;
                log(LogCategory::Sprites, LogLevel::Debug, || {
                    format!("sprite chain stopped after {:04X} on request", address)
                });
                break;
            }
        }

        run.accesses = mem.accesses();
        self.working = false;
        self.sprite_go = false;
        bus.cpu.add_cycles(run.accesses);

        log(LogCategory::Sprites, LogLevel::Debug, || {
            format!(
                "sprite chain done: {} sprites, {} pixels, {} stall cycles",
                run.sprites, run.pixels, run.accesses
            )
        });
        self.last_run = Some(run);
        run
    }
}
