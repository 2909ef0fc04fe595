//! Quadrant renderer.
//!
//! A sprite is drawn as four quadrants fanning out from its origin, each
//! with its own run of source lines. Lines are scaled through 8.8 size
//! accumulators, optionally stretched and tilted per destination line, and
//! handed to the [`PixelWriter`] one pixel at a time.
//!
//! ```text
//!      2 | 1
//!     ---+---
//!      3 | 0
//! ```

use emu_core::logging::{log, LogCategory, LogLevel};

use super::collision::{CollisionBuffer, PixelOutcome, PixelWriter};
use super::decoder::LineDecoder;
use super::ports::CountingMemory;
use super::registers::{SCREEN_HEIGHT, SCREEN_WIDTH, SIZE_ACCUM_OFFSET};
use super::scb::{SpriteDescriptor, SpriteLatches};

/// Drawing direction per quadrant as `(hsign, vsign)`.
const QUADRANT_SIGNS: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, -1), (-1, 1)];
const VFLIP_QUADRANT: [usize; 4] = [1, 0, 3, 2];
const HFLIP_QUADRANT: [usize; 4] = [3, 2, 1, 0];

/// Bytes of line data one sprite may consume. Real data never comes close;
/// a pointer into garbage that never yields a terminator hits this instead
/// of cycling through memory forever.
pub const SPRITE_DATA_LIMIT: u32 = 0x10000;

/// Screen-side state shared by every sprite of a run.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext {
    pub screen_h_start: i32,
    pub screen_v_start: i32,
    pub video_base: u16,
    pub vstretch: bool,
    /// Collision number to record, `None` when collisions are off for
    /// this sprite.
    pub collision: Option<u8>,
}

/// What one sprite did, indexed by quadrant number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpriteStats {
    pub pixels: [u32; 4],
    pub rendered: [bool; 4],
    pub ever_on_screen: bool,
    /// Drawing was abandoned after [`SPRITE_DATA_LIMIT`] bytes without an
    /// end-of-sprite marker.
    pub data_overrun: bool,
}

impl SpriteStats {
    pub fn total_pixels(&self) -> u32 {
        self.pixels.iter().sum()
    }
}

/// Whether the quadrant drawn in direction `modquad` can reach the screen
/// from an off-screen origin. The origin is compared as an unsigned word so
/// that negative positions land above `world_mid`.
fn quadrant_reaches_screen(modquad: usize, hpos: u16, vpos: u16, ctx: &RenderContext) -> bool {
    let (h, v) = (hpos as i32, vpos as i32);
    let h_start = ctx.screen_h_start;
    let v_start = ctx.screen_v_start;
    let h_end = h_start + SCREEN_WIDTH;
    let v_end = v_start + SCREEN_HEIGHT;
    let world_h_mid = h_start + 0x8000 + SCREEN_WIDTH / 2;
    let world_v_mid = v_start + 0x8000 + SCREEN_HEIGHT / 2;

    let rightwards = h < h_end || h > world_h_mid;
    let leftwards = h >= h_start && h <= world_h_mid;
    let downwards = v < v_end || v > world_v_mid;
    let upwards = v >= v_start && v <= world_v_mid;

    match modquad {
        0 => rightwards && downwards,
        1 => rightwards && upwards,
        2 => leftwards && upwards,
        _ => leftwards && downwards,
    }
}

/// Sprite data pointer plus the number of bytes consumed through it.
struct DataCursor {
    addr: u16,
    consumed: u32,
}

impl DataCursor {
    fn new(addr: u16) -> Self {
        Self { addr, consumed: 0 }
    }

    fn advance(&mut self, bytes: usize) {
        self.addr = self.addr.wrapping_add(bytes as u16);
        self.consumed = self.consumed.saturating_add(bytes as u32);
    }
}

/// Result of reading one line header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineHeader {
    EndOfSprite,
    EndOfQuadrant,
    Line(usize),
    /// The data budget ran out before a terminator.
    Overrun,
}

fn read_line_header(mem: &mut CountingMemory<'_>, cursor: &DataCursor) -> LineHeader {
    if cursor.consumed >= SPRITE_DATA_LIMIT {
        return LineHeader::Overrun;
    }
    match mem.read(cursor.addr) {
        0 => LineHeader::EndOfSprite,
        1 => LineHeader::EndOfQuadrant,
        n => LineHeader::Line(n as usize),
    }
}

/// Walk past a quadrant that will not be drawn, returning the header that
/// ended it.
fn skip_quadrant(mem: &mut CountingMemory<'_>, cursor: &mut DataCursor) -> LineHeader {
    loop {
        match read_line_header(mem, cursor) {
            LineHeader::EndOfQuadrant => {
                cursor.advance(1);
                return LineHeader::EndOfQuadrant;
            }
            LineHeader::Line(len) => cursor.advance(len),
            end => return end,
        }
    }
}

/// Render one sprite. The quadrant loop always runs four passes; once the
/// data ends the remaining passes do nothing.
pub fn render_sprite(
    mem: &mut CountingMemory<'_>,
    desc: &SpriteDescriptor,
    latches: &mut SpriteLatches,
    ctx: &RenderContext,
    buffer: &mut CollisionBuffer,
) -> SpriteStats {
    let control = desc.control;
    let writer = PixelWriter {
        video_base: ctx.video_base,
        class: control.sprite_type.pixel_class(),
        collision: ctx.collision,
    };
    let mut stats = SpriteStats::default();

    let hpos = latches.hpos as i16 as i32;
    let vpos = latches.vpos as i16 as i32;
    let superclip = !(ctx.screen_h_start..ctx.screen_h_start + SCREEN_WIDTH).contains(&hpos)
        || !(ctx.screen_v_start..ctx.screen_v_start + SCREEN_HEIGHT).contains(&vpos);

    let mut cursor = DataCursor::new(desc.data);
    let mut quadrant = control.start_quadrant();
    let mut hquadoff = 0;
    let mut vquadoff = 0;
    let mut sprite_done = false;
    let mut line = [0u8; 255];

    for pass in 0..4 {
        if sprite_done {
            break;
        }
        let (mut hsign, mut vsign) = QUADRANT_SIGNS[quadrant];
        if control.hflip {
            hsign = -hsign;
        }
        if control.vflip {
            vsign = -vsign;
        }
        if pass == 0 {
            hquadoff = hsign;
            vquadoff = vsign;
        }

        let render = if superclip {
            let mut modquad = quadrant;
            if control.vflip {
                modquad = VFLIP_QUADRANT[modquad];
            }
            if control.hflip {
                modquad = HFLIP_QUADRANT[modquad];
            }
            quadrant_reaches_screen(modquad, latches.hpos, latches.vpos, ctx)
        } else {
            true
        };

        if !render {
            log(LogCategory::Sprites, LogLevel::Trace, || {
                format!("SCB {:04X}: quadrant {} superclipped", desc.address, quadrant)
            });
            match skip_quadrant(mem, &mut cursor) {
                LineHeader::EndOfSprite => sprite_done = true,
                LineHeader::Overrun => {
                    stats.data_overrun = true;
                    sprite_done = true;
                }
                _ => {}
            }
            quadrant = (quadrant + 1) % 4;
            continue;
        }
        stats.rendered[quadrant] = true;

        let mut voff = latches.vpos as i16 as i32 - ctx.screen_v_start;
        if vsign != vquadoff {
            voff += vsign;
        }
        let mut tilt_acc: u16 = 0;
        let mut vsize_acc: u16 = if vsign == 1 { SIZE_ACCUM_OFFSET } else { 0 };

        loop {
            let len = match read_line_header(mem, &cursor) {
                LineHeader::EndOfSprite => {
                    sprite_done = true;
                    break;
                }
                LineHeader::EndOfQuadrant => {
                    cursor.advance(1);
                    break;
                }
                LineHeader::Overrun => {
                    stats.data_overrun = true;
                    sprite_done = true;
                    break;
                }
                LineHeader::Line(len) => len,
            };

            let data_len = len - 1;
            for (i, byte) in line[..data_len].iter_mut().enumerate() {
                *byte = mem.read(cursor.addr.wrapping_add(1 + i as u16));
            }
            cursor.advance(len);

            vsize_acc = vsize_acc.wrapping_add(latches.vsize);
            let pixel_height = vsize_acc >> 8;
            vsize_acc &= 0x00FF;

            for _ in 0..pixel_height {
                if (vsign == 1 && voff >= SCREEN_HEIGHT) || (vsign == -1 && voff < 0) {
                    break;
                }

                if (0..SCREEN_HEIGHT).contains(&voff) {
                    latches.hpos = latches.hpos.wrapping_add(((tilt_acc as i16) >> 8) as u16);
                    tilt_acc &= 0x00FF;

                    let mut hoff = latches.hpos as i16 as i32 - ctx.screen_h_start;
                    if hsign != hquadoff {
                        hoff += hsign;
                    }
                    let mut hsize_acc: u16 = if hsign == 1 { SIZE_ACCUM_OFFSET } else { 0 };
                    let mut onscreen = false;

                    let pixels = LineDecoder::new(&line[..data_len], control.bpp, control.literal);
                    'pixels: for raw in pixels {
                        let pen = latches.palette[(raw & 0x0F) as usize];
                        hsize_acc = hsize_acc.wrapping_add(latches.hsize);
                        let pixel_width = hsize_acc >> 8;
                        hsize_acc &= 0x00FF;

                        for _ in 0..pixel_width {
                            if (0..SCREEN_WIDTH).contains(&hoff) {
                                onscreen = true;
                                stats.ever_on_screen = true;
                                let outcome = writer.write(mem, buffer, hoff, voff, pen);
                                if outcome == PixelOutcome::Drawn {
                                    stats.pixels[quadrant] += 1;
                                }
                            } else if onscreen {
                                break 'pixels;
                            }
                            hoff += hsign;
                        }
                    }
                }

                voff += vsign;
                if control.depth.has_stretch() {
                    latches.hsize = latches.hsize.wrapping_add(latches.stretch);
                    if ctx.vstretch {
                        latches.vsize = latches.vsize.wrapping_add(latches.stretch);
                    }
                }
                if control.depth.has_tilt() {
                    tilt_acc = tilt_acc.wrapping_add(latches.tilt);
                }
            }
        }

        quadrant = (quadrant + 1) % 4;
    }

    if stats.data_overrun {
        log(LogCategory::Sprites, LogLevel::Warn, || {
            format!(
                "SCB {:04X}: no end of sprite within {} bytes of data at {:04X}, abandoned",
                desc.address, SPRITE_DATA_LIMIT, desc.data
            )
        });
    }

    log(LogCategory::Sprites, LogLevel::Trace, || {
        format!(
            "SCB {:04X}: drew {:?} pixels per quadrant",
            desc.address, stats.pixels
        )
    });
    stats
}
