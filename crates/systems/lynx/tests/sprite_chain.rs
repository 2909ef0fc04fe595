use emu_core::System;
use emu_lynx::{LynxBus, LynxError, SuzyConfig};

const SCB: u16 = 0x2000;
const SCB2: u16 = 0x2100;
const DATA: u16 = 0x3000;
const VIDEO: u16 = 0xC000;
const COLLOFF: u16 = 0x0020;

/// One literal 4bpp line of pens 1..4 in each of the four quadrants.
const FOUR_QUADRANTS: [u8; 16] = [
    3, 0x12, 0x34, 1, //
    3, 0x12, 0x34, 1, //
    3, 0x12, 0x34, 1, //
    3, 0x12, 0x34, 0,
];

fn write16(bus: &mut LynxBus, reg: u16, value: u16) {
    bus.write(reg, value as u8);
    bus.write(reg + 1, (value >> 8) as u8);
}

/// Depth 0, reused palette, literal data.
fn scb(coll: u8, next: u16, x: i16, y: i16) -> Vec<u8> {
    let mut bytes = vec![0xC4, 0x88, coll];
    bytes.extend_from_slice(&next.to_le_bytes());
    bytes.extend_from_slice(&DATA.to_le_bytes());
    bytes.extend_from_slice(&(x as u16).to_le_bytes());
    bytes.extend_from_slice(&(y as u16).to_le_bytes());
    bytes
}

fn console() -> LynxBus {
    let mut bus = LynxBus::new();
    write16(&mut bus, 0xFC08, VIDEO);
    write16(&mut bus, 0xFC0A, COLLOFF);
    bus.write(0xFC90, 0x01);
    bus
}

fn start(bus: &mut LynxBus, head: u16) {
    write16(bus, 0xFC10, head);
    bus.write(0xFC91, 0x01);
}

fn pixel(bus: &LynxBus, x: usize, y: usize) -> u8 {
    let byte = bus.ram.as_slice()[VIDEO as usize + y * 80 + x / 2];
    if x % 2 == 0 {
        byte >> 4
    } else {
        byte & 0x0F
    }
}

#[test]
fn on_screen_sprite_fills_all_four_quadrants() {
    let mut bus = console();
    bus.load_ram(SCB, &scb(0x00, 0x0000, 80, 50));
    bus.load_ram(DATA, &FOUR_QUADRANTS);
    start(&mut bus, SCB);

    // Down-right, up-right, up-left, down-left.
    assert_eq!(pixel(&bus, 80, 50), 1);
    assert_eq!(pixel(&bus, 83, 50), 4);
    assert_eq!(pixel(&bus, 80, 49), 1);
    assert_eq!(pixel(&bus, 79, 49), 1);
    assert_eq!(pixel(&bus, 76, 49), 4);
    assert_eq!(pixel(&bus, 79, 50), 1);

    let run = bus.suzy.last_run().unwrap();
    assert_eq!(run.sprites, 1);
    assert_eq!(run.pixels, 16);
    assert_eq!(bus.take_stall_cycles(), run.accesses as u64);
    assert_eq!(bus.take_stall_cycles(), 0);
    // The start bit reads back clear once the run is over.
    assert_eq!(bus.read(0xFC91) & 0x01, 0);
}

#[test]
fn sprite_far_off_the_top_left_draws_nothing_visible() {
    let mut bus = console();
    bus.load_ram(SCB, &scb(0x00, 0x0000, -300, -300));
    bus.load_ram(DATA, &FOUR_QUADRANTS);
    start(&mut bus, SCB);

    assert_eq!(bus.suzy.last_run().map(|r| r.pixels), Some(0));
    let frame = bus.render_frame(&[0xFFFF_FFFF; 16]);
    assert!(frame.pixels.iter().all(|&p| p == 0xFFFF_FFFF));
    assert_eq!(frame.get(0, 0), Some(0xFFFF_FFFF));
    assert!(bus.ram.as_slice()[VIDEO as usize..VIDEO as usize + 80 * 102]
        .iter()
        .all(|&b| b == 0));
}

#[test]
fn overlapping_sprites_record_mutual_collision() {
    let mut bus = console();
    // Both sprites draw a single pen-3 pixel at (10, 10).
    bus.load_ram(DATA, &[2, 0x30, 0]);
    bus.load_ram(SCB, &scb(0x02, SCB2, 10, 10));
    bus.load_ram(SCB2, &scb(0x05, 0x0000, 10, 10));
    start(&mut bus, SCB);

    assert_eq!(bus.suzy.last_run().map(|r| r.sprites), Some(2));
    // Slots 4/5 live in depository byte 2, slots 2/3 in byte 1.
    assert_eq!(bus.read(0xFC02), 0x30);
    assert_eq!(bus.read(0xFC01), 0x50);
    assert_ne!(bus.read(0xFC92) & 0x04, 0);
    // Each sprite's own slot is copied next to its SCB.
    assert_eq!(bus.ram.as_slice()[(SCB + COLLOFF) as usize], 0x00);
    assert_eq!(bus.ram.as_slice()[(SCB2 + COLLOFF) as usize], 0x03);

    // Clearing the sticky flag leaves the slots alone.
    bus.write(0xFC92, 0x04);
    assert_eq!(bus.read(0xFC92) & 0x04, 0);
    assert_eq!(bus.read(0xFC02), 0x30);
}

#[test]
fn everon_marks_sprites_that_never_reached_the_screen() {
    let mut bus = console();
    bus.load_ram(DATA, &[2, 0x30, 0]);
    bus.load_ram(SCB, &scb(0x20, SCB2, 10, 10));
    bus.load_ram(SCB2, &scb(0x20, 0x0000, 500, 10));
    write16(&mut bus, 0xFC10, SCB);
    bus.write(0xFC91, 0x05);

    assert_eq!(bus.ram.as_slice()[(SCB + COLLOFF) as usize] & 0x80, 0);
    assert_eq!(bus.ram.as_slice()[(SCB2 + COLLOFF) as usize] & 0x80, 0x80);
}

#[test]
fn stop_request_ends_chain_after_current_sprite() {
    let mut bus = console();
    bus.load_ram(DATA, &[0]);
    bus.load_ram(SCB, &scb(0x00, SCB2, 10, 10));
    bus.load_ram(SCB2, &scb(0x00, 0x0000, 10, 10));
    bus.write(0xFC92, 0x02);
    start(&mut bus, SCB);

    assert_eq!(bus.suzy.last_run().map(|r| r.sprites), Some(1));
    assert_eq!(bus.read(0xFC10), (SCB2 & 0xFF) as u8);
    assert_eq!(bus.read(0xFC11), (SCB2 >> 8) as u8);
}

#[test]
fn disabled_bus_ignores_start() {
    let mut bus = LynxBus::new();
    bus.load_ram(SCB, &scb(0x00, 0x0000, 80, 50));
    bus.load_ram(DATA, &FOUR_QUADRANTS);
    start(&mut bus, SCB);
    assert!(bus.suzy.last_run().is_none());
    assert_eq!(bus.take_stall_cycles(), 0);
}

#[test]
fn unbounded_config_walks_long_chains() {
    let mut bus = LynxBus::with_config(SuzyConfig { sprite_limit: None });
    write16(&mut bus, 0xFC08, VIDEO);
    bus.write(0xFC90, 0x01);
    bus.load_ram(DATA, &[0]);
    // 300 SCBs in a row, each pointing at the next.
    for i in 0..300u16 {
        let addr = 0x4000 + i * 16;
        let next = if i == 299 { 0 } else { addr + 16 };
        bus.load_ram(addr, &scb(0x00, next, 0, 0));
    }
    start(&mut bus, 0x4000);
    let run = bus.suzy.last_run().unwrap();
    assert_eq!(run.sprites, 300);
    assert!(!run.capped);
}

#[test]
fn math_unit_through_the_bus() {
    let mut bus = LynxBus::new();
    // Signed mode: 0x8000 counts as positive.
    bus.write(0xFC92, 0x80);
    write16(&mut bus, 0xFC60, 0x8000);
    write16(&mut bus, 0xFC62, 0x8000);
    let product: Vec<u8> = (0xFC66..=0xFC69).map(|a| bus.read(a)).collect();
    assert_eq!(product, vec![0x00, 0x00, 0x00, 0x40]);

    // Signed divide of -7 by 2: quotient -3, remainder +1.
    write16(&mut bus, 0xFC64, 2);
    let dividend = (-7i32) as u32;
    for (i, reg) in (0xFC66..=0xFC69).enumerate() {
        bus.write(reg, (dividend >> (8 * i)) as u8);
    }
    let quotient = u32::from_le_bytes([
        bus.read(0xFC60),
        bus.read(0xFC61),
        bus.read(0xFC62),
        bus.read(0xFC63),
    ]);
    assert_eq!(quotient as i32, -3);
    assert_eq!(bus.read(0xFC6A), 1);

    // Divide by zero.
    write16(&mut bus, 0xFC64, 0);
    bus.write(0xFC69, 0x55);
    assert_eq!(bus.read(0xFC60), 0);
    assert_eq!(bus.read(0xFC6A), 0);
    assert_ne!(bus.read(0xFC92) & 0x40, 0);
}

#[test]
fn save_state_restores_rendering_state() {
    let mut bus = console();
    bus.load_ram(SCB, &scb(0x00, 0x0000, 80, 50));
    bus.load_ram(DATA, &FOUR_QUADRANTS);
    start(&mut bus, SCB);
    let state = bus.save_state();

    let mut restored = LynxBus::new();
    restored.load_state(&state).unwrap();
    let palette: [u32; 16] = std::array::from_fn(|i| i as u32 * 0x111111);
    assert_eq!(restored.render_frame(&palette).pixels, bus.render_frame(&palette).pixels);
    assert_eq!(restored.suzy.latches(), bus.suzy.latches());

    let mut wrong = state;
    wrong["version"] = 2.into();
    assert!(matches!(
        restored.restore_state(&wrong),
        Err(LynxError::UnsupportedVersion(2))
    ));
    assert!(restored.load_state(&wrong).is_err());
}

#[test]
fn sprite_data_without_terminator_still_returns() {
    let mut bus = console();
    bus.load_ram(0x0000, &vec![0x02; 0x10000]);
    bus.load_ram(SCB, &scb(0x00, 0x0000, 10, 10));
    start(&mut bus, SCB);

    let run = bus.suzy.last_run().unwrap();
    assert_eq!(run.sprites, 1);
    assert!(run.pixels > 0);
    assert_eq!(bus.read(0xFC91) & 0x01, 0);
    assert_eq!(bus.take_stall_cycles(), run.accesses as u64);
}

#[test]
fn flipped_sprite_through_the_bus() {
    let mut bus = console();
    let mut sprite = scb(0x00, 0x0000, 80, 50);
    // Horizontal and vertical flip.
    sprite[0] = 0xF4;
    bus.load_ram(SCB, &sprite);
    bus.load_ram(DATA, &FOUR_QUADRANTS);
    start(&mut bus, SCB);

    assert_eq!(bus.suzy.last_run().map(|r| r.pixels), Some(16));
    assert_eq!(pixel(&bus, 80, 50), 1);
    assert_eq!(pixel(&bus, 77, 50), 4);
    assert_eq!(pixel(&bus, 81, 51), 1);
    assert_eq!(pixel(&bus, 84, 51), 4);
    assert_eq!(pixel(&bus, 80, 49), 0);
}
