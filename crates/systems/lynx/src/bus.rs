//! Lynx memory bus: 64K of RAM with Suzy mapped over `0xFC00-0xFCFF`.

use emu_core::logging::{log, LogCategory, LogLevel};
use emu_core::types::Frame;
use emu_core::{MountPointInfo, System};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cartridge::Cartridge;
use crate::suzy::ports::{CartridgePort, CpuStall, NoCartridge, SuzyBus, SuzyMemory};
use crate::suzy::registers::{LINE_BYTES, SCREEN_HEIGHT, SCREEN_WIDTH};
use crate::suzy::{Suzy, SuzyConfig};
use crate::LynxError;

pub const RAM_SIZE: usize = 0x10000;
const SUZY_PAGE: u16 = 0xFC00;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ram(Vec<u8>);

impl Default for Ram {
    fn default() -> Self {
        Self(vec![0; RAM_SIZE])
    }
}

impl Ram {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl SuzyMemory for Ram {
    fn read(&self, addr: u16) -> u8 {
        self.0[addr as usize]
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.0[addr as usize] = val;
    }
}

/// Cycles the CPU owes for sprite runs since it last asked.
#[derive(Debug, Default)]
pub struct StallCounter {
    pending: u64,
}

impl CpuStall for StallCounter {
    fn add_cycles(&mut self, count: u32) {
        self.pending += count as u64;
    }
}

/// Grey ramp used until the host installs the display chip's colours.
fn grey_palette() -> [u32; 16] {
    std::array::from_fn(|i| 0xFF00_0000 | (i as u32 * 0x0011_1111))
}

const CARTRIDGE_SLOT: &str = "Cartridge";

pub struct LynxBus {
    pub ram: Ram,
    pub suzy: Suzy,
    cartridge: Option<Cartridge>,
    stall: StallCounter,
    palette: [u32; 16],
}

impl Default for LynxBus {
    fn default() -> Self {
        Self::new()
    }
}

impl LynxBus {
    pub fn new() -> Self {
        Self::with_config(SuzyConfig::default())
    }

    pub fn with_config(config: SuzyConfig) -> Self {
        Self {
            ram: Ram::default(),
            suzy: Suzy::with_config(config),
            cartridge: None,
            stall: StallCounter::default(),
            palette: grey_palette(),
        }
    }

    /// Mount a raw or `.lnx` cartridge image.
    pub fn load_cartridge(&mut self, image: &[u8]) -> Result<(), LynxError> {
        let cart = Cartridge::new(image)?;
        log(LogCategory::Bus, LogLevel::Info, || {
            format!("cartridge mounted, page size {} bytes", cart.page_size(0))
        });
        self.cartridge = Some(cart);
        Ok(())
    }

    pub fn cartridge_mut(&mut self) -> Option<&mut Cartridge> {
        self.cartridge.as_mut()
    }

    /// Colours used by [`System::step_frame`], indexed by pen.
    pub fn set_palette(&mut self, palette: [u32; 16]) {
        self.palette = palette;
    }

    /// Hand the accumulated sprite-engine stall to the CPU loop.
    pub fn take_stall_cycles(&mut self) -> u64 {
        let cycles = std::mem::take(&mut self.stall.pending);
        if cycles > 0 {
            log(LogCategory::CPU, LogLevel::Trace, || {
                format!("CPU charged {} stall cycles", cycles)
            });
        }
        cycles
    }

    fn with_suzy<R>(&mut self, f: impl FnOnce(&mut Suzy, &mut SuzyBus<'_>) -> R) -> R {
        let mut empty = NoCartridge;
        let cart: &mut dyn CartridgePort = match self.cartridge.as_mut() {
            Some(cart) => cart,
            None => &mut empty,
        };
        let mut bus = SuzyBus {
            memory: &mut self.ram,
            cpu: &mut self.stall,
            cart,
        };
        f(&mut self.suzy, &mut bus)
    }

    pub fn read(&mut self, addr: u16) -> u8 {
        if addr & 0xFF00 == SUZY_PAGE {
            let offset = addr as u8;
            self.with_suzy(|suzy, bus| suzy.read(offset, bus))
        } else {
            self.ram.read(addr)
        }
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        if addr & 0xFF00 == SUZY_PAGE {
            let offset = addr as u8;
            self.with_suzy(|suzy, bus| suzy.write(offset, val, bus));
        } else {
            self.ram.write(addr, val);
        }
    }

    /// Copy `bytes` into RAM starting at `addr`, wrapping at the top.
    pub fn load_ram(&mut self, addr: u16, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            self.ram.write(addr.wrapping_add(i as u16), b);
        }
    }

    /// Expand the packed frame buffer at `VIDBAS` through `palette`.
    pub fn render_frame(&self, palette: &[u32; 16]) -> Frame {
        let mut frame = Frame::new(SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32);
        let base = self.suzy.video_base();
        for y in 0..SCREEN_HEIGHT as u16 {
            for x in 0..SCREEN_WIDTH as u16 {
                let byte = self.ram.read(base.wrapping_add(y * LINE_BYTES + x / 2));
                let pen = if x % 2 == 0 { byte >> 4 } else { byte & 0x0F };
                frame.pixels[y as usize * SCREEN_WIDTH as usize + x as usize] =
                    palette[pen as usize];
            }
        }
        frame
    }

    /// Restore a state produced by [`System::save_state`], reporting exactly
    /// what was wrong with it.
    pub fn restore_state(&mut self, v: &Value) -> Result<(), LynxError> {
        let version = v["version"].as_u64().unwrap_or(0);
        if version != 1 {
            return Err(LynxError::UnsupportedVersion(version));
        }
        let system = v["system"].as_str().unwrap_or("");
        if system != "lynx" {
            return Err(LynxError::WrongSystem(system.to_string()));
        }

        let ram_value = v.get("ram").ok_or(LynxError::MissingSection("ram"))?;
        let ram: Ram = serde_json::from_value(ram_value.clone())?;
        if ram.0.len() != RAM_SIZE {
            return Err(LynxError::InvalidRamSize(ram.0.len()));
        }
        let suzy_value = v.get("suzy").ok_or(LynxError::MissingSection("suzy"))?;
        self.suzy.load_state(suzy_value)?;
        self.ram = ram;
        self.stall = StallCounter::default();
        Ok(())
    }
}

impl System for LynxBus {
    type Error = LynxError;

    /// Suzy returns to power-on state; RAM keeps its contents.
    fn reset(&mut self) {
        self.suzy.reset();
        self.stall = StallCounter::default();
    }

    /// The CPU and display chip are driven by the host, so a frame is the
    /// current contents of the frame buffer.
    fn step_frame(&mut self) -> Result<Frame, Self::Error> {
        Ok(self.render_frame(&self.palette))
    }

    fn save_state(&self) -> Value {
        serde_json::json!({
            "version": 1,
            "system": "lynx",
            "ram": self.ram,
            "suzy": self.suzy.save_state(),
        })
    }

    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error> {
        self.restore_state(v).map_err(|err| match err {
            LynxError::Serde(inner) => inner,
            other => <serde_json::Error as serde::de::Error>::custom(other),
        })
    }

    fn supports_save_states(&self) -> bool {
        true
    }

    fn mount_points(&self) -> Vec<MountPointInfo> {
        vec![MountPointInfo {
            id: CARTRIDGE_SLOT.to_string(),
            name: "Cartridge Slot".to_string(),
            extensions: vec!["lnx".to_string(), "lyx".to_string(), "bin".to_string()],
            required: false,
        }]
    }

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error> {
        if mount_point_id != CARTRIDGE_SLOT {
            return Err(LynxError::InvalidMountPoint(mount_point_id.to_string()));
        }
        self.load_cartridge(data)?;
        self.reset();
        Ok(())
    }

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error> {
        if mount_point_id != CARTRIDGE_SLOT {
            return Err(LynxError::InvalidMountPoint(mount_point_id.to_string()));
        }
        self.cartridge = None;
        Ok(())
    }

    fn is_mounted(&self, mount_point_id: &str) -> bool {
        mount_point_id == CARTRIDGE_SLOT && self.cartridge.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suzy_page_is_routed_to_the_chip() {
        let mut bus = LynxBus::new();
        bus.write(0xFC08, 0x00);
        bus.write(0xFC09, 0xC0);
        assert_eq!(bus.read(0xFC88), 0x01);
        assert_eq!(bus.suzy.video_base(), 0xC000);
        // The RAM under the Suzy page is untouched.
        assert_eq!(bus.ram.as_slice()[0xFC09], 0);

        bus.write(0x1234, 0x56);
        assert_eq!(bus.read(0x1234), 0x56);
    }

    #[test]
    fn empty_slot_reads_high_through_rcart() {
        let mut bus = LynxBus::new();
        assert_eq!(bus.read(0xFCB2), 0xFF);
        assert!(!bus.is_mounted("Cartridge"));
    }

    #[test]
    fn mounted_cartridge_feeds_rcart0() {
        let mut bus = LynxBus::new();
        let rom: Vec<u8> = (0..256 * 256).map(|i| i as u8).collect();
        bus.mount("Cartridge", &rom).unwrap();
        assert!(bus.is_mounted("Cartridge"));
        if let Some(cart) = bus.cartridge_mut() {
            cart.set_page(1);
        }
        assert_eq!(bus.read(0xFCB2), 0x00);
        assert_eq!(bus.read(0xFCB2), 0x01);
        bus.write(0xFCB2, 0x80);
        assert_eq!(bus.read(0xFCB2), 0x80);
        bus.unmount("Cartridge").unwrap();
        assert_eq!(bus.read(0xFCB2), 0xFF);
    }

    #[test]
    fn mount_points_reject_unknown_slots() {
        let mut bus = LynxBus::new();
        let points = bus.mount_points();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].id, "Cartridge");
        assert!(points[0].extensions.contains(&"lnx".to_string()));

        assert!(matches!(bus.mount("BIOS", &[0; 512]), Err(LynxError::InvalidMountPoint(_))));
        assert!(matches!(bus.unmount("BIOS"), Err(LynxError::InvalidMountPoint(_))));
        assert!(matches!(bus.mount("Cartridge", &[1, 2, 3]), Err(LynxError::Cartridge(_))));
        assert!(!bus.is_mounted("BIOS"));
    }

    #[test]
    fn mount_resets_suzy() {
        let mut bus = LynxBus::new();
        bus.write(0xFC04, 0x10);
        bus.mount("Cartridge", &vec![0u8; 256 * 256]).unwrap();
        assert_eq!(bus.read(0xFC04), 0x00);
    }

    #[test]
    fn render_frame_unpacks_nibbles() {
        let mut bus = LynxBus::new();
        bus.write(0xFC08, 0x00);
        bus.write(0xFC09, 0x80);
        bus.load_ram(0x8000, &[0x1F]);
        bus.load_ram(0x8000 + 80 * 101 + 79, &[0x20]);
        let palette: [u32; 16] = std::array::from_fn(|i| 0xFF00_0000 | i as u32);
        let frame = bus.render_frame(&palette);

        assert_eq!((frame.width, frame.height), (160, 102));
        assert_eq!(frame.get(0, 0), Some(0xFF00_0001));
        assert_eq!(frame.get(1, 0), Some(0xFF00_000F));
        assert_eq!(frame.get(158, 101), Some(0xFF00_0002));
        assert_eq!(frame.get(159, 101), Some(0xFF00_0000));
    }

    #[test]
    fn step_frame_uses_installed_palette() {
        let mut bus = LynxBus::new();
        bus.write(0xFC09, 0x80);
        bus.load_ram(0x8000, &[0x30]);
        let frame = bus.step_frame().unwrap();
        assert_eq!(frame.get(0, 0), Some(0xFF33_3333));
        assert_eq!(frame.get(1, 0), Some(0xFF00_0000));

        bus.set_palette([0xFFAB_CDEF; 16]);
        assert_eq!(bus.step_frame().unwrap().get(1, 0), Some(0xFFAB_CDEF));
    }

    #[test]
    fn save_and_load_state() {
        let mut bus = LynxBus::new();
        assert!(bus.supports_save_states());
        bus.write(0x0200, 0xAB);
        bus.write(0xFC04, 0x10);
        let state = bus.save_state();
        assert_eq!(state["version"], 1);

        let mut restored = LynxBus::new();
        restored.load_state(&state).unwrap();
        assert_eq!(restored.read(0x0200), 0xAB);
        assert_eq!(restored.read(0xFC04), 0x10);

        let mut bad = state.clone();
        bad["system"] = "nes".into();
        assert!(matches!(restored.restore_state(&bad), Err(LynxError::WrongSystem(_))));
        assert!(restored.load_state(&bad).is_err());

        let mut short = state;
        short["ram"] = serde_json::json!([1, 2, 3]);
        assert!(matches!(restored.restore_state(&short), Err(LynxError::InvalidRamSize(3))));
    }
}
