//! Primitives shared by the system crates: the framebuffer type handed to
//! hosts, the [`System`] trait frontends drive, and the category/level
//! logging facade.

use serde_json::Value;

pub mod logging;

pub mod types {
    use serde::{Deserialize, Serialize};

    /// ARGB framebuffer, row-major.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Frame {
        pub width: u32,
        pub height: u32,
        pub pixels: Vec<u32>,
    }

    impl Frame {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                pixels: vec![0; (width * height) as usize],
            }
        }

        /// Pixel at `(x, y)`, or `None` outside the frame.
        pub fn get(&self, x: u32, y: u32) -> Option<u32> {
            if x >= self.width || y >= self.height {
                return None;
            }
            self.pixels.get((y * self.width + x) as usize).copied()
        }
    }
}

/// A media slot a system exposes to the frontend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPointInfo {
    /// Identifier passed to [`System::mount`] (e.g. "Cartridge")
    pub id: String,
    /// Display name
    pub name: String,
    /// Accepted file extensions, without the dot
    pub extensions: Vec<String>,
    pub required: bool,
}

pub trait System {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Return to power-on state. Mounted media stays mounted.
    fn reset(&mut self);

    /// Produce the next frame.
    fn step_frame(&mut self) -> Result<types::Frame, Self::Error>;

    /// JSON save state. Never includes cartridge contents.
    fn save_state(&self) -> Value;

    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error>;

    fn supports_save_states(&self) -> bool {
        false
    }

    fn mount_points(&self) -> Vec<MountPointInfo>;

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error>;

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error>;

    fn is_mounted(&self, mount_point_id: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::types::Frame;

    #[test]
    fn frame_initialization() {
        let f = Frame::new(160, 102);
        assert_eq!(f.pixels.len(), 160 * 102);
        assert_eq!((f.width, f.height), (160, 102));
        assert!(f.pixels.iter().all(|&p| p == 0));
    }

    #[test]
    fn frame_get_is_bounds_checked() {
        let mut f = Frame::new(4, 2);
        f.pixels[5] = 0xFF12_3456;
        assert_eq!(f.get(1, 1), Some(0xFF12_3456));
        assert_eq!(f.get(4, 0), None);
        assert_eq!(f.get(0, 2), None);
    }
}
