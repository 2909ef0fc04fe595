//! Atari Lynx system crate.
//!
//! The centrepiece is [`Suzy`], the sprite engine and math coprocessor.
//! [`LynxBus`] owns RAM, Suzy and the cartridge slot and routes the
//! `0xFC00` page to the chip; the CPU, Mikey and audio are not emulated
//! here and talk to Suzy only through the traits in [`suzy::ports`].

mod bus;
mod cartridge;
pub mod suzy;

pub use bus::{LynxBus, Ram, StallCounter, RAM_SIZE};
pub use cartridge::{Cartridge, CartridgeError};
pub use suzy::chain::RunStats;
pub use suzy::renderer::SpriteStats;
pub use suzy::{Suzy, SuzyConfig};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LynxError {
    #[error("Cartridge error: {0}")]
    Cartridge(#[from] CartridgeError),
    #[error("Unsupported save state version: {0}")]
    UnsupportedVersion(u64),
    #[error("Save state belongs to '{0}'")]
    WrongSystem(String),
    #[error("Save state has no '{0}' section")]
    MissingSection(&'static str),
    #[error("RAM image must be 65536 bytes, got {0}")]
    InvalidRamSize(usize),
    #[error("Invalid mount point: {0}")]
    InvalidMountPoint(String),
    #[error("Malformed save state: {0}")]
    Serde(#[from] serde_json::Error),
}
