//! Lynx cartridge behind Suzy's `RCART0`/`RCART1` data ports.
//!
//! A cart is one or two banks of 256 pages each. The page is selected by the
//! host (Mikey drives it through a shift register); within a page a ripple
//! counter advances on every data read.
//!
//! Images are either raw bank-0 dumps or `.lnx` files with a 64-byte
//! `LYNX` header carrying the page sizes of both banks.

use thiserror::Error;

use crate::suzy::ports::CartridgePort;

const LNX_MAGIC: &[u8; 4] = b"LYNX";
const LNX_HEADER_LEN: usize = 64;
const PAGES_PER_BANK: usize = 256;

#[derive(Debug, Error)]
pub enum CartridgeError {
    #[error("Invalid ROM size: {0} bytes")]
    InvalidSize(usize),
    #[error("Unsupported page size: {0} bytes")]
    UnsupportedPageSize(usize),
    #[error("Image truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

#[derive(Debug, Clone, Default)]
struct Bank {
    data: Vec<u8>,
    page_size: usize,
}

impl Bank {
    fn new(data: Vec<u8>, page_size: usize) -> Self {
        Self { data, page_size }
    }

    fn read(&self, page: u8, counter: u16) -> u8 {
        if self.page_size == 0 {
            return 0xFF;
        }
        let offset = page as usize * self.page_size + counter as usize % self.page_size;
        self.data.get(offset).copied().unwrap_or(0xFF)
    }
}

fn check_page_size(page_size: usize) -> Result<usize, CartridgeError> {
    match page_size {
        256 | 512 | 1024 | 2048 => Ok(page_size),
        _ => Err(CartridgeError::UnsupportedPageSize(page_size)),
    }
}

#[derive(Debug, Clone)]
pub struct Cartridge {
    banks: [Bank; 2],
    bank: usize,
    page: u8,
    counter: u16,
}

impl Cartridge {
    /// Build a cartridge from a raw dump or an `.lnx` image.
    pub fn new(image: &[u8]) -> Result<Self, CartridgeError> {
        if image.starts_with(LNX_MAGIC) {
            return Self::from_lnx(image);
        }
        if image.is_empty() || image.len() % PAGES_PER_BANK != 0 {
            return Err(CartridgeError::InvalidSize(image.len()));
        }
        let page_size = check_page_size(image.len() / PAGES_PER_BANK)?;
        Ok(Self::from_banks(Bank::new(image.to_vec(), page_size), Bank::default()))
    }

    fn from_lnx(image: &[u8]) -> Result<Self, CartridgeError> {
        if image.len() < LNX_HEADER_LEN {
            return Err(CartridgeError::Truncated {
                expected: LNX_HEADER_LEN,
                actual: image.len(),
            });
        }
        let page0 = check_page_size(u16::from_le_bytes([image[4], image[5]]) as usize)?;
        let page1 = match u16::from_le_bytes([image[6], image[7]]) as usize {
            0 => 0,
            size => check_page_size(size)?,
        };

        let len0 = page0 * PAGES_PER_BANK;
        let len1 = page1 * PAGES_PER_BANK;
        let expected = LNX_HEADER_LEN + len0 + len1;
        if image.len() < expected {
            return Err(CartridgeError::Truncated {
                expected,
                actual: image.len(),
            });
        }

        let body = &image[LNX_HEADER_LEN..];
        Ok(Self::from_banks(
            Bank::new(body[..len0].to_vec(), page0),
            Bank::new(body[len0..len0 + len1].to_vec(), page1),
        ))
    }

    fn from_banks(bank0: Bank, bank1: Bank) -> Self {
        Self {
            banks: [bank0, bank1],
            bank: 0,
            page: 0,
            counter: 0,
        }
    }

    pub fn page_size(&self, bank: usize) -> usize {
        self.banks[bank & 1].page_size
    }

    /// Page select, driven by the host's shift register.
    pub fn set_page(&mut self, page: u8) {
        self.page = page;
        self.counter = 0;
    }
}

impl CartridgePort for Cartridge {
    fn select_bank(&mut self, bank: usize) {
        self.bank = bank & 1;
    }

    fn read_data(&mut self) -> u8 {
        let value = self.banks[self.bank].read(self.page, self.counter);
        self.counter = self.counter.wrapping_add(1);
        value
    }

    fn set_address_low(&mut self, value: u8) {
        self.counter = (self.counter & 0xFF00) | value as u16;
    }
}
