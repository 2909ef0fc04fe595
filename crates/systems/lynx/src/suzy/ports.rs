//! Collaborators Suzy talks to, and the access counter used while the
//! sprite engine owns the bus.
//!
//! Suzy owns none of these. The console hands them in as a [`SuzyBus`] for
//! the duration of a single register access, so a sprite run always has
//! exclusive use of RAM until the triggering write returns.

/// System RAM as seen from Suzy. Addresses wrap modulo 65536.
pub trait SuzyMemory {
    fn read(&self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, val: u8);
}

/// The host CPU's view of a finished sprite run.
pub trait CpuStall {
    /// Charge `count` bus cycles to the CPU, which was halted for the run.
    fn add_cycles(&mut self, count: u32);
}

/// Cartridge data port behind `RCART0`/`RCART1`.
pub trait CartridgePort {
    fn select_bank(&mut self, bank: usize);
    /// Read at the current address and advance the auto-increment counter.
    fn read_data(&mut self) -> u8;
    fn set_address_low(&mut self, value: u8);
}

/// Empty cartridge slot: reads float high, writes vanish.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCartridge;

impl CartridgePort for NoCartridge {
    fn select_bank(&mut self, _bank: usize) {}

    fn read_data(&mut self) -> u8 {
        0xFF
    }

    fn set_address_low(&mut self, _value: u8) {}
}

/// Borrowed collaborators for one register access.
pub struct SuzyBus<'a> {
    pub memory: &'a mut dyn SuzyMemory,
    pub cpu: &'a mut dyn CpuStall,
    pub cart: &'a mut dyn CartridgePort,
}

/// RAM wrapper that tallies every byte-wide access made by the sprite engine.
pub struct CountingMemory<'m> {
    inner: &'m mut dyn SuzyMemory,
    accesses: u32,
}

impl<'m> CountingMemory<'m> {
    pub fn new(inner: &'m mut dyn SuzyMemory) -> Self {
        Self { inner, accesses: 0 }
    }

    pub fn read(&mut self, addr: u16) -> u8 {
        self.accesses = self.accesses.saturating_add(1);
        self.inner.read(addr)
    }

    /// Little-endian word; the high byte address wraps.
    pub fn read_u16(&mut self, addr: u16) -> u16 {
        let lo = self.read(addr) as u16;
        let hi = self.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    pub fn write(&mut self, addr: u16, val: u8) {
        self.accesses = self.accesses.saturating_add(1);
        self.inner.write(addr, val);
    }

    pub fn accesses(&self) -> u32 {
        self.accesses
    }
}


#[cfg(test)]
mod tests {
    use super::testing::TestRam;
    use super::*;

    #[test]
    fn counts_every_byte_access() {
        let mut ram = TestRam::new();
        ram.load(0x1234, &[0x34, 0x12]);
        let mut mem = CountingMemory::new(&mut ram);

        assert_eq!(mem.read_u16(0x1234), 0x1234);
        mem.write(0x0010, 0xAA);
        assert_eq!(mem.read(0x0010), 0xAA);
        assert_eq!(mem.accesses(), 4);
    }

    #[test]
    fn word_read_wraps_at_top_of_memory() {
        let mut ram = TestRam::new();
        ram.0[0xFFFF] = 0xCD;
        ram.0[0x0000] = 0xAB;
        let mut mem = CountingMemory::new(&mut ram);
        assert_eq!(mem.read_u16(0xFFFF), 0xABCD);
    }

    #[test]
    fn empty_slot_reads_high() {
        let mut cart = NoCartridge;
        cart.select_bank(1);
        cart.set_address_low(0x40);
        assert_eq!(cart.read_data(), 0xFF);
    }
}
