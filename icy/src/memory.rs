//! In-memory register file implementing [`Bus`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{Bus, Result};

/// A bus whose devices are plain memory.
///
/// Every `(address, register)` pair holds a 16-bit word. Byte writes store
/// the byte as the whole word; byte reads return the low byte. Registers
/// that were never written read as zero. Useful as a dummy server backend
/// and in tests.
#[derive(Debug, Default)]
pub struct MemoryBus {
    /// Register contents.
    registers: Mutex<HashMap<(u8, u8), u16>>,
}

impl MemoryBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a register.
    pub fn set(&self, address: u8, register: u8, value: u16) {
        self.lock().insert((address, register), value);
    }

    /// Current content of a register.
    pub fn get(&self, address: u8, register: u8) -> u16 {
        self.lock().get(&(address, register)).copied().unwrap_or(0)
    }

    /// Number of registers that have been written.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no register has been written.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Locks the register map.
    fn lock(&self) -> MutexGuard<'_, HashMap<(u8, u8), u16>> {
        self.registers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Bus for MemoryBus {
    fn read_byte(&self, address: u8, register: u8) -> Result<u8> {
        let [_, low] = self.get(address, register).to_be_bytes();
        Ok(low)
    }

    fn write_byte(&self, address: u8, register: u8, value: u8) -> Result<()> {
        self.set(address, register, u16::from(value));
        Ok(())
    }

    fn read_word(&self, address: u8, register: u8) -> Result<u16> {
        Ok(self.get(address, register))
    }

    fn write_word(&self, address: u8, register: u8, value: u16) -> Result<()> {
        self.set(address, register, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwritten_registers_read_zero() {
        let bus = MemoryBus::new();
        assert_eq!(bus.read_byte(0x18, 0x05).unwrap(), 0);
        assert_eq!(bus.read_word(0x18, 0x05).unwrap(), 0);
        assert!(bus.is_empty());
    }

    #[test]
    fn byte_read_returns_low_byte() {
        let bus = MemoryBus::new();
        bus.write_word(0x18, 0x05, 0x0A3C).unwrap();
        assert_eq!(bus.read_byte(0x18, 0x05).unwrap(), 0x3C);
    }

    #[test]
    fn registers_are_independent() {
        let bus = MemoryBus::new();
        bus.write_byte(0x18, 0x01, 0x11).unwrap();
        bus.write_byte(0x19, 0x01, 0x22).unwrap();
        bus.write_byte(0x18, 0x02, 0x33).unwrap();
        assert_eq!(bus.read_byte(0x18, 0x01).unwrap(), 0x11);
        assert_eq!(bus.read_byte(0x19, 0x01).unwrap(), 0x22);
        assert_eq!(bus.read_byte(0x18, 0x02).unwrap(), 0x33);
        assert_eq!(bus.len(), 3);
    }
}
