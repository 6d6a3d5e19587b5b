//! The bus-access contract shared by every backend.

use std::sync::Arc;

use crate::Result;

/// Register-level access to devices on an SMBus/I2C bus.
///
/// Devices are addressed by 7-bit slave address and 8-bit register. Words
/// are presented most-significant byte first regardless of how the
/// transport moves them.
///
/// Implementations synchronize internally, so one instance can be shared
/// across threads. Reads are not assumed idempotent: some devices latch or
/// clear state when a register is read.
pub trait Bus: Send + Sync {
    /// Reads one byte from `register` of the device at `address`.
    fn read_byte(&self, address: u8, register: u8) -> Result<u8>;

    /// Writes one byte to `register` of the device at `address`.
    fn write_byte(&self, address: u8, register: u8, value: u8) -> Result<()>;

    /// Reads one 16-bit word from `register` of the device at `address`.
    fn read_word(&self, address: u8, register: u8) -> Result<u16>;

    /// Writes one 16-bit word to `register` of the device at `address`.
    fn write_word(&self, address: u8, register: u8, value: u16) -> Result<()>;
}

macro_rules! forward_bus {
    ($($ty:ty),*) => {$(
        impl<B: Bus + ?Sized> Bus for $ty {
            fn read_byte(&self, address: u8, register: u8) -> Result<u8> {
                (**self).read_byte(address, register)
            }

            fn write_byte(&self, address: u8, register: u8, value: u8) -> Result<()> {
                (**self).write_byte(address, register, value)
            }

            fn read_word(&self, address: u8, register: u8) -> Result<u16> {
                (**self).read_word(address, register)
            }

            fn write_word(&self, address: u8, register: u8, value: u16) -> Result<()> {
                (**self).write_word(address, register, value)
            }
        }
    )*};
}

forward_bus!(&B, Box<B>, Arc<B>);
