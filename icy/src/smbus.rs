//! SMBus transport over a kernel bus device.
//!
//! [`Smbus`] turns [`Bus`] calls into two device primitives: slave address
//! selection and a single generic SMBus transaction. Selection is lazy; the
//! last selected address is cached and only re-issued when it changes. The
//! cache and the device live behind one lock so a (select, transfer) pair
//! can never interleave with another caller's.

use std::io;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{Bus, Error, Result};

/// Direction of an SMBus transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Device to host.
    Read,
    /// Host to device.
    Write,
}

/// Amount of data moved by one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    /// One data byte.
    Byte,
    /// One 16-bit data word.
    Word,
}

/// Low-level bus device.
///
/// Implemented by [`I2cDev`](crate::I2cDev) for Linux and by test doubles.
pub trait Device: Send {
    /// Points subsequent transactions at the slave `address`.
    fn select(&mut self, address: u8) -> io::Result<()>;

    /// Performs one transaction against `register` of the selected device.
    ///
    /// For [`SizeClass::Byte`] only `data[0]` is used. Writes read from
    /// `data`; reads fill it.
    fn smbus_access(
        &mut self,
        direction: Direction,
        register: u8,
        size: SizeClass,
        data: &mut [u8; 2],
    ) -> io::Result<()>;
}

/// Device handle plus the address it currently points at.
#[derive(Debug)]
struct State<D> {
    /// The device.
    device: D,
    /// Last address successfully selected; `None` before the first selection.
    selected: Option<u8>,
}

impl<D: Device> State<D> {
    /// Selects `address` unless it is already selected.
    fn select(&mut self, address: u8) -> Result<()> {
        if self.selected != Some(address) {
            self.device
                .select(address)
                .map_err(|source| Error::AddressSelect { address, source })?;
            self.selected = Some(address);
        }
        Ok(())
    }
}

/// [`Bus`] implementation over a kernel SMBus device.
#[derive(Debug)]
pub struct Smbus<D> {
    /// Device and address cache, locked for each whole transaction.
    state: Mutex<State<D>>,
}

impl<D: Device> Smbus<D> {
    /// Wraps an already opened device.
    pub const fn with_device(device: D) -> Self {
        Self {
            state: Mutex::new(State {
                device,
                selected: None,
            }),
        }
    }

    /// Consumes the transport and returns the device.
    pub fn into_inner(self) -> D {
        self.state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .device
    }

    /// Locks the state. A panic in another caller cannot leave the cache
    /// wrong, since it is only updated after a successful selection.
    fn lock(&self) -> MutexGuard<'_, State<D>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Selects `address` and runs one transaction, atomically.
    fn transact(
        &self,
        address: u8,
        register: u8,
        direction: Direction,
        size: SizeClass,
        data: &mut [u8; 2],
    ) -> Result<()> {
        let mut state = self.lock();
        state.select(address)?;
        state
            .device
            .smbus_access(direction, register, size, data)
            .map_err(|source| Error::Transfer {
                address,
                register,
                source,
            })
    }
}

#[cfg(target_os = "linux")]
impl Smbus<crate::I2cDev> {
    /// Opens `/dev/i2c-{bus}` for exclusive use.
    pub fn open(bus: u8) -> Result<Self> {
        Self::open_path(format!("/dev/i2c-{bus}"))
    }

    /// Opens the bus device at `path` for exclusive use.
    pub fn open_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        crate::I2cDev::open(path).map(Self::with_device)
    }
}

impl<D: Device> Bus for Smbus<D> {
    fn read_byte(&self, address: u8, register: u8) -> Result<u8> {
        let mut data = [0; 2];
        self.transact(address, register, Direction::Read, SizeClass::Byte, &mut data)?;
        Ok(data[0])
    }

    fn write_byte(&self, address: u8, register: u8, value: u8) -> Result<()> {
        let mut data = [value, 0];
        self.transact(address, register, Direction::Write, SizeClass::Byte, &mut data)
    }

    fn read_word(&self, address: u8, register: u8) -> Result<u16> {
        let mut data = [0; 2];
        self.transact(address, register, Direction::Read, SizeClass::Word, &mut data)?;
        Ok(u16::from_be_bytes(data))
    }

    fn write_word(&self, address: u8, register: u8, value: u16) -> Result<()> {
        let mut data = value.to_be_bytes();
        self.transact(address, register, Direction::Write, SizeClass::Word, &mut data)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    /// Register file that counts selections and can be told to fail.
    #[derive(Debug, Default)]
    struct MockDevice {
        selected: Option<u8>,
        selects: usize,
        fail_select: bool,
        fail_transfer: bool,
        registers: HashMap<(u8, u8), [u8; 2]>,
        last_write: Option<(u8, u8, SizeClass, [u8; 2])>,
    }

    impl Device for MockDevice {
        fn select(&mut self, address: u8) -> io::Result<()> {
            self.selects += 1;
            if self.fail_select {
                return Err(io::Error::from_raw_os_error(16));
            }
            self.selected = Some(address);
            Ok(())
        }

        fn smbus_access(
            &mut self,
            direction: Direction,
            register: u8,
            size: SizeClass,
            data: &mut [u8; 2],
        ) -> io::Result<()> {
            if self.fail_transfer {
                return Err(io::Error::from_raw_os_error(121));
            }
            let address = self.selected.expect("transfer before select");
            match direction {
                Direction::Write => {
                    self.registers.insert((address, register), *data);
                    self.last_write = Some((address, register, size, *data));
                }
                Direction::Read => {
                    *data = self
                        .registers
                        .get(&(address, register))
                        .copied()
                        .unwrap_or_default();
                }
            }
            Ok(())
        }
    }

    #[test]
    fn same_address_selects_once() {
        let bus = Smbus::with_device(MockDevice::default());
        bus.write_byte(0x18, 0x08, 0x03).unwrap();
        bus.read_byte(0x18, 0x08).unwrap();
        bus.read_word(0x18, 0x05).unwrap();
        assert_eq!(bus.into_inner().selects, 1);
    }

    #[test]
    fn switching_address_reselects_once() {
        let bus = Smbus::with_device(MockDevice::default());
        bus.read_byte(0x18, 0x00).unwrap();
        bus.read_byte(0x19, 0x00).unwrap();
        bus.read_byte(0x19, 0x01).unwrap();
        bus.read_byte(0x18, 0x00).unwrap();
        assert_eq!(bus.into_inner().selects, 3);
    }

    #[test]
    fn address_zero_is_selected() {
        let bus = Smbus::with_device(MockDevice::default());
        bus.write_byte(0x00, 0x01, 0xAA).unwrap();
        let dev = bus.into_inner();
        assert_eq!(dev.selects, 1);
        assert_eq!(dev.selected, Some(0x00));
    }

    #[test]
    fn failed_select_leaves_cache_untouched() {
        let bus = Smbus::with_device(MockDevice {
            fail_select: true,
            ..MockDevice::default()
        });
        let err = bus.read_byte(0x18, 0x05).unwrap_err();
        match err {
            Error::AddressSelect { address, source } => {
                assert_eq!(address, 0x18);
                assert_eq!(source.raw_os_error(), Some(16));
            }
            other => panic!("expected AddressSelect, got {other:?}"),
        }
        assert!(bus.lock().selected.is_none());

        bus.lock().device.fail_select = false;
        bus.read_byte(0x18, 0x05).unwrap();
        assert_eq!(bus.into_inner().selects, 2);
    }

    #[test]
    fn transfer_error_carries_system_error() {
        let bus = Smbus::with_device(MockDevice {
            fail_transfer: true,
            ..MockDevice::default()
        });
        match bus.write_word(0x40, 0x02, 0x1234).unwrap_err() {
            Error::Transfer {
                address,
                register,
                source,
            } => {
                assert_eq!((address, register), (0x40, 0x02));
                assert_eq!(source.raw_os_error(), Some(121));
            }
            other => panic!("expected Transfer, got {other:?}"),
        }
        // Selection succeeded, so the cache still holds the address.
        assert_eq!(bus.lock().selected, Some(0x40));
    }

    #[test]
    fn words_are_most_significant_byte_first() {
        let bus = Smbus::with_device(MockDevice::default());
        bus.write_word(0x18, 0x05, 0x0A3C).unwrap();
        assert_eq!(
            bus.lock().device.last_write,
            Some((0x18, 0x05, SizeClass::Word, [0x0A, 0x3C]))
        );

        bus.lock().device.registers.insert((0x18, 0x06), [0x00, 0x54]);
        assert_eq!(bus.read_word(0x18, 0x06).unwrap(), 0x0054);
    }

    #[test]
    fn byte_write_uses_first_payload_byte() {
        let bus = Smbus::with_device(MockDevice::default());
        bus.write_byte(0x18, 0x08, 0x03).unwrap();
        assert_eq!(
            bus.lock().device.last_write,
            Some((0x18, 0x08, SizeClass::Byte, [0x03, 0x00]))
        );
        assert_eq!(bus.read_byte(0x18, 0x08).unwrap(), 0x03);
    }

    #[test]
    fn roundtrip_through_transport() {
        let bus = Smbus::with_device(MockDevice::default());
        for (addr, reg, val) in [(0x18u8, 0x01u8, 0x00u8), (0x40, 0x7F, 0xFF), (0x77, 0x00, 0x5A)] {
            bus.write_byte(addr, reg, val).unwrap();
            assert_eq!(bus.read_byte(addr, reg).unwrap(), val);
        }
        for (addr, reg, val) in [(0x18u8, 0x02u8, 0x0000u16), (0x48, 0x10, 0xFFFF), (0x50, 0x20, 0x8001)] {
            bus.write_word(addr, reg, val).unwrap();
            assert_eq!(bus.read_word(addr, reg).unwrap(), val);
        }
    }
}
