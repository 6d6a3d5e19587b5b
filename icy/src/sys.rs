//! Linux `i2c-dev` ioctl bindings.
//!
//! Constants and layouts follow `include/uapi/linux/i2c.h` and
//! `include/uapi/linux/i2c-dev.h`.

#![allow(unsafe_code)]

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::path::Path;

use nix::fcntl::{Flock, FlockArg};

use crate::smbus::{Device, Direction, SizeClass};
use crate::{Error, Result};

/// `I2C_SLAVE`: set the slave address for subsequent transactions.
const I2C_SLAVE: u16 = 0x0703;
/// `I2C_SMBUS`: perform one SMBus transaction.
const I2C_SMBUS: u16 = 0x0720;

/// `I2C_SMBUS_READ` / `I2C_SMBUS_WRITE`.
const I2C_SMBUS_READ: u8 = 1;
/// See [`I2C_SMBUS_READ`].
const I2C_SMBUS_WRITE: u8 = 0;

/// `I2C_SMBUS_BYTE_DATA` transaction size.
const I2C_SMBUS_BYTE_DATA: u32 = 2;
/// `I2C_SMBUS_WORD_DATA` transaction size.
const I2C_SMBUS_WORD_DATA: u32 = 3;

/// `I2C_SMBUS_BLOCK_MAX + 2`: size of `union i2c_smbus_data`.
const SMBUS_DATA_LEN: usize = 34;

/// `union i2c_smbus_data`, viewed as its block member.
#[repr(C, align(2))]
struct SmbusData {
    /// Raw union storage.
    block: [u8; SMBUS_DATA_LEN],
}

/// `struct i2c_smbus_ioctl_data`. Only the kernel reads its fields.
#[repr(C)]
#[allow(dead_code)]
struct SmbusIoctlData {
    /// [`I2C_SMBUS_READ`] or [`I2C_SMBUS_WRITE`].
    read_write: u8,
    /// Register (SMBus "command").
    command: u8,
    /// Transaction size.
    size: u32,
    /// Payload, read or written by the kernel.
    data: *mut SmbusData,
}

nix::ioctl_write_int_bad!(
    /// Issues `I2C_SLAVE` on `fd`.
    i2c_slave,
    I2C_SLAVE
);
nix::ioctl_write_ptr_bad!(
    /// Issues `I2C_SMBUS` on `fd`.
    i2c_smbus,
    I2C_SMBUS,
    SmbusIoctlData
);

/// An open, exclusively locked `/dev/i2c-N` device.
pub struct I2cDev {
    /// Device file holding an exclusive advisory lock.
    file: Flock<File>,
}

impl fmt::Debug for I2cDev {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("I2cDev")
            .field("fd", &self.file.as_raw_fd())
            .finish()
    }
}

impl I2cDev {
    /// Opens the device at `path` read/write and locks it exclusively.
    ///
    /// The lock is advisory: it keeps other icy processes off the bus,
    /// not arbitrary programs.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let open_err = |source| Error::DeviceOpen {
            path: path.to_path_buf(),
            source,
        };
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(open_err)?;
        let file = Flock::lock(file, FlockArg::LockExclusiveNonblock)
            .map_err(|(_, errno)| open_err(io::Error::from(errno)))?;
        Ok(Self { file })
    }
}

impl Device for I2cDev {
    fn select(&mut self, address: u8) -> io::Result<()> {
        // SAFETY: the fd is open for the lifetime of `self`; I2C_SLAVE takes
        // the address by value.
        unsafe { i2c_slave(self.file.as_raw_fd(), i32::from(address)) }?;
        Ok(())
    }

    fn smbus_access(
        &mut self,
        direction: Direction,
        register: u8,
        size: SizeClass,
        data: &mut [u8; 2],
    ) -> io::Result<()> {
        let mut block = SmbusData {
            block: [0; SMBUS_DATA_LEN],
        };
        block.block[..2].copy_from_slice(data);

        let args = SmbusIoctlData {
            read_write: match direction {
                Direction::Read => I2C_SMBUS_READ,
                Direction::Write => I2C_SMBUS_WRITE,
            },
            command: register,
            size: match size {
                SizeClass::Byte => I2C_SMBUS_BYTE_DATA,
                SizeClass::Word => I2C_SMBUS_WORD_DATA,
            },
            data: &raw mut block,
        };

        // SAFETY: `args` and `block` outlive the call, and `block` is the
        // full size of `union i2c_smbus_data`, so the kernel never writes
        // past it.
        unsafe { i2c_smbus(self.file.as_raw_fd(), &raw const args) }?;

        data.copy_from_slice(&block.block[..2]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Bus, Smbus};

    #[test]
    fn missing_device_is_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("i2c-99");
        match Smbus::open_path(&path).unwrap_err() {
            Error::DeviceOpen { path: p, source } => {
                assert_eq!(p, path);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("expected DeviceOpen, got {other:?}"),
        }
    }

    #[test]
    fn second_open_is_refused() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let _first = Smbus::open_path(file.path()).unwrap();
        assert!(matches!(
            Smbus::open_path(file.path()),
            Err(Error::DeviceOpen { .. })
        ));
    }

    #[test]
    fn non_bus_file_rejects_selection() {
        // A regular file opens fine but has no i2c ioctls.
        let file = tempfile::NamedTempFile::new().unwrap();
        let bus = Smbus::open_path(file.path()).unwrap();
        match bus.read_byte(0x18, 0x05).unwrap_err() {
            Error::AddressSelect { address, source } => {
                assert_eq!(address, 0x18);
                assert!(source.raw_os_error().is_some());
            }
            other => panic!("expected AddressSelect, got {other:?}"),
        }
    }
}
