//! Driver for the Microchip MCP9808 digital temperature sensor.

use crate::{Bus, Error, Result};

/// Default slave address (A2..A0 tied low).
pub const ADDRESS: u8 = 0x18;

/// Alert upper boundary register.
pub const REG_UPPER_TEMP: u8 = 0x02;
/// Alert lower boundary register.
pub const REG_LOWER_TEMP: u8 = 0x03;
/// Critical temperature register.
pub const REG_CRIT_TEMP: u8 = 0x04;
/// Ambient temperature register.
pub const REG_AMBIENT_TEMP: u8 = 0x05;
/// Manufacturer ID register.
pub const REG_MANUF_ID: u8 = 0x06;
/// Device ID / revision register.
pub const REG_DEVICE_ID: u8 = 0x07;
/// Resolution register.
pub const REG_RESOLUTION: u8 = 0x08;

/// Expected manufacturer ID.
pub const MANUF_ID: u16 = 0x0054;
/// Expected device ID; the low byte is the silicon revision.
pub const DEVICE_ID: u16 = 0x0400;

/// Temperature conversion resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Resolution {
    /// +0.5 °C
    Low = 0,
    /// +0.25 °C
    Medium = 1,
    /// +0.125 °C
    High = 2,
    /// +0.0625 °C (power-up default)
    VeryHigh = 3,
}

impl Resolution {
    /// Step size in degrees Celsius.
    pub const fn step(self) -> f64 {
        match self {
            Self::Low => 0.5,
            Self::Medium => 0.25,
            Self::High => 0.125,
            Self::VeryHigh => 0.0625,
        }
    }
}

impl TryFrom<u8> for Resolution {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::Low),
            1 => Ok(Self::Medium),
            2 => Ok(Self::High),
            3 => Ok(Self::VeryHigh),
            other => Err(Error::UnsupportedResolution(other)),
        }
    }
}

/// An MCP9808 reached through any [`Bus`].
#[derive(Debug)]
pub struct Mcp9808<B> {
    /// The bus the sensor sits on.
    bus: B,
    /// Slave address.
    address: u8,
}

impl<B: Bus> Mcp9808<B> {
    /// Sensor at the default address.
    pub const fn new(bus: B) -> Self {
        Self::with_address(bus, ADDRESS)
    }

    /// Sensor at a strapped address (`0x18..=0x1F`).
    pub const fn with_address(bus: B, address: u8) -> Self {
        Self { bus, address }
    }

    /// Releases the bus.
    pub fn into_inner(self) -> B {
        self.bus
    }

    /// Raw manufacturer ID.
    pub fn manufacturer(&self) -> Result<u16> {
        self.bus.read_word(self.address, REG_MANUF_ID)
    }

    /// Raw device ID and revision.
    pub fn device(&self) -> Result<u16> {
        self.bus.read_word(self.address, REG_DEVICE_ID)
    }

    /// Whether the IDs identify an MCP9808, ignoring the revision byte.
    pub fn identify(&self) -> Result<bool> {
        Ok(self.manufacturer()? == MANUF_ID && (self.device()? & 0xFF00) == DEVICE_ID)
    }

    /// Ambient temperature in degrees Celsius.
    pub fn temperature(&self) -> Result<f64> {
        self.bus
            .read_word(self.address, REG_AMBIENT_TEMP)
            .map(decode_temperature)
    }

    /// Current conversion resolution.
    pub fn resolution(&self) -> Result<Resolution> {
        Resolution::try_from(self.bus.read_byte(self.address, REG_RESOLUTION)?)
    }

    /// Sets the conversion resolution.
    pub fn set_resolution(&self, resolution: Resolution) -> Result<()> {
        self.bus
            .write_byte(self.address, REG_RESOLUTION, resolution as u8)
    }
}

/// Converts a raw ambient temperature word: 12 bits of 1/16 °C plus a sign
/// bit at `0x1000`. Alert flag bits are ignored.
pub fn decode_temperature(word: u16) -> f64 {
    let t = f64::from(word & 0x0FFF) / 16.0;
    if word & 0x1000 == 0 { t } else { t - 256.0 }
}
