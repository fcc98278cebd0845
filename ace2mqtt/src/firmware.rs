use std::fmt;

use crate::error::DecodeError;

/// Firmware version as packed by the hub into `masterFirmwareVersion`:
/// bits 12-15 major, bits 8-11 minor, bits 0-7 build.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub build: u8,
}

impl FirmwareVersion {
    pub fn decode(raw: u16) -> Self {
        Self {
            major: ((raw & 0xf000) >> 12) as u8,
            minor: ((raw & 0x0f00) >> 8) as u8,
            build: (raw & 0x00ff) as u8,
        }
    }
}

impl From<u16> for FirmwareVersion {
    fn from(raw: u16) -> Self {
        Self::decode(raw)
    }
}

impl TryFrom<i64> for FirmwareVersion {
    type Error = DecodeError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        u16::try_from(raw)
            .map(Self::decode)
            .map_err(|_| DecodeError::FirmwareOutOfRange(raw))
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}
