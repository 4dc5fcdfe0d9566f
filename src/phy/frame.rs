// Frame header layout and per-frame coding properties
// Coded header: [Id:4] [Counter:4 BE] [Version:1] [PayloadLen:2 BE] [Crc:1] [Inner<<4 | Outer:1]

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use super::crc::CrcScheme;
use crate::error::ConfigError;
use crate::error_correction::FecScheme;
use crate::utils::consts::{
    HEADER_PROTOCOL_LEN, HEADER_USER_LEN, ID_LEN, MAX_SPREADING_FACTOR, MIN_SPREADING_FACTOR,
    PROTOCOL_VERSION,
};

/// User section of the header: session Id and frame counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameHeader {
    pub id: [u8; ID_LEN],
    pub counter: u32,
}

impl FrameHeader {
    pub fn new(id: [u8; ID_LEN], counter: u32) -> Self {
        Self { id, counter }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_USER_LEN] {
        let mut bytes = [0u8; HEADER_USER_LEN];
        bytes[..ID_LEN].copy_from_slice(&self.id);
        let mut cursor = Cursor::new(&mut bytes[ID_LEN..]);
        // the slice is exactly four bytes long
        let _ = cursor.write_u32::<BigEndian>(self.counter);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_USER_LEN {
            return None;
        }
        let mut id = [0u8; ID_LEN];
        id.copy_from_slice(&bytes[..ID_LEN]);
        let counter = Cursor::new(&bytes[ID_LEN..HEADER_USER_LEN])
            .read_u32::<BigEndian>()
            .ok()?;
        Some(Self { id, counter })
    }
}

/// Zero-padded Id bytes from a string of at most four bytes.
pub fn parse_id(id: &str) -> Result<[u8; ID_LEN], ConfigError> {
    if id.len() > ID_LEN {
        return Err(ConfigError::IdTooLong(id.to_string()));
    }
    let mut bytes = [0u8; ID_LEN];
    bytes[..id.len()].copy_from_slice(id.as_bytes());
    Ok(bytes)
}

/// Printable form of an Id, trailing padding removed
pub fn display_id(id: &[u8; ID_LEN]) -> String {
    let end = id.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&id[..end]).into_owned()
}

/// CRC and FEC applied to one coded section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameProperties {
    pub crc: CrcScheme,
    pub inner_fec: FecScheme,
    pub outer_fec: FecScheme,
}

impl FrameProperties {
    pub fn new(crc: CrcScheme, inner_fec: FecScheme, outer_fec: FecScheme) -> Self {
        Self {
            crc,
            inner_fec,
            outer_fec,
        }
    }
}

/// Shared by the frame generator and synchronizer of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    pub spreading_factor: usize,
    /// Length of the user header section
    pub header_len: usize,
    /// Largest payload; also assumed when a header fails its check
    pub max_payload: usize,
    pub header: FrameProperties,
    pub payload: FrameProperties,
}

impl FrameConfig {
    pub fn new(
        spreading_factor: usize,
        properties: FrameProperties,
        max_payload: usize,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            spreading_factor,
            header_len: HEADER_USER_LEN,
            max_payload,
            header: properties,
            payload: properties,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_SPREADING_FACTOR..=MAX_SPREADING_FACTOR).contains(&self.spreading_factor) {
            return Err(ConfigError::InvalidSpreadingFactor(self.spreading_factor));
        }
        if self.max_payload == 0 || self.max_payload > u16::MAX as usize {
            return Err(ConfigError::InvalidPayloadCapacity(self.max_payload));
        }
        Ok(())
    }

    /// Bytes in the coded header message (user + protocol sections)
    pub fn coded_header_len(&self) -> usize {
        self.header_len + HEADER_PROTOCOL_LEN
    }
}

/// Protocol section appended to the user header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolSection {
    pub payload_len: usize,
    pub payload: FrameProperties,
}

impl ProtocolSection {
    pub fn to_bytes(&self) -> [u8; HEADER_PROTOCOL_LEN] {
        let len = self.payload_len as u16;
        [
            PROTOCOL_VERSION,
            (len >> 8) as u8,
            (len & 0xFF) as u8,
            self.payload.crc.id(),
            (self.payload.inner_fec.id() << 4) | (self.payload.outer_fec.id() & 0x0F),
        ]
    }

    /// `None` for an unknown version or scheme, or a length above `max_payload`
    pub fn parse(bytes: &[u8], max_payload: usize) -> Option<Self> {
        if bytes.len() < HEADER_PROTOCOL_LEN || bytes[0] != PROTOCOL_VERSION {
            return None;
        }
        let payload_len = ((bytes[1] as usize) << 8) | bytes[2] as usize;
        if payload_len > max_payload {
            return None;
        }
        let payload = FrameProperties {
            crc: CrcScheme::from_id(bytes[3])?,
            inner_fec: FecScheme::from_id(bytes[4] >> 4)?,
            outer_fec: FecScheme::from_id(bytes[4] & 0x0F)?,
        };
        Some(Self {
            payload_len,
            payload,
        })
    }
}
