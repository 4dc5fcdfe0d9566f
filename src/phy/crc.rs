// Frame integrity checks and bit packing helpers
// CRC8 polynomial: x^8 + x^2 + x + 1 (0x07); CRC32 is IEEE 802.3

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

const CRC8_POLYNOMIAL: u8 = 0x07;

/// Calculate CRC8 checksum for given data
pub fn calculate_crc8(data: &[u8]) -> u8 {
    let mut crc: u8 = 0x00;

    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            if (crc & 0x80) != 0 {
                crc = (crc << 1) ^ CRC8_POLYNOMIAL;
            } else {
                crc <<= 1;
            }
        }
    }

    crc
}

pub fn calculate_crc32(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Integrity check appended to every coded header and payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrcScheme {
    None,
    Crc8,
    #[default]
    Crc32,
}

impl CrcScheme {
    pub const ALL: [CrcScheme; 3] = [CrcScheme::None, CrcScheme::Crc8, CrcScheme::Crc32];

    pub fn name(self) -> &'static str {
        match self {
            CrcScheme::None => "none",
            CrcScheme::Crc8 => "crc8",
            CrcScheme::Crc32 => "crc32",
        }
    }

    /// Identifier carried in the header's protocol section
    pub fn id(self) -> u8 {
        match self {
            CrcScheme::None => 0,
            CrcScheme::Crc8 => 1,
            CrcScheme::Crc32 => 2,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|scheme| scheme.id() == id)
    }

    pub fn len(self) -> usize {
        match self {
            CrcScheme::None => 0,
            CrcScheme::Crc8 => 1,
            CrcScheme::Crc32 => 4,
        }
    }

    /// Big-endian check bytes for `data`
    pub fn compute(self, data: &[u8]) -> Vec<u8> {
        match self {
            CrcScheme::None => Vec::new(),
            CrcScheme::Crc8 => vec![calculate_crc8(data)],
            CrcScheme::Crc32 => calculate_crc32(data).to_be_bytes().to_vec(),
        }
    }

    pub fn append(self, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(data.len() + self.len());
        out.extend_from_slice(data);
        out.extend(self.compute(data));
        out
    }

    /// Splits `data || check` and verifies the check.
    pub fn verify(self, coded: &[u8]) -> (Vec<u8>, bool) {
        if coded.len() < self.len() {
            return (coded.to_vec(), false);
        }
        let (data, check) = coded.split_at(coded.len() - self.len());
        (data.to_vec(), self.compute(data) == check)
    }
}

impl fmt::Display for CrcScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CrcScheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scheme| scheme.name() == s)
            .ok_or_else(|| ConfigError::UnknownCrc(s.to_string()))
    }
}

/// Convert byte to bit array (MSB first)
pub fn byte_to_bits(byte: u8) -> [u8; 8] {
    let mut bits = [0u8; 8];
    for (i, bit) in bits.iter_mut().enumerate() {
        *bit = (byte >> (7 - i)) & 1;
    }
    bits
}

/// Convert bit array to byte (MSB first)
pub fn bits_to_byte(bits: &[u8]) -> u8 {
    let mut byte = 0u8;
    for (i, &bit) in bits.iter().enumerate().take(8) {
        if bit != 0 {
            byte |= 1 << (7 - i);
        }
    }
    byte
}

/// Convert bytes to bit vector
pub fn bytes_to_bits(bytes: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity(bytes.len() * 8);
    for &byte in bytes {
        bits.extend_from_slice(&byte_to_bits(byte));
    }
    bits
}

/// Convert bit vector to bytes, zero-padding the last byte
pub fn bits_to_bytes(bits: &[u8]) -> Vec<u8> {
    bits.chunks(8).map(bits_to_byte).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc8() {
        let data = b"Hello, World!";
        let (_, ok) = CrcScheme::Crc8.verify(&CrcScheme::Crc8.append(data));
        assert!(ok);

        let mut modified = CrcScheme::Crc8.append(data);
        modified[0] = b'h';
        assert!(!CrcScheme::Crc8.verify(&modified).1);
    }

    #[test]
    fn test_crc32_known_value() {
        assert_eq!(calculate_crc32(b"123456789"), 0xCBF4_3926);
        let coded = CrcScheme::Crc32.append(b"123456789");
        assert_eq!(&coded[9..], &[0xCB, 0xF4, 0x39, 0x26]);
        let (data, ok) = CrcScheme::Crc32.verify(&coded);
        assert!(ok);
        assert_eq!(data, b"123456789");
    }

    #[test]
    fn test_crc_none_always_passes() {
        let (data, ok) = CrcScheme::None.verify(b"abc");
        assert!(ok);
        assert_eq!(data, b"abc");
    }

    #[test]
    fn test_scheme_names_and_ids() {
        for scheme in CrcScheme::ALL {
            assert_eq!(scheme.name().parse::<CrcScheme>().unwrap(), scheme);
            assert_eq!(CrcScheme::from_id(scheme.id()), Some(scheme));
        }
        assert!("crc64".parse::<CrcScheme>().is_err());
    }

    #[test]
    fn test_bit_conversion() {
        let byte = 0b10110011;
        let bits = byte_to_bits(byte);
        assert_eq!(bits, [1, 0, 1, 1, 0, 0, 1, 1]);
        assert_eq!(bits_to_byte(&bits), byte);
        assert_eq!(bits_to_bytes(&[1, 0, 1]), vec![0b1010_0000]);
    }
}
