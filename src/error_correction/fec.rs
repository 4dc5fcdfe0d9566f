use std::fmt;
use std::str::FromStr;

use super::convolutional::{ConvolutionalCode, V27, V29, V39};
use super::golay::{self, GolayCode};
use super::hamming::{BlockStatus, HammingCode};
use super::reed_solomon::{RS_BLOCK_DATA, RS_ECC_LEN, ReedSolomonDecoder, ReedSolomonEncoder};
use crate::error::ConfigError;
use crate::phy::crc::{bits_to_bytes, bytes_to_bits};

/// Forward error correction scheme, selected by name.
///
/// Every scheme maps a bit vector of known length to a coded vector whose
/// length depends only on the input length; the last block is zero padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FecScheme {
    #[default]
    None,
    Rep3,
    Rep5,
    Hamming74,
    Hamming84,
    Hamming128,
    Secded2216,
    Secded3932,
    Secded7264,
    Rs8,
    Golay2412,
    Conv27,
    Conv29,
    Conv39,
}

impl FecScheme {
    pub const ALL: [FecScheme; 14] = [
        FecScheme::None,
        FecScheme::Rep3,
        FecScheme::Rep5,
        FecScheme::Hamming74,
        FecScheme::Hamming84,
        FecScheme::Hamming128,
        FecScheme::Secded2216,
        FecScheme::Secded3932,
        FecScheme::Secded7264,
        FecScheme::Rs8,
        FecScheme::Golay2412,
        FecScheme::Conv27,
        FecScheme::Conv29,
        FecScheme::Conv39,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FecScheme::None => "none",
            FecScheme::Rep3 => "rep3",
            FecScheme::Rep5 => "rep5",
            FecScheme::Hamming74 => "h74",
            FecScheme::Hamming84 => "h84",
            FecScheme::Hamming128 => "h128",
            FecScheme::Secded2216 => "secded2216",
            FecScheme::Secded3932 => "secded3932",
            FecScheme::Secded7264 => "secded7264",
            FecScheme::Rs8 => "rs8",
            FecScheme::Golay2412 => "g2412",
            FecScheme::Conv27 => "v27",
            FecScheme::Conv29 => "v29",
            FecScheme::Conv39 => "v39",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            FecScheme::None => "no error-correction",
            FecScheme::Rep3 => "simple repeat code, r1/3",
            FecScheme::Rep5 => "simple repeat code, r1/5",
            FecScheme::Hamming74 => "Hamming (7,4) block code, r1/2 (really 4/7)",
            FecScheme::Hamming84 => "Hamming (8,4) block code, r1/2",
            FecScheme::Hamming128 => "Hamming (12,8) block code, r2/3",
            FecScheme::Secded2216 => "SEC-DED (22,16) block code, r8/11",
            FecScheme::Secded3932 => "SEC-DED (39,32) block code",
            FecScheme::Secded7264 => "SEC-DED (72,64) block code, r8/9",
            FecScheme::Rs8 => "Reed-Solomon, 223/255",
            FecScheme::Golay2412 => "Golay (24,12) block code, r1/2",
            FecScheme::Conv27 => "convolutional code, r1/2, K=7, dfree=10",
            FecScheme::Conv29 => "convolutional code, r1/2, K=9, dfree=12",
            FecScheme::Conv39 => "convolutional code, r1/3, K=9, dfree=18",
        }
    }

    /// 4-bit identifier carried in the header's protocol section
    pub fn id(self) -> u8 {
        Self::ALL
            .iter()
            .position(|&scheme| scheme == self)
            .unwrap_or(0) as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    fn hamming(self) -> Option<HammingCode> {
        match self {
            FecScheme::Hamming74 => Some(HammingCode::new(4, false)),
            FecScheme::Hamming84 => Some(HammingCode::new(4, true)),
            FecScheme::Hamming128 => Some(HammingCode::new(8, false)),
            FecScheme::Secded2216 => Some(HammingCode::new(16, true)),
            FecScheme::Secded3932 => Some(HammingCode::new(32, true)),
            FecScheme::Secded7264 => Some(HammingCode::new(64, true)),
            _ => None,
        }
    }

    fn convolutional(self) -> Option<ConvolutionalCode> {
        match self {
            FecScheme::Conv27 => Some(V27),
            FecScheme::Conv29 => Some(V29),
            FecScheme::Conv39 => Some(V39),
            _ => None,
        }
    }

    fn repetitions(self) -> usize {
        match self {
            FecScheme::Rep3 => 3,
            FecScheme::Rep5 => 5,
            _ => 1,
        }
    }

    /// Coded length in bits for a message of `msg_bits` bits
    pub fn encoded_bits(self, msg_bits: usize) -> usize {
        if let Some(code) = self.hamming() {
            return msg_bits.div_ceil(code.data_bits()) * code.block_bits();
        }
        if let Some(code) = self.convolutional() {
            return code.encoded_bits(msg_bits);
        }
        match self {
            FecScheme::Golay2412 => msg_bits.div_ceil(golay::DATA_BITS) * golay::BLOCK_BITS,
            FecScheme::Rs8 => {
                let msg_bytes = msg_bits.div_ceil(8);
                let blocks = msg_bytes.div_ceil(RS_BLOCK_DATA);
                8 * (msg_bytes + blocks * RS_ECC_LEN)
            }
            _ => msg_bits * self.repetitions(),
        }
    }

    pub fn encode(self, bits: &[u8]) -> Vec<u8> {
        if let Some(code) = self.hamming() {
            let mut out = Vec::with_capacity(self.encoded_bits(bits.len()));
            let mut block = vec![0u8; code.data_bits()];
            for chunk in bits.chunks(code.data_bits()) {
                block.fill(0);
                block[..chunk.len()].copy_from_slice(chunk);
                code.encode_block(&block, &mut out);
            }
            return out;
        }
        if let Some(code) = self.convolutional() {
            return code.encode(bits);
        }
        match self {
            FecScheme::Golay2412 => {
                let code = GolayCode::new();
                let mut out = Vec::with_capacity(self.encoded_bits(bits.len()));
                let mut block = [0u8; golay::DATA_BITS];
                for chunk in bits.chunks(golay::DATA_BITS) {
                    block.fill(0);
                    block[..chunk.len()].copy_from_slice(chunk);
                    code.encode_block(&block, &mut out);
                }
                out
            }
            FecScheme::Rs8 => {
                let encoder = ReedSolomonEncoder::new(RS_ECC_LEN);
                bytes_to_bits(&encoder.encode_blocks(&bits_to_bytes(bits)))
            }
            _ => {
                let repetitions = self.repetitions();
                bits.iter()
                    .flat_map(|&bit| std::iter::repeat_n(bit, repetitions))
                    .collect()
            }
        }
    }

    /// Decodes `coded` (exactly `encoded_bits(msg_bits)` bits) back to
    /// `msg_bits` bits. Uncorrectable blocks are passed through as received.
    pub fn decode(self, coded: &[u8], msg_bits: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(msg_bits + 64);
        if let Some(code) = self.hamming() {
            let mut uncorrectable = 0;
            for block in coded.chunks_exact(code.block_bits()) {
                if code.decode_block(block, &mut out) == BlockStatus::Uncorrectable {
                    uncorrectable += 1;
                }
            }
            if uncorrectable > 0 {
                tracing::trace!("{}: {} uncorrectable blocks", self.name(), uncorrectable);
            }
        } else if let Some(code) = self.convolutional() {
            out = code.decode(coded);
        } else if self == FecScheme::Golay2412 {
            let code = GolayCode::new();
            let uncorrectable = coded
                .chunks_exact(golay::BLOCK_BITS)
                .filter(|block| code.decode_block(block, &mut out) == BlockStatus::Uncorrectable)
                .count();
            if uncorrectable > 0 {
                tracing::trace!("{}: {} uncorrectable blocks", self.name(), uncorrectable);
            }
        } else if self == FecScheme::Rs8 {
            let decoder = ReedSolomonDecoder::new(RS_ECC_LEN);
            let result = decoder.decode_blocks(&bits_to_bytes(coded), msg_bits.div_ceil(8));
            out = bytes_to_bits(&result.data);
        } else {
            let repetitions = self.repetitions();
            out.extend(coded.chunks_exact(repetitions).map(|copies| {
                let ones = copies.iter().filter(|&&bit| bit != 0).count();
                u8::from(2 * ones > repetitions)
            }));
        }
        out.resize(msg_bits, 0);
        out
    }
}

impl fmt::Display for FecScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FecScheme {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scheme| scheme.name() == s)
            .ok_or_else(|| ConfigError::UnknownFec(s.to_string()))
    }
}

/// Human readable list of the schemes, one per line
pub fn available_codes() -> String {
    FecScheme::ALL
        .iter()
        .map(|scheme| format!("  {:<12} {}", scheme.name(), scheme.description()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(bits: usize) -> Vec<u8> {
        (0..bits).map(|i| ((i * 31 + 7) % 11 % 2) as u8).collect()
    }

    #[test]
    fn test_names_and_ids_are_unique() {
        for scheme in FecScheme::ALL {
            assert_eq!(scheme.name().parse::<FecScheme>().unwrap(), scheme);
            assert_eq!(FecScheme::from_id(scheme.id()), Some(scheme));
            assert!(scheme.id() < 16);
        }
        assert!(matches!("v615".parse::<FecScheme>(), Err(ConfigError::UnknownFec(_))));
    }

    #[test]
    fn test_clean_channel_for_every_scheme() {
        for scheme in FecScheme::ALL {
            for bits in [8, 104, 1000] {
                let msg = message(bits);
                let coded = scheme.encode(&msg);
                assert_eq!(coded.len(), scheme.encoded_bits(bits), "{scheme}");
                assert_eq!(scheme.decode(&coded, bits), msg, "{scheme}");
            }
        }
    }

    #[test]
    fn test_secded3932_corrects_one_error_per_block() {
        let scheme = FecScheme::Secded3932;
        let msg = message(832);
        let mut coded = scheme.encode(&msg);
        assert_eq!(coded.len(), 26 * 39);
        for block in 0..26 {
            coded[block * 39 + (block * 5) % 39] ^= 1;
        }
        assert_eq!(scheme.decode(&coded, 832), msg);
    }

    #[test]
    fn test_repetition_majority() {
        let msg = message(40);
        let mut coded = FecScheme::Rep5.encode(&msg);
        for i in (0..coded.len()).step_by(5) {
            coded[i] ^= 1;
            coded[i + 3] ^= 1;
        }
        assert_eq!(FecScheme::Rep5.decode(&coded, 40), msg);
    }

    #[test]
    fn test_rs8_corrects_byte_errors() {
        let msg = message(8 * 300);
        let mut coded = FecScheme::Rs8.encode(&msg);
        assert_eq!(coded.len(), 8 * (300 + 2 * 32));
        // flip a handful of whole bytes in the first block
        for byte in [0usize, 10, 100, 200] {
            for bit in 0..8 {
                coded[byte * 8 + bit] ^= 1;
            }
        }
        assert_eq!(FecScheme::Rs8.decode(&coded, msg.len()), msg);
    }

    #[test]
    fn test_golay_corrects_three_errors_per_block() {
        let scheme = FecScheme::Golay2412;
        let msg = message(120);
        let mut coded = scheme.encode(&msg);
        assert_eq!(coded.len(), 10 * 24);
        for block in 0..10 {
            for offset in [1, 9, 17] {
                coded[block * 24 + (offset + block) % 24] ^= 1;
            }
        }
        assert_eq!(scheme.decode(&coded, 120), msg);
    }

    #[test]
    fn test_convolutional_codes_survive_sparse_errors() {
        for scheme in [FecScheme::Conv27, FecScheme::Conv29, FecScheme::Conv39] {
            let msg = message(500);
            let mut coded = scheme.encode(&msg);
            for i in (7..coded.len()).step_by(25) {
                coded[i] ^= 1;
            }
            assert_eq!(scheme.decode(&coded, 500), msg, "{scheme}");
        }
    }

    #[test]
    fn test_available_codes_lists_every_name() {
        let listing = available_codes();
        for scheme in FecScheme::ALL {
            assert!(listing.contains(scheme.name()));
        }
    }
}
