// CRC + two-stage FEC + QPSK mapping for one header or payload section

use num_complex::Complex32;
use std::f32::consts::FRAC_1_SQRT_2;

use super::crc::{bits_to_bytes, bytes_to_bits};
use super::frame::FrameProperties;

/// Codes messages of a fixed length. Encode order is
/// message -> CRC append -> inner FEC -> outer FEC -> QPSK; decode reverses it.
#[derive(Debug, Clone)]
pub struct SymbolCoder {
    props: FrameProperties,
    msg_len: usize,
    crc_bits: usize,
    inner_bits: usize,
    outer_bits: usize,
}

impl SymbolCoder {
    pub fn new(msg_len: usize, props: FrameProperties) -> Self {
        let crc_bits = 8 * (msg_len + props.crc.len());
        let inner_bits = props.inner_fec.encoded_bits(crc_bits);
        let outer_bits = props.outer_fec.encoded_bits(inner_bits);
        Self {
            props,
            msg_len,
            crc_bits,
            inner_bits,
            outer_bits,
        }
    }

    pub fn msg_len(&self) -> usize {
        self.msg_len
    }

    pub fn props(&self) -> FrameProperties {
        self.props
    }

    /// Modulation symbols per coded message (2 bits each)
    pub fn symbol_count(&self) -> usize {
        self.outer_bits.div_ceil(2)
    }

    /// `msg` shorter than the configured length is zero padded, longer is truncated.
    pub fn encode(&self, msg: &[u8]) -> Vec<Complex32> {
        let mut padded = vec![0u8; self.msg_len];
        let n = msg.len().min(self.msg_len);
        padded[..n].copy_from_slice(&msg[..n]);

        let bits = bytes_to_bits(&self.props.crc.append(&padded));
        let inner = self.props.inner_fec.encode(&bits);
        let mut outer = self.props.outer_fec.encode(&inner);
        outer.resize(2 * self.symbol_count(), 0);

        outer.chunks_exact(2).map(|pair| modulate(pair[0], pair[1])).collect()
    }

    /// Hard-decision decode; `valid` reports the CRC after FEC correction.
    pub fn decode(&self, symbols: &[Complex32]) -> (Vec<u8>, bool) {
        let mut bits = Vec::with_capacity(2 * symbols.len());
        for &symbol in symbols {
            let (b0, b1) = demodulate(symbol);
            bits.push(b0);
            bits.push(b1);
        }
        bits.resize(self.outer_bits, 0);

        let inner = self.props.outer_fec.decode(&bits, self.inner_bits);
        let crc_bits = self.props.inner_fec.decode(&inner, self.crc_bits);
        let coded = bits_to_bytes(&crc_bits);
        self.props.crc.verify(&coded)
    }
}

/// First bit on I, second on Q; bit 0 maps to the positive level.
pub fn modulate(b0: u8, b1: u8) -> Complex32 {
    let level = |bit: u8| if bit == 0 { FRAC_1_SQRT_2 } else { -FRAC_1_SQRT_2 };
    Complex32::new(level(b0), level(b1))
}

pub fn demodulate(symbol: Complex32) -> (u8, u8) {
    (u8::from(symbol.re < 0.0), u8::from(symbol.im < 0.0))
}

/// Nearest constellation point
pub fn decide(symbol: Complex32) -> Complex32 {
    let (b0, b1) = demodulate(symbol);
    modulate(b0, b1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_correction::FecScheme;
    use crate::phy::crc::CrcScheme;

    fn props(inner: FecScheme, outer: FecScheme) -> FrameProperties {
        FrameProperties::new(CrcScheme::Crc32, inner, outer)
    }

    #[test]
    fn test_symbol_count_end_to_end_case() {
        // 100 bytes + crc32 = 832 bits -> 26 secded3932 blocks = 1014 bits -> 507 symbols
        let coder = SymbolCoder::new(100, props(FecScheme::None, FecScheme::Secded3932));
        assert_eq!(coder.symbol_count(), 507);
        let header = SymbolCoder::new(13, props(FecScheme::Hamming128, FecScheme::None));
        // 17 bytes -> 136 bits -> 17 h128 blocks = 204 bits -> 102 symbols
        assert_eq!(header.symbol_count(), 102);
    }

    #[test]
    fn test_coded_round_trip() {
        let msg: Vec<u8> = (0..57u8).map(|i| i.wrapping_mul(37)).collect();
        for (inner, outer) in [
            (FecScheme::None, FecScheme::None),
            (FecScheme::Hamming128, FecScheme::None),
            (FecScheme::Hamming74, FecScheme::Rep3),
            (FecScheme::Secded7264, FecScheme::Rs8),
            (FecScheme::Golay2412, FecScheme::Conv29),
        ] {
            let coder = SymbolCoder::new(msg.len(), props(inner, outer));
            let symbols = coder.encode(&msg);
            assert_eq!(symbols.len(), coder.symbol_count());
            let (decoded, valid) = coder.decode(&symbols);
            assert!(valid, "{inner}/{outer}");
            assert_eq!(decoded, msg);
        }
    }

    #[test]
    fn test_symbol_errors_corrected_or_flagged() {
        let msg = b"spread spectrum".to_vec();
        let coded = SymbolCoder::new(msg.len(), props(FecScheme::Hamming128, FecScheme::None));
        let mut symbols = coded.encode(&msg);
        // one flipped I bit in the first Hamming block
        symbols[1].re = -symbols[1].re;
        let (decoded, valid) = coded.decode(&symbols);
        assert!(valid);
        assert_eq!(decoded, msg);

        let plain = SymbolCoder::new(msg.len(), props(FecScheme::None, FecScheme::None));
        let mut symbols = plain.encode(&msg);
        symbols[3] = -symbols[3];
        let (_, valid) = plain.decode(&symbols);
        assert!(!valid);
    }
}
