/// Hamming single-error-correcting block code over an arbitrary number of
/// data bits, optionally extended with an overall parity bit (SEC-DED).
///
/// Codeword layout: positions 1..=n carry the classic Hamming code with
/// parity bits at powers of two; the extended code appends the overall
/// parity after position n.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HammingCode {
    data_bits: usize,
    parity_bits: usize,
    extended: bool,
}

/// Outcome of decoding one codeword
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    Clean,
    Corrected,
    Uncorrectable,
}

impl HammingCode {
    pub const fn new(data_bits: usize, extended: bool) -> Self {
        let mut parity_bits = 1;
        while (1usize << parity_bits) < data_bits + parity_bits + 1 {
            parity_bits += 1;
        }
        Self {
            data_bits,
            parity_bits,
            extended,
        }
    }

    pub fn data_bits(&self) -> usize {
        self.data_bits
    }

    pub fn block_bits(&self) -> usize {
        self.data_bits + self.parity_bits + usize::from(self.extended)
    }

    fn hamming_len(&self) -> usize {
        self.data_bits + self.parity_bits
    }

    /// `data` must hold exactly `data_bits` bits.
    pub fn encode_block(&self, data: &[u8], out: &mut Vec<u8>) {
        let n = self.hamming_len();
        let mut word = vec![0u8; n + 1];
        let mut source = data.iter();
        for (position, slot) in word.iter_mut().enumerate().skip(1) {
            if !position.is_power_of_two() {
                *slot = source.next().copied().unwrap_or(0) & 1;
            }
        }
        for p in 0..self.parity_bits {
            let mask = 1usize << p;
            let parity = (1..=n)
                .filter(|position| position & mask != 0)
                .fold(0u8, |acc, position| acc ^ word[position]);
            word[mask] = parity;
        }
        out.extend_from_slice(&word[1..]);
        if self.extended {
            out.push(word[1..].iter().fold(0, |acc, bit| acc ^ bit));
        }
    }

    /// `block` must hold exactly `block_bits` bits.
    pub fn decode_block(&self, block: &[u8], out: &mut Vec<u8>) -> BlockStatus {
        let n = self.hamming_len();
        let mut word = vec![0u8; n + 1];
        word[1..].copy_from_slice(&block[..n]);

        let syndrome = (1..=n)
            .filter(|&position| word[position] & 1 != 0)
            .fold(0usize, |acc, position| acc ^ position);

        let status = if self.extended {
            let overall = block.iter().fold(0u8, |acc, bit| acc ^ (bit & 1));
            match (syndrome, overall) {
                (0, 0) => BlockStatus::Clean,
                // the overall parity bit itself flipped
                (0, _) => BlockStatus::Corrected,
                (s, 1) if s <= n => {
                    word[s] ^= 1;
                    BlockStatus::Corrected
                }
                _ => BlockStatus::Uncorrectable,
            }
        } else {
            match syndrome {
                0 => BlockStatus::Clean,
                s if s <= n => {
                    word[s] ^= 1;
                    BlockStatus::Corrected
                }
                _ => BlockStatus::Uncorrectable,
            }
        };

        out.extend(
            (1..=n)
                .filter(|position| !position.is_power_of_two())
                .map(|position| word[position] & 1),
        );
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(code: &HammingCode, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        code.encode_block(data, &mut out);
        out
    }

    #[test]
    fn test_block_sizes() {
        assert_eq!(HammingCode::new(4, false).block_bits(), 7);
        assert_eq!(HammingCode::new(4, true).block_bits(), 8);
        assert_eq!(HammingCode::new(8, false).block_bits(), 12);
        assert_eq!(HammingCode::new(16, true).block_bits(), 22);
        assert_eq!(HammingCode::new(32, true).block_bits(), 39);
        assert_eq!(HammingCode::new(64, true).block_bits(), 72);
    }

    #[test]
    fn test_every_single_error_is_corrected() {
        let code = HammingCode::new(32, true);
        let data: Vec<u8> = (0..32).map(|i| ((i * 7 + 3) % 5 % 2) as u8).collect();
        let block = encode(&code, &data);

        for flip in 0..block.len() {
            let mut corrupted = block.clone();
            corrupted[flip] ^= 1;
            let mut out = Vec::new();
            assert_eq!(code.decode_block(&corrupted, &mut out), BlockStatus::Corrected);
            assert_eq!(out, data, "flip at {flip}");
        }
    }

    #[test]
    fn test_double_error_is_detected_by_extended_code() {
        let code = HammingCode::new(16, true);
        let data = vec![1u8; 16];
        let mut block = encode(&code, &data);
        block[2] ^= 1;
        block[9] ^= 1;
        let mut out = Vec::new();
        assert_eq!(code.decode_block(&block, &mut out), BlockStatus::Uncorrectable);
    }

    #[test]
    fn test_h74_single_errors() {
        let code = HammingCode::new(4, false);
        for value in 0..16u8 {
            let data: Vec<u8> = (0..4).map(|i| (value >> (3 - i)) & 1).collect();
            let block = encode(&code, &data);
            let mut out = Vec::new();
            assert_eq!(code.decode_block(&block, &mut out), BlockStatus::Clean);
            assert_eq!(out, data);
            for flip in 0..7 {
                let mut corrupted = block.clone();
                corrupted[flip] ^= 1;
                out.clear();
                code.decode_block(&corrupted, &mut out);
                assert_eq!(out, data);
            }
        }
    }
}
