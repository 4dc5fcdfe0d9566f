/// Extended Golay (24,12) block code: 12 data bits, 11 cyclic parity bits
/// from g(x) = x^11 + x^9 + x^7 + x^6 + x^5 + x + 1 and one overall parity
/// bit. Corrects every pattern of up to three errors.
use super::hamming::BlockStatus;

const GENERATOR: u32 = 0xAE3;

pub const DATA_BITS: usize = 12;
pub const BLOCK_BITS: usize = 24;

/// Syndrome table decoder
pub struct GolayCode {
    /// Error pattern for each 12-bit syndrome, `None` past three errors
    patterns: Vec<Option<u32>>,
}

fn cyclic_parity(data: u32) -> u32 {
    let mut r = (data & 0xFFF) << 11;
    for bit in (11..23).rev() {
        if r & (1 << bit) != 0 {
            r ^= GENERATOR << (bit - 11);
        }
    }
    r & 0x7FF
}

/// Parity half of the codeword for 12 data bits
fn parity(data: u32) -> u32 {
    let p = cyclic_parity(data);
    let overall = ((data & 0xFFF) << 11 | p).count_ones() & 1;
    p << 1 | overall
}

fn syndrome(word: u32) -> usize {
    (parity(word >> 12) ^ (word & 0xFFF)) as usize
}

pub fn encode_word(data: u32) -> u32 {
    (data & 0xFFF) << 12 | parity(data)
}

impl GolayCode {
    pub fn new() -> Self {
        let mut patterns = vec![None; 1 << 12];
        patterns[0] = Some(0);
        for a in 0..BLOCK_BITS {
            for b in a..BLOCK_BITS {
                for c in b..BLOCK_BITS {
                    let error = (1u32 << a) | (1 << b) | (1 << c);
                    patterns[syndrome(error)].get_or_insert(error);
                }
            }
        }
        Self { patterns }
    }

    /// `data` must hold exactly 12 bits, most significant first.
    pub fn encode_block(&self, data: &[u8], out: &mut Vec<u8>) {
        let value = data.iter().fold(0u32, |acc, &bit| acc << 1 | u32::from(bit & 1));
        let word = encode_word(value);
        out.extend((0..BLOCK_BITS).rev().map(|i| ((word >> i) & 1) as u8));
    }

    /// `block` must hold exactly 24 bits.
    pub fn decode_block(&self, block: &[u8], out: &mut Vec<u8>) -> BlockStatus {
        let word = block.iter().fold(0u32, |acc, &bit| acc << 1 | u32::from(bit & 1));
        let (corrected, status) = match self.patterns[syndrome(word)] {
            Some(0) => (word, BlockStatus::Clean),
            Some(error) => (word ^ error, BlockStatus::Corrected),
            None => (word, BlockStatus::Uncorrectable),
        };
        out.extend((12..BLOCK_BITS).rev().map(|i| ((corrected >> i) & 1) as u8));
        status
    }
}

impl Default for GolayCode {
    fn default() -> Self {
        Self::new()
    }
}
