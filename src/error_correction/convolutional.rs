/// Zero-terminated feedforward convolutional codes with hard-decision
/// Viterbi decoding.
///
/// The shift register holds the newest input bit at position `K - 1`; each
/// generator selects register taps whose parity forms one output bit.
#[derive(Debug, Clone, Copy)]
pub struct ConvolutionalCode {
    constraint_length: usize,
    generators: &'static [u32],
}

/// r1/2, K=7 (NASA standard)
pub const V27: ConvolutionalCode = ConvolutionalCode::new(7, &[0o171, 0o133]);
/// r1/2, K=9
pub const V29: ConvolutionalCode = ConvolutionalCode::new(9, &[0o753, 0o561]);
/// r1/3, K=9
pub const V39: ConvolutionalCode = ConvolutionalCode::new(9, &[0o557, 0o663, 0o711]);

fn parity(x: u32) -> u8 {
    (x.count_ones() & 1) as u8
}

impl ConvolutionalCode {
    pub const fn new(constraint_length: usize, generators: &'static [u32]) -> Self {
        Self {
            constraint_length,
            generators,
        }
    }

    fn rate_inverse(&self) -> usize {
        self.generators.len()
    }

    fn num_states(&self) -> usize {
        1 << (self.constraint_length - 1)
    }

    fn tail_bits(&self) -> usize {
        self.constraint_length - 1
    }

    /// Coded length for `msg_bits` input bits, tail included
    pub fn encoded_bits(&self, msg_bits: usize) -> usize {
        (msg_bits + self.tail_bits()) * self.rate_inverse()
    }

    fn branch(&self, register: u32) -> impl Iterator<Item = u8> + '_ {
        self.generators.iter().map(move |&g| parity(register & g))
    }

    pub fn encode(&self, bits: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_bits(bits.len()));
        let mut state = 0u32;
        let tail = std::iter::repeat_n(0u8, self.tail_bits());
        for bit in bits.iter().copied().chain(tail) {
            let register = u32::from(bit & 1) << self.tail_bits() | state;
            out.extend(self.branch(register));
            state = register >> 1;
        }
        out
    }

    /// Maximum likelihood path through the trellis, ending in state zero.
    /// Returns the message bits without the tail.
    pub fn decode(&self, coded: &[u8]) -> Vec<u8> {
        let n = self.rate_inverse();
        let states = self.num_states();
        let mask = (states - 1) as u32;
        let input_shift = self.constraint_length - 2;
        let words = states.div_ceil(64);
        let steps = coded.len() / n;

        const UNREACHED: u32 = u32::MAX / 4;
        let mut metrics = vec![UNREACHED; states];
        metrics[0] = 0;
        let mut next = vec![0u32; states];
        let mut decisions = vec![0u64; steps * words];

        for (step, symbol) in coded.chunks_exact(n).enumerate() {
            for target in 0..states {
                let input = (target >> input_shift) as u32;
                let mut best = u32::MAX;
                for b in 0..2u32 {
                    let previous = ((target as u32) << 1) & mask | b;
                    let register = input << self.tail_bits() | previous;
                    let distance = self
                        .branch(register)
                        .zip(symbol)
                        .filter(|&(expected, &received)| expected != received & 1)
                        .count() as u32;
                    let metric = metrics[previous as usize] + distance;
                    if metric < best {
                        best = metric;
                        if b == 1 {
                            decisions[step * words + target / 64] |= 1 << (target % 64);
                        }
                    }
                }
                next[target] = best;
            }
            let floor = next.iter().copied().min().unwrap_or(0);
            for (metric, &candidate) in metrics.iter_mut().zip(&next) {
                *metric = (candidate - floor).min(UNREACHED);
            }
        }

        let mut bits = vec![0u8; steps];
        let mut state = 0usize;
        for step in (0..steps).rev() {
            bits[step] = (state >> input_shift) as u8;
            let b = (decisions[step * words + state / 64] >> (state % 64)) & 1;
            state = ((state << 1) & mask as usize) | b as usize;
        }
        bits.truncate(steps.saturating_sub(self.tail_bits()));
        bits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(bits: usize) -> Vec<u8> {
        (0..bits).map(|i| ((i * 13 + 5) % 7 % 2) as u8).collect()
    }

    #[test]
    fn test_encoded_length_includes_tail() {
        assert_eq!(V27.encoded_bits(100), 212);
        assert_eq!(V29.encoded_bits(100), 216);
        assert_eq!(V39.encoded_bits(100), 324);
        assert_eq!(V27.encode(&message(100)).len(), 212);
    }

    #[test]
    fn test_impulse_response_weight_is_free_distance() {
        for (code, dfree) in [(V27, 10), (V29, 12), (V39, 18)] {
            let weight: usize = code.encode(&[1]).iter().map(|&b| b as usize).sum();
            assert!(weight >= dfree, "{weight} < {dfree}");
        }
    }

    #[test]
    fn test_clean_decode() {
        for code in [V27, V29, V39] {
            let msg = message(257);
            assert_eq!(code.decode(&code.encode(&msg)), msg);
        }
    }

    #[test]
    fn test_corrects_scattered_errors() {
        for code in [V27, V29, V39] {
            let msg = message(400);
            let mut coded = code.encode(&msg);
            // one flipped bit every 20 coded bits
            for i in (3..coded.len()).step_by(20) {
                coded[i] ^= 1;
            }
            assert_eq!(code.decode(&coded), msg);
        }
    }

    #[test]
    fn test_corrects_short_burst() {
        let msg = message(200);
        let mut coded = V29.encode(&msg);
        for bit in &mut coded[150..154] {
            *bit ^= 1;
        }
        assert_eq!(V29.decode(&coded), msg);
    }
}
