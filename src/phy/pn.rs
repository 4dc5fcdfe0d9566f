// Pseudo-noise chip sequences for acquisition and spreading

use num_complex::Complex32;
use std::f32::consts::FRAC_1_SQRT_2;

use crate::utils::consts::{
    PN_DEGREE, PREAMBLE_LEN, PREAMBLE_POLYNOMIAL, PREAMBLE_SEED, SPREADING_POLYNOMIAL,
    SPREADING_SEED,
};

/// Maximal-length linear feedback shift register.
///
/// The generator polynomial includes the x^m term, which is dropped from
/// the feedback mask. Each step outputs the parity of `state & mask` and
/// shifts it in from the right.
#[derive(Debug, Clone)]
pub struct MSequence {
    state: u32,
    mask: u32,
    degree_mask: u32,
}

impl MSequence {
    pub fn new(degree: u32, polynomial: u32, seed: u32) -> Self {
        let degree_mask = (1u32 << degree) - 1;
        Self {
            state: seed & degree_mask,
            mask: polynomial >> 1,
            degree_mask,
        }
    }

    pub fn advance(&mut self) -> u8 {
        let bit = ((self.state & self.mask).count_ones() & 1) as u8;
        self.state = ((self.state << 1) | bit as u32) & self.degree_mask;
        bit
    }
}

impl Iterator for MSequence {
    type Item = u8;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.advance())
    }
}

/// Two register bits per chip, real component first.
pub fn qpsk_chips(degree: u32, polynomial: u32, seed: u32, len: usize) -> Vec<Complex32> {
    let mut sequence = MSequence::new(degree, polynomial, seed);
    let level = |bit: u8| if bit == 1 { FRAC_1_SQRT_2 } else { -FRAC_1_SQRT_2 };
    (0..len)
        .map(|_| {
            let re = level(sequence.advance());
            let im = level(sequence.advance());
            Complex32::new(re, im)
        })
        .collect()
}

/// The fixed 64-chip acquisition preamble.
pub fn preamble_sequence() -> Vec<Complex32> {
    qpsk_chips(PN_DEGREE, PREAMBLE_POLYNOMIAL, PREAMBLE_SEED, PREAMBLE_LEN)
}

/// The spreading sequence shared by header and payload.
pub fn spreading_sequence(spreading_factor: usize) -> Vec<Complex32> {
    qpsk_chips(PN_DEGREE, SPREADING_POLYNOMIAL, SPREADING_SEED, spreading_factor)
}
