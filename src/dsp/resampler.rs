// Polyphase rational resampler (interpolate by P, low-pass, decimate by Q)

use num_complex::Complex32;
use std::f64::consts::PI;
use tracing::debug;

use crate::error::ConfigError;
use crate::utils::consts::{
    RESAMPLER_ATTENUATION_DB, RESAMPLER_MAX_FACTOR, RESAMPLER_ZERO_CROSSINGS,
};

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd(b, a % b) }
}

/// Best approximation `p / q` of `ratio` with both terms at most `max_term`
/// (continued-fraction convergents and their semiconvergents).
pub fn rational_approximation(ratio: f64, max_term: u64) -> (u64, u64) {
    let (mut p0, mut q0, mut p1, mut q1) = (0u64, 1u64, 1u64, 0u64);
    let mut x = ratio;
    let mut best = (ratio.round().max(1.0) as u64, 1u64);
    for _ in 0..64 {
        let a = x.floor() as u64;
        let p2 = a.saturating_mul(p1).saturating_add(p0);
        let q2 = a.saturating_mul(q1).saturating_add(q0);
        if p2 > max_term || q2 > max_term {
            // largest semiconvergent that still fits
            let limit_p = if p1 == 0 { u64::MAX } else { (max_term - p0) / p1 };
            let limit_q = if q1 == 0 { u64::MAX } else { (max_term - q0) / q1 };
            let n = limit_p.min(limit_q).min(a);
            if n > 0 {
                let candidate = (n * p1 + p0, n * q1 + q0);
                let err = |(p, q): (u64, u64)| (p as f64 / q as f64 - ratio).abs();
                if q1 > 0 && err(candidate) < err((p1, q1)) {
                    best = candidate;
                }
            }
            break;
        }
        (p0, q0, p1, q1) = (p1, q1, p2, q2);
        if q1 > 0 && p1 > 0 {
            best = (p1, q1);
        }
        let frac = x - a as f64;
        if frac < 1e-12 {
            break;
        }
        x = 1.0 / frac;
    }
    best
}

/// Interpolation/decimation pair realizing `output_rate / input_rate`.
pub fn resampling_factors(input_rate: u64, output_rate: u64) -> Result<(u64, u64), ConfigError> {
    if input_rate == 0 || output_rate == 0 {
        return Err(ConfigError::InvalidResampleRatio(0.0));
    }
    let divisor = gcd(input_rate, output_rate);
    let (p, q) = (output_rate / divisor, input_rate / divisor);
    if p <= RESAMPLER_MAX_FACTOR && q <= RESAMPLER_MAX_FACTOR {
        return Ok((p, q));
    }
    let ratio = output_rate as f64 / input_rate as f64;
    let (p, q) = rational_approximation(ratio, RESAMPLER_MAX_FACTOR);
    if p == 0 || q == 0 {
        return Err(ConfigError::InvalidResampleRatio(ratio));
    }
    debug!("resampling {} -> {} approximated as {}/{}", input_rate, output_rate, p, q);
    Ok((p, q))
}

fn bessel_i0(x: f64) -> f64 {
    let mut sum = 1.0;
    let mut term = 1.0;
    let half = x / 2.0;
    for k in 1..64 {
        term *= (half / k as f64).powi(2);
        sum += term;
        if term < sum * 1e-12 {
            break;
        }
    }
    sum
}

fn kaiser_beta(attenuation_db: f64) -> f64 {
    if attenuation_db > 50.0 {
        0.1102 * (attenuation_db - 8.7)
    } else if attenuation_db > 21.0 {
        0.5842 * (attenuation_db - 21.0).powf(0.4) + 0.07886 * (attenuation_db - 21.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone)]
pub struct RationalResampler {
    interpolation: usize,
    decimation: usize,
    branches: Vec<Vec<f32>>,
    history: Vec<Complex32>,
    head: usize,
    phase: usize,
    delay: f64,
}

impl RationalResampler {
    pub fn new(interpolation: u64, decimation: u64) -> Self {
        let p = interpolation.max(1) as usize;
        let q = decimation.max(1) as usize;
        let r = p.max(q);
        let half = RESAMPLER_ZERO_CROSSINGS * r;
        let len = 2 * half + 1;
        let beta = kaiser_beta(RESAMPLER_ATTENUATION_DB as f64);
        let norm = bessel_i0(beta);

        let prototype: Vec<f64> = (0..len)
            .map(|i| {
                let t = (i as f64 - half as f64) / r as f64;
                let sinc = if t.abs() < 1e-12 { 1.0 } else { (PI * t).sin() / (PI * t) };
                let w = (i as f64 - half as f64) / half as f64;
                let window = bessel_i0(beta * (1.0 - w * w).max(0.0).sqrt()) / norm;
                p as f64 / r as f64 * sinc * window
            })
            .collect();

        let depth = len.div_ceil(p);
        let branches = (0..p)
            .map(|phase| {
                (0..depth)
                    .map(|k| prototype.get(phase + k * p).copied().unwrap_or(0.0) as f32)
                    .collect()
            })
            .collect();

        Self {
            interpolation: p,
            decimation: q,
            branches,
            history: vec![Complex32::default(); depth],
            head: 0,
            phase: 0,
            delay: half as f64 / p as f64,
        }
    }

    pub fn from_rates(input_rate: u64, output_rate: u64) -> Result<Self, ConfigError> {
        let (p, q) = resampling_factors(input_rate, output_rate)?;
        Ok(Self::new(p, q))
    }

    pub fn rate(&self) -> f64 {
        self.interpolation as f64 / self.decimation as f64
    }

    /// Group delay in input samples
    pub fn delay(&self) -> f64 {
        self.delay
    }

    pub fn reset(&mut self) {
        self.history.fill(Complex32::default());
        self.head = 0;
        self.phase = 0;
    }

    /// Appends the resampled output of `input` to `output`.
    pub fn execute(&mut self, input: &[Complex32], output: &mut Vec<Complex32>) {
        let depth = self.history.len();
        output.reserve((input.len() as f64 * self.rate()).ceil() as usize + 1);
        for &sample in input {
            self.head = (self.head + 1) % depth;
            self.history[self.head] = sample;
            // every output whose input index is this sample
            while self.phase < self.interpolation {
                let taps = &self.branches[self.phase];
                let mut acc = Complex32::default();
                for (k, &tap) in taps.iter().enumerate() {
                    acc += self.history[(self.head + depth - k) % depth] * tap;
                }
                output.push(acc);
                self.phase += self.decimation;
            }
            self.phase -= self.interpolation;
        }
    }
}
