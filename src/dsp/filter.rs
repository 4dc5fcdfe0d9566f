// Root-Nyquist pulse shaping: transmit interpolator and receive matched-filter bank

use num_complex::Complex32;
use std::f32::consts::PI;

/// Root-raised-cosine impulse response at `t` symbol periods.
pub fn root_raised_cosine(t: f32, beta: f32) -> f32 {
    if t.abs() < 1e-6 {
        return 1.0 - beta + 4.0 * beta / PI;
    }
    let x = 4.0 * beta * t;
    if (1.0 - x * x).abs() < 1e-4 {
        let arg = PI / (4.0 * beta);
        return beta / 2f32.sqrt()
            * ((1.0 + 2.0 / PI) * arg.sin() + (1.0 - 2.0 / PI) * arg.cos());
    }
    let numerator = (PI * t * (1.0 - beta)).sin() + x * (PI * t * (1.0 + beta)).cos();
    numerator / (PI * t * (1.0 - x * x))
}

/// `2·k·m + 1` taps of a root-raised-cosine filter delayed by `m` symbols
/// and shifted later by `offset` samples, scaled to unit energy at offset 0.
pub fn rrc_taps(k: usize, m: usize, beta: f32, offset: f32, len: usize) -> Vec<f32> {
    let center = (k * m) as f32;
    let energy: f32 = (0..2 * k * m + 1)
        .map(|n| root_raised_cosine((n as f32 - center) / k as f32, beta).powi(2))
        .sum();
    let scale = 1.0 / energy.sqrt();
    (0..len)
        .map(|n| scale * root_raised_cosine((n as f32 - center - offset) / k as f32, beta))
        .collect()
}

/// Polyphase interpolator: one input symbol in, `k` output samples out.
#[derive(Debug, Clone)]
pub struct FirInterpolator {
    k: usize,
    taps: Vec<f32>,
    history: Vec<Complex32>,
    head: usize,
}

impl FirInterpolator {
    pub fn new(k: usize, m: usize, beta: f32) -> Self {
        let taps = rrc_taps(k, m, beta, 0.0, 2 * k * m + 1);
        let depth = taps.len().div_ceil(k);
        Self {
            k,
            taps,
            history: vec![Complex32::default(); depth],
            head: 0,
        }
    }

    pub fn taps(&self) -> &[f32] {
        &self.taps
    }

    pub fn reset(&mut self) {
        self.history.fill(Complex32::default());
        self.head = 0;
    }

    /// Writes exactly `k` samples into `out`.
    pub fn execute(&mut self, symbol: Complex32, out: &mut [Complex32]) {
        let depth = self.history.len();
        self.head = (self.head + 1) % depth;
        self.history[self.head] = symbol;
        for (phase, sample) in out.iter_mut().take(self.k).enumerate() {
            let mut acc = Complex32::default();
            for q in 0..depth {
                let Some(&tap) = self.taps.get(phase + self.k * q) else {
                    break;
                };
                acc += self.history[(self.head + depth - q) % depth] * tap;
            }
            *sample = acc;
        }
    }
}

/// Bank of matched filters, branch `b` delaying the output by `b / branches` of a sample.
#[derive(Debug, Clone)]
pub struct MatchedFilterBank {
    branches: Vec<Vec<f32>>,
    history: Vec<Complex32>,
    head: usize,
}

impl MatchedFilterBank {
    pub fn new(k: usize, m: usize, beta: f32, branch_count: usize) -> Self {
        let len = 2 * k * m + 2;
        let branches = (0..branch_count)
            .map(|b| rrc_taps(k, m, beta, b as f32 / branch_count as f32, len))
            .collect();
        Self {
            branches,
            history: vec![Complex32::default(); len],
            head: 0,
        }
    }

    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    pub fn reset(&mut self) {
        self.history.fill(Complex32::default());
        self.head = 0;
    }

    pub fn push(&mut self, sample: Complex32) {
        self.head = (self.head + 1) % self.history.len();
        self.history[self.head] = sample;
    }

    /// Filter output of `branch` for the newest pushed sample.
    pub fn execute(&self, branch: usize) -> Complex32 {
        let len = self.history.len();
        self.branches[branch]
            .iter()
            .enumerate()
            .fold(Complex32::default(), |acc, (l, &tap)| {
                acc + self.history[(self.head + len - l) % len] * tap
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rrc_is_symmetric_with_unit_energy() {
        let taps = rrc_taps(2, 7, 0.25, 0.0, 29);
        let energy: f32 = taps.iter().map(|t| t * t).sum();
        assert!((energy - 1.0).abs() < 1e-4);
        for n in 0..14 {
            assert!((taps[n] - taps[28 - n]).abs() < 1e-6);
        }
        let peak = taps.iter().cloned().fold(0.0f32, f32::max);
        assert_eq!(peak, taps[14]);
    }

    #[test]
    fn test_singular_point_is_continuous() {
        let beta = 0.25;
        let at = root_raised_cosine(1.0, beta);
        let near = root_raised_cosine(1.001, beta);
        assert!((at - near).abs() < 1e-2);
    }

    #[test]
    fn test_interpolator_matched_filter_is_nearly_nyquist() {
        // one isolated chip through TX shaping and branch 0 of the RX bank
        let mut interp = FirInterpolator::new(2, 7, 0.25);
        let mut bank = MatchedFilterBank::new(2, 7, 0.30, 32);
        let mut out = [Complex32::default(); 2];
        let mut response = Vec::new();
        for i in 0..40 {
            let symbol = if i == 0 { Complex32::new(1.0, 0.0) } else { Complex32::default() };
            interp.execute(symbol, &mut out);
            for &s in &out {
                bank.push(s);
                response.push(bank.execute(0).re);
            }
        }
        // peak after both filter delays, near-zero at other symbol instants
        assert!(response[28] > 0.95);
        for lag in (2..26).step_by(2) {
            assert!(response[28 + lag].abs() < 0.05, "lag {lag}: {}", response[28 + lag]);
            assert!(response[28 - lag].abs() < 0.05, "lag -{lag}: {}", response[28 - lag]);
        }
    }
}
