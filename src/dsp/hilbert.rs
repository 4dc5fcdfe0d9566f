// Complex baseband <-> real passband at twice the rate, centred on a quarter of the real rate

use num_complex::Complex32;

use super::resampler::RationalResampler;

/// `e^{j·π·n/2}` for n = 0..4
const QUARTER_CARRIER: [Complex32; 4] = [
    Complex32::new(1.0, 0.0),
    Complex32::new(0.0, 1.0),
    Complex32::new(-1.0, 0.0),
    Complex32::new(0.0, -1.0),
];

/// Turns complex samples at rate `fs` into real samples at `2·fs`; complex
/// frequency `f` lands at real frequency `f + fs / 2`.
pub struct HilbertInterpolator {
    resampler: RationalResampler,
    buffer: Vec<Complex32>,
    index: usize,
}

impl HilbertInterpolator {
    pub fn new() -> Self {
        Self {
            resampler: RationalResampler::new(2, 1),
            buffer: Vec::new(),
            index: 0,
        }
    }

    pub fn delay(&self) -> f64 {
        self.resampler.delay()
    }

    pub fn execute(&mut self, input: &[Complex32], output: &mut Vec<f32>) {
        self.buffer.clear();
        self.resampler.execute(input, &mut self.buffer);
        output.extend(self.buffer.iter().map(|&sample| {
            let real = (sample * QUARTER_CARRIER[self.index]).re;
            self.index = (self.index + 1) % 4;
            real
        }));
    }
}

impl Default for HilbertInterpolator {
    fn default() -> Self {
        Self::new()
    }
}

/// Inverse of [`HilbertInterpolator`]: real samples at `2·fs` to complex at `fs`.
pub struct HilbertDecimator {
    resampler: RationalResampler,
    buffer: Vec<Complex32>,
    index: usize,
}

impl HilbertDecimator {
    pub fn new() -> Self {
        Self {
            resampler: RationalResampler::new(1, 2),
            buffer: Vec::new(),
            index: 0,
        }
    }

    pub fn delay(&self) -> f64 {
        self.resampler.delay()
    }

    pub fn execute(&mut self, input: &[f32], output: &mut Vec<Complex32>) {
        self.buffer.clear();
        self.buffer.extend(input.iter().map(|&sample| {
            // mixing a real signal down keeps half of its amplitude
            let mixed = QUARTER_CARRIER[self.index].conj() * (2.0 * sample);
            self.index = (self.index + 1) % 4;
            mixed
        }));
        self.resampler.execute(&self.buffer, output);
    }
}

impl Default for HilbertDecimator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    #[test]
    fn test_complex_tone_maps_to_shifted_real_tone() {
        let mut interp = HilbertInterpolator::new();
        let freq = 0.1f32; // cycles per complex sample
        let input: Vec<Complex32> = (0..2000)
            .map(|n| Complex32::from_polar(0.5, TAU * freq * n as f32))
            .collect();
        let mut real = Vec::new();
        interp.execute(&input, &mut real);
        assert_eq!(real.len(), 4000);

        // expected real frequency (per real sample): (f + 1/2) / 2
        let f_real = (freq + 0.5) / 2.0;
        let (mut i_sum, mut q_sum, mut energy) = (0.0f32, 0.0f32, 0.0f32);
        for (n, &x) in real.iter().enumerate().skip(200) {
            i_sum += x * (TAU * f_real * n as f32).cos();
            q_sum += x * (TAU * f_real * n as f32).sin();
            energy += x * x;
        }
        let count = (real.len() - 200) as f32;
        let tone_power = 2.0 * (i_sum * i_sum + q_sum * q_sum) / (count * count);
        // nearly all the energy sits in the expected tone
        assert!(tone_power / (energy / count) > 0.95);
    }

    #[test]
    fn test_round_trip_restores_baseband() {
        let mut interp = HilbertInterpolator::new();
        let mut decim = HilbertDecimator::new();
        let freq = -0.07f32;
        let input: Vec<Complex32> = (0..3000)
            .map(|n| Complex32::from_polar(0.8, TAU * freq * n as f32))
            .collect();
        let mut real = Vec::new();
        interp.execute(&input, &mut real);
        let mut output = Vec::new();
        decim.execute(&real, &mut output);
        assert_eq!(output.len(), input.len());

        let delay = (interp.delay() + decim.delay() / 2.0).round() as usize;
        for n in 300..2900 {
            let error = (output[n] - input[n - delay]).norm();
            assert!(error < 0.05, "sample {n}: {error}");
        }
    }
}
