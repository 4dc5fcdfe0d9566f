// Preamble detection by normalized correlation against the pulse-shaped preamble

use num_complex::Complex32;
use std::f32::consts::PI;
use tracing::trace;

use super::pn::preamble_sequence;
use crate::dsp::FirInterpolator;
use crate::utils::consts::{DETECTION_THRESHOLD, FILTER_DELAY, SAMPLES_PER_SYMBOL, TX_EXCESS_BANDWIDTH};

/// Coherent segments whose magnitudes are summed
const SEGMENTS: usize = 4;

/// Window starts examined after the first threshold crossing
const PEAK_SEARCH: usize = 16;

/// Channel estimates at a detected preamble
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Absolute index of the sample the frame starts at (integer part)
    pub start: u64,
    /// Fractional timing offset in samples, within [-0.5, 0.5]
    pub timing_offset: f32,
    /// Carrier frequency offset, radians per sample
    pub frequency_offset: f32,
    /// Carrier phase at `start`
    pub phase_offset: f32,
    /// Amplitude relative to the reference preamble
    pub gain: f32,
    /// Normalized correlation at the peak
    pub correlation: f32,
}

struct PeakSearch {
    /// Absolute window start of `values[0]`
    first: u64,
    values: Vec<f32>,
}

pub struct PreambleDetector {
    template: Vec<Complex32>,
    template_energy: f32,
    threshold: f32,

    history: Vec<Complex32>,
    capacity: usize,
    pushed: u64,
    energy: f32,

    previous: f32,
    search: Option<PeakSearch>,
}

impl PreambleDetector {
    pub fn new() -> Self {
        // The first 2 * 64 samples of a frame depend on preamble chips only.
        let mut interp = FirInterpolator::new(SAMPLES_PER_SYMBOL, FILTER_DELAY, TX_EXCESS_BANDWIDTH);
        let mut pair = [Complex32::default(); SAMPLES_PER_SYMBOL];
        let mut template = Vec::new();
        for chip in preamble_sequence() {
            interp.execute(chip, &mut pair);
            template.extend_from_slice(&pair);
        }
        let template_energy = template.iter().map(|t| t.norm_sqr()).sum();
        let capacity = template.len() + PEAK_SEARCH + 2;

        Self {
            template,
            template_energy,
            threshold: DETECTION_THRESHOLD,
            history: Vec::with_capacity(4 * capacity),
            capacity,
            pushed: 0,
            energy: 0.0,
            previous: 0.0,
            search: None,
        }
    }

    pub fn template_len(&self) -> usize {
        self.template.len()
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Largest carrier error (radians per sample) left after a detection's
    /// frequency estimate is applied.
    pub fn frequency_resolution(&self) -> f32 {
        PI / self.template.len() as f32
    }

    /// Total samples pushed so far
    pub fn pushed(&self) -> u64 {
        self.pushed
    }

    /// Forgets any partial peak search; sample history is kept.
    pub fn reset_search(&mut self) {
        self.previous = 0.0;
        self.search = None;
    }

    pub fn reset(&mut self) {
        self.reset_search();
        self.history.clear();
        self.energy = 0.0;
    }

    /// Records a sample without correlating.
    pub fn push(&mut self, sample: Complex32) {
        let len = self.template.len();
        if self.history.len() >= len {
            let leaving = self.history[self.history.len() - len];
            self.energy -= leaving.norm_sqr();
        }
        self.energy = (self.energy + sample.norm_sqr()).max(0.0);
        self.history.push(sample);
        self.pushed += 1;
        if self.history.len() >= 4 * self.capacity {
            let excess = self.history.len() - self.capacity;
            self.history.drain(..excess);
        }
    }

    /// Samples from absolute index `start` up to the newest one.
    pub fn samples_since(&self, start: u64) -> &[Complex32] {
        let first = self.pushed - self.history.len() as u64;
        let offset = start.saturating_sub(first) as usize;
        &self.history[offset.min(self.history.len())..]
    }

    /// Correlates the window ending at the newest sample. Returns a
    /// detection once the peak following a threshold crossing is known.
    pub fn detect(&mut self) -> Option<Detection> {
        let len = self.template.len();
        if self.history.len() < len {
            return None;
        }
        let window_start = self.pushed - len as u64;
        let rxy = if self.energy > 1e-12 {
            self.correlate(self.history.len() - len).0
        } else {
            0.0
        };

        match self.search.as_mut() {
            Some(search) => search.values.push(rxy),
            None => {
                if rxy < self.threshold {
                    self.previous = rxy;
                    return None;
                }
                trace!("preamble threshold crossed at {} (rxy={:.3})", window_start, rxy);
                self.search = Some(PeakSearch {
                    first: window_start.wrapping_sub(1),
                    values: vec![self.previous, rxy],
                });
            }
        }

        let complete = self
            .search
            .as_ref()
            .is_some_and(|search| search.values.len() >= PEAK_SEARCH + 3);
        if !complete {
            return None;
        }
        let search = self.search.take()?;
        self.previous = 0.0;

        let values = &search.values;
        let mut peak = 1;
        for i in 2..values.len() - 1 {
            if values[i] > values[peak] {
                peak = i;
            }
        }
        let (left, centre, right) = (values[peak - 1], values[peak], values[peak + 1]);
        let curvature = left - 2.0 * centre + right;
        let timing_offset = if curvature < 0.0 {
            (0.5 * (left - right) / curvature).clamp(-0.5, 0.5)
        } else {
            0.0
        };

        let start = search.first.wrapping_add(peak as u64);
        let offset = (start - (self.pushed - self.history.len() as u64)) as usize;
        let (_, segments, window_energy) = self.correlate(offset);
        Some(self.estimate(start, timing_offset, centre, &segments, window_energy))
    }

    /// (normalized correlation, segment correlations, window energy) for the
    /// window starting at history offset `offset`.
    fn correlate(&self, offset: usize) -> (f32, [Complex32; SEGMENTS], f32) {
        let len = self.template.len();
        let segment_len = len / SEGMENTS;
        let window = &self.history[offset..offset + len];
        let mut segments = [Complex32::default(); SEGMENTS];
        let mut energy = 0.0f32;
        for (n, (x, t)) in window.iter().zip(&self.template).enumerate() {
            segments[n / segment_len] += t.conj() * x;
            energy += x.norm_sqr();
        }
        if energy <= 0.0 {
            return (0.0, segments, 0.0);
        }
        let magnitude: f32 = segments.iter().map(|c| c.norm()).sum();
        let rxy = magnitude / (energy * self.template_energy).sqrt();
        (rxy, segments, energy)
    }

    fn estimate(
        &self,
        start: u64,
        timing_offset: f32,
        correlation: f32,
        segments: &[Complex32; SEGMENTS],
        window_energy: f32,
    ) -> Detection {
        let segment_len = (self.template.len() / SEGMENTS) as f32;
        let progression: Complex32 = segments
            .windows(2)
            .map(|pair| pair[1] * pair[0].conj())
            .sum();
        let frequency_offset = progression.arg() / segment_len;

        let centre = |p: usize| p as f32 * segment_len + (segment_len - 1.0) / 2.0;
        let derotated: Complex32 = segments
            .iter()
            .enumerate()
            .map(|(p, c)| c * Complex32::from_polar(1.0, -frequency_offset * centre(p)))
            .sum();
        let phase_offset = derotated.arg();
        let gain = (window_energy / self.template_energy).sqrt();

        trace!(
            "preamble at {}: rxy={:.3} tau={:+.3} dphi={:+.5} phi={:+.3} gain={:.3}",
            start, correlation, timing_offset, frequency_offset, phase_offset, gain
        );

        Detection {
            start,
            timing_offset,
            frequency_offset,
            phase_offset,
            gain,
            correlation,
        }
    }
}

impl Default for PreambleDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preamble_waveform() -> Vec<Complex32> {
        let detector = PreambleDetector::new();
        detector.template.clone()
    }

    fn run(detector: &mut PreambleDetector, samples: &[Complex32]) -> Option<Detection> {
        for &s in samples {
            detector.push(s);
            if let Some(d) = detector.detect() {
                return Some(d);
            }
        }
        None
    }

    #[test]
    fn test_detects_clean_preamble_at_its_start() {
        let mut samples = vec![Complex32::default(); 300];
        samples.extend(preamble_waveform());
        samples.extend(vec![Complex32::default(); 64]);

        let mut detector = PreambleDetector::new();
        let d = run(&mut detector, &samples).expect("preamble should be detected");
        assert_eq!(d.start, 300);
        assert!(d.timing_offset.abs() < 0.05);
        assert!(d.frequency_offset.abs() < 1e-4);
        assert!(d.correlation > 0.99);
        assert!((d.gain - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_estimates_gain_phase_and_frequency() {
        let dphi = 0.002f32;
        let phi = 1.1f32;
        let mut samples = vec![Complex32::default(); 50];
        samples.extend(
            preamble_waveform()
                .iter()
                .enumerate()
                .map(|(n, &s)| s * 0.3 * Complex32::from_polar(1.0, phi + dphi * n as f32)),
        );
        samples.extend(vec![Complex32::default(); 64]);

        let mut detector = PreambleDetector::new();
        let d = run(&mut detector, &samples).expect("preamble should be detected");
        assert_eq!(d.start, 50);
        assert!((d.gain - 0.3).abs() < 0.01);
        assert!((d.frequency_offset - dphi).abs() < 2e-4, "{}", d.frequency_offset);
        assert!((d.phase_offset - phi).abs() < 0.05, "{}", d.phase_offset);
    }

    #[test]
    fn test_timing_holds_under_noise() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        for seed in 0..8u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut samples = vec![Complex32::default(); 300];
            samples.extend(preamble_waveform().iter().map(|&s| s * 0.8));
            samples.extend(vec![Complex32::default(); 64]);
            for s in samples.iter_mut() {
                // complex Gaussian, total variance 0.16
                let r = (-2.0 * rng.random_range(f32::EPSILON..1.0f32).ln()).sqrt() * 0.4 / 2f32.sqrt();
                *s += Complex32::from_polar(r, 2.0 * PI * rng.random::<f32>());
            }

            let mut detector = PreambleDetector::new();
            let d = run(&mut detector, &samples).expect("preamble should be detected");
            let position = d.start as f32 + d.timing_offset;
            assert!((position - 300.0).abs() < 0.3, "seed {seed}: {d:?}");
            assert!(d.frequency_offset.abs() < detector.frequency_resolution(), "seed {seed}: {d:?}");
        }
    }

    #[test]
    fn test_silence_never_correlates() {
        let mut detector = PreambleDetector::new();
        assert!(run(&mut detector, &vec![Complex32::default(); 5000]).is_none());
    }
}
