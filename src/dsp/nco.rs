use num_complex::Complex32;
use std::f32::consts::{PI, TAU};

/// Numerically-controlled oscillator; phase and frequency in radians (per step).
#[derive(Debug, Clone, Default)]
pub struct Nco {
    phase: f32,
    frequency: f32,
}

impl Nco {
    pub fn new(frequency: f32) -> Self {
        Self {
            phase: 0.0,
            frequency,
        }
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.frequency = 0.0;
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn set_phase(&mut self, phase: f32) {
        self.phase = wrap_phase(phase);
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.frequency = frequency;
    }

    pub fn adjust_phase(&mut self, delta: f32) {
        self.phase = wrap_phase(self.phase + delta);
    }

    pub fn adjust_frequency(&mut self, delta: f32) {
        self.frequency += delta;
    }

    pub fn step(&mut self) {
        self.phase = wrap_phase(self.phase + self.frequency);
    }

    pub fn mix_up(&self, sample: Complex32) -> Complex32 {
        sample * Complex32::from_polar(1.0, self.phase)
    }

    pub fn mix_down(&self, sample: Complex32) -> Complex32 {
        sample * Complex32::from_polar(1.0, -self.phase)
    }

    /// Mixes every sample up, stepping once per sample.
    pub fn mix_block_up(&mut self, samples: &mut [Complex32]) {
        for sample in samples.iter_mut() {
            *sample = self.mix_up(*sample);
            self.step();
        }
    }

    pub fn mix_block_down(&mut self, samples: &mut [Complex32]) {
        for sample in samples.iter_mut() {
            *sample = self.mix_down(*sample);
            self.step();
        }
    }
}

pub fn wrap_phase(phase: f32) -> f32 {
    if (-PI..PI).contains(&phase) {
        return phase;
    }
    let wrapped = (phase + PI).rem_euclid(TAU) - PI;
    if wrapped >= PI { wrapped - TAU } else { wrapped }
}

/// Second-order phase-locked loop steering an [`Nco`].
///
/// `bandwidth` is the loop's natural frequency in radians per oscillator
/// step, so the loop responds equally fast whatever the update interval.
/// Each update corrects the phase by `wn · error` and the frequency by
/// `wn² · error` spread over `steps_per_update` steps, with
/// `wn = bandwidth · steps_per_update` (damping 0.5).
#[derive(Debug, Clone)]
pub struct PhaseLockedLoop {
    nco: Nco,
    phase_gain: f32,
    frequency_gain: f32,
}

impl PhaseLockedLoop {
    pub fn new(bandwidth: f32, steps_per_update: usize) -> Self {
        let steps = steps_per_update.max(1) as f32;
        let natural = bandwidth * steps;
        Self {
            nco: Nco::default(),
            phase_gain: natural,
            frequency_gain: natural * natural / steps,
        }
    }

    pub fn reset(&mut self) {
        self.nco.reset();
    }

    pub fn nco(&self) -> &Nco {
        &self.nco
    }

    pub fn nco_mut(&mut self) -> &mut Nco {
        &mut self.nco
    }

    pub fn update(&mut self, phase_error: f32) {
        self.nco.adjust_frequency(self.frequency_gain * phase_error);
        self.nco.adjust_phase(self.phase_gain * phase_error);
    }
}
