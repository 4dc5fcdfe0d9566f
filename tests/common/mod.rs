#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use dsss_transfer::phy::{FrameConfig, FrameGenerator, FrameSynchronizer, ReceivedFrame};
use num_complex::Complex32;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub type Frames = Arc<Mutex<Vec<ReceivedFrame>>>;

/// Synchronizer whose frames land in a shared vector
pub fn collecting_synchronizer(config: FrameConfig) -> (FrameSynchronizer, Frames) {
    let frames: Frames = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&frames);
    let sync = FrameSynchronizer::new(config, move |frame| sink.lock().unwrap().push(frame));
    (sync, frames)
}

/// Assembles and drains one frame.
pub fn frame_samples(generator: &mut FrameGenerator, header: &[u8], payload: &[u8]) -> Vec<Complex32> {
    generator.assemble(header, payload).unwrap();
    let mut samples = vec![Complex32::default(); generator.frame_samples()];
    assert!(generator.write_samples(&mut samples));
    samples
}

pub fn silence(len: usize) -> Vec<Complex32> {
    vec![Complex32::default(); len]
}

/// Seeded complex white Gaussian noise of total variance `sigma²`
pub struct Noise {
    rng: StdRng,
    sigma: f32,
}

impl Noise {
    pub fn new(seed: u64, sigma: f32) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            sigma,
        }
    }

    pub fn sample(&mut self) -> Complex32 {
        // Box-Muller
        let u1: f32 = self.rng.random_range(f32::EPSILON..1.0);
        let u2: f32 = self.rng.random();
        let r = (-2.0 * u1.ln()).sqrt() * self.sigma / std::f32::consts::SQRT_2;
        let theta = std::f32::consts::TAU * u2;
        Complex32::new(r * theta.cos(), r * theta.sin())
    }

    pub fn add_to(&mut self, samples: &mut [Complex32]) {
        for s in samples.iter_mut() {
            *s += self.sample();
        }
    }
}

pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}
