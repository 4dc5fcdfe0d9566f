use num_complex::Complex32;
use tracing::{debug, info, trace};

use super::coder::SymbolCoder;
use super::frame::{FrameConfig, ProtocolSection};
use super::pn::{preamble_sequence, spreading_sequence};
use crate::dsp::FirInterpolator;
use crate::error::FrameError;
use crate::utils::consts::{FILTER_DELAY, SAMPLES_PER_SYMBOL, TX_EXCESS_BANDWIDTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    Preamble,
    Header,
    Payload,
    Tail,
}

/// DSSS frame generator: preamble, spread header and payload, interpolator flush.
pub struct FrameGenerator {
    config: FrameConfig,
    interp: FirInterpolator,
    preamble: Vec<Complex32>,
    spreading: Vec<Complex32>,
    header_coder: SymbolCoder,

    header_symbols: Vec<Complex32>,
    payload_symbols: Vec<Complex32>,

    state: GeneratorState,
    chip_counter: usize,
    pending: [Complex32; SAMPLES_PER_SYMBOL],
    pending_index: usize,
    remaining: usize,
    frame_samples: usize,
    frames_assembled: u64,
}

impl FrameGenerator {
    pub fn new(config: FrameConfig) -> Self {
        let header_coder = SymbolCoder::new(config.coded_header_len(), config.header);
        let spreading = spreading_sequence(config.spreading_factor);

        info!("FrameGenerator initialized:");
        info!("  - spreading factor: {}", config.spreading_factor);
        info!(
            "  - header: {} bytes, {} symbols ({}/{}/{})",
            config.header_len,
            header_coder.symbol_count(),
            config.header.crc,
            config.header.inner_fec,
            config.header.outer_fec
        );
        info!("  - max payload: {} bytes", config.max_payload);

        Self {
            interp: FirInterpolator::new(SAMPLES_PER_SYMBOL, FILTER_DELAY, TX_EXCESS_BANDWIDTH),
            preamble: preamble_sequence(),
            spreading,
            header_coder,
            header_symbols: Vec::new(),
            payload_symbols: Vec::new(),
            state: GeneratorState::Preamble,
            chip_counter: 0,
            pending: [Complex32::default(); SAMPLES_PER_SYMBOL],
            pending_index: SAMPLES_PER_SYMBOL,
            remaining: 0,
            frame_samples: 0,
            frames_assembled: 0,
            config,
        }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn state(&self) -> GeneratorState {
        self.state
    }

    /// A frame is armed and not yet fully written
    pub fn is_assembled(&self) -> bool {
        self.remaining > 0
    }

    /// Samples of the assembled frame not yet written
    pub fn remaining_samples(&self) -> usize {
        self.remaining
    }

    /// Samples in the most recently assembled frame, flush tail included
    pub fn frame_samples(&self) -> usize {
        self.frame_samples
    }

    pub fn frames_assembled(&self) -> u64 {
        self.frames_assembled
    }

    pub fn header_symbol_count(&self) -> usize {
        self.header_coder.symbol_count()
    }

    /// Codes and arms one frame.
    pub fn assemble(&mut self, header: &[u8], payload: &[u8]) -> Result<(), FrameError> {
        if self.is_assembled() {
            return Err(FrameError::FrameInProgress);
        }
        if header.len() != self.config.header_len {
            return Err(FrameError::HeaderLength {
                expected: self.config.header_len,
                actual: header.len(),
            });
        }
        if payload.len() > self.config.max_payload {
            return Err(FrameError::PayloadTooLarge {
                max: self.config.max_payload,
                actual: payload.len(),
            });
        }

        let protocol = ProtocolSection {
            payload_len: payload.len(),
            payload: self.config.payload,
        };
        let mut header_msg = Vec::with_capacity(self.config.coded_header_len());
        header_msg.extend_from_slice(header);
        header_msg.extend_from_slice(&protocol.to_bytes());

        self.header_symbols = self.header_coder.encode(&header_msg);
        let payload_coder = SymbolCoder::new(payload.len(), self.config.payload);
        self.payload_symbols = payload_coder.encode(payload);

        let chips = self.preamble.len()
            + self.config.spreading_factor * (self.header_symbols.len() + self.payload_symbols.len())
            + 2 * FILTER_DELAY;
        self.frame_samples = chips * SAMPLES_PER_SYMBOL;
        self.remaining = self.frame_samples;

        self.state = GeneratorState::Preamble;
        self.chip_counter = 0;
        self.pending_index = SAMPLES_PER_SYMBOL;
        self.interp.reset();
        self.frames_assembled += 1;

        debug!(
            "Assembled frame: payload={} bytes, header_symbols={}, payload_symbols={}, samples={}",
            payload.len(),
            self.header_symbols.len(),
            self.payload_symbols.len(),
            self.frame_samples
        );
        Ok(())
    }

    /// Fills `buffer` with the next samples of the frame, zero padding after
    /// its end. Returns true once the whole frame has been written.
    pub fn write_samples(&mut self, buffer: &mut [Complex32]) -> bool {
        let mut complete = !self.is_assembled();
        for slot in buffer.iter_mut() {
            if self.remaining == 0 {
                *slot = Complex32::default();
                continue;
            }
            if self.pending_index == SAMPLES_PER_SYMBOL {
                let chip = self.next_chip();
                self.interp.execute(chip, &mut self.pending);
                self.pending_index = 0;
            }
            *slot = self.pending[self.pending_index];
            self.pending_index += 1;
            self.remaining -= 1;
            if self.remaining == 0 {
                trace!("Frame {} drained", self.frames_assembled);
                self.state = GeneratorState::Preamble;
                complete = true;
            }
        }
        complete
    }

    fn next_chip(&mut self) -> Complex32 {
        let n = self.config.spreading_factor;
        let counter = self.chip_counter;
        self.chip_counter += 1;
        let (chip, segment_len) = match self.state {
            GeneratorState::Preamble => (self.preamble[counter], self.preamble.len()),
            GeneratorState::Header => (
                self.header_symbols[counter / n] * self.spreading[counter % n],
                self.header_symbols.len() * n,
            ),
            GeneratorState::Payload => (
                self.payload_symbols[counter / n] * self.spreading[counter % n],
                self.payload_symbols.len() * n,
            ),
            GeneratorState::Tail => (Complex32::default(), 2 * FILTER_DELAY),
        };
        if self.chip_counter == segment_len {
            self.chip_counter = 0;
            self.state = match self.state {
                GeneratorState::Preamble => GeneratorState::Header,
                GeneratorState::Header if self.payload_symbols.is_empty() => GeneratorState::Tail,
                GeneratorState::Header => GeneratorState::Payload,
                GeneratorState::Payload | GeneratorState::Tail => GeneratorState::Tail,
            };
        }
        chip
    }
}
