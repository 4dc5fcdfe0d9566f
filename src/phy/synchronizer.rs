// Frame synchronizer: preamble detection, carrier and timing recovery, despreading, decoding

use num_complex::Complex32;
use tracing::{debug, info, trace};

use super::coder::{SymbolCoder, decide};
use super::detector::{Detection, PreambleDetector};
use super::frame::{FrameConfig, FrameProperties, ProtocolSection};
use super::pn::{preamble_sequence, spreading_sequence};
use crate::dsp::{MatchedFilterBank, Nco, PhaseLockedLoop};
use crate::utils::consts::{
    FILTER_BANK_BRANCHES, FILTER_DELAY, PLL_BANDWIDTH, RX_EXCESS_BANDWIDTH, SAMPLES_PER_SYMBOL,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    DetectFrame,
    RxPreamble,
    RxHeader,
    RxPayload,
}

/// Channel measurements for one received frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SyncStats {
    /// Received level relative to a unit-amplitude preamble
    pub rssi_db: f32,
    /// Carrier frequency offset, radians per sample
    pub cfo: f32,
    /// Carrier phase at the start of the frame
    pub phase: f32,
    /// Fractional timing offset, samples
    pub timing_offset: f32,
    /// Error vector magnitude over the header and payload symbols
    pub evm_db: f32,
}

/// Delivered once per detected frame, whatever its checks say.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedFrame {
    /// User header section
    pub header: Vec<u8>,
    pub header_valid: bool,
    pub payload: Vec<u8>,
    pub payload_valid: bool,
    pub stats: SyncStats,
}

pub type FrameHandler = Box<dyn FnMut(ReceivedFrame) + Send>;

pub struct FrameSynchronizer {
    config: FrameConfig,
    detector: PreambleDetector,
    mixer: Nco,
    bank: MatchedFilterBank,
    pll: PhaseLockedLoop,

    preamble: Vec<Complex32>,
    spreading: Vec<Complex32>,
    header_coder: SymbolCoder,
    payload_coder: SymbolCoder,

    state: SyncState,
    branch: usize,
    gain: f32,
    chip_gain: f32,
    sample_index: usize,
    next_chip_at: usize,

    preamble_chips: Vec<Complex32>,
    despread: Complex32,
    chip_in_symbol: usize,
    header_symbols: Vec<Complex32>,
    payload_symbols: Vec<Complex32>,
    header: Vec<u8>,
    header_valid: bool,

    stats: SyncStats,
    error_energy: f32,
    frames_detected: u64,

    handler: FrameHandler,
}

impl FrameSynchronizer {
    pub fn new(config: FrameConfig, handler: impl FnMut(ReceivedFrame) + Send + 'static) -> Self {
        let header_coder = SymbolCoder::new(config.coded_header_len(), config.header);
        let payload_coder = SymbolCoder::new(config.max_payload, config.payload);

        info!("FrameSynchronizer initialized:");
        info!("  - spreading factor: {}", config.spreading_factor);
        info!("  - header symbols: {}", header_coder.symbol_count());
        info!("  - max payload: {} bytes", config.max_payload);

        Self {
            detector: PreambleDetector::new(),
            mixer: Nco::default(),
            bank: MatchedFilterBank::new(
                SAMPLES_PER_SYMBOL,
                FILTER_DELAY,
                RX_EXCESS_BANDWIDTH,
                FILTER_BANK_BRANCHES,
            ),
            pll: PhaseLockedLoop::new(PLL_BANDWIDTH, config.spreading_factor),
            preamble: preamble_sequence(),
            spreading: spreading_sequence(config.spreading_factor),
            header_coder,
            payload_coder,
            state: SyncState::DetectFrame,
            branch: 0,
            gain: 1.0,
            chip_gain: 1.0,
            sample_index: 0,
            next_chip_at: 0,
            preamble_chips: Vec::new(),
            despread: Complex32::default(),
            chip_in_symbol: 0,
            header_symbols: Vec::new(),
            payload_symbols: Vec::new(),
            header: Vec::new(),
            header_valid: false,
            stats: SyncStats::default(),
            error_energy: 0.0,
            frames_detected: 0,
            handler: Box::new(handler),
            config,
        }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// A preamble was detected and its frame is not yet delivered
    pub fn is_frame_open(&self) -> bool {
        self.state != SyncState::DetectFrame
    }

    pub fn frames_detected(&self) -> u64 {
        self.frames_detected
    }

    /// Drops any partial frame and sample history.
    pub fn reset(&mut self) {
        self.detector.reset();
        self.state = SyncState::DetectFrame;
    }

    pub fn execute(&mut self, samples: &[Complex32]) {
        for &sample in samples {
            self.detector.push(sample);
            if self.state != SyncState::DetectFrame {
                self.process_sample(sample);
                continue;
            }
            if let Some(detection) = self.detector.detect() {
                self.open_frame(&detection);
                let replay = self.detector.samples_since(detection.start).to_vec();
                for sample in replay {
                    self.process_sample(sample);
                }
            }
        }
    }

    fn open_frame(&mut self, detection: &Detection) {
        self.frames_detected += 1;

        // Chip i is taken at `start + 2·k·m + 2·i + timing_offset`, realised
        // as a whole-sample shift plus a filter bank branch lagging by b/B.
        let branches = FILTER_BANK_BRANCHES as f32;
        let tau = detection.timing_offset;
        let (mut shift, lag) = if tau > 0.0 { (1, 1.0 - tau) } else { (0, -tau) };
        let mut branch = (lag * branches).round() as usize;
        if branch >= FILTER_BANK_BRANCHES {
            branch = 0;
            shift -= 1;
        }
        self.branch = branch;
        self.sample_index = 0;
        self.next_chip_at = 2 * SAMPLES_PER_SYMBOL * FILTER_DELAY + shift;
        self.bank.reset();

        self.mixer.set_frequency(detection.frequency_offset);
        self.mixer.set_phase(detection.phase_offset);
        self.gain = if detection.gain > 0.0 { 1.0 / detection.gain } else { 1.0 };
        self.chip_gain = 1.0;
        self.pll.reset();

        self.preamble_chips.clear();
        self.header_symbols.clear();
        self.payload_symbols.clear();
        self.despread = Complex32::default();
        self.chip_in_symbol = 0;
        self.error_energy = 0.0;

        self.stats = SyncStats {
            rssi_db: 20.0 * detection.gain.max(1e-12).log10(),
            cfo: detection.frequency_offset,
            phase: detection.phase_offset,
            timing_offset: tau,
            evm_db: 0.0,
        };
        debug!(
            "Frame {} detected at sample {}: rxy={:.3} tau={:+.3} branch={} shift={}",
            self.frames_detected, detection.start, detection.correlation, tau, branch, shift
        );
        self.state = SyncState::RxPreamble;
    }

    fn process_sample(&mut self, sample: Complex32) {
        let baseband = self.mixer.mix_down(sample) * self.gain;
        self.mixer.step();
        self.bank.push(baseband);
        if self.sample_index == self.next_chip_at {
            self.next_chip_at += SAMPLES_PER_SYMBOL;
            let chip = self.bank.execute(self.branch);
            self.process_chip(chip);
        }
        self.sample_index += 1;
    }

    fn process_chip(&mut self, chip: Complex32) {
        match self.state {
            SyncState::DetectFrame => {}
            SyncState::RxPreamble => {
                self.preamble_chips.push(chip);
                if self.preamble_chips.len() == self.preamble.len() {
                    self.refine_carrier();
                    self.state = SyncState::RxHeader;
                }
            }
            SyncState::RxHeader | SyncState::RxPayload => {
                let nco = self.pll.nco_mut();
                let z = nco.mix_down(chip) * self.chip_gain;
                nco.step();
                self.despread += z * self.spreading[self.chip_in_symbol].conj();
                self.chip_in_symbol += 1;
                if self.chip_in_symbol == self.spreading.len() {
                    let symbol = self.despread / self.spreading.len() as f32;
                    self.despread = Complex32::default();
                    self.chip_in_symbol = 0;
                    self.process_symbol(symbol);
                }
            }
        }
    }

    /// Residual carrier from the known preamble chips; seeds the loop so
    /// its first step lands on the first header chip.
    fn refine_carrier(&mut self) {
        let products: Vec<Complex32> = self
            .preamble_chips
            .iter()
            .zip(&self.preamble)
            .map(|(y, p)| y * p.conj())
            .collect();
        // The detector already removed all but a fraction of its resolution.
        let limit = self.detector.frequency_resolution() * SAMPLES_PER_SYMBOL as f32;
        let frequency = lag_averaged_frequency(&products).clamp(-limit, limit);
        let last = (products.len() - 1) as f32;
        let reference: Complex32 = products
            .iter()
            .enumerate()
            .map(|(i, w)| w * Complex32::from_polar(1.0, -frequency * (i as f32 - last)))
            .sum();
        let amplitude = reference.norm() / products.len() as f32;
        self.chip_gain = if amplitude > 0.0 { 1.0 / amplitude } else { 1.0 };

        let nco = self.pll.nco_mut();
        nco.set_frequency(frequency);
        nco.set_phase(reference.arg() + frequency);
        trace!(
            "preamble refinement: dphi={:+.5}/chip theta={:+.3} amplitude={:.3}",
            frequency,
            reference.arg(),
            amplitude
        );
    }

    fn process_symbol(&mut self, symbol: Complex32) {
        let reference = decide(symbol);
        self.pll.update((symbol * reference.conj()).arg());
        self.error_energy += (symbol - reference).norm_sqr();

        match self.state {
            SyncState::RxHeader => {
                self.header_symbols.push(symbol);
                if self.header_symbols.len() == self.header_coder.symbol_count() {
                    self.decode_header();
                }
            }
            SyncState::RxPayload => {
                self.payload_symbols.push(symbol);
                if self.payload_symbols.len() == self.payload_coder.symbol_count() {
                    self.deliver();
                }
            }
            _ => {}
        }
    }

    fn decode_header(&mut self) {
        let (bytes, crc_ok) = self.header_coder.decode(&self.header_symbols);
        let header_len = self.config.header_len;
        let section = if crc_ok {
            ProtocolSection::parse(&bytes[header_len..], self.config.max_payload)
        } else {
            None
        };
        self.header = bytes[..header_len].to_vec();
        self.header_valid = section.is_some();

        // A failed header leaves the payload shape unknown; assume the largest.
        let (payload_len, props): (usize, FrameProperties) = match section {
            Some(section) => (section.payload_len, section.payload),
            None => (self.config.max_payload, self.config.payload),
        };
        trace!(
            "header decoded: valid={} payload_len={} ({}/{}/{})",
            self.header_valid,
            payload_len,
            props.crc,
            props.inner_fec,
            props.outer_fec
        );
        if payload_len != self.payload_coder.msg_len() || props != self.payload_coder.props() {
            self.payload_coder = SymbolCoder::new(payload_len, props);
        }

        self.state = SyncState::RxPayload;
        if self.payload_coder.symbol_count() == 0 {
            self.deliver();
        }
    }

    fn deliver(&mut self) {
        let (payload, payload_valid) = self.payload_coder.decode(&self.payload_symbols);
        let symbols = self.header_symbols.len() + self.payload_symbols.len();
        let evm = self.error_energy / symbols.max(1) as f32;
        self.stats.evm_db = 10.0 * evm.max(1e-12).log10();
        self.stats.cfo = self.mixer.frequency() + self.pll.nco().frequency() / SAMPLES_PER_SYMBOL as f32;

        let frame = ReceivedFrame {
            header: std::mem::take(&mut self.header),
            header_valid: self.header_valid,
            payload,
            payload_valid,
            stats: self.stats,
        };
        debug!(
            "Frame {} delivered: header_valid={} payload_valid={} len={} evm={:.1} dB",
            self.frames_detected,
            frame.header_valid,
            frame.payload_valid,
            frame.payload.len(),
            frame.stats.evm_db
        );
        (self.handler)(frame);

        self.detector.reset_search();
        self.state = SyncState::DetectFrame;
    }
}

/// Frequency (radians per element) of a noisy tone, from its
/// autocorrelation averaged over lags `1..=len/2`.
fn lag_averaged_frequency(tone: &[Complex32]) -> f32 {
    let max_lag = tone.len() / 2;
    if max_lag == 0 {
        return 0.0;
    }
    let sum: Complex32 = (1..=max_lag)
        .map(|lag| {
            let r: Complex32 = tone[lag..].iter().zip(tone).map(|(late, early)| late * early.conj()).sum();
            r / (tone.len() - lag) as f32
        })
        .sum();
    sum.arg() / ((max_lag + 1) as f32 / 2.0)
}
