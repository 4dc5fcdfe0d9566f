// Session configuration: the user-facing surface and its validated form

use std::f64::consts::PI;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::device::RadioDriver;
use crate::dsp::resampler::resampling_factors;
use crate::error::ConfigError;
use crate::error_correction::FecScheme;
use crate::phy::crc::CrcScheme;
use crate::phy::frame::{FrameConfig, FrameProperties, parse_id};
use crate::utils::consts::{
    BLOCKS_PER_SECOND, FRAME_DURATION_S, HEADER_USER_LEN, ID_LEN, MAX_PAYLOAD_SIZE,
    MIN_PAYLOAD_SIZE, SAMPLES_PER_SYMBOL,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Transmit,
    Receive,
}

/// Everything a session is started with, as typed by a user or read from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub radio: String,
    pub transmit: bool,
    pub sample_rate: u64,
    pub bit_rate: u32,
    pub frequency: u64,
    pub frequency_offset: f64,
    pub gain: String,
    pub ppm: f64,
    pub spreading_factor: usize,
    /// `inner[,outer]`
    pub fec: String,
    pub crc: String,
    pub id: String,
    pub dump: Option<PathBuf>,
    /// Seconds without a frame before receiving gives up; 0 waits forever
    pub timeout: u64,
    pub audio: bool,
    /// Seconds to linger after the last transmitted sample
    pub final_delay: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            radio: "io".to_string(),
            transmit: false,
            sample_rate: 2_000_000,
            bit_rate: 100,
            frequency: 434_000_000,
            frequency_offset: 0.0,
            gain: "0".to_string(),
            ppm: 0.0,
            spreading_factor: 64,
            fec: "h128,none".to_string(),
            crc: CrcScheme::default().name().to_string(),
            id: String::new(),
            dump: None,
            timeout: 0,
            audio: false,
            final_delay: 0.0,
        }
    }
}

/// Parses `inner[,outer]`; a missing outer code means `none`.
pub fn parse_fec_pair(codes: &str) -> Result<(FecScheme, FecScheme), ConfigError> {
    let (inner, outer) = codes.split_once(',').unwrap_or((codes, "none"));
    Ok((inner.trim().parse()?, outer.trim().parse()?))
}

/// Payload bytes per frame: about 100 ms of data, clamped.
pub fn payload_size(bit_rate: u32) -> usize {
    let bytes = (bit_rate as f64 / 8.0 * FRAME_DURATION_S) as usize;
    bytes.clamp(MIN_PAYLOAD_SIZE, MAX_PAYLOAD_SIZE)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioParams {
    /// Real PCM rate, twice the complex sample rate
    pub rate: u32,
    pub gain_db: f32,
}

/// Validated, derived session parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SessionParams {
    pub direction: Direction,
    pub driver: RadioDriver,
    pub audio: Option<AudioParams>,
    /// Complex sample rate at the channel, after clock correction
    pub sample_rate: u64,
    pub bit_rate: u32,
    /// Modem rate: bit rate × spreading factor × samples per chip
    pub internal_rate: u64,
    /// Carrier frequency, informational for stream channels
    pub frequency: f64,
    /// Offset applied by the mixer, Hz
    pub frequency_offset: f64,
    pub gain_db: f32,
    pub frame: FrameConfig,
    pub id: [u8; ID_LEN],
    pub dump: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub final_delay: Duration,
}

impl SessionParams {
    /// Mixer step in radians per channel sample
    pub fn mixer_frequency(&self) -> f32 {
        (2.0 * PI * self.frequency_offset / self.sample_rate as f64) as f32
    }

    /// Samples the generator produces per transmit block
    pub fn tx_block_len(&self) -> usize {
        self.internal_rate.div_ceil(BLOCKS_PER_SECOND) as usize
    }

    /// Channel samples per receive block
    pub fn rx_block_len(&self) -> usize {
        self.sample_rate.div_ceil(BLOCKS_PER_SECOND) as usize
    }
}

impl SessionConfig {
    pub fn direction(&self) -> Direction {
        if self.transmit { Direction::Transmit } else { Direction::Receive }
    }

    pub fn validate(&self) -> Result<SessionParams, ConfigError> {
        let driver: RadioDriver = self.radio.parse()?;
        if self.audio && !driver.is_stream() {
            return Err(ConfigError::AudioNeedsStream);
        }
        if self.bit_rate == 0 {
            return Err(ConfigError::InvalidBitRate(self.bit_rate));
        }
        let gain_db: f32 = self
            .gain
            .trim()
            .parse()
            .ok()
            .filter(|g: &f32| g.is_finite())
            .ok_or_else(|| ConfigError::InvalidGain(self.gain.clone()))?;

        let correction = (1e6 - self.ppm) / 1e6;
        let corrected_rate = (self.sample_rate as f64 * correction).round();
        if self.sample_rate == 0 || !corrected_rate.is_finite() || corrected_rate < 1.0 {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        let corrected_rate = corrected_rate as u64;
        let frequency = self.frequency as f64 * correction;

        let (sample_rate, frequency_offset, frequency, audio) = if self.audio {
            let iq_rate = corrected_rate / 2;
            if iq_rate == 0 {
                return Err(ConfigError::InvalidSampleRate(self.sample_rate));
            }
            if frequency >= corrected_rate as f64 / 2.0 {
                return Err(ConfigError::InvalidFrequency(self.frequency));
            }
            let audio = AudioParams {
                rate: u32::try_from(2 * iq_rate).map_err(|_| ConfigError::InvalidSampleRate(self.sample_rate))?,
                gain_db,
            };
            (iq_rate, frequency - iq_rate as f64 / 2.0, 0.0, Some(audio))
        } else {
            (corrected_rate, self.frequency_offset * correction, frequency, None)
        };
        if frequency_offset.abs() >= sample_rate as f64 / 2.0 {
            return Err(ConfigError::InvalidFrequency(self.frequency));
        }

        let internal_rate = self.bit_rate as u64 * self.spreading_factor as u64 * SAMPLES_PER_SYMBOL as u64;
        // Both directions share the factors, reversed.
        resampling_factors(internal_rate, sample_rate)?;

        let (inner, outer) = parse_fec_pair(&self.fec)?;
        let crc: CrcScheme = self.crc.parse()?;
        let frame = FrameConfig {
            spreading_factor: self.spreading_factor,
            header_len: HEADER_USER_LEN,
            max_payload: payload_size(self.bit_rate),
            header: FrameProperties::new(CrcScheme::Crc32, inner, outer),
            payload: FrameProperties::new(crc, inner, outer),
        };
        frame.validate()?;

        let params = SessionParams {
            direction: self.direction(),
            driver,
            audio,
            sample_rate,
            bit_rate: self.bit_rate,
            internal_rate,
            frequency,
            frequency_offset,
            gain_db,
            frame,
            id: parse_id(&self.id)?,
            dump: self.dump.clone(),
            timeout: (self.timeout > 0).then(|| Duration::from_secs(self.timeout)),
            final_delay: Duration::from_secs_f64(self.final_delay.max(0.0)),
        };

        info!("Session parameters ({:?}):", params.direction);
        info!("  - driver: {}{}", params.driver, if self.audio { " (audio)" } else { "" });
        info!("  - sample rate: {} S/s, internal {} S/s", params.sample_rate, params.internal_rate);
        info!("  - bit rate: {} b/s, spreading factor {}", params.bit_rate, self.spreading_factor);
        info!("  - fec: {}/{}, crc {}", inner, outer, crc);
        info!("  - max payload: {} bytes", params.frame.max_payload);
        debug!(
            "  - frequency {:.0} Hz, offset {:.1} Hz, gain {} dB, ppm {}",
            params.frequency, params.frequency_offset, gain_db, self.ppm
        );
        Ok(params)
    }
}
