use std::io;

use thiserror::Error;

/// Malformed session or frame parameters, rejected before anything runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u64),
    #[error("invalid bit rate: {0}")]
    InvalidBitRate(u32),
    #[error("invalid frequency: {0}")]
    InvalidFrequency(u64),
    #[error("spreading factor {0} outside [2, 64]")]
    InvalidSpreadingFactor(usize),
    #[error("unknown forward error correction code: {0}")]
    UnknownFec(String),
    #[error("unknown crc scheme: {0}")]
    UnknownCrc(String),
    #[error("id longer than 4 bytes: {0:?}")]
    IdTooLong(String),
    #[error("invalid gain: {0}")]
    InvalidGain(String),
    #[error("unsupported radio driver: {0:?}")]
    UnsupportedRadio(String),
    #[error("audio mode needs the io or file driver")]
    AudioNeedsStream,
    #[error("resampling ratio {0} cannot be realized")]
    InvalidResampleRatio(f64),
    #[error("payload capacity {0} outside [1, 65535]")]
    InvalidPayloadCapacity(usize),
}

/// Frame assembly rejected by the generator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("header is {actual} bytes, expected {expected}")]
    HeaderLength { expected: usize, actual: usize },
    #[error("payload of {actual} bytes exceeds the {max} byte maximum")]
    PayloadTooLarge { max: usize, actual: usize },
    #[error("previous frame has not been drained")]
    FrameInProgress,
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("configuration file: {0}")]
    ConfigFile(#[from] serde_json::Error),
    #[error("channel error: {0}")]
    Channel(String),
}

pub type Result<T> = std::result::Result<T, TransferError>;
