/// Default log level (overridden by RUST_LOG)
pub const LOG_LEVEL: &str = "warn";

/// Log level used when `-v` is given
pub const VERBOSE_LOG_LEVEL: &str = "debug";

// ============================================================================
// Modem Parameters
// ============================================================================

/// Samples per symbol at the modem's internal rate
pub const SAMPLES_PER_SYMBOL: usize = 2;

/// Pulse-shaping filter delay (symbols)
pub const FILTER_DELAY: usize = 7;

/// Excess bandwidth of the transmit pulse shape
pub const TX_EXCESS_BANDWIDTH: f32 = 0.25;

/// Excess bandwidth of the receive matched filter
pub const RX_EXCESS_BANDWIDTH: f32 = 0.30;

/// Number of phase branches in the receive matched-filter bank
pub const FILTER_BANK_BRANCHES: usize = 32;

/// Normalized preamble correlation needed to declare a detection
pub const DETECTION_THRESHOLD: f32 = 0.5;

/// Chips in the acquisition preamble
pub const PREAMBLE_LEN: usize = 64;

/// Register length of the PN generators
pub const PN_DEGREE: u32 = 7;

/// Preamble generator polynomial and seed
pub const PREAMBLE_POLYNOMIAL: u32 = 0x0089;
pub const PREAMBLE_SEED: u32 = 0x0001;

/// Spreading generator polynomial and seed
pub const SPREADING_POLYNOMIAL: u32 = 0x00cb;
pub const SPREADING_SEED: u32 = 0x0053;

/// Valid spreading factors
pub const MIN_SPREADING_FACTOR: usize = 2;
pub const MAX_SPREADING_FACTOR: usize = 64;

/// Carrier loop natural frequency, radians per chip
pub const PLL_BANDWIDTH: f32 = 0.008;

// ============================================================================
// Frame Parameters
// ============================================================================

/// User section of the frame header: Id (4) + Counter (4)
pub const HEADER_USER_LEN: usize = 8;

/// Protocol section appended to the user header:
/// version (1) + payload length (2) + crc scheme (1) + fec schemes (1)
pub const HEADER_PROTOCOL_LEN: usize = 5;

/// Protocol version carried in every header
pub const PROTOCOL_VERSION: u8 = 1;

/// Session Id length in bytes
pub const ID_LEN: usize = 4;

/// Payload size bounds (bytes)
pub const MIN_PAYLOAD_SIZE: usize = 16;
pub const MAX_PAYLOAD_SIZE: usize = 8000;

/// Seconds of data carried by one frame
pub const FRAME_DURATION_S: f64 = 0.1;

/// Blocks per second pushed through the sample pipeline
pub const BLOCKS_PER_SECOND: u64 = 20;

// ============================================================================
// Sample Pipeline
// ============================================================================

/// TX peak amplitude after block normalization
pub const TX_PEAK_AMPLITUDE: f32 = 0.75;

/// Stop-band attenuation of the resampler prototype (dB)
pub const RESAMPLER_ATTENUATION_DB: f32 = 60.0;

/// Zero crossings on each side of the resampler prototype
pub const RESAMPLER_ZERO_CROSSINGS: usize = 12;

/// Largest interpolation/decimation factor the resampler accepts
pub const RESAMPLER_MAX_FACTOR: u64 = 1024;

/// Bounded wait of one channel operation (ms)
pub const CHANNEL_TIMEOUT_MS: u64 = 10;

/// Blocks buffered by a loopback channel
pub const LOOPBACK_DEPTH: usize = 64;
