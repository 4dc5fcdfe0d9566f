use reed_solomon::{Decoder, Encoder};
use tracing::{debug, trace};

/// Parity bytes per Reed-Solomon block
pub const RS_ECC_LEN: usize = 32;

/// Data bytes per full block (255 - 32)
pub const RS_BLOCK_DATA: usize = 223;

/// Reed-Solomon error correction encoder
pub struct ReedSolomonEncoder {
    encoder: Encoder,
    ecc_len: usize,
}

/// Reed-Solomon error correction decoder
pub struct ReedSolomonDecoder {
    decoder: Decoder,
    ecc_len: usize,
}

/// Result of error correction operation
#[derive(Debug)]
pub struct ErrorCorrectionResult {
    /// The corrected data
    pub data: Vec<u8>,
    /// Number of bytes changed by the decoder
    pub errors_corrected: usize,
    /// Whether every block was decodable
    pub success: bool,
}

impl ReedSolomonEncoder {
    /// Create a new Reed-Solomon encoder with specified error correction code length
    ///
    /// # Arguments
    /// * `ecc_len` - Parity bytes per block; up to `ecc_len / 2` byte errors are corrected
    pub fn new(ecc_len: usize) -> Self {
        let encoder = Encoder::new(ecc_len);
        Self { encoder, ecc_len }
    }

    /// Encode one block (at most `255 - ecc_len` bytes) and append its parity
    pub fn encode(&self, data: &[u8]) -> Vec<u8> {
        let encoded = self.encoder.encode(data);
        let mut result = Vec::with_capacity(data.len() + self.ecc_len);
        result.extend_from_slice(data);
        result.extend_from_slice(encoded.ecc());
        result
    }

    /// Split `data` into shortened blocks of up to 223 bytes, each followed by its parity
    pub fn encode_blocks(&self, data: &[u8]) -> Vec<u8> {
        let block_data = 255 - self.ecc_len;
        let mut out = Vec::with_capacity(self.encoded_size(data.len()));
        for chunk in data.chunks(block_data) {
            out.extend(self.encode(chunk));
        }
        debug!(
            "RS encoded {} bytes into {} bytes ({} blocks)",
            data.len(),
            out.len(),
            data.len().div_ceil(block_data)
        );
        out
    }

    /// Calculate the total size after block encoding
    pub fn encoded_size(&self, data_len: usize) -> usize {
        data_len + data_len.div_ceil(255 - self.ecc_len) * self.ecc_len
    }
}

impl ReedSolomonDecoder {
    /// Create a new Reed-Solomon decoder (`ecc_len` must match the encoder)
    pub fn new(ecc_len: usize) -> Self {
        let decoder = Decoder::new(ecc_len);
        Self { decoder, ecc_len }
    }

    /// Decode and correct one block (data followed by parity)
    pub fn decode(&self, encoded_data: &[u8]) -> ErrorCorrectionResult {
        if encoded_data.len() < self.ecc_len {
            return ErrorCorrectionResult {
                data: Vec::new(),
                errors_corrected: 0,
                success: false,
            };
        }

        let data_len = encoded_data.len() - self.ecc_len;
        let mut corrupted = encoded_data.to_vec();

        match self.decoder.correct(&mut corrupted, None) {
            Ok(corrected) => {
                let data = corrected.data().to_vec();
                let errors_corrected = data
                    .iter()
                    .zip(encoded_data)
                    .filter(|(a, b)| a != b)
                    .count();
                ErrorCorrectionResult {
                    data,
                    errors_corrected,
                    success: true,
                }
            }
            Err(e) => {
                trace!("Reed-Solomon correction failed: {:?}", e);
                ErrorCorrectionResult {
                    data: encoded_data[..data_len].to_vec(),
                    errors_corrected: 0,
                    success: false,
                }
            }
        }
    }

    /// Inverse of [`ReedSolomonEncoder::encode_blocks`] for a message of `data_len` bytes
    pub fn decode_blocks(&self, encoded: &[u8], data_len: usize) -> ErrorCorrectionResult {
        let block_data = 255 - self.ecc_len;
        let mut result = ErrorCorrectionResult {
            data: Vec::with_capacity(data_len),
            errors_corrected: 0,
            success: true,
        };
        let mut offset = 0;
        let mut remaining = data_len;
        while remaining > 0 {
            let chunk = remaining.min(block_data);
            let end = (offset + chunk + self.ecc_len).min(encoded.len());
            let block = self.decode(&encoded[offset.min(end)..end]);
            result.errors_corrected += block.errors_corrected;
            result.success &= block.success;
            result.data.extend(block.data);
            offset = end;
            remaining -= chunk;
        }
        result.data.resize(data_len, 0);
        result
    }
}
