//! Compression policy and LZ4 wrapper for transfer payloads
//!
//! The policy only marks a descriptor. The direct channel that honours the
//! mark uses `compress()` / `decompress()`.

use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionPolicy {
    threshold: usize,
}

impl CompressionPolicy {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// True iff the payload is strictly larger than the threshold
    pub fn should_compress(&self, payload_size: usize) -> bool {
        payload_size > self.threshold
    }
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_COMPRESS_THRESHOLD)
    }
}

/// Compress data using LZ4 with size prepend
pub fn compress(data: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(data)
}

/// Decompress data that was compressed with `compress()`
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, TransportError> {
    lz4_flex::decompress_size_prepended(data).map_err(|e| TransportError::Codec(e.to_string()))
}
