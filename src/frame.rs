//! Frames handed from a `FrameSource` to a `Detector`.
//!
//! Pixel bytes stay private to the frame; detectors borrow them through
//! `Frame::pixels` for the duration of one inference call.

use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

/// One decoded frame.
pub struct Frame {
    data: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// Position in the source's sequence, starting at 0.
    pub index: u64,

    /// Capture time in milliseconds since the Unix epoch.
    pub captured_at_ms: u64,

    /// SHA-256 of the pixel data, computed at capture time.
    fingerprint: [u8; 32],
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: u64) -> Self {
        Self::with_timestamp(data, width, height, index, now_ms())
    }

    pub fn with_timestamp(
        data: Vec<u8>,
        width: u32,
        height: u32,
        index: u64,
        captured_at_ms: u64,
    ) -> Self {
        let fingerprint: [u8; 32] = Sha256::digest(&data).into();
        Self {
            data,
            width,
            height,
            index,
            captured_at_ms,
            fingerprint,
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn fingerprint(&self) -> [u8; 32] {
        self.fingerprint
    }
}

impl std::fmt::Debug for Frame {
    // Pixel data is never printed.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("index", &self.index)
            .field("captured_at_ms", &self.captured_at_ms)
            .field("bytes", &self.data.len())
            .finish()
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
