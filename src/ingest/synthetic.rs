//! Synthetic frame source for `stub://` URLs.
//!
//! Produces paced, generated frames. Query parameters shape the stream:
//! - `frames=N`: end of stream after N frames
//! - `disconnect_after=N`: report the camera unreachable after N frames

use super::{FramePacer, FrameSource, SourceError};
use crate::frame::Frame;

/// Largest generated frame side, in pixels.
pub const MAX_FRAME_SIDE: u32 = 8192;

#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    pub url: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
    pub frame_limit: Option<u64>,
    pub disconnect_after: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera".to_string(),
            target_fps: 10,
            width: 64,
            height: 48,
            frame_limit: None,
            disconnect_after: None,
        }
    }
}

impl SyntheticConfig {
    pub fn from_url(url: &str, target_fps: u32, width: u32, height: u32) -> Result<Self, SourceError> {
        let mut cfg = SyntheticConfig {
            url: url.to_string(),
            target_fps,
            width,
            height,
            ..SyntheticConfig::default()
        };
        if let Some(query) = url.split('?').nth(1) {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| SourceError::Unreachable(format!("malformed query '{}'", pair)))?;
                let parsed: u64 = value.parse().map_err(|_| {
                    SourceError::Unreachable(format!("query '{}' must be an integer", key))
                })?;
                match key {
                    "frames" => cfg.frame_limit = Some(parsed),
                    "disconnect_after" => cfg.disconnect_after = Some(parsed),
                    other => log::debug!("synthetic source {}: ignoring query '{}'", url, other),
                }
            }
        }
        Ok(cfg)
    }
}

pub struct SyntheticSource {
    config: SyntheticConfig,
    pacer: FramePacer,
    frame_count: u64,
    /// Changes every 50 frames to simulate scene activity.
    scene_state: u8,
    closed: bool,
}

impl SyntheticSource {
    /// Frame sides are clamped to `1..=MAX_FRAME_SIDE`.
    pub fn new(mut config: SyntheticConfig) -> Self {
        config.width = config.width.clamp(1, MAX_FRAME_SIDE);
        config.height = config.height.clamp(1, MAX_FRAME_SIDE);
        log::info!("synthetic source connected: {}", config.url);
        let pacer = FramePacer::new(config.target_fps);
        Self {
            config,
            pacer,
            frame_count: 0,
            scene_state: 0,
            closed: false,
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    fn generate_pixels(&mut self) -> Vec<u8> {
        let pixel_count = self.config.width as usize * self.config.height as usize * 3;
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        if self.closed {
            return Err(SourceError::Unreachable("source closed".to_string()));
        }
        if let Some(limit) = self.config.frame_limit {
            if self.frame_count >= limit {
                return Ok(None);
            }
        }
        if let Some(after) = self.config.disconnect_after {
            if self.frame_count >= after {
                return Err(SourceError::Unreachable(format!(
                    "{} disconnected after {} frames",
                    self.config.url, self.frame_count
                )));
            }
        }

        self.pacer.wait();
        let pixels = self.generate_pixels();
        let frame = Frame::new(pixels, self.config.width, self.config.height, self.frame_count);
        self.frame_count += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.closed = true;
        log::debug!(
            "synthetic source {} closed after {} frames",
            self.config.url,
            self.frame_count
        );
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{} @ {} fps", self.config.url, self.config.target_fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config(url: &str) -> SyntheticConfig {
        SyntheticConfig::from_url(url, 120, 8, 6).unwrap()
    }

    #[test]
    fn parses_query_parameters() {
        let cfg = fast_config("stub://gate?frames=10&disconnect_after=4");
        assert_eq!(cfg.frame_limit, Some(10));
        assert_eq!(cfg.disconnect_after, Some(4));
        assert!(SyntheticConfig::from_url("stub://gate?frames=x", 10, 8, 6).is_err());
    }

    #[test]
    fn produces_sequential_frames() {
        let mut source = SyntheticSource::new(fast_config("stub://seq?frames=3"));
        let a = source.next_frame().unwrap().unwrap();
        let b = source.next_frame().unwrap().unwrap();
        assert_eq!((a.index, b.index), (0, 1));
        assert_eq!(source.frames_captured(), 2);
        assert_eq!(a.byte_len(), 8 * 6 * 3);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn oversized_frames_are_clamped() {
        let cfg = SyntheticConfig {
            width: u32::MAX,
            height: 0,
            ..SyntheticConfig::default()
        };
        let source = SyntheticSource::new(cfg);
        assert_eq!(source.config.width, MAX_FRAME_SIDE);
        assert_eq!(source.config.height, 1);
    }

    #[test]
    fn ends_stream_at_frame_limit() {
        let mut source = SyntheticSource::new(fast_config("stub://short?frames=1"));
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn disconnect_is_unreachable() {
        let mut source = SyntheticSource::new(fast_config("stub://flaky?disconnect_after=1"));
        assert!(source.next_frame().unwrap().is_some());
        assert!(matches!(source.next_frame(), Err(SourceError::Unreachable(_))));
    }

    #[test]
    fn closed_source_yields_no_frames() {
        let mut source = SyntheticSource::new(fast_config("stub://closing"));
        source.close().unwrap();
        assert!(source.next_frame().is_err());
    }
}
