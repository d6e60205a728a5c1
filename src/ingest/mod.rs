//! Frame sources.
//!
//! A `FrameSource` is a lazy sequence of frames for one camera. It paces
//! itself to the requested rate, ends with `Ok(None)` when the stream is
//! exhausted, and is never restarted: a new session opens a new source.
//!
//! Sources are opened through a `SourceFactory` on the session thread, so a
//! slow connect never blocks the orchestrator.
//!
//! - `SyntheticSource`: generated frames for `stub://` URLs (tests, demos)
//! - `SourceCatalog`: camera id -> source URL lookup used by the daemon

mod pacer;
pub mod synthetic;

pub use pacer::FramePacer;
pub use synthetic::{SyntheticConfig, SyntheticSource};

use std::collections::BTreeMap;

use crate::camera::CameraId;
use crate::frame::Frame;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The camera cannot be reached. Ends the session.
    #[error("camera unreachable: {0}")]
    Unreachable(String),
    /// A single read failed. The loop skips it and asks for the next frame.
    #[error("frame read interrupted: {0}")]
    Interrupted(String),
}

pub trait FrameSource: Send {
    /// Block until the next frame is due and return it, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;

    /// Release the underlying stream.
    fn close(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Short description for logs.
    fn describe(&self) -> String;
}

pub trait SourceFactory: Send + Sync {
    fn open(
        &self,
        camera: &CameraId,
        frames_per_second: u32,
    ) -> Result<Box<dyn FrameSource>, SourceError>;
}

/// Maps camera ids to source URLs.
#[derive(Clone, Debug)]
pub struct SourceCatalog {
    cameras: BTreeMap<CameraId, String>,
    synthetic_fallback: bool,
    width: u32,
    height: u32,
}

impl SourceCatalog {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            cameras: BTreeMap::new(),
            synthetic_fallback: true,
            width,
            height,
        }
    }

    pub fn with_camera(mut self, camera: CameraId, url: impl Into<String>) -> Self {
        self.cameras.insert(camera, url.into());
        self
    }

    /// When enabled, cameras missing from the catalog open `stub://<id>`.
    pub fn with_synthetic_fallback(mut self, enabled: bool) -> Self {
        self.synthetic_fallback = enabled;
        self
    }

    pub fn url_for(&self, camera: &CameraId) -> Option<String> {
        match self.cameras.get(camera) {
            Some(url) => Some(url.clone()),
            None if self.synthetic_fallback => Some(format!("stub://{}", camera)),
            None => None,
        }
    }
}

impl SourceFactory for SourceCatalog {
    fn open(
        &self,
        camera: &CameraId,
        frames_per_second: u32,
    ) -> Result<Box<dyn FrameSource>, SourceError> {
        let url = self
            .url_for(camera)
            .ok_or_else(|| SourceError::Unreachable(format!("camera {} not in catalog", camera)))?;
        if !url.starts_with("stub://") {
            return Err(SourceError::Unreachable(format!(
                "unsupported source url '{}' (only stub:// is built in)",
                url
            )));
        }
        let config = SyntheticConfig::from_url(&url, frames_per_second, self.width, self.height)?;
        Ok(Box::new(SyntheticSource::new(config)))
    }
}
