//! Replays a recorded per-frame detection script.
//!
//! Script files are JSON arrays with one step per frame. A step is either an
//! array of detections or `{"error": "..."}` to simulate an inference failure
//! on that frame. Frames past the end of the script have no detections.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

use crate::detect::backend::{Detector, InferenceParams};
use crate::detect::result::Detection;
use crate::frame::Frame;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ReplayStep {
    Detections(Vec<Detection>),
    Failure { error: String },
}

pub struct ReplayBackend {
    steps: Vec<ReplayStep>,
}

impl ReplayBackend {
    pub fn new(steps: Vec<ReplayStep>) -> Self {
        Self { steps }
    }

    /// Build from plain per-frame detection sets.
    pub fn from_frames(frames: Vec<Vec<Detection>>) -> Self {
        Self::new(frames.into_iter().map(ReplayStep::Detections).collect())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read replay script {}: {}", path.display(), e))?;
        let steps: Vec<ReplayStep> = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid replay script {}: {}", path.display(), e))?;
        Ok(Self::new(steps))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Detector for ReplayBackend {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn infer(&mut self, frame: &Frame, params: &InferenceParams) -> Result<Vec<Detection>> {
        match self.steps.get(frame.index as usize) {
            None => Ok(Vec::new()),
            Some(ReplayStep::Failure { error }) => {
                Err(anyhow!("replayed failure on frame {}: {}", frame.index, error))
            }
            Some(ReplayStep::Detections(dets)) => {
                Ok(dets.iter().filter(|d| params.accepts(d)).cloned().collect())
            }
        }
    }
}
