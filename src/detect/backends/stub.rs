use anyhow::Result;

use crate::detect::backend::{Detector, InferenceParams};
use crate::detect::result::{BoundingBox, Detection};
use crate::frame::Frame;

/// Frames per synthetic scene.
const SCENE_FRAMES: u64 = 50;

/// Stub backend for testing and demos.
///
/// Produces deterministic tracks from the frame index:
/// - every scene (50 frames) a "person" walks through frames 5..35
/// - on odd scenes a "car" is visible in frames 10..20, with frame 15 dropped
///
/// Confidence jitter is derived from the frame fingerprint.
pub struct StubBackend {
    frames_seen: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self { frames_seen: 0 }
    }

    fn scene_detections(frame: &Frame) -> Vec<Detection> {
        let scene = frame.index / SCENE_FRAMES;
        let offset = frame.index % SCENE_FRAMES;
        let jitter = frame.fingerprint()[0] as f32 / 255.0;
        let mut out = Vec::new();

        if (5..35).contains(&offset) {
            let x = offset as f32 / SCENE_FRAMES as f32 * frame.width as f32;
            out.push(
                Detection::tracked(scene * 2 + 1, "person", 0.6 + 0.35 * jitter).with_bbox(
                    BoundingBox {
                        x,
                        y: frame.height as f32 * 0.25,
                        w: frame.width as f32 * 0.1,
                        h: frame.height as f32 * 0.5,
                    },
                ),
            );
        }
        if scene % 2 == 1 && (10..20).contains(&offset) && offset != 15 {
            out.push(
                Detection::tracked(scene * 2 + 2, "car", 0.7 + 0.25 * jitter).with_bbox(
                    BoundingBox {
                        x: frame.width as f32 * 0.5,
                        y: frame.height as f32 * 0.6,
                        w: frame.width as f32 * 0.3,
                        h: frame.height as f32 * 0.2,
                    },
                ),
            );
        }
        out
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn infer(&mut self, frame: &Frame, params: &InferenceParams) -> Result<Vec<Detection>> {
        self.frames_seen += 1;
        Ok(Self::scene_detections(frame)
            .into_iter()
            .filter(|d| params.accepts(d))
            .collect())
    }

    fn release(&mut self) -> Result<()> {
        log::debug!("stub backend released after {} frames", self.frames_seen);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;

    fn frame(index: u64) -> Frame {
        Frame::with_timestamp(vec![index as u8; 48], 4, 4, index, 0)
    }

    fn params(classes: &[&str]) -> InferenceParams {
        InferenceParams::from_config(&SessionConfig {
            classes: classes.iter().map(|c| c.to_string()).collect(),
            confidence_threshold: 0.5,
            ..SessionConfig::default()
        })
    }

    #[test]
    fn person_visible_mid_scene() {
        let mut backend = StubBackend::new();
        assert!(backend.infer(&frame(0), &params(&[])).unwrap().is_empty());

        let dets = backend.infer(&frame(6), &params(&[])).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class, "person");
        assert_eq!(dets[0].track_id, Some(1));
    }

    #[test]
    fn car_appears_on_odd_scenes_with_a_gap() {
        let mut backend = StubBackend::new();
        let dets = backend.infer(&frame(62), &params(&["car"])).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].track_id, Some(4));
        assert!(backend.infer(&frame(65), &params(&["car"])).unwrap().is_empty());
    }

    #[test]
    fn class_filter_is_applied() {
        let mut backend = StubBackend::new();
        assert!(backend.infer(&frame(62), &params(&["dog"])).unwrap().is_empty());
    }
}
