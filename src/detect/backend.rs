use anyhow::Result;
use std::collections::BTreeSet;

use crate::detect::result::Detection;
use crate::frame::Frame;
use crate::session::SessionConfig;

/// Inference parameters fixed for the lifetime of a session.
#[derive(Clone, Debug, PartialEq)]
pub struct InferenceParams {
    pub model_path: String,
    pub device: String,
    pub classes: BTreeSet<String>,
    pub confidence_threshold: f32,
    pub iou: f32,
    pub tracker_model: String,
}

impl InferenceParams {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            model_path: config.detection_model_path.clone(),
            device: config.device.clone(),
            classes: config.classes.clone(),
            confidence_threshold: config.confidence_threshold,
            iou: config.iou,
            tracker_model: config.tracker_model.clone(),
        }
    }

    /// Class filter and confidence threshold.
    pub fn accepts(&self, detection: &Detection) -> bool {
        detection.confidence >= self.confidence_threshold
            && (self.classes.is_empty() || self.classes.contains(&detection.class))
    }
}

/// Detection + tracking capability for one session.
///
/// An instance is owned by exactly one session and used from that session's
/// thread only. `infer` errors are treated as single-frame failures.
pub trait Detector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Detect and track objects in one frame.
    fn infer(&mut self, frame: &Frame, params: &InferenceParams) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, called once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release model/device handles. Called once when the session ends.
    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Builds a `Detector` from a validated session config.
pub trait DetectorFactory: Send + Sync {
    fn build(&self, config: &SessionConfig) -> Result<Box<dyn Detector>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_apply_class_filter_and_threshold() {
        let config = SessionConfig {
            classes: ["person".to_string()].into_iter().collect(),
            confidence_threshold: 0.5,
            ..SessionConfig::default()
        };
        let params = InferenceParams::from_config(&config);
        assert!(params.accepts(&Detection::tracked(1, "person", 0.5)));
        assert!(!params.accepts(&Detection::tracked(1, "person", 0.49)));
        assert!(!params.accepts(&Detection::tracked(1, "car", 0.9)));

        let open = InferenceParams::from_config(&SessionConfig::default());
        assert!(open.accepts(&Detection::tracked(2, "car", 0.9)));
    }
}
