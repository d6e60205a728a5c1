use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;

use crate::error::{MonitorError, Result};

pub const DEFAULT_MIN_TRACK_FRAMES: u32 = 7;
pub const MAX_FRAMES_PER_SECOND: u32 = 120;

/// Immutable per-session parameters.
///
/// Field names match the `POST /monitor` body. Validation runs when the
/// session is started, before any resource is acquired.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub device: String,
    pub detection_model_path: String,
    /// Class names to keep. Empty keeps every class.
    #[serde(default, deserialize_with = "nullable_classes")]
    pub classes: BTreeSet<String>,
    pub tracker_model: String,
    pub frames_per_second: u32,
    /// Grace period: consecutive missed frames before a track is lost.
    pub frames_before_disappearance: u32,
    pub confidence_threshold: f32,
    #[serde(default = "default_min_track_frames")]
    pub min_track_frames: u32,
    pub iou: f32,
}

fn default_min_track_frames() -> u32 {
    DEFAULT_MIN_TRACK_FRAMES
}

fn nullable_classes<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<BTreeSet<String>, D::Error> {
    let classes: Option<Vec<String>> = Option::deserialize(deserializer)?;
    Ok(classes
        .unwrap_or_default()
        .into_iter()
        .map(|c| c.trim().to_string())
        .collect())
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device: "cpu".to_string(),
            detection_model_path: "stub://yolo".to_string(),
            classes: BTreeSet::new(),
            tracker_model: "bytetrack.yaml".to_string(),
            frames_per_second: 10,
            frames_before_disappearance: 10,
            confidence_threshold: 0.5,
            min_track_frames: DEFAULT_MIN_TRACK_FRAMES,
            iou: 0.7,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        static DEVICE_RE: OnceLock<regex::Regex> = OnceLock::new();
        let device_re = DEVICE_RE
            .get_or_init(|| regex::Regex::new(r"^(cpu|mps|cuda(:[0-9]{1,2})?|[0-9]{1,2})$").unwrap());
        if !device_re.is_match(&self.device) {
            return Err(MonitorError::invalid(format!(
                "device '{}' must be cpu, mps, cuda, cuda:N or a device index",
                self.device
            )));
        }
        if self.detection_model_path.trim().is_empty() {
            return Err(MonitorError::invalid("detection_model_path must not be empty"));
        }
        if self.tracker_model.trim().is_empty() {
            return Err(MonitorError::invalid("tracker_model must not be empty"));
        }
        if self.classes.iter().any(|c| c.is_empty()) {
            return Err(MonitorError::invalid("classes must not contain empty names"));
        }
        if self.frames_per_second == 0 || self.frames_per_second > MAX_FRAMES_PER_SECOND {
            return Err(MonitorError::invalid(format!(
                "frames_per_second must be in 1..={}",
                MAX_FRAMES_PER_SECOND
            )));
        }
        if self.frames_before_disappearance == 0 {
            return Err(MonitorError::invalid("frames_before_disappearance must be >= 1"));
        }
        if self.min_track_frames == 0 {
            return Err(MonitorError::invalid("min_track_frames must be >= 1"));
        }
        if !unit_interval(self.confidence_threshold) {
            return Err(MonitorError::invalid("confidence_threshold must be in [0, 1]"));
        }
        if !unit_interval(self.iou) {
            return Err(MonitorError::invalid("iou must be in [0, 1]"));
        }
        Ok(())
    }
}

fn unit_interval(value: f32) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        SessionConfig::default().validate().unwrap();
    }

    #[test]
    fn parses_wire_body_with_optional_fields() {
        let cfg: SessionConfig = serde_json::from_str(
            r#"{
                "device": "cuda:0",
                "detection_model_path": "models/yolo11n.pt",
                "classes": null,
                "tracker_model": "botsort.yaml",
                "frames_per_second": 5,
                "frames_before_disappearance": 15,
                "confidence_threshold": 0.4,
                "iou": 0.5
            }"#,
        )
        .unwrap();
        assert!(cfg.classes.is_empty());
        assert_eq!(cfg.min_track_frames, DEFAULT_MIN_TRACK_FRAMES);
        cfg.validate().unwrap();
    }

    #[test]
    fn classes_are_deduplicated() {
        let cfg: SessionConfig = serde_json::from_str(
            r#"{"device":"cpu","detection_model_path":"m","classes":["person","car","person"],
                "tracker_model":"t","frames_per_second":1,"frames_before_disappearance":1,
                "confidence_threshold":0,"min_track_frames":1,"iou":1}"#,
        )
        .unwrap();
        assert_eq!(cfg.classes.len(), 2);
        assert!(cfg.classes.contains("car"));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let base = SessionConfig::default();
        let cases: Vec<SessionConfig> = vec![
            SessionConfig { device: "gpu".into(), ..base.clone() },
            SessionConfig { detection_model_path: " ".into(), ..base.clone() },
            SessionConfig { tracker_model: String::new(), ..base.clone() },
            SessionConfig { frames_per_second: 0, ..base.clone() },
            SessionConfig { frames_per_second: 500, ..base.clone() },
            SessionConfig { frames_before_disappearance: 0, ..base.clone() },
            SessionConfig { min_track_frames: 0, ..base.clone() },
            SessionConfig { confidence_threshold: 1.5, ..base.clone() },
            SessionConfig { confidence_threshold: f32::NAN, ..base.clone() },
            SessionConfig { iou: -0.1, ..base.clone() },
            SessionConfig { classes: [String::new()].into_iter().collect(), ..base.clone() },
        ];
        for cfg in cases {
            let err = cfg.validate().unwrap_err();
            assert!(matches!(err, MonitorError::InvalidConfig(_)), "{:?}", cfg);
        }
    }

    #[test]
    fn accepts_device_spellings() {
        for device in ["cpu", "mps", "cuda", "cuda:1", "0"] {
            let cfg = SessionConfig { device: device.into(), ..SessionConfig::default() };
            cfg.validate().unwrap();
        }
    }
}
