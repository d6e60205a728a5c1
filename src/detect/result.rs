use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// One tracked object observation in one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: String,
    pub confidence: f32,
    #[serde(default)]
    pub bbox: BoundingBox,
    /// Tracker-assigned id. `None` when the tracker could not associate the box.
    #[serde(default)]
    pub track_id: Option<u64>,
}

impl Detection {
    pub fn tracked(track_id: u64, class: impl Into<String>, confidence: f32) -> Self {
        Self {
            class: class.into(),
            confidence,
            bbox: BoundingBox::default(),
            track_id: Some(track_id),
        }
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = bbox;
        self
    }
}
