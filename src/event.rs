use serde::{Deserialize, Serialize};

use crate::camera::CameraId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The track was observed often enough to be considered real.
    Confirmed,
    /// A confirmed track stayed absent for the whole grace period.
    Disappeared,
}

/// Validated track lifecycle event. Immutable once emitted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub camera_id: CameraId,
    pub track_id: u64,
    pub class: String,
    pub kind: EventKind,
    /// Capture time of the frame that triggered the event (ms since epoch).
    pub timestamp_ms: u64,
    /// Index of the frame that triggered the event.
    pub frame_index: u64,
    /// Capture time of the track's first observation.
    pub first_seen_ms: u64,
}
