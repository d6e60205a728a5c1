use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackState {
    /// Seen fewer than `min_track_frames` times; nothing reported yet.
    Pending,
    /// Reported via a `Confirmed` event.
    Confirmed,
    /// Missing from recent frames, still inside the grace period.
    Disappearing,
    /// Grace period exhausted. The record is dropped in the same step.
    Lost,
}

/// Per-track accumulator owned by one `TrackStateMachine`.
#[derive(Clone, Debug, Serialize)]
pub struct Track {
    pub track_id: u64,
    pub class: String,
    pub state: TrackState,
    /// Frames in which the track was observed. Short gaps do not reset it.
    pub seen_count: u32,
    /// Consecutive frames without an observation.
    pub missed_frames: u32,
    pub first_seen_ms: u64,
    pub last_seen_ms: u64,
    /// Whether a `Confirmed` event was ever emitted for this record.
    pub confirmed: bool,
}

impl Track {
    pub(crate) fn new(track_id: u64, class: &str, timestamp_ms: u64) -> Self {
        Self {
            track_id,
            class: class.to_string(),
            state: TrackState::Pending,
            seen_count: 0,
            missed_frames: 0,
            first_seen_ms: timestamp_ms,
            last_seen_ms: timestamp_ms,
            confirmed: false,
        }
    }
}
