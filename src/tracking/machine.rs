use std::collections::BTreeMap;

use super::state::{Track, TrackState};
use crate::camera::CameraId;
use crate::detect::Detection;
use crate::event::{Event, EventKind};

/// Turns per-frame tracked detections into `Confirmed` / `Disappeared` events
/// for one camera.
///
/// Per frame, every known track is either observed or missed:
/// - observed: `seen_count += 1`, `missed_frames = 0`. A pending track reaching
///   `min_track_frames` becomes confirmed and emits `Confirmed`. A disappearing
///   track returns to the state it left, without an event.
/// - missed: `missed_frames += 1` and the track is disappearing. Once
///   `missed_frames` reaches `frames_before_disappearance` it is lost: the
///   record is dropped and `Disappeared` is emitted if it was ever confirmed.
///
/// Events for missed tracks come before events for observed tracks; within
/// each group they are ordered by track id.
#[derive(Debug)]
pub struct TrackStateMachine {
    camera: CameraId,
    min_track_frames: u32,
    frames_before_disappearance: u32,
    tracks: BTreeMap<u64, Track>,
    frames_observed: u64,
}

impl TrackStateMachine {
    /// Both thresholds are clamped to at least 1.
    pub fn new(camera: CameraId, min_track_frames: u32, frames_before_disappearance: u32) -> Self {
        Self {
            camera,
            min_track_frames: min_track_frames.max(1),
            frames_before_disappearance: frames_before_disappearance.max(1),
            tracks: BTreeMap::new(),
            frames_observed: 0,
        }
    }

    pub fn camera(&self) -> &CameraId {
        &self.camera
    }

    pub fn frames_observed(&self) -> u64 {
        self.frames_observed
    }

    /// Live track records (pending, confirmed or disappearing).
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    pub fn track(&self, track_id: u64) -> Option<&Track> {
        self.tracks.get(&track_id)
    }

    pub fn live_tracks(&self) -> usize {
        self.tracks.len()
    }

    /// Feed one frame's detection set. Returns the events it triggers.
    pub fn observe(
        &mut self,
        frame_index: u64,
        timestamp_ms: u64,
        detections: &[Detection],
    ) -> Vec<Event> {
        self.frames_observed += 1;
        let observed = strongest_per_track(detections);
        let mut events = Vec::new();

        let missing: Vec<u64> = self
            .tracks
            .keys()
            .filter(|id| !observed.contains_key(id))
            .copied()
            .collect();
        for track_id in missing {
            if let Some(event) = self.miss(track_id, frame_index, timestamp_ms) {
                events.push(event);
            }
        }

        for (track_id, detection) in observed {
            if let Some(event) = self.hit(track_id, detection, frame_index, timestamp_ms) {
                events.push(event);
            }
        }

        events
    }

    fn hit(
        &mut self,
        track_id: u64,
        detection: &Detection,
        frame_index: u64,
        timestamp_ms: u64,
    ) -> Option<Event> {
        let track = self.tracks.entry(track_id).or_insert_with(|| {
            log::trace!(
                "camera {}: new track {} ({})",
                self.camera,
                track_id,
                detection.class
            );
            Track::new(track_id, &detection.class, timestamp_ms)
        });
        track.seen_count = track.seen_count.saturating_add(1);
        track.missed_frames = 0;
        track.last_seen_ms = timestamp_ms;

        if track.state == TrackState::Disappearing {
            track.state = if track.confirmed {
                TrackState::Confirmed
            } else {
                TrackState::Pending
            };
        }

        if track.state == TrackState::Pending && track.seen_count >= self.min_track_frames {
            track.state = TrackState::Confirmed;
            track.confirmed = true;
            return Some(Event {
                camera_id: self.camera.clone(),
                track_id,
                class: track.class.clone(),
                kind: EventKind::Confirmed,
                timestamp_ms,
                frame_index,
                first_seen_ms: track.first_seen_ms,
            });
        }
        None
    }

    fn miss(&mut self, track_id: u64, frame_index: u64, timestamp_ms: u64) -> Option<Event> {
        let track = self.tracks.get_mut(&track_id)?;
        track.missed_frames = track.missed_frames.saturating_add(1);
        track.state = TrackState::Disappearing;
        if track.missed_frames < self.frames_before_disappearance {
            return None;
        }

        let mut track = self.tracks.remove(&track_id)?;
        track.state = TrackState::Lost;
        if !track.confirmed {
            log::trace!(
                "camera {}: dropped unconfirmed track {} after {} sightings",
                self.camera,
                track_id,
                track.seen_count
            );
            return None;
        }
        Some(Event {
            camera_id: self.camera.clone(),
            track_id,
            class: track.class,
            kind: EventKind::Disappeared,
            timestamp_ms,
            frame_index,
            first_seen_ms: track.first_seen_ms,
        })
    }
}

/// Drops untracked detections and keeps the most confident box per track id.
fn strongest_per_track(detections: &[Detection]) -> BTreeMap<u64, &Detection> {
    let mut out: BTreeMap<u64, &Detection> = BTreeMap::new();
    for detection in detections {
        let Some(track_id) = detection.track_id else {
            continue;
        };
        out.entry(track_id)
            .and_modify(|current| {
                if detection.confidence > current.confidence {
                    *current = detection;
                }
            })
            .or_insert(detection);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(min_track_frames: u32, frames_before_disappearance: u32) -> TrackStateMachine {
        TrackStateMachine::new(CameraId::from(1), min_track_frames, frames_before_disappearance)
    }

    fn person(track_id: u64) -> Detection {
        Detection::tracked(track_id, "person", 0.9)
    }

    /// Feeds frames 1..=n and returns (frame, kind, track) for every event.
    fn run(
        sm: &mut TrackStateMachine,
        frames: &[Vec<Detection>],
    ) -> Vec<(u64, EventKind, u64)> {
        let mut out = Vec::new();
        for (i, dets) in frames.iter().enumerate() {
            let index = i as u64 + 1;
            for ev in sm.observe(index, index * 100, dets) {
                out.push((index, ev.kind, ev.track_id));
            }
        }
        out
    }

    #[test]
    fn confirms_then_disappears() {
        let mut sm = machine(3, 2);
        let events = run(
            &mut sm,
            &[
                vec![person(7)],
                vec![person(7)],
                vec![person(7)],
                vec![],
                vec![],
            ],
        );
        assert_eq!(
            events,
            vec![(3, EventKind::Confirmed, 7), (5, EventKind::Disappeared, 7)]
        );
        assert_eq!(sm.live_tracks(), 0);
    }

    #[test]
    fn reappearance_within_grace_period_is_silent() {
        let mut sm = machine(3, 2);
        let events = run(
            &mut sm,
            &[
                vec![person(7)],
                vec![person(7)],
                vec![person(7)],
                vec![],
                vec![person(7)],
                vec![],
            ],
        );
        assert_eq!(events, vec![(3, EventKind::Confirmed, 7)]);
        let track = sm.track(7).unwrap();
        assert_eq!(track.state, TrackState::Disappearing);
        assert_eq!(track.missed_frames, 1);
    }

    #[test]
    fn disappearing_track_returns_to_confirmed() {
        let mut sm = machine(1, 3);
        run(&mut sm, &[vec![person(2)], vec![]]);
        assert_eq!(sm.track(2).unwrap().state, TrackState::Disappearing);
        let events = sm.observe(3, 300, &[person(2)]);
        assert!(events.is_empty());
        assert_eq!(sm.track(2).unwrap().state, TrackState::Confirmed);
    }

    #[test]
    fn unconfirmed_track_is_dropped_without_event() {
        let mut sm = machine(3, 2);
        let events = run(&mut sm, &[vec![person(4)], vec![person(4)], vec![], vec![]]);
        assert!(events.is_empty());
        assert!(sm.track(4).is_none());
    }

    #[test]
    fn short_gaps_do_not_reset_sightings() {
        let mut sm = machine(3, 2);
        let events = run(
            &mut sm,
            &[vec![person(5)], vec![], vec![person(5)], vec![], vec![person(5)]],
        );
        assert_eq!(events, vec![(5, EventKind::Confirmed, 5)]);
    }

    #[test]
    fn single_frame_grace_period_loses_on_first_miss() {
        let mut sm = machine(1, 1);
        let events = run(&mut sm, &[vec![person(9)], vec![]]);
        assert_eq!(
            events,
            vec![(1, EventKind::Confirmed, 9), (2, EventKind::Disappeared, 9)]
        );
    }

    #[test]
    fn redetection_after_loss_is_a_new_track() {
        let mut sm = machine(2, 1);
        let events = run(
            &mut sm,
            &[
                vec![person(3)],
                vec![person(3)],
                vec![],
                vec![person(3)],
                vec![person(3)],
            ],
        );
        assert_eq!(
            events,
            vec![
                (2, EventKind::Confirmed, 3),
                (3, EventKind::Disappeared, 3),
                (5, EventKind::Confirmed, 3),
            ]
        );
        assert_eq!(sm.track(3).unwrap().first_seen_ms, 400);
    }

    #[test]
    fn confirmed_is_emitted_once_per_track() {
        let mut sm = machine(2, 5);
        let frames: Vec<Vec<Detection>> = (0..20).map(|_| vec![person(1)]).collect();
        let events = run(&mut sm, &frames);
        assert_eq!(events, vec![(2, EventKind::Confirmed, 1)]);
        assert_eq!(sm.track(1).unwrap().seen_count, 20);
    }

    #[test]
    fn tracks_are_independent() {
        let mut sm = machine(2, 2);
        let events = run(
            &mut sm,
            &[
                vec![person(1), Detection::tracked(2, "car", 0.8)],
                vec![person(1)],
                vec![],
                vec![],
            ],
        );
        assert_eq!(
            events,
            vec![(2, EventKind::Confirmed, 1), (4, EventKind::Disappeared, 1)]
        );
        assert_eq!(sm.live_tracks(), 0);
    }

    #[test]
    fn untracked_and_duplicate_detections() {
        let mut sm = machine(1, 2);
        let untracked = Detection {
            track_id: None,
            ..person(0)
        };
        let events = sm.observe(
            1,
            100,
            &[
                untracked,
                Detection::tracked(6, "person", 0.4),
                Detection::tracked(6, "bicycle", 0.95),
            ],
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].class, "bicycle");
        let ids: Vec<u64> = sm.tracks().map(|t| t.track_id).collect();
        assert_eq!(ids, vec![6]);
        assert_eq!(sm.track(6).unwrap().seen_count, 1);
    }

    #[test]
    fn events_carry_camera_and_timing() {
        let mut sm = TrackStateMachine::new(CameraId::parse("dock").unwrap(), 2, 1);
        assert_eq!(sm.camera().as_str(), "dock");
        sm.observe(10, 1_000, &[person(8)]);
        let confirmed = sm.observe(11, 1_100, &[person(8)]);
        assert_eq!(confirmed[0].camera_id.as_str(), "dock");
        assert_eq!(confirmed[0].frame_index, 11);
        assert_eq!(confirmed[0].timestamp_ms, 1_100);
        assert_eq!(confirmed[0].first_seen_ms, 1_000);

        let gone = sm.observe(12, 1_200, &[]);
        assert_eq!(gone[0].kind, EventKind::Disappeared);
        assert_eq!(gone[0].first_seen_ms, 1_000);
        assert_eq!(sm.frames_observed(), 3);
    }

    #[test]
    fn unknown_ids_absent_from_frame_create_nothing() {
        let mut sm = machine(1, 1);
        assert!(sm.observe(1, 0, &[]).is_empty());
        assert_eq!(sm.live_tracks(), 0);
    }
}
