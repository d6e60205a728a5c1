use super::{CancelToken, SessionConfig, SessionDeps, SessionStatus, StatusCell};
use crate::camera::CameraId;
use crate::detect::{Detector, InferenceParams};
use crate::error::{MonitorError, Result};
use crate::ingest::{FramePacer, FrameSource, SourceError};
use crate::tracking::TrackStateMachine;

enum LoopEnd {
    Cancelled,
    Exhausted,
    Fatal(MonitorError),
}

pub(crate) struct SessionRunner {
    pub(crate) camera: CameraId,
    pub(crate) config: SessionConfig,
    pub(crate) deps: SessionDeps,
    pub(crate) cancel: CancelToken,
    pub(crate) state: StatusCell,
}

impl SessionRunner {
    /// Thread body. The status cell reaches a terminal state only after the
    /// detector and source have been released. Returns the teardown result.
    pub(crate) fn run(self) -> Result<()> {
        let camera = &self.camera;

        let mut detector = match self.deps.detectors.build(&self.config) {
            Ok(detector) => detector,
            Err(err) => {
                log::error!("camera {}: detector setup failed: {:#}", camera, err);
                self.state.finish(SessionStatus::Failed {
                    reason: format!("detector setup failed: {}", err),
                });
                return Ok(());
            }
        };

        let mut source = match self.deps.sources.open(camera, self.config.frames_per_second) {
            Ok(source) => source,
            Err(err) => {
                let fatal = MonitorError::SourceFatalFailure(err.to_string());
                log::error!("camera {}: {}", camera, fatal);
                let released = release(camera, detector.as_mut(), None);
                self.state.finish(SessionStatus::Failed {
                    reason: fatal.to_string(),
                });
                return released;
            }
        };

        log::info!(
            "camera {}: session running ({}, detector {})",
            camera,
            source.describe(),
            detector.name()
        );
        self.state.mark_running();

        let end = self.frame_loop(detector.as_mut(), source.as_mut());
        let released = release(camera, detector.as_mut(), Some(&mut source));

        let status = match end {
            LoopEnd::Cancelled => {
                log::info!("camera {}: session stopped", camera);
                SessionStatus::Stopped
            }
            LoopEnd::Exhausted => {
                log::info!("camera {}: source exhausted, session finished", camera);
                SessionStatus::Finished
            }
            LoopEnd::Fatal(err) => {
                log::error!("camera {}: session terminated: {}", camera, err);
                SessionStatus::Failed {
                    reason: err.to_string(),
                }
            }
        };
        self.state.finish(status);
        released
    }

    fn frame_loop(&self, detector: &mut dyn Detector, source: &mut dyn FrameSource) -> LoopEnd {
        let camera = &self.camera;
        let params = InferenceParams::from_config(&self.config);
        let mut machine = TrackStateMachine::new(
            camera.clone(),
            self.config.min_track_frames,
            self.config.frames_before_disappearance,
        );
        // A source that keeps failing is retried at most once per frame slot.
        let retry_backoff = FramePacer::new(self.config.frames_per_second).budget();

        loop {
            if self.cancel.is_cancelled() {
                return LoopEnd::Cancelled;
            }

            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => return LoopEnd::Exhausted,
                Err(SourceError::Interrupted(reason)) => {
                    log::warn!("camera {}: frame read interrupted: {}", camera, reason);
                    self.state.record(|s| s.source_interruptions += 1);
                    std::thread::sleep(retry_backoff);
                    continue;
                }
                Err(err @ SourceError::Unreachable(_)) => {
                    return LoopEnd::Fatal(MonitorError::SourceFatalFailure(err.to_string()));
                }
            };

            // The source may have blocked for a while.
            if self.cancel.is_cancelled() {
                return LoopEnd::Cancelled;
            }
            if frame.index == 0 {
                log::info!("camera {}: first frame {}x{}", camera, frame.width, frame.height);
            }

            let detections = match detector.infer(&frame, &params) {
                Ok(detections) => detections,
                Err(err) => {
                    let err = MonitorError::DetectorTransientFailure {
                        frame_index: frame.index,
                        reason: format!("{:#}", err),
                    };
                    log::warn!("camera {}: {}; skipping frame", camera, err);
                    self.state.record(|s| s.detector_failures += 1);
                    continue;
                }
            };
            log::trace!(
                "camera {}: frame {} -> {} detections",
                camera,
                frame.index,
                detections.len()
            );

            let events = machine.observe(frame.index, frame.captured_at_ms, &detections);
            let mut sink_failures = 0;
            for event in &events {
                if let Err(err) = self.deps.sink.publish(event) {
                    log::warn!("camera {}: event sink rejected event: {:#}", camera, err);
                    sink_failures += 1;
                }
            }

            self.state.record(|s| {
                s.frames_processed += 1;
                s.events_emitted += events.len() as u64;
                s.sink_failures += sink_failures;
                s.live_tracks = machine.live_tracks();
            });
        }
    }
}

/// Release the detector and (if opened) the source. Both are attempted even
/// if the first fails.
fn release(
    camera: &CameraId,
    detector: &mut dyn Detector,
    source: Option<&mut Box<dyn FrameSource>>,
) -> Result<()> {
    let mut failures = Vec::new();
    if let Err(err) = detector.release() {
        failures.push(format!("detector: {:#}", err));
    }
    if let Some(source) = source {
        if let Err(err) = source.close() {
            failures.push(format!("source: {:#}", err));
        }
    }
    if failures.is_empty() {
        log::debug!("camera {}: resources released", camera);
        return Ok(());
    }
    let err = MonitorError::ResourceReleaseFailure(failures.join("; "));
    log::error!("camera {}: {}", camera, err);
    Err(err)
}
