//! Camera sessions.
//!
//! A session binds one camera to one detector, one frame source and one
//! `TrackStateMachine`, and runs the frame loop on its own thread. The
//! orchestrator keeps a `RunningSession` per camera: the cancel token, the
//! join handle and a shared status cell the loop reports into.

mod config;
mod runner;

pub use config::{SessionConfig, DEFAULT_MIN_TRACK_FRAMES, MAX_FRAMES_PER_SECOND};

use rand::RngCore;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crate::camera::CameraId;
use crate::detect::DetectorFactory;
use crate::error::{MonitorError, Result};
use crate::frame::now_ms;
use crate::ingest::SourceFactory;
use crate::sink::EventSink;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    /// Thread started, detector/source not ready yet.
    Starting,
    Running,
    /// Cancellation requested, waiting for the loop to release resources.
    Stopping,
    Stopped,
    /// The source reached the end of its stream.
    Finished,
    Failed { reason: String },
}

impl SessionStatus {
    /// The loop has exited and released its resources.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Stopped | SessionStatus::Finished | SessionStatus::Failed { .. }
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub frames_processed: u64,
    pub detector_failures: u64,
    pub source_interruptions: u64,
    pub events_emitted: u64,
    pub sink_failures: u64,
    pub live_tracks: usize,
}

/// Returned by `Orchestrator::start`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionHandle {
    pub camera_id: CameraId,
    /// Random id distinguishing successive sessions of the same camera.
    pub session_id: String,
    pub started_at_ms: u64,
}

/// Registry snapshot entry returned by `Orchestrator::list`.
#[derive(Clone, Debug, Serialize)]
pub struct SessionSummary {
    pub camera_id: CameraId,
    pub session_id: String,
    pub started_at_ms: u64,
    pub status: SessionStatus,
    pub stats: SessionStats,
    pub config: SessionConfig,
}

#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
struct Snapshot {
    status: SessionStatus,
    stats: SessionStats,
}

/// Status + stats shared between a session thread and the registry.
#[derive(Clone, Debug)]
pub(crate) struct StatusCell(Arc<Mutex<Snapshot>>);

impl StatusCell {
    fn new() -> Self {
        StatusCell(Arc::new(Mutex::new(Snapshot {
            status: SessionStatus::Starting,
            stats: SessionStats::default(),
        })))
    }

    fn with<R>(&self, f: impl FnOnce(&mut Snapshot) -> R) -> R {
        let mut guard = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub(crate) fn status(&self) -> SessionStatus {
        self.with(|s| s.status.clone())
    }

    pub(crate) fn stats(&self) -> SessionStats {
        self.with(|s| s.stats.clone())
    }

    pub(crate) fn record(&self, f: impl FnOnce(&mut SessionStats)) {
        self.with(|s| f(&mut s.stats))
    }

    /// Starting -> Running. A stop request that arrived first wins.
    pub(crate) fn mark_running(&self) {
        self.with(|s| {
            if s.status == SessionStatus::Starting {
                s.status = SessionStatus::Running;
            }
        })
    }

    /// Live -> Stopping. Terminal states are kept.
    pub(crate) fn mark_stopping(&self) {
        self.with(|s| {
            if !s.status.is_terminal() {
                s.status = SessionStatus::Stopping;
            }
        })
    }

    pub(crate) fn finish(&self, status: SessionStatus) {
        self.with(|s| s.status = status)
    }
}

/// Collaborators a session needs, shared by every session.
#[derive(Clone)]
pub struct SessionDeps {
    pub detectors: Arc<dyn DetectorFactory>,
    pub sources: Arc<dyn SourceFactory>,
    pub sink: Arc<dyn EventSink>,
}

/// Registry-side view of a live session thread.
pub(crate) struct RunningSession {
    pub(crate) handle: SessionHandle,
    pub(crate) config: SessionConfig,
    cancel: CancelToken,
    state: StatusCell,
    join: Option<JoinHandle<Result<()>>>,
}

impl RunningSession {
    pub(crate) fn status(&self) -> SessionStatus {
        self.state.status()
    }

    pub(crate) fn summary(&self) -> SessionSummary {
        SessionSummary {
            camera_id: self.handle.camera_id.clone(),
            session_id: self.handle.session_id.clone(),
            started_at_ms: self.handle.started_at_ms,
            status: self.state.status(),
            stats: self.state.stats(),
            config: self.config.clone(),
        }
    }

    /// Signal cancellation and hand out the join handle. Never blocks.
    pub(crate) fn request_stop(&mut self) -> Option<JoinHandle<Result<()>>> {
        self.cancel.cancel();
        self.state.mark_stopping();
        self.join.take()
    }
}

/// Spawn the session thread. Returns as soon as the thread exists; the
/// detector and source are set up on the thread itself.
pub(crate) fn spawn(
    camera: CameraId,
    config: SessionConfig,
    deps: SessionDeps,
) -> Result<RunningSession> {
    let mut id_bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut id_bytes);
    let handle = SessionHandle {
        camera_id: camera.clone(),
        session_id: hex::encode(id_bytes),
        started_at_ms: now_ms(),
    };
    let cancel = CancelToken::default();
    let state = StatusCell::new();

    let runner = runner::SessionRunner {
        camera: camera.clone(),
        config: config.clone(),
        deps,
        cancel: cancel.clone(),
        state: state.clone(),
    };
    let join = std::thread::Builder::new()
        .name(format!("camera-{}", camera))
        .spawn(move || runner.run())
        .map_err(|e| MonitorError::SessionSpawn(e.to_string()))?;

    Ok(RunningSession {
        handle,
        config,
        cancel,
        state,
        join: Some(join),
    })
}
