//! Process-wide registry of camera sessions.
//!
//! At most one session exists per camera at any instant. The registry mutex
//! is held only to check and mutate the map, never while a session is being
//! joined, so start/stop for different cameras run concurrently while
//! start/stop for the same camera serialize on the registry entry:
//!
//! - `start` inserts a fully spawned session under the lock.
//! - `stop` marks the entry as stopping under the lock, joins the thread
//!   outside it, then removes the entry. While the entry is stopping a
//!   `start` for that camera sees `AlreadyMonitoring` and a second `stop`
//!   sees `NotMonitoring`, so the old session's detector and source are
//!   released before a new session can open them.
//! - `stop_all` signals every idle entry, joins those, then waits on a
//!   condvar for entries another caller was already stopping. It returns
//!   with the registry empty of everything that existed when it was called.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use crate::camera::CameraId;
use crate::detect::DetectorFactory;
use crate::error::{MonitorError, Result};
use crate::ingest::SourceFactory;
use crate::session::{
    self, RunningSession, SessionConfig, SessionDeps, SessionHandle, SessionSummary,
};
use crate::sink::EventSink;

struct Entry {
    session: RunningSession,
    stopping: bool,
}

impl Entry {
    /// The loop exited on its own (finished or failed) and nobody is stopping it.
    fn is_reapable(&self) -> bool {
        !self.stopping && self.session.status().is_terminal()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct BatchFailure {
    pub camera_id: CameraId,
    pub error: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct BatchReport {
    pub total_cameras: usize,
    pub successful: Vec<CameraId>,
    pub failed: Vec<BatchFailure>,
}

pub struct Orchestrator {
    sessions: Mutex<HashMap<CameraId, Entry>>,
    /// Signalled whenever a stopped entry leaves the registry.
    removed: Condvar,
    deps: SessionDeps,
}

impl Orchestrator {
    pub fn new(
        detectors: Arc<dyn DetectorFactory>,
        sources: Arc<dyn SourceFactory>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            removed: Condvar::new(),
            deps: SessionDeps {
                detectors,
                sources,
                sink,
            },
        }
    }

    // Nothing panics while holding the registry lock, but a poisoned map is
    // still consistent: every mutation is a single insert/remove/flag flip.
    fn registry(&self) -> MutexGuard<'_, HashMap<CameraId, Entry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove_stopped(&self, camera: &CameraId) {
        self.registry().remove(camera);
        self.removed.notify_all();
    }

    /// Start monitoring `camera`. Returns once the session thread is running;
    /// does not wait for the first frame.
    pub fn start(&self, camera: CameraId, config: SessionConfig) -> Result<SessionHandle> {
        config.validate()?;

        let (spawned, reaped) = {
            let mut sessions = self.registry();
            let reaped = match sessions.get(&camera).map(Entry::is_reapable) {
                Some(false) => return Err(MonitorError::AlreadyMonitoring(camera)),
                Some(true) => sessions.remove(&camera),
                None => None,
            };
            let spawned = session::spawn(camera.clone(), config, self.deps.clone()).map(|session| {
                let handle = session.handle.clone();
                sessions.insert(
                    camera.clone(),
                    Entry {
                        session,
                        stopping: false,
                    },
                );
                handle
            });
            (spawned, reaped)
        };

        if let Some(mut old) = reaped {
            log::info!(
                "camera {}: reaping ended session {}",
                camera,
                old.session.handle.session_id
            );
            join_session(&camera, old.session.request_stop());
        }

        let handle = spawned?;
        log::info!("camera {}: monitoring started (session {})", camera, handle.session_id);
        Ok(handle)
    }

    /// Start the same config on several cameras. Per-camera failures are
    /// reported, not returned; an invalid config fails the whole batch.
    pub fn start_batch(&self, cameras: &[CameraId], config: &SessionConfig) -> Result<BatchReport> {
        config.validate()?;
        let mut report = BatchReport {
            total_cameras: cameras.len(),
            ..BatchReport::default()
        };
        for camera in cameras {
            match self.start(camera.clone(), config.clone()) {
                Ok(_) => report.successful.push(camera.clone()),
                Err(err) => {
                    log::warn!("camera {}: batch start failed: {}", camera, err);
                    report.failed.push(BatchFailure {
                        camera_id: camera.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }
        log::info!(
            "batch start: {}/{} sessions started",
            report.successful.len(),
            report.total_cameras
        );
        Ok(report)
    }

    /// Stop monitoring `camera`. Blocks until the session has released its
    /// detector and source.
    pub fn stop(&self, camera: &CameraId) -> Result<()> {
        let join = {
            let mut sessions = self.registry();
            match sessions.get_mut(camera) {
                Some(entry) if !entry.stopping => {
                    entry.stopping = true;
                    entry.session.request_stop()
                }
                _ => return Err(MonitorError::NotMonitoring(camera.clone())),
            }
        };

        log::info!("camera {}: stopping session", camera);
        join_session(camera, join);
        self.remove_stopped(camera);
        log::info!("camera {}: monitoring stopped", camera);
        Ok(())
    }

    /// Stop every registered session. Returns how many this call stopped;
    /// sessions already being stopped by another caller are waited for but
    /// not counted.
    pub fn stop_all(&self) -> usize {
        // Signal every session first so they wind down in parallel.
        let mut joins: Vec<(CameraId, Option<JoinHandle<Result<()>>>)> = Vec::new();
        let mut in_flight: Vec<CameraId> = Vec::new();
        {
            let mut sessions = self.registry();
            for (camera, entry) in sessions.iter_mut() {
                if entry.stopping {
                    in_flight.push(camera.clone());
                } else {
                    entry.stopping = true;
                    joins.push((camera.clone(), entry.session.request_stop()));
                }
            }
        }

        let count = joins.len();
        if count > 0 {
            log::info!("stopping {} sessions", count);
        }
        for (camera, join) in joins {
            join_session(&camera, join);
            self.remove_stopped(&camera);
        }

        if !in_flight.is_empty() {
            log::info!("waiting for {} sessions already stopping", in_flight.len());
            let mut sessions = self.registry();
            while in_flight
                .iter()
                .any(|camera| sessions.get(camera).map_or(false, |entry| entry.stopping))
            {
                sessions = self
                    .removed
                    .wait(sessions)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        }

        if count > 0 {
            log::info!("all {} sessions stopped", count);
        }
        count
    }

    /// Snapshot of the registry, ordered by camera id.
    pub fn list(&self) -> Vec<SessionSummary> {
        let mut out: Vec<SessionSummary> = self
            .registry()
            .values()
            .map(|entry| entry.session.summary())
            .collect();
        out.sort_by(|a, b| a.camera_id.cmp(&b.camera_id));
        out
    }

    pub fn status(&self, camera: &CameraId) -> Result<SessionSummary> {
        self.registry()
            .get(camera)
            .map(|entry| entry.session.summary())
            .ok_or_else(|| MonitorError::NotMonitoring(camera.clone()))
    }

    pub fn is_monitoring(&self, camera: &CameraId) -> bool {
        self.registry().contains_key(camera)
    }

    pub fn len(&self) -> usize {
        self.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        let stopped = self.stop_all();
        if stopped > 0 {
            log::info!("orchestrator shut down, {} sessions stopped", stopped);
        }
    }
}

/// Wait for a session thread. Teardown failures are logged; they never
/// keep the entry registered.
fn join_session(camera: &CameraId, join: Option<JoinHandle<Result<()>>>) {
    let Some(join) = join else {
        return;
    };
    match join.join() {
        Ok(Ok(())) => {}
        Ok(Err(err)) => log::warn!("camera {}: {}", camera, err),
        Err(_) => log::error!("camera {}: session thread panicked", camera),
    }
}
