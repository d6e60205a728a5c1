//! Orchestrator error taxonomy.
//!
//! Registry conflicts and config rejections are returned to the caller.
//! Per-frame and teardown failures are carried here so they can be logged and
//! reported through the session status surface, but they never cross a
//! session boundary.

use crate::camera::CameraId;

pub type Result<T> = std::result::Result<T, MonitorError>;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Bad session parameters. Rejected before any resource is acquired.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("camera {0} is already being monitored")]
    AlreadyMonitoring(CameraId),

    #[error("camera {0} is not being monitored")]
    NotMonitoring(CameraId),

    /// Single-frame inference error. The frame is skipped.
    #[error("detector failed on frame {frame_index}: {reason}")]
    DetectorTransientFailure { frame_index: u64, reason: String },

    /// Camera unreachable or disconnected. The session terminates.
    #[error("frame source failed: {0}")]
    SourceFatalFailure(String),

    /// Teardown error during stop. The registry entry is removed regardless.
    #[error("failed to release session resources: {0}")]
    ResourceReleaseFailure(String),

    /// The session thread could not be started.
    #[error("failed to spawn session: {0}")]
    SessionSpawn(String),
}

impl MonitorError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        MonitorError::InvalidConfig(reason.into())
    }

    /// HTTP status code for the API layer.
    pub fn http_status(&self) -> u16 {
        match self {
            MonitorError::InvalidConfig(_) => 422,
            MonitorError::AlreadyMonitoring(_) => 409,
            MonitorError::NotMonitoring(_) => 404,
            _ => 500,
        }
    }
}
