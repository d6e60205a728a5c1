//! Camera monitoring core.
//!
//! Runs one detection-and-tracking session per camera and turns the noisy
//! per-frame tracker output into validated "object present" / "object gone"
//! events.
//!
//! # Architecture
//!
//! ```text
//! Orchestrator ──start──▶ CameraSession (one thread per camera)
//!                           FrameSource ─▶ Detector ─▶ TrackStateMachine ─▶ EventSink
//! ```
//!
//! The orchestrator guarantees a single live session per camera, including
//! under concurrent start/stop, and that `stop` returns only after the
//! session's detector and source were released.
//!
//! # Module Structure
//!
//! - `orchestrator`: session registry (start, stop, stop-all, list, status)
//! - `session`: per-camera config, status surface, frame loop
//! - `tracking`: track validation state machine
//! - `detect`: detector seam, registry, stub/replay backends
//! - `ingest`: frame sources and pacing
//! - `sink`: event sinks
//! - `api`: HTTP surface over the orchestrator
//! - `config`: daemon configuration

pub mod api;
pub mod camera;
pub mod config;
pub mod detect;
pub mod error;
pub mod event;
pub mod frame;
pub mod ingest;
pub mod orchestrator;
pub mod session;
pub mod sink;
pub mod tracking;

pub use camera::CameraId;
pub use detect::{
    BoundingBox, Detection, Detector, DetectorFactory, DetectorRegistry, InferenceParams,
    ReplayBackend, StubBackend,
};
pub use error::{MonitorError, Result};
pub use event::{Event, EventKind};
pub use frame::Frame;
pub use ingest::{FramePacer, FrameSource, SourceCatalog, SourceError, SourceFactory, SyntheticSource};
pub use orchestrator::{BatchFailure, BatchReport, Orchestrator};
pub use session::{
    CancelToken, SessionConfig, SessionHandle, SessionStats, SessionStatus, SessionSummary,
};
pub use sink::{ChannelSink, EventSink, FanoutSink, JsonlSink, LogSink, MemorySink};
pub use tracking::{Track, TrackState, TrackStateMachine};
