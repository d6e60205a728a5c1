//! Detection + tracking capability.
//!
//! The detector itself is an external collaborator: this module defines the
//! `Detector` seam, the parameters it receives, and the registry that builds a
//! detector from a validated session config.

mod backend;
pub mod backends;
mod registry;
mod result;

pub use backend::{Detector, DetectorFactory, InferenceParams};
pub use backends::{ReplayBackend, ReplayStep, StubBackend};
pub use registry::DetectorRegistry;
pub use result::{BoundingBox, Detection};
