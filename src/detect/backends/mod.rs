pub mod replay;
pub mod stub;

pub use replay::{ReplayBackend, ReplayStep};
pub use stub::StubBackend;
