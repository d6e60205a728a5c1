//! Track validation.
//!
//! Raw tracker output is noisy: ids flicker in and out and short-lived false
//! positives get ids too. `TrackStateMachine` turns that stream into two
//! validated signals per track, `Confirmed` and `Disappeared`.

mod machine;
mod state;

pub use machine::TrackStateMachine;
pub use state::{Track, TrackState};
