use std::time::{Duration, Instant};

/// Sleeps between frames to hold a target rate.
///
/// Deadlines advance by one frame budget per call. When the producer falls
/// behind, the next deadline is rebased on the current instant instead of
/// bursting to catch up.
#[derive(Debug)]
pub struct FramePacer {
    budget: Duration,
    next_due: Option<Instant>,
    late_frames: u64,
}

impl FramePacer {
    pub fn new(frames_per_second: u32) -> Self {
        let fps = frames_per_second.max(1) as u64;
        Self {
            budget: Duration::from_micros(1_000_000 / fps),
            next_due: None,
            late_frames: 0,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Frames that were already overdue when requested.
    pub fn late_frames(&self) -> u64 {
        self.late_frames
    }

    /// Block until the next frame slot. The first call returns immediately.
    pub fn wait(&mut self) {
        let now = Instant::now();
        let due = match self.next_due {
            None => now,
            Some(due) => due,
        };
        if due > now {
            std::thread::sleep(due - now);
            self.next_due = Some(due + self.budget);
        } else {
            if self.next_due.is_some() && now - due > self.budget {
                self.late_frames += 1;
            }
            self.next_due = Some(now + self.budget);
        }
    }
}
