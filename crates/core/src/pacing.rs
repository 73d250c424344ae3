use std::time::{Duration, Instant};

/// Sleeps out the remainder of a target frame time.
///
/// Replaces a fixed per-iteration sleep: the loop only waits for whatever is
/// left after the frame's own work, and not at all when pacing is disabled.
#[derive(Debug)]
pub struct FramePacer {
    target: Option<Duration>,
    frame_start: Instant,
}

impl FramePacer {
    pub fn new(target: Option<Duration>) -> Self {
        Self {
            target,
            frame_start: Instant::now(),
        }
    }

    /// Pace to `fps` frames per second. Zero disables pacing.
    pub fn from_fps(fps: u32) -> Self {
        let target = (fps > 0).then(|| Duration::from_secs_f64(1.0 / f64::from(fps)));
        Self::new(target)
    }

    pub fn target(&self) -> Option<Duration> {
        self.target
    }

    /// Time still to wait when `elapsed` has passed since the frame began.
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.target
            .map(|target| target.saturating_sub(elapsed))
            .unwrap_or(Duration::ZERO)
    }

    /// Block until the target frame time has passed, then start the next frame.
    pub fn wait(&mut self) {
        let remaining = self.remaining(self.frame_start.elapsed());
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
        self.frame_start = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_is_target_minus_elapsed() {
        let pacer = FramePacer::new(Some(Duration::from_millis(16)));
        assert_eq!(
            pacer.remaining(Duration::from_millis(10)),
            Duration::from_millis(6)
        );
    }

    #[test]
    fn test_overrun_frame_does_not_wait() {
        let pacer = FramePacer::new(Some(Duration::from_millis(16)));
        assert_eq!(pacer.remaining(Duration::from_millis(40)), Duration::ZERO);
    }

    #[test]
    fn test_disabled_pacer_never_waits() {
        let pacer = FramePacer::from_fps(0);
        assert!(pacer.target().is_none());
        assert_eq!(pacer.remaining(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_wait_blocks_for_target() {
        let mut pacer = FramePacer::new(Some(Duration::from_millis(5)));
        let start = Instant::now();
        pacer.wait();
        assert!(start.elapsed() >= Duration::from_millis(4));
    }
}
