//! Frame clock for the main loop.

use std::time::{Duration, Instant};

/// Upper bound on a single frame delta.
///
/// The loop can block for a long time (minimized window, swapchain
/// recreation), and input integration must not see that as one huge step.
pub const MAX_FRAME_DELTA: Duration = Duration::from_millis(250);

/// Measures time between frames and since startup.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
    ticks: u64,
}

impl Timer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            ticks: 0,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Time since the previous tick, clamped to [`MAX_FRAME_DELTA`].
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.ticks += 1;
        delta.min(MAX_FRAME_DELTA)
    }

    pub fn delta_secs(&mut self) -> f32 {
        self.tick().as_secs_f32()
    }

    /// Number of ticks so far, i.e. loop iterations.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Average iterations per second since startup.
    pub fn average_rate(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 { self.ticks as f64 / secs } else { 0.0 }
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_measures_sleep() {
        let mut timer = Timer::new();
        std::thread::sleep(Duration::from_millis(2));
        let first = timer.tick();
        assert!(first >= Duration::from_millis(2));
        assert!(timer.elapsed() >= first);
        assert_eq!(timer.ticks(), 1);
    }

    #[test]
    fn test_long_stall_is_clamped() {
        let mut timer = Timer::new();
        timer.last_tick -= Duration::from_secs(3);
        assert_eq!(timer.tick(), MAX_FRAME_DELTA);
    }

    #[test]
    fn test_average_rate_counts_ticks() {
        let mut timer = Timer::new();
        timer.start -= Duration::from_secs(2);
        for _ in 0..10 {
            timer.tick();
        }
        let rate = timer.average_rate();
        assert!(rate > 4.0 && rate <= 5.0, "rate was {}", rate);
    }
}
