//! Pause-aware wall clock used to interpolate playback position between
//! buffer boundaries.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub(crate) struct Timer {
    elapsed: Duration,
    running_since: Option<Instant>,
}

impl Timer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Start (or keep) running. Time already accumulated is kept.
    pub(crate) fn resume(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    pub(crate) fn pause(&mut self) {
        if let Some(start) = self.running_since.take() {
            self.elapsed += start.elapsed();
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    pub(crate) fn elapsed(&self) -> Duration {
        match self.running_since {
            Some(start) => self.elapsed + start.elapsed(),
            None => self.elapsed,
        }
    }

    /// Zero the clock, keeping the running/paused state.
    pub(crate) fn restart(&mut self) {
        self.elapsed = Duration::ZERO;
        if self.running_since.is_some() {
            self.running_since = Some(Instant::now());
        }
    }

    /// Remove `amount` from the accumulated time, saturating at zero.
    pub(crate) fn consume(&mut self, amount: Duration) {
        let now = Instant::now();
        let total = self.elapsed();
        self.elapsed = total.saturating_sub(amount);
        if self.running_since.is_some() {
            self.running_since = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn paused_timer_does_not_advance() {
        let mut timer = Timer::new();
        assert_eq!(timer.elapsed(), Duration::ZERO);
        timer.resume();
        thread::sleep(Duration::from_millis(15));
        timer.pause();
        let frozen = timer.elapsed();
        assert!(frozen >= Duration::from_millis(15));
        thread::sleep(Duration::from_millis(10));
        assert_eq!(timer.elapsed(), frozen);
    }

    #[test]
    fn restart_and_consume() {
        let mut timer = Timer::new();
        timer.resume();
        thread::sleep(Duration::from_millis(20));
        timer.pause();
        timer.consume(Duration::from_millis(5));
        assert!(timer.elapsed() >= Duration::from_millis(15));
        timer.consume(Duration::from_secs(10));
        assert_eq!(timer.elapsed(), Duration::ZERO);

        timer.resume();
        timer.restart();
        assert!(timer.is_running());
        assert!(timer.elapsed() < Duration::from_millis(10));
    }
}
