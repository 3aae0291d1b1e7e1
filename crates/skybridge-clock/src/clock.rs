//! Simulated time, end time, and the running flag.

/// Simulated time in seconds.
pub type SimTime = f64;

/// Plain clock state. Always accessed through the clock lock in
/// [`ClockHandle`](crate::ClockHandle).
#[derive(Debug, Clone)]
pub struct SimulationClock {
    now: SimTime,
    end_time: SimTime,
    running: bool,
}

impl SimulationClock {
    pub fn new(end_time: SimTime) -> Self {
        Self {
            now: 0.0,
            end_time,
            running: true,
        }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn end_time(&self) -> SimTime {
        self.end_time
    }

    pub fn set_end_time(&mut self, end_time: SimTime) {
        self.end_time = end_time;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// `running && now < end_time`
    pub fn should_continue(&self) -> bool {
        self.running && self.now < self.end_time
    }

    /// Move time forward. `step` must be non-negative.
    pub(crate) fn advance_by(&mut self, step: SimTime) {
        debug_assert!(step >= 0.0, "clock cannot move backwards (step={step})");
        self.now += step;
    }

    pub(crate) fn stop(&mut self) {
        self.running = false;
    }

    /// Rewind to zero for a synchronized start.
    pub(crate) fn reset(&mut self) {
        self.now = 0.0;
    }
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new(f64::INFINITY)
    }
}
