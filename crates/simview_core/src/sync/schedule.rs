//! Camera sampling schedule.
//!
//! Camera frames are phase-locked to simulation time, not wall time. A frame
//! is due once the simulation has advanced a full sampling interval past the
//! last captured frame.

/// Tolerance absorbing floating point round-off in accumulated step times.
///
/// With a 0.002 s step, ten steps sum to 0.019999999999999997, which must
/// still count as a full 0.02 s interval.
pub const CAMERA_TIME_EPSILON: f64 = 1e-5;

/// Decides when a simulation instance needs a new camera frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraSchedule {
    /// Sampling interval in simulation seconds.
    interval: f64,
}

impl CameraSchedule {
    /// Default camera sampling interval (50 Hz).
    pub const DEFAULT_INTERVAL: f64 = 0.020;

    /// Creates a schedule with the given interval in simulation seconds.
    #[must_use]
    pub const fn new(interval: f64) -> Self {
        Self { interval }
    }

    /// Returns the sampling interval.
    #[must_use]
    pub const fn interval(&self) -> f64 {
        self.interval
    }

    /// Returns `true` if a frame is due at `sim_time` given the time of the
    /// last captured frame.
    #[must_use]
    pub fn is_due(&self, sim_time: f64, last_frame_time: f64) -> bool {
        sim_time - last_frame_time > self.interval - CAMERA_TIME_EPSILON
    }
}

impl Default for CameraSchedule {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Steps a clock the way a physics integrator does (repeated addition)
    /// and returns the step indices at which frames fire.
    fn firing_steps(interval: f64, timestep: f64, steps: usize) -> Vec<usize> {
        let schedule = CameraSchedule::new(interval);
        let mut time = 0.0;
        let mut last = 0.0;
        let mut fired = Vec::new();
        for index in 0..=steps {
            if schedule.is_due(time, last) {
                fired.push(index);
                last = time;
            }
            time += timestep;
        }
        fired
    }

    #[test]
    fn test_not_due_at_start() {
        let schedule = CameraSchedule::default();
        assert!(!schedule.is_due(0.0, 0.0));
    }

    #[test]
    fn test_fires_every_tenth_step() {
        let fired = firing_steps(0.02, 0.002, 100);
        assert_eq!(fired, vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100]);
    }

    #[test]
    fn test_never_more_often_than_interval() {
        let fired = firing_steps(0.02, 0.002, 1000);
        for pair in fired.windows(2) {
            assert!(pair[1] - pair[0] >= 10, "fired too early: {pair:?}");
        }
    }

    #[test]
    fn test_interval_shorter_than_step_fires_every_step() {
        let fired = firing_steps(0.001, 0.002, 5);
        assert_eq!(fired, vec![1, 2, 3, 4, 5]);
    }
}
