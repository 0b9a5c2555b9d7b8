//! Drift: an autonomous, bounded sweep of the beat frequency
//!
//! The scheduler is a pure state machine. Each tick moves the beat one step
//! in the current direction; reaching a bound clamps to it and reverses.
//!
//! ```text
//!   Idle --arm--> Descending --beat <= min--> Ascending
//!     ^               ^                           |
//!     |               +-------beat >= max---------+
//!     +--disarm-- (either sweeping state)
//! ```
//!
//! Timing lives in the engine task, which owns the single tick `Interval`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{DriftConfig, FrequencyBand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftDirection {
    Ascending,
    Descending,
}

impl DriftDirection {
    pub fn reversed(self) -> Self {
        match self {
            DriftDirection::Ascending => DriftDirection::Descending,
            DriftDirection::Descending => DriftDirection::Ascending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftPhase {
    Idle,
    Ascending,
    Descending,
}

/// Observable drift parameters
#[derive(Debug, Clone, PartialEq)]
pub struct DriftState {
    pub armed: bool,
    pub direction: DriftDirection,
    pub min: f32,
    pub max: f32,
    pub step_hz: f32,
    pub period: Duration,
}

#[derive(Debug, Clone)]
pub struct DriftScheduler {
    state: DriftState,
    initial_direction: DriftDirection,
}

impl DriftScheduler {
    /// Disarmed scheduler with bounds copied from `band`
    pub fn new(config: &DriftConfig, band: &FrequencyBand) -> Self {
        Self {
            state: DriftState {
                armed: false,
                direction: config.initial_direction,
                min: band.min,
                max: band.max,
                step_hz: config.step_hz,
                period: config.period(),
            },
            initial_direction: config.initial_direction,
        }
    }

    pub fn state(&self) -> &DriftState {
        &self.state
    }

    pub fn is_armed(&self) -> bool {
        self.state.armed
    }

    pub fn period(&self) -> Duration {
        self.state.period
    }

    pub fn phase(&self) -> DriftPhase {
        match (self.state.armed, self.state.direction) {
            (false, _) => DriftPhase::Idle,
            (true, DriftDirection::Ascending) => DriftPhase::Ascending,
            (true, DriftDirection::Descending) => DriftPhase::Descending,
        }
    }

    /// Start sweeping from the initial direction within `band`.
    pub fn arm(&mut self, band: &FrequencyBand) {
        self.resync(band);
        self.state.direction = self.initial_direction;
        self.state.armed = true;
    }

    pub fn disarm(&mut self) {
        self.state.armed = false;
    }

    /// Flip between armed and idle; returns the new armed flag.
    pub fn toggle(&mut self, band: &FrequencyBand) -> bool {
        if self.state.armed {
            self.disarm();
        } else {
            self.arm(band);
        }
        self.state.armed
    }

    /// Copy bounds from `band` without touching direction or armed state.
    pub fn resync(&mut self, band: &FrequencyBand) {
        self.state.min = band.min;
        self.state.max = band.max;
    }

    /// Advance one step from `beat`. Returns `None` while idle.
    pub fn tick(&mut self, beat: f32) -> Option<f32> {
        if !self.state.armed {
            return None;
        }

        let DriftState { min, max, step_hz, .. } = self.state;
        let next = match self.state.direction {
            DriftDirection::Descending => {
                let next = beat - step_hz;
                if next <= min {
                    self.state.direction = DriftDirection::Ascending;
                    min
                } else {
                    next.min(max)
                }
            }
            DriftDirection::Ascending => {
                let next = beat + step_hz;
                if next >= max {
                    self.state.direction = DriftDirection::Descending;
                    max
                } else {
                    next.max(min)
                }
            }
        };

        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn theta_scheduler() -> DriftScheduler {
        let mut drift = DriftScheduler::new(&DriftConfig::default(), &FrequencyBand::new(4.0, 8.0));
        drift.arm(&FrequencyBand::new(4.0, 8.0));
        drift
    }

    #[test]
    fn test_starts_idle_with_band_bounds() {
        let drift = DriftScheduler::new(&DriftConfig::default(), &FrequencyBand::new(8.0, 13.0));
        assert_eq!(drift.phase(), DriftPhase::Idle);
        assert_eq!(drift.state().min, 8.0);
        assert_eq!(drift.state().max, 13.0);
    }

    #[test]
    fn test_idle_tick_is_none() {
        let mut drift = DriftScheduler::new(&DriftConfig::default(), &FrequencyBand::new(4.0, 8.0));
        assert_eq!(drift.tick(6.0), None);
    }

    #[test]
    fn test_theta_sweep_sequence() {
        let mut drift = theta_scheduler();
        let mut beat = 6.0;
        let mut seen = vec![beat];
        for _ in 0..7 {
            beat = drift.tick(beat).unwrap();
            seen.push(beat);
        }
        assert_eq!(seen, vec![6.0, 5.0, 4.0, 5.0, 6.0, 7.0, 8.0, 7.0]);
    }

    #[test]
    fn test_flip_happens_at_bound() {
        let mut drift = theta_scheduler();
        assert_eq!(drift.tick(4.5), Some(4.0));
        assert_eq!(drift.phase(), DriftPhase::Ascending);
        assert_eq!(drift.tick(4.0), Some(5.0));
    }

    #[test]
    fn test_out_of_range_start_is_pulled_inside() {
        let mut drift = theta_scheduler();
        // Descending from far above max lands on max, not beyond it
        assert_eq!(drift.tick(20.0), Some(8.0));
    }

    #[test]
    fn test_rearm_resets_direction_and_bounds() {
        let mut drift = theta_scheduler();
        drift.tick(4.5);
        assert_eq!(drift.phase(), DriftPhase::Ascending);

        drift.disarm();
        assert_eq!(drift.phase(), DriftPhase::Idle);

        drift.arm(&FrequencyBand::new(8.0, 13.0));
        assert_eq!(drift.phase(), DriftPhase::Descending);
        assert_eq!(drift.state().min, 8.0);
        assert_eq!(drift.state().max, 13.0);
    }

    #[test]
    fn test_toggle_reports_armed_flag() {
        let band = FrequencyBand::new(4.0, 8.0);
        let mut drift = DriftScheduler::new(&DriftConfig::default(), &band);
        assert!(drift.toggle(&band));
        assert!(!drift.toggle(&band));
    }
}
