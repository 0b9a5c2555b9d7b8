//! Per-sample parameter ramp
//!
//! A ramp glides from the value it holds when retargeted to a new target
//! over a fixed duration, then holds the target. Two shapes are supported:
//!
//! - Linear: `start + (end - start) * progress`
//! - Exponential: `start * (end / start)^progress`, the natural choice for
//!   pitch since equal times cover equal musical intervals
//!
//! Exponential ramps protect against `log(0)` by clamping both ends to a
//! small positive floor.

use crate::backend::RampCurve;

const EXP_FLOOR: f32 = 0.0001;

#[derive(Debug, Clone)]
pub struct Ramp {
    current: f32,
    start: f32,
    end: f32,
    curve: RampCurve,
    /// Total length in samples
    length: u32,
    /// Samples elapsed since retarget
    elapsed: u32,
}

impl Ramp {
    /// Ramp resting at `value`
    pub fn new(value: f32) -> Self {
        Self {
            current: value,
            start: value,
            end: value,
            curve: RampCurve::Linear,
            length: 0,
            elapsed: 0,
        }
    }

    pub fn value(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.end
    }

    pub fn is_active(&self) -> bool {
        self.elapsed < self.length
    }

    /// Jump straight to `value`, cancelling any ramp in flight
    pub fn set(&mut self, value: f32) {
        *self = Self::new(value);
    }

    /// Glide from the current value to `end` over `seconds`
    pub fn retarget(&mut self, end: f32, seconds: f32, curve: RampCurve, sample_rate: f32) {
        let length = (seconds.max(0.0) * sample_rate).round() as u32;
        if length == 0 {
            self.set(end);
            return;
        }
        self.start = self.current;
        self.end = end;
        self.curve = curve;
        self.length = length;
        self.elapsed = 0;
    }

    /// Advance one sample and return the new value
    pub fn next_sample(&mut self) -> f32 {
        if !self.is_active() {
            self.current = self.end;
            return self.current;
        }

        self.elapsed += 1;
        let progress = self.elapsed as f32 / self.length as f32;
        self.current = if progress >= 1.0 {
            self.end
        } else {
            match self.curve {
                RampCurve::Linear => self.start + (self.end - self.start) * progress,
                RampCurve::Exponential => {
                    let start = self.start.abs().max(EXP_FLOOR);
                    let end = self.end.abs().max(EXP_FLOOR);
                    start * (end / start).powf(progress)
                }
            }
        };
        self.current
    }
}
