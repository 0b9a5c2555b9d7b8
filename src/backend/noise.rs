//! Colored noise sources
//!
//! - White: independent uniform samples in [-1, 1]
//! - Pink: Voss-McCartney with seven octave rows. Each sample redraws the row
//!   given by the trailing zeros of a running counter, so row `k` changes
//!   once every `2^(k+1)` samples and the sum approximates a 1/f spectrum.
//! - Brown: bounded random walk (6 dB/octave rolloff)
//!
//! Changing color keeps the RNG and resets the color-specific state.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::backend::NoiseColor;

const PINK_OCTAVES: usize = 7;
const BROWN_STEP: f32 = 0.02;

#[derive(Debug, Clone)]
enum NoiseState {
    White,
    Pink { octaves: [f32; PINK_OCTAVES], counter: u32 },
    Brown { last: f32 },
}

#[derive(Debug, Clone)]
pub struct NoiseSource {
    color: NoiseColor,
    rng: StdRng,
    state: NoiseState,
}

impl NoiseSource {
    pub fn new(color: NoiseColor) -> Self {
        Self::with_rng(color, StdRng::from_entropy())
    }

    /// Deterministic source for tests
    pub fn with_seed(color: NoiseColor, seed: u64) -> Self {
        Self::with_rng(color, StdRng::seed_from_u64(seed))
    }

    fn with_rng(color: NoiseColor, mut rng: StdRng) -> Self {
        let state = Self::initial_state(color, &mut rng);
        Self { color, rng, state }
    }

    fn initial_state(color: NoiseColor, rng: &mut StdRng) -> NoiseState {
        match color {
            NoiseColor::White => NoiseState::White,
            NoiseColor::Pink => {
                let mut octaves = [0.0; PINK_OCTAVES];
                for octave in octaves.iter_mut() {
                    *octave = rng.gen::<f32>() * 2.0 - 1.0;
                }
                NoiseState::Pink {
                    octaves,
                    counter: 0,
                }
            }
            NoiseColor::Brown => NoiseState::Brown { last: 0.0 },
        }
    }

    pub fn color(&self) -> NoiseColor {
        self.color
    }

    pub fn set_color(&mut self, color: NoiseColor) {
        if color != self.color {
            self.color = color;
            self.state = Self::initial_state(color, &mut self.rng);
        }
    }

    /// Next sample in [-1, 1]
    pub fn next_sample(&mut self) -> f32 {
        match &mut self.state {
            NoiseState::White => self.rng.gen::<f32>() * 2.0 - 1.0,
            NoiseState::Pink { octaves, counter } => {
                *counter = counter.wrapping_add(1);
                let row = counter.trailing_zeros() as usize;
                if row < PINK_OCTAVES {
                    octaves[row] = self.rng.gen::<f32>() * 2.0 - 1.0;
                }
                octaves.iter().sum::<f32>() / PINK_OCTAVES as f32
            }
            NoiseState::Brown { last } => {
                let step = (self.rng.gen::<f32>() * 2.0 - 1.0) * BROWN_STEP;
                *last = (*last + step).clamp(-1.0, 1.0);
                *last
            }
        }
    }
}
