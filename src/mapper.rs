//! Frequency mapping from presets and pointer coordinates
//!
//! All functions here are pure. The vertical axis selects the left (carrier)
//! frequency in `[base * 0.75, base * 1.5]`, top of the surface being the
//! highest pitch; the horizontal axis selects the beat within the band. The
//! right channel is always `left + beat`, computed when the pair is applied.

use rand::Rng;

use crate::config::{FrequencyBand, Surface};

/// Lowest carrier reachable from the surface, as a multiple of the base
pub const CARRIER_LOW_RATIO: f32 = 0.75;

/// Highest carrier reachable from the surface, as a multiple of the base
pub const CARRIER_HIGH_RATIO: f32 = 1.5;

/// Target for the left and right oscillators, kept as carrier plus beat.
///
/// The beat is stored rather than recovered as `right - left`: near a power
/// of two the f32 sum rounds, and a beat read back from it drifts off the
/// value that was set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyPair {
    pub left: f32,
    pub beat: f32,
}

impl FrequencyPair {
    /// Pair with the given carrier and beat
    pub const fn from_beat(left: f32, beat: f32) -> Self {
        Self { left, beat }
    }

    /// Pair from explicit left and right frequencies
    pub fn new(left: f32, right: f32) -> Self {
        Self::from_beat(left, right - left)
    }

    pub fn right(&self) -> f32 {
        self.left + self.beat
    }
}

/// Map a pre-clamped surface coordinate to a frequency pair.
///
/// `x` and `y` must already lie inside `[0, width] x [0, height]`; see
/// [`map_pointer`] for the clamping entry point.
pub fn map_coordinate(
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    base_hz: f32,
    band: &FrequencyBand,
) -> FrequencyPair {
    let y_min = base_hz * CARRIER_LOW_RATIO;
    let y_max = base_hz * CARRIER_HIGH_RATIO;
    let left = y_max - (y / height) * (y_max - y_min);

    let beat = (x / width) * (band.max - band.min) + band.min;

    FrequencyPair::from_beat(left, beat)
}

/// Clamp a raw pointer position to the surface, then map it.
pub fn map_pointer(x: f32, y: f32, surface: &Surface, base_hz: f32, band: &FrequencyBand) -> FrequencyPair {
    let (x, y) = surface.clamp(x, y);
    map_coordinate(x, y, surface.width, surface.height, base_hz, band)
}

/// Midpoint of the band
pub fn center_beat(band: &FrequencyBand) -> f32 {
    (band.min + band.max) / 2.0
}

/// Uniformly drawn whole-Hz beat inside the band.
///
/// The draw covers every integer in `[ceil(min), floor(max)]`. A band too
/// narrow to contain an integer yields its center instead.
pub fn random_beat<R: Rng + ?Sized>(band: &FrequencyBand, rng: &mut R) -> f32 {
    let low = band.min.ceil() as i64;
    let high = band.max.floor() as i64;
    if low > high {
        return center_beat(band);
    }
    rng.gen_range(low..=high) as f32
}
