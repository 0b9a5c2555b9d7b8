//! Audio backend contract and implementations
//!
//! The engine never touches sample buffers. It drives a backend through
//! [`AudioBackend`]: create voices, set pan and gain, start/stop them and
//! ramp their frequency. Rendering happens wherever the backend chooses.
//!
//! - [`SoftwareBackend`]: in-process [`Mixer`], rendered on demand
//! - `RealtimeBackend` (feature `realtime`): the same mixer pulled by a cpal stream

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::error::BackendResult;

pub mod mixer;
pub mod noise;
pub mod ramp;
#[cfg(feature = "realtime")]
pub mod realtime;
pub mod software;

pub use mixer::Mixer;
#[cfg(feature = "realtime")]
pub use realtime::RealtimeBackend;
pub use software::SoftwareBackend;

/// Opaque handle to a backend voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(pub u32);

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Oscillator waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
    Sawtooth,
}

/// Spectral color of a noise voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseColor {
    White,
    Pink,
    Brown,
}

/// Interpolation shape of a parameter ramp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampCurve {
    Linear,
    /// Constant ratio per unit time; both ends must be positive
    Exponential,
}

/// Everything the engine needs from an audio output.
///
/// All calls come from the single engine task. Implementations hand work to
/// their own render thread however they like.
pub trait AudioBackend: Send + 'static {
    /// Make the output usable. May wait on the platform (user gesture,
    /// device open). Called before any voice is created.
    fn unlock(&mut self) -> impl Future<Output = BackendResult<()>> + Send;

    fn create_oscillator(&mut self, waveform: Waveform, gain_db: f32) -> BackendResult<VoiceId>;

    /// Low-frequency modulator adding `+/- depth_hz` to `target`'s frequency
    fn create_lfo(&mut self, target: VoiceId, rate_hz: f32, depth_hz: f32) -> BackendResult<VoiceId>;

    fn create_noise(&mut self, color: NoiseColor, gain_db: f32) -> BackendResult<VoiceId>;

    fn set_pan(&mut self, voice: VoiceId, pan: f32) -> BackendResult<()>;

    /// Gain in dB; `None` silences the voice
    fn set_gain_db(&mut self, voice: VoiceId, gain_db: Option<f32>) -> BackendResult<()>;

    /// Jump to a frequency without a ramp
    fn set_frequency(&mut self, voice: VoiceId, hz: f32) -> BackendResult<()>;

    fn ramp_frequency(
        &mut self,
        voice: VoiceId,
        hz: f32,
        duration: Duration,
        curve: RampCurve,
    ) -> BackendResult<()>;

    /// Change a noise voice's color. Callers stop the voice first.
    fn set_noise_color(&mut self, voice: VoiceId, color: NoiseColor) -> BackendResult<()>;

    fn start(&mut self, voice: VoiceId) -> BackendResult<()>;

    fn stop(&mut self, voice: VoiceId) -> BackendResult<()>;

    /// Free the voice. Unknown ids are ignored.
    fn release(&mut self, voice: VoiceId);
}
