//! Backend rendering into a shared in-process mixer
//!
//! The engine task drives the mixer through [`AudioBackend`]; whoever holds
//! the other end of [`SoftwareBackend::mixer`] (a realtime stream, an offline
//! renderer, a test) pulls samples from it.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use crate::backend::{AudioBackend, Mixer, NoiseColor, RampCurve, VoiceId, Waveform};
use crate::error::{BackendError, BackendResult};

pub struct SoftwareBackend {
    mixer: Arc<Mutex<Mixer>>,
}

impl SoftwareBackend {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            mixer: Arc::new(Mutex::new(Mixer::new(sample_rate))),
        }
    }

    /// Shared handle for the rendering side
    pub fn mixer(&self) -> Arc<Mutex<Mixer>> {
        Arc::clone(&self.mixer)
    }

    fn lock(&self) -> BackendResult<MutexGuard<'_, Mixer>> {
        self.mixer
            .lock()
            .map_err(|_| BackendError::Stream("mixer lock poisoned".to_string()))
    }
}

impl AudioBackend for SoftwareBackend {
    async fn unlock(&mut self) -> BackendResult<()> {
        debug!("Software backend needs no unlock");
        Ok(())
    }

    fn create_oscillator(&mut self, waveform: Waveform, gain_db: f32) -> BackendResult<VoiceId> {
        Ok(self.lock()?.create_oscillator(waveform, gain_db))
    }

    fn create_lfo(&mut self, target: VoiceId, rate_hz: f32, depth_hz: f32) -> BackendResult<VoiceId> {
        self.lock()?.create_lfo(target, rate_hz, depth_hz)
    }

    fn create_noise(&mut self, color: NoiseColor, gain_db: f32) -> BackendResult<VoiceId> {
        Ok(self.lock()?.create_noise(color, gain_db))
    }

    fn set_pan(&mut self, voice: VoiceId, pan: f32) -> BackendResult<()> {
        self.lock()?.set_pan(voice, pan)
    }

    fn set_gain_db(&mut self, voice: VoiceId, gain_db: Option<f32>) -> BackendResult<()> {
        self.lock()?.set_gain_db(voice, gain_db)
    }

    fn set_frequency(&mut self, voice: VoiceId, hz: f32) -> BackendResult<()> {
        self.lock()?.set_frequency(voice, hz)
    }

    fn ramp_frequency(
        &mut self,
        voice: VoiceId,
        hz: f32,
        duration: Duration,
        curve: RampCurve,
    ) -> BackendResult<()> {
        self.lock()?.ramp_frequency(voice, hz, duration, curve)
    }

    fn set_noise_color(&mut self, voice: VoiceId, color: NoiseColor) -> BackendResult<()> {
        self.lock()?.set_noise_color(voice, color)
    }

    fn start(&mut self, voice: VoiceId) -> BackendResult<()> {
        self.lock()?.start(voice)
    }

    fn stop(&mut self, voice: VoiceId) -> BackendResult<()> {
        self.lock()?.stop(voice)
    }

    fn release(&mut self, voice: VoiceId) {
        if let Ok(mut mixer) = self.lock() {
            mixer.release(voice);
        }
    }
}
