//! Synth voice lifecycle
//!
//! Owns the backend and the five voices the engine plays: left and right
//! tones, a harmonic overtone wobbled by an LFO, and a noise bed. Voices are
//! created lazily on first play and live until [`SynthVoices::dispose`];
//! stopping only silences them. "Not yet created" is the single `None` state
//! of `voices`, checked in one place per method.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::backend::{AudioBackend, NoiseColor, RampCurve, VoiceId, Waveform};
use crate::config::{EngineConfig, VoiceConfig};
use crate::error::{BackendResult, EngineError, EngineResult};
use crate::mapper::FrequencyPair;

/// Frequency and stereo position of one tone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OscillatorState {
    pub frequency: f32,
    pub pan: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseType {
    White,
    Pink,
    Brown,
    Off,
}

impl NoiseType {
    pub fn color(self) -> Option<NoiseColor> {
        match self {
            NoiseType::White => Some(NoiseColor::White),
            NoiseType::Pink => Some(NoiseColor::Pink),
            NoiseType::Brown => Some(NoiseColor::Brown),
            NoiseType::Off => None,
        }
    }
}

impl std::str::FromStr for NoiseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "white" => Ok(NoiseType::White),
            "pink" => Ok(NoiseType::Pink),
            "brown" => Ok(NoiseType::Brown),
            "off" => Ok(NoiseType::Off),
            other => Err(format!("unknown noise type '{}'", other)),
        }
    }
}

/// Noise bed settings; `volume` is linear in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseState {
    pub noise_type: NoiseType,
    pub volume: f32,
}

impl NoiseState {
    pub fn new(noise_type: NoiseType, volume: f32) -> Self {
        Self {
            noise_type,
            volume: volume.clamp(0.0, 1.0),
        }
    }

    pub fn off(volume: f32) -> Self {
        Self::new(NoiseType::Off, volume)
    }

    /// Whether the generator should be running while playing
    pub fn is_audible(&self) -> bool {
        self.noise_type != NoiseType::Off && volume_to_db(self.volume).is_some()
    }
}

/// Linear volume to dB gain. Zero volume is silence rather than `-inf`.
pub fn volume_to_db(volume: f32) -> Option<f32> {
    if volume > 0.0 {
        Some(20.0 * volume.min(1.0).log10())
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy)]
struct VoiceSet {
    left: VoiceId,
    right: VoiceId,
    harmonic: VoiceId,
    harmonic_lfo: VoiceId,
    noise: VoiceId,
}

impl VoiceSet {
    /// Voices that run for the whole of playback
    fn tones(&self) -> [VoiceId; 4] {
        [self.left, self.right, self.harmonic, self.harmonic_lfo]
    }

    fn all(&self) -> [VoiceId; 5] {
        [
            self.left,
            self.right,
            self.harmonic,
            self.harmonic_lfo,
            self.noise,
        ]
    }
}

pub struct SynthVoices<B: AudioBackend> {
    backend: B,
    voices: Option<VoiceSet>,
    config: VoiceConfig,
    ramp: Duration,
    harmonic_ramp: Duration,
    harmonic_target: f32,
    /// Color currently loaded in the noise voice
    noise_type: NoiseType,
    noise_running: bool,
    running: bool,
}

impl<B: AudioBackend> SynthVoices<B> {
    pub fn new(backend: B, config: &EngineConfig) -> Self {
        Self {
            backend,
            voices: None,
            config: config.voices.clone(),
            ramp: config.ramp(),
            harmonic_ramp: config.harmonic_ramp(),
            harmonic_target: 0.0,
            noise_type: NoiseType::Off,
            noise_running: false,
            running: false,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn is_initialized(&self) -> bool {
        self.voices.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn harmonic_target(&self) -> f32 {
        self.harmonic_target
    }

    /// Unlock the backend and build the voice set, unless it already exists.
    ///
    /// Returns `true` when voices were created by this call. On failure every
    /// voice created so far is released and the manager stays uninitialized.
    pub async fn initialize_voices(
        &mut self,
        frequencies: FrequencyPair,
        noise: &NoiseState,
    ) -> EngineResult<bool> {
        if self.voices.is_some() {
            return Ok(false);
        }

        self.backend
            .unlock()
            .await
            .map_err(EngineError::BackendUnlock)?;

        let mut created = Vec::with_capacity(5);
        match self.create_voice_set(frequencies, noise, &mut created) {
            Ok(set) => {
                info!(
                    "Created voices: left {} right {} harmonic {} lfo {} noise {}",
                    set.left, set.right, set.harmonic, set.harmonic_lfo, set.noise
                );
                self.voices = Some(set);
                Ok(true)
            }
            Err(e) => {
                warn!("Voice creation failed, releasing {} voices: {}", created.len(), e);
                for id in created {
                    self.backend.release(id);
                }
                Err(EngineError::Backend(e))
            }
        }
    }

    fn create_voice_set(
        &mut self,
        frequencies: FrequencyPair,
        noise: &NoiseState,
        created: &mut Vec<VoiceId>,
    ) -> BackendResult<VoiceSet> {
        let cfg = self.config.clone();
        let backend = &mut self.backend;

        let left = backend.create_oscillator(Waveform::Sine, cfg.tone_gain_db)?;
        created.push(left);
        backend.set_pan(left, cfg.left_pan)?;
        backend.set_frequency(left, frequencies.left)?;

        let right = backend.create_oscillator(Waveform::Sine, cfg.tone_gain_db)?;
        created.push(right);
        backend.set_pan(right, cfg.right_pan)?;
        backend.set_frequency(right, frequencies.right())?;

        let harmonic_hz = frequencies.left * cfg.harmonic_ratio;
        let harmonic = backend.create_oscillator(Waveform::Sine, cfg.harmonic_gain_db)?;
        created.push(harmonic);
        backend.set_pan(harmonic, 0.0)?;
        backend.set_frequency(harmonic, harmonic_hz)?;

        let harmonic_lfo = backend.create_lfo(harmonic, cfg.lfo_rate_hz, cfg.lfo_depth_hz)?;
        created.push(harmonic_lfo);

        let color = noise.noise_type.color().unwrap_or(NoiseColor::White);
        let gain_db = volume_to_db(noise.volume);
        let noise_voice = backend.create_noise(color, gain_db.unwrap_or(0.0))?;
        created.push(noise_voice);
        backend.set_pan(noise_voice, 0.0)?;
        if gain_db.is_none() {
            backend.set_gain_db(noise_voice, None)?;
        }

        self.harmonic_target = harmonic_hz;
        self.noise_type = noise.noise_type;

        Ok(VoiceSet {
            left,
            right,
            harmonic,
            harmonic_lfo,
            noise: noise_voice,
        })
    }

    /// Glide the tones to new targets. A no-op before voices exist; the
    /// frequencies are applied at creation instead.
    pub fn apply_frequencies(&mut self, frequencies: FrequencyPair) -> BackendResult<()> {
        let Some(voices) = self.voices else {
            return Ok(());
        };

        self.backend
            .ramp_frequency(voices.left, frequencies.left, self.ramp, RampCurve::Exponential)?;
        self.backend
            .ramp_frequency(voices.right, frequencies.right(), self.ramp, RampCurve::Exponential)?;

        self.harmonic_target = frequencies.left * self.config.harmonic_ratio;
        self.backend.ramp_frequency(
            voices.harmonic,
            self.harmonic_target,
            self.harmonic_ramp,
            RampCurve::Linear,
        )?;

        debug!(
            "Ramping to L {:.2} Hz R {:.2} Hz (beat {:.2} Hz)",
            frequencies.left,
            frequencies.right(),
            frequencies.beat
        );
        Ok(())
    }

    /// Apply color and volume to the noise bed.
    ///
    /// The generator is stopped before its color changes, and runs again
    /// only while `playing` and audible. Volume-only changes adjust the gain
    /// in place.
    pub fn apply_noise(&mut self, noise: &NoiseState, playing: bool) -> BackendResult<()> {
        let Some(voices) = self.voices else {
            return Ok(());
        };

        if noise.noise_type != self.noise_type {
            if self.noise_running {
                self.backend.stop(voices.noise)?;
                self.noise_running = false;
            }
            if let Some(color) = noise.noise_type.color() {
                self.backend.set_noise_color(voices.noise, color)?;
            }
            self.noise_type = noise.noise_type;
        }

        self.backend
            .set_gain_db(voices.noise, volume_to_db(noise.volume))?;

        let should_run = playing && noise.is_audible();
        if should_run && !self.noise_running {
            self.backend.start(voices.noise)?;
            self.noise_running = true;
        } else if !should_run && self.noise_running {
            self.backend.stop(voices.noise)?;
            self.noise_running = false;
        }

        debug!(
            "Noise {:?} at volume {:.3} ({})",
            noise.noise_type,
            noise.volume,
            if self.noise_running { "running" } else { "stopped" }
        );
        Ok(())
    }

    /// Start every voice, or none of them.
    pub fn start(&mut self, noise: &NoiseState) -> BackendResult<()> {
        let Some(voices) = self.voices else {
            return Ok(());
        };
        if self.running {
            return Ok(());
        }

        let mut started = Vec::with_capacity(5);
        let mut to_start = voices.tones().to_vec();
        if noise.is_audible() {
            to_start.push(voices.noise);
        }

        for id in to_start {
            if let Err(e) = self.backend.start(id) {
                warn!("Failed to start voice {}: {}", id, e);
                for started_id in started {
                    let _ = self.backend.stop(started_id);
                }
                return Err(e);
            }
            started.push(id);
        }

        self.noise_running = noise.is_audible();
        self.running = true;
        Ok(())
    }

    /// Stop every voice. Idempotent: a second call makes no backend calls.
    pub fn stop(&mut self) -> BackendResult<()> {
        let Some(voices) = self.voices else {
            return Ok(());
        };
        if !self.running {
            return Ok(());
        }

        let mut to_stop = voices.tones().to_vec();
        if self.noise_running {
            to_stop.push(voices.noise);
        }

        // Keep stopping after a failure; report the first one
        let mut result = Ok(());
        for id in to_stop {
            if let Err(e) = self.backend.stop(id) {
                warn!("Failed to stop voice {}: {}", id, e);
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        self.noise_running = false;
        self.running = false;
        result
    }

    /// Stop and release all voices. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        let Some(voices) = self.voices.take() else {
            return;
        };
        if self.running {
            for id in voices.all() {
                let _ = self.backend.stop(id);
            }
        }
        for id in voices.all() {
            self.backend.release(id);
        }
        self.running = false;
        self.noise_running = false;
        info!("Voices disposed");
    }
}
