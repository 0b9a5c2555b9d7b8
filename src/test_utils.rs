//! Test utilities for backend call verification and audio checks

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::backend::{AudioBackend, NoiseColor, RampCurve, VoiceId, Waveform};
use crate::error::{BackendError, BackendResult};

/// One call made against a [`RecordingBackend`]
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    Unlock,
    CreateOscillator {
        voice: VoiceId,
        waveform: Waveform,
        gain_db: f32,
    },
    CreateLfo {
        voice: VoiceId,
        target: VoiceId,
        rate_hz: f32,
        depth_hz: f32,
    },
    CreateNoise {
        voice: VoiceId,
        color: NoiseColor,
        gain_db: f32,
    },
    SetPan {
        voice: VoiceId,
        pan: f32,
    },
    SetGainDb {
        voice: VoiceId,
        gain_db: Option<f32>,
    },
    SetFrequency {
        voice: VoiceId,
        hz: f32,
    },
    RampFrequency {
        voice: VoiceId,
        hz: f32,
        duration: Duration,
        curve: RampCurve,
    },
    SetNoiseColor {
        voice: VoiceId,
        color: NoiseColor,
    },
    Start(VoiceId),
    Stop(VoiceId),
    Release(VoiceId),
}

/// Shared view of a [`RecordingBackend`]: its call log and failure switch.
///
/// The backend moves into the engine; tests keep the recorder.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<BackendCall>>>,
    fail_unlock: Arc<AtomicBool>,
}

impl Recorder {
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    pub fn count(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn starts(&self) -> Vec<VoiceId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::Start(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn stops(&self) -> Vec<VoiceId> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::Stop(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Ramp targets sent to one voice, oldest first
    pub fn ramps_for(&self, voice: VoiceId) -> Vec<f32> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::RampFrequency { voice: v, hz, .. } if v == voice => Some(hz),
                _ => None,
            })
            .collect()
    }

    /// Make subsequent unlocks fail (or succeed again)
    pub fn set_fail_unlock(&self, fail: bool) {
        self.fail_unlock.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: BackendCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

/// Backend that renders nothing and records every call.
///
/// Voice ids are handed out in creation order starting at 0, so the engine's
/// voices are left #0, right #1, harmonic #2, LFO #3, noise #4.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    recorder: Recorder,
    next_id: u32,
    fail_start_on: Option<VoiceId>,
    unlock_delay: Option<Duration>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorder(&self) -> Recorder {
        self.recorder.clone()
    }

    pub fn failing_unlock(self) -> Self {
        self.recorder.set_fail_unlock(true);
        self
    }

    /// Fail every `start` of this voice
    pub fn failing_start(mut self, voice: VoiceId) -> Self {
        self.fail_start_on = Some(voice);
        self
    }

    /// Make unlock take this long, as a device open would
    pub fn with_unlock_delay(mut self, delay: Duration) -> Self {
        self.unlock_delay = Some(delay);
        self
    }

    fn next_voice(&mut self) -> VoiceId {
        let id = VoiceId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl AudioBackend for RecordingBackend {
    async fn unlock(&mut self) -> BackendResult<()> {
        self.recorder.record(BackendCall::Unlock);
        if let Some(delay) = self.unlock_delay {
            tokio::time::sleep(delay).await;
        }
        if self.recorder.fail_unlock.load(Ordering::SeqCst) {
            return Err(BackendError::Locked("output blocked".to_string()));
        }
        Ok(())
    }

    fn create_oscillator(&mut self, waveform: Waveform, gain_db: f32) -> BackendResult<VoiceId> {
        let voice = self.next_voice();
        self.recorder.record(BackendCall::CreateOscillator {
            voice,
            waveform,
            gain_db,
        });
        Ok(voice)
    }

    fn create_lfo(&mut self, target: VoiceId, rate_hz: f32, depth_hz: f32) -> BackendResult<VoiceId> {
        let voice = self.next_voice();
        self.recorder.record(BackendCall::CreateLfo {
            voice,
            target,
            rate_hz,
            depth_hz,
        });
        Ok(voice)
    }

    fn create_noise(&mut self, color: NoiseColor, gain_db: f32) -> BackendResult<VoiceId> {
        let voice = self.next_voice();
        self.recorder.record(BackendCall::CreateNoise {
            voice,
            color,
            gain_db,
        });
        Ok(voice)
    }

    fn set_pan(&mut self, voice: VoiceId, pan: f32) -> BackendResult<()> {
        self.recorder.record(BackendCall::SetPan { voice, pan });
        Ok(())
    }

    fn set_gain_db(&mut self, voice: VoiceId, gain_db: Option<f32>) -> BackendResult<()> {
        self.recorder.record(BackendCall::SetGainDb { voice, gain_db });
        Ok(())
    }

    fn set_frequency(&mut self, voice: VoiceId, hz: f32) -> BackendResult<()> {
        self.recorder.record(BackendCall::SetFrequency { voice, hz });
        Ok(())
    }

    fn ramp_frequency(
        &mut self,
        voice: VoiceId,
        hz: f32,
        duration: Duration,
        curve: RampCurve,
    ) -> BackendResult<()> {
        self.recorder.record(BackendCall::RampFrequency {
            voice,
            hz,
            duration,
            curve,
        });
        Ok(())
    }

    fn set_noise_color(&mut self, voice: VoiceId, color: NoiseColor) -> BackendResult<()> {
        self.recorder.record(BackendCall::SetNoiseColor { voice, color });
        Ok(())
    }

    fn start(&mut self, voice: VoiceId) -> BackendResult<()> {
        if self.fail_start_on == Some(voice) {
            return Err(BackendError::Stream(format!("voice {} refused to start", voice)));
        }
        self.recorder.record(BackendCall::Start(voice));
        Ok(())
    }

    fn stop(&mut self, voice: VoiceId) -> BackendResult<()> {
        self.recorder.record(BackendCall::Stop(voice));
        Ok(())
    }

    fn release(&mut self, voice: VoiceId) {
        self.recorder.record(BackendCall::Release(voice));
    }
}

/// Calculate RMS energy of audio buffer
pub fn calculate_rms(audio: &[f32]) -> f32 {
    if audio.is_empty() {
        return 0.0;
    }
    let sum: f32 = audio.iter().map(|x| x * x).sum();
    (sum / audio.len() as f32).sqrt()
}

/// Split interleaved stereo into left and right channels
pub fn deinterleave(audio: &[f32]) -> (Vec<f32>, Vec<f32>) {
    audio
        .chunks_exact(2)
        .map(|frame| (frame[0], frame[1]))
        .unzip()
}

/// Count upward zero crossings, a cheap frequency estimate
pub fn count_zero_crossings(audio: &[f32]) -> usize {
    audio
        .windows(2)
        .filter(|w| w[0] <= 0.0 && w[1] > 0.0)
        .count()
}
