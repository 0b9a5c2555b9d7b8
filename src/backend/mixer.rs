//! In-process voice mixer
//!
//! Holds every voice the engine creates and renders them to interleaved
//! stereo. Oscillators and noise are summed with equal-power panning; LFOs
//! produce no sound and instead offset their target oscillator's frequency.
//! The sum is soft-clipped with `tanh`.

use std::f32::consts::{FRAC_PI_4, PI};
use std::time::Duration;

use crate::backend::noise::NoiseSource;
use crate::backend::ramp::Ramp;
use crate::backend::{NoiseColor, RampCurve, VoiceId, Waveform};
use crate::error::{BackendError, BackendResult};

/// Default frequency of a freshly created oscillator
const INITIAL_FREQUENCY: f32 = 440.0;

pub fn db_to_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

/// Equal-power pan law: -1 is hard left, 1 hard right
fn pan_gains(pan: f32) -> (f32, f32) {
    let angle = (pan.clamp(-1.0, 1.0) + 1.0) * FRAC_PI_4;
    (angle.cos(), angle.sin())
}

#[derive(Debug, Clone)]
struct Oscillator {
    waveform: Waveform,
    phase: f32,
    frequency: Ramp,
    /// Offset written by an LFO each frame
    modulation: f32,
}

impl Oscillator {
    fn advance(&mut self, sample_rate: f32) -> f32 {
        let value = match self.waveform {
            Waveform::Sine => (2.0 * PI * self.phase).sin(),
            Waveform::Triangle => 1.0 - 4.0 * (self.phase - 0.5).abs(),
            Waveform::Square => {
                if self.phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * self.phase - 1.0,
        };

        let hz = (self.frequency.next_sample() + self.modulation).max(0.0);
        self.phase += hz / sample_rate;
        self.phase -= self.phase.floor();
        value
    }
}

#[derive(Debug, Clone)]
struct Lfo {
    target: VoiceId,
    rate_hz: f32,
    depth_hz: f32,
    phase: f32,
}

impl Lfo {
    fn advance(&mut self, sample_rate: f32) -> f32 {
        let value = (2.0 * PI * self.phase).sin() * self.depth_hz;
        self.phase += self.rate_hz / sample_rate;
        self.phase -= self.phase.floor();
        value
    }
}

#[derive(Debug, Clone)]
enum VoiceKind {
    Oscillator(Oscillator),
    Lfo(Lfo),
    Noise(NoiseSource),
}

impl VoiceKind {
    fn name(&self) -> &'static str {
        match self {
            VoiceKind::Oscillator(_) => "oscillator",
            VoiceKind::Lfo(_) => "lfo",
            VoiceKind::Noise(_) => "noise",
        }
    }
}

#[derive(Debug, Clone)]
struct Voice {
    kind: VoiceKind,
    gain: f32,
    pan: f32,
    running: bool,
}

pub struct Mixer {
    sample_rate: f32,
    voices: Vec<Option<Voice>>,
}

impl Mixer {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            voices: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Change the render rate. Ramps in flight keep their sample counts.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    /// Number of live (created and not released) voices
    pub fn voice_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_some()).count()
    }

    fn add(&mut self, kind: VoiceKind, gain: f32) -> VoiceId {
        let voice = Voice {
            kind,
            gain,
            pan: 0.0,
            running: false,
        };
        // Reuse a released slot before growing
        let index = match self.voices.iter().position(|v| v.is_none()) {
            Some(index) => {
                self.voices[index] = Some(voice);
                index
            }
            None => {
                self.voices.push(Some(voice));
                self.voices.len() - 1
            }
        };
        VoiceId(index as u32)
    }

    fn voice(&self, id: VoiceId) -> BackendResult<&Voice> {
        self.voices
            .get(id.0 as usize)
            .and_then(|v| v.as_ref())
            .ok_or(BackendError::UnknownVoice(id))
    }

    fn voice_mut(&mut self, id: VoiceId) -> BackendResult<&mut Voice> {
        self.voices
            .get_mut(id.0 as usize)
            .and_then(|v| v.as_mut())
            .ok_or(BackendError::UnknownVoice(id))
    }

    fn oscillator_mut(&mut self, id: VoiceId) -> BackendResult<&mut Oscillator> {
        match &mut self.voice_mut(id)?.kind {
            VoiceKind::Oscillator(osc) => Ok(osc),
            _ => Err(BackendError::WrongVoiceKind {
                voice: id,
                expected: "oscillator",
            }),
        }
    }

    pub fn create_oscillator(&mut self, waveform: Waveform, gain_db: f32) -> VoiceId {
        let osc = Oscillator {
            waveform,
            phase: 0.0,
            frequency: Ramp::new(INITIAL_FREQUENCY),
            modulation: 0.0,
        };
        self.add(VoiceKind::Oscillator(osc), db_to_linear(gain_db))
    }

    pub fn create_lfo(&mut self, target: VoiceId, rate_hz: f32, depth_hz: f32) -> BackendResult<VoiceId> {
        // Target must exist and be an oscillator
        self.oscillator_mut(target)?;
        let lfo = Lfo {
            target,
            rate_hz,
            depth_hz,
            phase: 0.0,
        };
        Ok(self.add(VoiceKind::Lfo(lfo), 1.0))
    }

    pub fn create_noise(&mut self, color: NoiseColor, gain_db: f32) -> VoiceId {
        self.add(VoiceKind::Noise(NoiseSource::new(color)), db_to_linear(gain_db))
    }

    pub fn set_pan(&mut self, id: VoiceId, pan: f32) -> BackendResult<()> {
        self.voice_mut(id)?.pan = pan.clamp(-1.0, 1.0);
        Ok(())
    }

    pub fn set_gain_db(&mut self, id: VoiceId, gain_db: Option<f32>) -> BackendResult<()> {
        self.voice_mut(id)?.gain = gain_db.map(db_to_linear).unwrap_or(0.0);
        Ok(())
    }

    pub fn set_frequency(&mut self, id: VoiceId, hz: f32) -> BackendResult<()> {
        self.oscillator_mut(id)?.frequency.set(hz);
        Ok(())
    }

    pub fn ramp_frequency(
        &mut self,
        id: VoiceId,
        hz: f32,
        duration: Duration,
        curve: RampCurve,
    ) -> BackendResult<()> {
        let sample_rate = self.sample_rate;
        self.oscillator_mut(id)?
            .frequency
            .retarget(hz, duration.as_secs_f32(), curve, sample_rate);
        Ok(())
    }

    pub fn set_noise_color(&mut self, id: VoiceId, color: NoiseColor) -> BackendResult<()> {
        match &mut self.voice_mut(id)?.kind {
            VoiceKind::Noise(source) => {
                source.set_color(color);
                Ok(())
            }
            _ => Err(BackendError::WrongVoiceKind {
                voice: id,
                expected: "noise",
            }),
        }
    }

    pub fn start(&mut self, id: VoiceId) -> BackendResult<()> {
        self.voice_mut(id)?.running = true;
        Ok(())
    }

    pub fn stop(&mut self, id: VoiceId) -> BackendResult<()> {
        let voice = self.voice_mut(id)?;
        voice.running = false;
        let target = match &voice.kind {
            VoiceKind::Lfo(lfo) => Some(lfo.target),
            _ => None,
        };
        if let Some(target) = target {
            if let Ok(osc) = self.oscillator_mut(target) {
                osc.modulation = 0.0;
            }
        }
        Ok(())
    }

    pub fn release(&mut self, id: VoiceId) {
        if let Some(slot) = self.voices.get_mut(id.0 as usize) {
            *slot = None;
        }
    }

    pub fn is_running(&self, id: VoiceId) -> bool {
        self.voice(id).map(|v| v.running).unwrap_or(false)
    }

    /// Current (possibly mid-ramp) base frequency of an oscillator
    pub fn frequency(&self, id: VoiceId) -> Option<f32> {
        match &self.voice(id).ok()?.kind {
            VoiceKind::Oscillator(osc) => Some(osc.frequency.value()),
            _ => None,
        }
    }

    /// Frequency an oscillator is ramping towards
    pub fn target_frequency(&self, id: VoiceId) -> Option<f32> {
        match &self.voice(id).ok()?.kind {
            VoiceKind::Oscillator(osc) => Some(osc.frequency.target()),
            _ => None,
        }
    }

    pub fn noise_color(&self, id: VoiceId) -> Option<NoiseColor> {
        match &self.voice(id).ok()?.kind {
            VoiceKind::Noise(source) => Some(source.color()),
            _ => None,
        }
    }

    pub fn voice_kind(&self, id: VoiceId) -> Option<&'static str> {
        self.voice(id).ok().map(|v| v.kind.name())
    }

    /// Render one stereo frame
    pub fn next_frame(&mut self) -> (f32, f32) {
        let sample_rate = self.sample_rate;

        // Modulators first so oscillators see this frame's offset
        for index in 0..self.voices.len() {
            let offset = match &mut self.voices[index] {
                Some(Voice {
                    kind: VoiceKind::Lfo(lfo),
                    running: true,
                    ..
                }) => Some((lfo.target, lfo.advance(sample_rate))),
                _ => None,
            };
            if let Some((target, value)) = offset {
                if let Ok(osc) = self.oscillator_mut(target) {
                    osc.modulation = value;
                }
            }
        }

        let mut left = 0.0;
        let mut right = 0.0;
        for voice in self.voices.iter_mut().flatten() {
            let running = voice.running;
            // Oscillators keep their phase and ramps moving while stopped
            let sample = match &mut voice.kind {
                VoiceKind::Oscillator(osc) => osc.advance(sample_rate),
                VoiceKind::Noise(source) if running => source.next_sample(),
                _ => continue,
            };
            if !running {
                continue;
            }
            let (gl, gr) = pan_gains(voice.pan);
            left += sample * voice.gain * gl;
            right += sample * voice.gain * gr;
        }

        (left.tanh(), right.tanh())
    }

    /// Fill an interleaved stereo buffer
    pub fn render(&mut self, output: &mut [f32]) {
        for frame in output.chunks_mut(2) {
            let (left, right) = self.next_frame();
            frame[0] = left;
            if let Some(r) = frame.get_mut(1) {
                *r = right;
            }
        }
    }
}
