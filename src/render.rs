//! Offline rendering of a session to a WAV file
//!
//! Plays the same voice set the engine uses through a [`SoftwareBackend`]
//! and pulls samples in render time instead of wall-clock time. Drift ticks
//! fall on exact frame boundaries, one per drift period; with no concurrent
//! input there is nothing to debounce, so each tick is applied directly.

use std::path::Path;
use tracing::{debug, info};

use crate::backend::{Mixer, SoftwareBackend};
use crate::config::EngineConfig;
use crate::drift::DriftScheduler;
use crate::error::{BackendError, EngineError, RenderResult};
use crate::mapper::{center_beat, FrequencyPair};
use crate::synth::{NoiseState, SynthVoices};
use crate::test_utils::calculate_rms;

/// What to render
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Duration in seconds
    pub duration: f32,
    /// Base preset key; the configured default when `None`
    pub base: Option<String>,
    /// Band key; the configured default when `None`
    pub band: Option<String>,
    pub noise: NoiseState,
    /// Arm drift from the first frame
    pub drift: bool,
    /// Fade in time in seconds
    pub fade_in: f32,
    /// Fade out time in seconds
    pub fade_out: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            duration: 10.0,
            base: None,
            band: None,
            noise: NoiseState::off(0.01),
            drift: false,
            fade_in: 0.05,
            fade_out: 0.05,
        }
    }
}

/// Statistics about rendered audio
#[derive(Debug, Clone, PartialEq)]
pub struct RenderStats {
    pub frames: usize,
    pub duration: f32,
    pub rms_left: f32,
    pub rms_right: f32,
    pub peak: f32,
    pub start: FrequencyPair,
    pub end: FrequencyPair,
    /// Beat after each drift tick, in order
    pub drift_beats: Vec<f32>,
}

impl RenderStats {
    pub fn print_summary(&self) {
        println!("Render Statistics:");
        println!("  Duration:     {:.3} seconds", self.duration);
        println!("  Frames:       {}", self.frames);
        println!("  RMS L/R:      {:.3} / {:.3}", self.rms_left, self.rms_right);
        println!("  Peak:         {:.3}", self.peak);
        println!(
            "  Start:        L {:.2} Hz  R {:.2} Hz  beat {:.2} Hz",
            self.start.left,
            self.start.right(),
            self.start.beat
        );
        println!(
            "  End:          L {:.2} Hz  R {:.2} Hz  beat {:.2} Hz",
            self.end.left,
            self.end.right(),
            self.end.beat
        );
        if !self.drift_beats.is_empty() {
            println!("  Drift ticks:  {}", self.drift_beats.len());
        }
    }
}

/// Render a session to interleaved stereo samples
pub async fn render_session_to_buffer(
    config: &EngineConfig,
    options: &RenderOptions,
) -> RenderResult<(Vec<f32>, RenderStats)> {
    let base_key = options.base.as_deref().unwrap_or(&config.default_base);
    let base_hz = config
        .base_hz(base_key)
        .ok_or_else(|| EngineError::UnknownBasePreset(base_key.to_string()))?;
    let band_key = options.band.as_deref().unwrap_or(&config.default_band);
    let band = config
        .band(band_key)
        .ok_or_else(|| EngineError::UnknownBand(band_key.to_string()))?;

    let sample_rate = options.sample_rate.max(1);
    let backend = SoftwareBackend::new(sample_rate as f32);
    let mixer = backend.mixer();
    let mut synth = SynthVoices::new(backend, config);

    let start = FrequencyPair::from_beat(base_hz, center_beat(&band));
    synth.initialize_voices(start, &options.noise).await?;
    synth.start(&options.noise)?;

    let mut drift = DriftScheduler::new(&config.drift, &band);
    if options.drift {
        drift.arm(&band);
    }

    let total_frames = (options.duration.max(0.0) * sample_rate as f32) as usize;
    let period_frames = ((drift.period().as_secs_f64() * sample_rate as f64) as usize).max(1);

    info!(
        "Rendering {} frames at {} Hz: {} {} Hz, {} {}-{} Hz{}",
        total_frames,
        sample_rate,
        base_key,
        base_hz,
        band_key,
        band.min,
        band.max,
        if options.drift { ", drifting" } else { "" }
    );

    let mut samples = vec![0.0f32; total_frames * 2];
    let mut current = start;
    let mut drift_beats = Vec::new();
    let mut frame = 0;

    while frame < total_frames {
        let block = (total_frames - frame).min(period_frames);
        {
            let mut mixer = lock(&mixer)?;
            mixer.render(&mut samples[frame * 2..(frame + block) * 2]);
        }
        frame += block;

        if frame < total_frames {
            if let Some(beat) = drift.tick(current.beat) {
                current = FrequencyPair::from_beat(current.left, beat);
                synth.apply_frequencies(current)?;
                drift_beats.push(beat);
                debug!("Drift at frame {}: beat {:.2} Hz", frame, beat);
            }
        }
    }

    synth.stop()?;
    synth.dispose();

    apply_fades(&mut samples, sample_rate, options.fade_in, options.fade_out);

    let (left, right): (Vec<f32>, Vec<f32>) = samples
        .chunks_exact(2)
        .map(|frame| (frame[0], frame[1]))
        .unzip();
    let stats = RenderStats {
        frames: total_frames,
        duration: total_frames as f32 / sample_rate as f32,
        rms_left: calculate_rms(&left),
        rms_right: calculate_rms(&right),
        peak: samples.iter().map(|x| x.abs()).fold(0.0f32, f32::max),
        start,
        end: current,
        drift_beats,
    };

    Ok((samples, stats))
}

/// Render a session and write it as a 32-bit float stereo WAV
pub async fn render_session(
    config: &EngineConfig,
    options: &RenderOptions,
    output_path: &Path,
) -> RenderResult<RenderStats> {
    let (samples, stats) = render_session_to_buffer(config, options).await?;
    write_wav(output_path, &samples, options.sample_rate.max(1))?;
    info!("Wrote {:?}", output_path);
    Ok(stats)
}

fn lock(mixer: &std::sync::Mutex<Mixer>) -> RenderResult<std::sync::MutexGuard<'_, Mixer>> {
    mixer
        .lock()
        .map_err(|_| BackendError::Stream("mixer lock poisoned".to_string()).into())
}

/// Linear fade in and fade out over interleaved stereo
fn apply_fades(samples: &mut [f32], sample_rate: u32, fade_in: f32, fade_out: f32) {
    let frames = samples.len() / 2;

    let fade_in_frames = (fade_in.max(0.0) * sample_rate as f32) as usize;
    for i in 0..fade_in_frames.min(frames) {
        let gain = i as f32 / fade_in_frames as f32;
        samples[i * 2] *= gain;
        samples[i * 2 + 1] *= gain;
    }

    let fade_out_frames = (fade_out.max(0.0) * sample_rate as f32) as usize;
    let start = frames.saturating_sub(fade_out_frames);
    for i in start..frames {
        let gain = (frames - i) as f32 / fade_out_frames as f32;
        samples[i * 2] *= gain;
        samples[i * 2 + 1] *= gain;
    }
}

fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> RenderResult<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
