//! Real-time audio output using cpal
//! Works with JACK, ALSA, CoreAudio, WASAPI, etc.
//!
//! The cpal stream is not `Send`, so it lives on its own thread for the
//! lifetime of the backend. Unlocking spawns that thread, opens the default
//! output device and reports back; any failure there is an unlock failure.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::backend::{AudioBackend, Mixer, NoiseColor, RampCurve, SoftwareBackend, VoiceId, Waveform};
use crate::error::{BackendError, BackendResult};

struct StreamThread {
    shutdown: mpsc::Sender<()>,
    handle: thread::JoinHandle<()>,
}

pub struct RealtimeBackend {
    inner: SoftwareBackend,
    stream: Option<StreamThread>,
}

impl Default for RealtimeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeBackend {
    pub fn new() -> Self {
        // Sample rate is replaced by the device rate on unlock
        Self {
            inner: SoftwareBackend::new(44100.0),
            stream: None,
        }
    }

    pub fn mixer(&self) -> Arc<Mutex<Mixer>> {
        self.inner.mixer()
    }
}

impl Drop for RealtimeBackend {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown.send(());
            if stream.handle.join().is_err() {
                warn!("Audio stream thread panicked");
            }
        }
    }
}

fn run_stream(
    mixer: Arc<Mutex<Mixer>>,
    ready: oneshot::Sender<BackendResult<u32>>,
    shutdown: mpsc::Receiver<()>,
) {
    let stream = match open_stream(mixer) {
        Ok((stream, sample_rate)) => {
            let _ = ready.send(Ok(sample_rate));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    // Park until the backend is dropped; the stream plays meanwhile
    let _ = shutdown.recv();
    drop(stream);
    info!("Audio stream closed");
}

fn open_stream(mixer: Arc<Mutex<Mixer>>) -> BackendResult<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    info!("Audio host: {:?}", host.id());

    let device = host.default_output_device().ok_or(BackendError::NoDevice)?;
    if let Ok(name) = device.name() {
        info!("Audio device: {}", name);
    }

    let config = device
        .default_output_config()
        .map_err(|e| BackendError::Locked(e.to_string()))?;
    info!("Audio config: {:?}", config);

    let sample_rate = config.sample_rate().0;
    let channels = config.channels() as usize;

    if let Ok(mut m) = mixer.lock() {
        m.set_sample_rate(sample_rate as f32);
    }

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config.into(), mixer, channels),
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config.into(), mixer, channels),
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config.into(), mixer, channels),
        other => Err(BackendError::Stream(format!(
            "Unsupported sample format {:?}",
            other
        ))),
    }?;

    stream
        .play()
        .map_err(|e| BackendError::Locked(e.to_string()))?;
    info!("Audio stream started at {} Hz", sample_rate);

    Ok((stream, sample_rate))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: Arc<Mutex<Mixer>>,
    channels: usize,
) -> BackendResult<cpal::Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut mixer = match mixer.lock() {
                    Ok(mixer) => mixer,
                    Err(_) => {
                        for sample in data.iter_mut() {
                            *sample = T::from_sample(0.0);
                        }
                        return;
                    }
                };
                for frame in data.chunks_mut(channels) {
                    let (left, right) = mixer.next_frame();
                    match frame.len() {
                        1 => frame[0] = T::from_sample((left + right) * 0.5),
                        _ => {
                            frame[0] = T::from_sample(left);
                            frame[1] = T::from_sample(right);
                            for extra in frame.iter_mut().skip(2) {
                                *extra = T::from_sample(0.0);
                            }
                        }
                    }
                }
            },
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| BackendError::Stream(e.to_string()))
}

impl AudioBackend for RealtimeBackend {
    async fn unlock(&mut self) -> BackendResult<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let mixer = self.inner.mixer();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel();
        let handle = thread::spawn(move || run_stream(mixer, ready_tx, shutdown_rx));

        match ready_rx.await {
            Ok(Ok(_sample_rate)) => {
                self.stream = Some(StreamThread {
                    shutdown: shutdown_tx,
                    handle,
                });
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(BackendError::Locked(
                "audio thread exited before opening a stream".to_string(),
            )),
        }
    }

    fn create_oscillator(&mut self, waveform: Waveform, gain_db: f32) -> BackendResult<VoiceId> {
        self.inner.create_oscillator(waveform, gain_db)
    }

    fn create_lfo(&mut self, target: VoiceId, rate_hz: f32, depth_hz: f32) -> BackendResult<VoiceId> {
        self.inner.create_lfo(target, rate_hz, depth_hz)
    }

    fn create_noise(&mut self, color: NoiseColor, gain_db: f32) -> BackendResult<VoiceId> {
        self.inner.create_noise(color, gain_db)
    }

    fn set_pan(&mut self, voice: VoiceId, pan: f32) -> BackendResult<()> {
        self.inner.set_pan(voice, pan)
    }

    fn set_gain_db(&mut self, voice: VoiceId, gain_db: Option<f32>) -> BackendResult<()> {
        self.inner.set_gain_db(voice, gain_db)
    }

    fn set_frequency(&mut self, voice: VoiceId, hz: f32) -> BackendResult<()> {
        self.inner.set_frequency(voice, hz)
    }

    fn ramp_frequency(
        &mut self,
        voice: VoiceId,
        hz: f32,
        duration: Duration,
        curve: RampCurve,
    ) -> BackendResult<()> {
        self.inner.ramp_frequency(voice, hz, duration, curve)
    }

    fn set_noise_color(&mut self, voice: VoiceId, color: NoiseColor) -> BackendResult<()> {
        self.inner.set_noise_color(voice, color)
    }

    fn start(&mut self, voice: VoiceId) -> BackendResult<()> {
        self.inner.start(voice)
    }

    fn stop(&mut self, voice: VoiceId) -> BackendResult<()> {
        self.inner.stop(voice)
    }

    fn release(&mut self, voice: VoiceId) {
        self.inner.release(voice)
    }
}
