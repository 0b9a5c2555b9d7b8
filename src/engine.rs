//! Frequency control engine
//!
//! A single task owns every piece of engine state and serializes three event
//! sources: user commands arriving on a channel, expiry of the debounce
//! window, and drift ticks. Callers talk to it through a cloneable
//! [`EngineHandle`]; each request carries a oneshot reply.
//!
//! Pointer input, preset switches, random beats and drift ticks all push
//! candidate frequency pairs into one [`Debouncer`]. Only its trailing value
//! reaches the voices.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::future;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, sleep_until, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::backend::AudioBackend;
use crate::config::{EngineConfig, FrequencyBand, Surface};
use crate::debounce::Debouncer;
use crate::drift::{DriftScheduler, DriftState};
use crate::error::{ConfigError, ConfigResult, EngineError, EngineResult};
use crate::mapper::{center_beat, map_pointer, random_beat, FrequencyPair};
use crate::synth::{NoiseState, NoiseType, OscillatorState, SynthVoices};

/// Capacity of the request queue between handles and the engine task
const COMMAND_BUFFER: usize = 64;

/// Pointer position in surface-local coordinates, with the surface size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PointerEvent {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Event at `(x, y)` on a surface of the given size
    pub fn on(surface: &Surface, x: f32, y: f32) -> Self {
        Self::new(x, y, surface.width, surface.height)
    }
}

/// Point-in-time view of the engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub is_playing: bool,
    pub voices_initialized: bool,
    pub base_key: String,
    pub base_hz: f32,
    pub band_key: String,
    pub band: FrequencyBand,
    pub left: OscillatorState,
    pub right: OscillatorState,
    pub harmonic_target: f32,
    /// Applied beat, `right - left`
    pub beat: f32,
    /// Update still waiting out the debounce window
    pub pending: Option<FrequencyPair>,
    pub noise: NoiseState,
    pub drift: DriftState,
    pub drift_timer_active: bool,
    pub pointer_down: bool,
}

enum Command {
    Play(oneshot::Sender<EngineResult<()>>),
    Stop(oneshot::Sender<EngineResult<()>>),
    TogglePlayback(oneshot::Sender<EngineResult<bool>>),
    RandomizeBeat(oneshot::Sender<f32>),
    SetBasePreset(String, oneshot::Sender<EngineResult<()>>),
    SetBand(String, oneshot::Sender<EngineResult<()>>),
    SetNoise(NoiseState, oneshot::Sender<EngineResult<()>>),
    ToggleDrift(oneshot::Sender<bool>),
    PointerDown(PointerEvent, oneshot::Sender<()>),
    PointerMove(PointerEvent, oneshot::Sender<()>),
    PointerUp(oneshot::Sender<()>),
    Snapshot(oneshot::Sender<EngineSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

pub struct Engine<B: AudioBackend> {
    config: EngineConfig,
    synth: SynthVoices<B>,
    base_key: String,
    base_hz: f32,
    band_key: String,
    band: FrequencyBand,
    left: OscillatorState,
    right: OscillatorState,
    /// Applied beat; `right.frequency` is derived from it
    beat: f32,
    noise: NoiseState,
    drift: DriftScheduler,
    debounce: Debouncer<FrequencyPair>,
    /// Present only while drift is armed and playback is running
    drift_timer: Option<Interval>,
    pointer_down: bool,
    is_playing: bool,
    rng: StdRng,
}

impl<B: AudioBackend> Engine<B> {
    /// Build an engine at the configured default base and band.
    pub fn new(config: EngineConfig, backend: B) -> ConfigResult<Self> {
        config.validate()?;

        let base_hz = config
            .base_hz(&config.default_base)
            .ok_or_else(|| ConfigError::UnknownDefault {
                table: "base_presets",
                key: config.default_base.clone(),
            })?;
        let band = config
            .band(&config.default_band)
            .ok_or_else(|| ConfigError::UnknownDefault {
                table: "bands",
                key: config.default_band.clone(),
            })?;

        let pair = FrequencyPair::from_beat(base_hz, center_beat(&band));
        let voices = &config.voices;

        Ok(Self {
            synth: SynthVoices::new(backend, &config),
            base_key: config.default_base.clone(),
            base_hz,
            band_key: config.default_band.clone(),
            band,
            left: OscillatorState {
                frequency: pair.left,
                pan: voices.left_pan,
            },
            right: OscillatorState {
                frequency: pair.right(),
                pan: voices.right_pan,
            },
            beat: pair.beat,
            noise: NoiseState::off(voices.noise_volume),
            drift: DriftScheduler::new(&config.drift, &band),
            debounce: Debouncer::new(config.debounce_window()),
            drift_timer: None,
            pointer_down: false,
            is_playing: false,
            rng: StdRng::from_entropy(),
            config,
        })
    }

    /// Use a fixed seed for random beats
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Move the engine onto its own task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(self) -> EngineHandle {
        let (commands, receiver) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(self.run(receiver));
        EngineHandle { commands }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        info!(
            "Engine started at {} ({} Hz), band {} ({}-{} Hz)",
            self.base_key, self.base_hz, self.band_key, self.band.min, self.band.max
        );

        loop {
            let deadline = self.debounce.deadline();
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle(command).await {
                            break;
                        }
                    }
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                _ = debounce_expiry(deadline) => self.flush_debounce(),
                _ = drift_tick(&mut self.drift_timer) => self.on_drift_tick(),
            }
        }

        info!("Engine stopped");
    }

    /// Serve one request; returns `false` once the engine should exit.
    async fn handle(&mut self, command: Command) -> bool {
        // A dropped reply receiver just means the caller stopped waiting
        match command {
            Command::Play(reply) => {
                let _ = reply.send(self.play().await);
            }
            Command::Stop(reply) => {
                let _ = reply.send(self.stop());
            }
            Command::TogglePlayback(reply) => {
                let result = if self.is_playing {
                    self.stop().map(|_| false)
                } else {
                    self.play().await.map(|_| true)
                };
                let _ = reply.send(result);
            }
            Command::RandomizeBeat(reply) => {
                let _ = reply.send(self.randomize_beat());
            }
            Command::SetBasePreset(key, reply) => {
                let _ = reply.send(self.set_base_preset(&key));
            }
            Command::SetBand(key, reply) => {
                let _ = reply.send(self.set_band(&key));
            }
            Command::SetNoise(noise, reply) => {
                let _ = reply.send(self.set_noise(noise));
            }
            Command::ToggleDrift(reply) => {
                let _ = reply.send(self.toggle_drift());
            }
            Command::PointerDown(event, reply) => {
                self.pointer_down = true;
                self.push_pointer(event);
                let _ = reply.send(());
            }
            Command::PointerMove(event, reply) => {
                if self.pointer_down {
                    self.push_pointer(event);
                }
                let _ = reply.send(());
            }
            Command::PointerUp(reply) => {
                self.pointer_down = false;
                let _ = reply.send(());
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown(reply) => {
                self.shutdown();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    async fn play(&mut self) -> EngineResult<()> {
        if self.is_playing {
            debug!("Play requested while already playing");
            return Ok(());
        }

        if let Some(pair) = self.debounce.cancel() {
            self.commit(pair);
        }
        let pair = self.applied_pair();

        let created = match self.synth.initialize_voices(pair, &self.noise).await {
            Ok(created) => created,
            Err(e) => {
                warn!("Playback not started: {}", e);
                return Err(e);
            }
        };
        if !created {
            self.synth.apply_frequencies(pair)?;
            self.synth.apply_noise(&self.noise, false)?;
        }

        if let Err(e) = self.synth.start(&self.noise) {
            warn!("Playback not started: {}", e);
            return Err(e.into());
        }

        self.is_playing = true;
        if self.drift.is_armed() {
            self.start_drift_timer();
        }

        info!(
            "Playing L {:.2} Hz R {:.2} Hz (beat {:.2} Hz)",
            pair.left,
            pair.right(),
            pair.beat
        );
        Ok(())
    }

    /// Silence the voices and cancel both timers. A pending update is kept
    /// as the applied state so the next play resumes from it.
    fn stop(&mut self) -> EngineResult<()> {
        if let Some(pair) = self.debounce.cancel() {
            self.commit(pair);
        }
        if self.drift.is_armed() {
            self.drift.disarm();
            debug!("Drift disarmed by stop");
        }
        self.drift_timer = None;

        if !self.is_playing {
            return Ok(());
        }
        self.is_playing = false;
        self.synth.stop()?;

        info!("Playback stopped");
        Ok(())
    }

    fn randomize_beat(&mut self) -> f32 {
        let beat = random_beat(&self.band, &mut self.rng);
        let left = self.latest_pair().left;
        self.push(FrequencyPair::from_beat(left, beat));
        debug!("Random beat {} Hz in {}", beat, self.band_key);
        beat
    }

    fn set_base_preset(&mut self, key: &str) -> EngineResult<()> {
        let base_hz = self
            .config
            .base_hz(key)
            .ok_or_else(|| EngineError::UnknownBasePreset(key.to_string()))?;

        self.base_key = key.to_string();
        self.base_hz = base_hz;
        self.push(FrequencyPair::from_beat(base_hz, center_beat(&self.band)));

        info!("Base preset {} ({} Hz)", key, base_hz);
        Ok(())
    }

    fn set_band(&mut self, key: &str) -> EngineResult<()> {
        let band = self
            .config
            .band(key)
            .ok_or_else(|| EngineError::UnknownBand(key.to_string()))?;

        self.band_key = key.to_string();
        self.band = band;
        let left = self.latest_pair().left;
        self.push(FrequencyPair::from_beat(left, center_beat(&band)));

        if self.drift.is_armed() {
            self.drift.resync(&band);
            debug!("Drift bounds now {}-{} Hz", band.min, band.max);
        }

        info!("Band {} ({}-{} Hz)", key, band.min, band.max);
        Ok(())
    }

    fn set_noise(&mut self, noise: NoiseState) -> EngineResult<()> {
        let noise = NoiseState::new(noise.noise_type, noise.volume);
        self.noise = noise;
        self.synth.apply_noise(&noise, self.is_playing)?;

        if noise.noise_type == NoiseType::Off {
            debug!("Noise off");
        } else {
            debug!("Noise {:?} at {:.3}", noise.noise_type, noise.volume);
        }
        Ok(())
    }

    fn toggle_drift(&mut self) -> bool {
        let armed = self.drift.toggle(&self.band);
        if armed {
            if self.is_playing {
                self.start_drift_timer();
            }
            info!(
                "Drift armed in {}-{} Hz, {:?}",
                self.band.min,
                self.band.max,
                self.drift.state().direction
            );
        } else {
            self.drift_timer = None;
            info!("Drift disarmed");
        }
        armed
    }

    fn push_pointer(&mut self, event: PointerEvent) {
        let surface = if event.width > 0.0 && event.height > 0.0 {
            Surface::new(event.width, event.height)
        } else {
            self.config.surface
        };
        let pair = map_pointer(event.x, event.y, &surface, self.base_hz, &self.band);
        self.push(pair);
    }

    fn push(&mut self, pair: FrequencyPair) {
        self.debounce.push(pair, Instant::now());
    }

    fn flush_debounce(&mut self) {
        let Some(pair) = self.debounce.poll(Instant::now()) else {
            return;
        };
        self.commit(pair);
        debug!("Applying L {:.2} Hz R {:.2} Hz", pair.left, pair.right());
        if let Err(e) = self.synth.apply_frequencies(pair) {
            warn!("Failed to apply frequencies: {}", e);
        }
    }

    fn on_drift_tick(&mut self) {
        if !self.is_playing || !self.drift.is_armed() {
            self.drift_timer = None;
            return;
        }

        let latest = self.latest_pair();
        if let Some(beat) = self.drift.tick(latest.beat) {
            debug!(
                "Drift tick {:.2} -> {:.2} Hz ({:?})",
                latest.beat,
                beat,
                self.drift.state().direction
            );
            self.push(FrequencyPair::from_beat(latest.left, beat));
        }
    }

    fn start_drift_timer(&mut self) {
        let period = self.drift.period();
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.drift_timer = Some(timer);
    }

    fn commit(&mut self, pair: FrequencyPair) {
        self.left.frequency = pair.left;
        self.right.frequency = pair.right();
        self.beat = pair.beat;
    }

    fn applied_pair(&self) -> FrequencyPair {
        FrequencyPair::from_beat(self.left.frequency, self.beat)
    }

    /// Newest known target, counting an update still in the debounce window
    fn latest_pair(&self) -> FrequencyPair {
        self.debounce
            .pending()
            .copied()
            .unwrap_or_else(|| self.applied_pair())
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            is_playing: self.is_playing,
            voices_initialized: self.synth.is_initialized(),
            base_key: self.base_key.clone(),
            base_hz: self.base_hz,
            band_key: self.band_key.clone(),
            band: self.band,
            left: self.left,
            right: self.right,
            harmonic_target: self.synth.harmonic_target(),
            beat: self.beat,
            pending: self.debounce.pending().copied(),
            noise: self.noise,
            drift: self.drift.state().clone(),
            drift_timer_active: self.drift_timer.is_some(),
            pointer_down: self.pointer_down,
        }
    }

    fn shutdown(&mut self) {
        self.debounce.cancel();
        self.drift.disarm();
        self.drift_timer = None;
        if self.is_playing {
            if let Err(e) = self.synth.stop() {
                warn!("Failed to stop voices on shutdown: {}", e);
            }
            self.is_playing = false;
        }
        self.synth.dispose();
    }
}

async fn debounce_expiry(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}

async fn drift_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => future::pending().await,
    }
}

/// Cloneable handle to a running [`Engine`]
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
}

impl EngineHandle {
    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> EngineResult<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| EngineError::Closed)?;
        response.await.map_err(|_| EngineError::Closed)
    }

    /// Unlock the backend, create voices on first use and start them.
    pub async fn play(&self) -> EngineResult<()> {
        self.request(Command::Play).await?
    }

    /// Idempotent; also disarms drift.
    pub async fn stop(&self) -> EngineResult<()> {
        self.request(Command::Stop).await?
    }

    /// Returns whether the engine is playing afterwards
    pub async fn toggle_playback(&self) -> EngineResult<bool> {
        self.request(Command::TogglePlayback).await?
    }

    /// Pick a whole-Hz beat in the current band; returns it.
    pub async fn randomize_beat(&self) -> EngineResult<f32> {
        self.request(Command::RandomizeBeat).await
    }

    pub async fn set_base_preset(&self, key: &str) -> EngineResult<()> {
        let key = key.to_string();
        self.request(|reply| Command::SetBasePreset(key, reply)).await?
    }

    pub async fn set_band(&self, key: &str) -> EngineResult<()> {
        let key = key.to_string();
        self.request(|reply| Command::SetBand(key, reply)).await?
    }

    pub async fn set_noise(&self, noise: NoiseState) -> EngineResult<()> {
        self.request(|reply| Command::SetNoise(noise, reply)).await?
    }

    /// Returns the new armed flag
    pub async fn toggle_drift(&self) -> EngineResult<bool> {
        self.request(Command::ToggleDrift).await
    }

    pub async fn pointer_down(&self, event: PointerEvent) -> EngineResult<()> {
        self.request(|reply| Command::PointerDown(event, reply)).await
    }

    /// Ignored unless the pointer is down
    pub async fn pointer_move(&self, event: PointerEvent) -> EngineResult<()> {
        self.request(|reply| Command::PointerMove(event, reply)).await
    }

    pub async fn pointer_up(&self) -> EngineResult<()> {
        self.request(Command::PointerUp).await
    }

    pub async fn snapshot(&self) -> EngineResult<EngineSnapshot> {
        self.request(Command::Snapshot).await
    }

    /// Stop, release all voices and end the engine task. Succeeds if the
    /// engine is already gone.
    pub async fn shutdown(&self) {
        let _ = self.request(Command::Shutdown).await;
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SoftwareBackend;

    fn engine() -> Engine<SoftwareBackend> {
        Engine::new(EngineConfig::default(), SoftwareBackend::new(8000.0))
            .unwrap()
            .with_seed(7)
    }

    #[test]
    fn test_new_starts_at_default_presets() {
        let snapshot = engine().snapshot();
        assert_eq!(snapshot.base_key, "ut");
        assert_eq!(snapshot.band_key, "alpha");
        assert_eq!(snapshot.left.frequency, 396.0);
        assert_eq!(snapshot.right.frequency, 406.5);
        assert_eq!(snapshot.left.pan, -1.0);
        assert_eq!(snapshot.right.pan, 1.0);
        assert!(!snapshot.is_playing);
        assert!(!snapshot.drift.armed);
        assert_eq!(snapshot.drift.min, 8.0);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let mut config = EngineConfig::default();
        config.default_band = "omega".to_string();
        assert!(Engine::new(config, SoftwareBackend::new(8000.0)).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_preset_keys_are_errors() {
        let handle = engine().spawn();
        assert_eq!(
            handle.set_base_preset("xx").await,
            Err(EngineError::UnknownBasePreset("xx".to_string()))
        );
        assert_eq!(
            handle.set_band("omega").await,
            Err(EngineError::UnknownBand("omega".to_string()))
        );
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_ends_task_and_releases_voices() {
        let engine = engine();
        let mixer = engine.synth.backend().mixer();
        let handle = engine.spawn();
        handle.play().await.unwrap();
        assert_eq!(mixer.lock().unwrap().voice_count(), 5);

        handle.shutdown().await;
        tokio::task::yield_now().await;
        assert!(handle.is_closed());
        assert_eq!(mixer.lock().unwrap().voice_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_after_shutdown_report_closed() {
        let handle = engine().spawn();
        handle.shutdown().await;
        handle.shutdown().await;
        assert_eq!(handle.play().await, Err(EngineError::Closed));
    }
}
