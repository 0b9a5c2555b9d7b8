//! # Binaural - Binaural Beat Frequency Control Engine
//!
//! Two detuned sine tones, one per ear, whose difference is the beat the
//! listener perceives. A harmonic overtone and a colored-noise bed sit under
//! them. The engine turns preset choices and 2D pointer input into target
//! frequencies, rate-limits those updates, and can sweep the beat on its own.
//!
//! ## Core Features
//!
//! - **Frequency Mapping**: vertical axis picks the carrier, horizontal axis the beat
//! - **Debounced Updates**: bursts of input collapse into one glide per quiet window
//! - **Drift**: the beat walks between the band's bounds, reversing at each end
//! - **Lazy Voices**: backend voices are created on first play and reused after
//! - **Backends**: in-process software mixer, real-time output via cpal (`realtime` feature)
//! - **Offline Render**: whole sessions to 32-bit float WAV
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use binaural::backend::SoftwareBackend;
//! use binaural::config::EngineConfig;
//! use binaural::engine::{Engine, PointerEvent};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = Engine::new(EngineConfig::default(), SoftwareBackend::new(44100.0))?;
//! let handle = engine.spawn();
//!
//! handle.play().await?;
//! handle.set_band("theta").await?;
//! handle.pointer_down(PointerEvent::new(200.0, 200.0, 400.0, 400.0)).await?;
//! handle.pointer_up().await?;
//! handle.toggle_drift().await?;
//!
//! let snapshot = handle.snapshot().await?;
//! println!("beat {} Hz", snapshot.beat);
//!
//! handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod debounce;
pub mod drift;
pub mod engine;
pub mod error;
pub mod mapper;
pub mod render;
pub mod synth;
pub mod test_utils;

pub use backend::{AudioBackend, SoftwareBackend};
pub use config::{EngineConfig, FrequencyBand};
pub use engine::{Engine, EngineHandle, EngineSnapshot, PointerEvent};
pub use error::{BackendError, ConfigError, EngineError, RenderError};
pub use mapper::FrequencyPair;
pub use synth::{NoiseState, NoiseType};
