//! Error types for configuration loading, backend calls and engine requests

use std::fmt;

use crate::backend::VoiceId;

/// Configuration errors. These are fatal at load time.
#[derive(Debug)]
pub enum ConfigError {
    /// Band whose maximum lies below its minimum
    InvertedBand { key: String, min: f32, max: f32 },
    /// Band with a negative lower bound
    NegativeBand { key: String, min: f32 },
    /// Band with a NaN or infinite bound
    NonFiniteBand { key: String, min: f32, max: f32 },
    /// Base preset that is zero, negative or not finite
    InvalidBase { key: String, hz: f32 },
    /// A preset table has no entries
    EmptyTable(&'static str),
    /// The default base or band key is missing from its table
    UnknownDefault { table: &'static str, key: String },
    /// A timing or size value that must be strictly positive
    NonPositive { field: &'static str },
    /// Malformed TOML
    Parse(toml::de::Error),
    /// IO error while reading a config file
    Io(std::io::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvertedBand { key, min, max } => {
                write!(f, "Band '{}' has max {} Hz below min {} Hz", key, max, min)
            }
            ConfigError::NegativeBand { key, min } => {
                write!(f, "Band '{}' has negative min {} Hz", key, min)
            }
            ConfigError::NonFiniteBand { key, min, max } => {
                write!(f, "Band '{}' must have finite bounds, got {} - {}", key, min, max)
            }
            ConfigError::InvalidBase { key, hz } => {
                write!(f, "Base preset '{}' must be a positive frequency, got {}", key, hz)
            }
            ConfigError::EmptyTable(table) => write!(f, "Preset table '{}' is empty", table),
            ConfigError::UnknownDefault { table, key } => {
                write!(f, "Default key '{}' not found in table '{}'", key, table)
            }
            ConfigError::NonPositive { field } => write!(f, "'{}' must be greater than zero", field),
            ConfigError::Parse(e) => write!(f, "Config parse error: {}", e),
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Parse(e) => Some(e),
            ConfigError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Errors reported by an [`AudioBackend`](crate::backend::AudioBackend)
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Output could not be unlocked (no user gesture yet, device busy, ...)
    Locked(String),
    /// No output device available
    NoDevice,
    /// The voice was never created or has been released
    UnknownVoice(VoiceId),
    /// Operation not valid for this kind of voice
    WrongVoiceKind { voice: VoiceId, expected: &'static str },
    /// Output stream failure
    Stream(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Locked(msg) => write!(f, "Audio output is locked: {}", msg),
            BackendError::NoDevice => write!(f, "No audio output device found"),
            BackendError::UnknownVoice(id) => write!(f, "Unknown voice {}", id),
            BackendError::WrongVoiceKind { voice, expected } => {
                write!(f, "Voice {} is not a {}", voice, expected)
            }
            BackendError::Stream(msg) => write!(f, "Audio stream error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

/// Errors returned by engine requests
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The backend could not be unlocked; playback stays stopped and may be retried
    BackendUnlock(BackendError),
    /// A backend call failed after unlock
    Backend(BackendError),
    /// No base preset with this key
    UnknownBasePreset(String),
    /// No frequency band with this key
    UnknownBand(String),
    /// The engine task has shut down
    Closed,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::BackendUnlock(e) => write!(f, "Could not unlock audio output: {}", e),
            EngineError::Backend(e) => write!(f, "Backend error: {}", e),
            EngineError::UnknownBasePreset(key) => write!(f, "Unknown base preset: {}", key),
            EngineError::UnknownBand(key) => write!(f, "Unknown frequency band: {}", key),
            EngineError::Closed => write!(f, "Engine has shut down"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::BackendUnlock(e) | EngineError::Backend(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BackendError> for EngineError {
    fn from(e: BackendError) -> Self {
        EngineError::Backend(e)
    }
}

/// Errors from offline rendering
#[derive(Debug)]
pub enum RenderError {
    /// Driving the voices failed, or a preset key was unknown
    Engine(EngineError),
    /// Writing the WAV file failed
    Wav(hound::Error),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Engine(e) => write!(f, "Render failed: {}", e),
            RenderError::Wav(e) => write!(f, "Failed to write WAV: {}", e),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Engine(e) => Some(e),
            RenderError::Wav(e) => Some(e),
        }
    }
}

impl From<EngineError> for RenderError {
    fn from(e: EngineError) -> Self {
        RenderError::Engine(e)
    }
}

impl From<BackendError> for RenderError {
    fn from(e: BackendError) -> Self {
        RenderError::Engine(EngineError::Backend(e))
    }
}

impl From<hound::Error> for RenderError {
    fn from(e: hound::Error) -> Self {
        RenderError::Wav(e)
    }
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for backend calls
pub type BackendResult<T> = Result<T, BackendError>;

/// Result type for engine requests
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type for offline rendering
pub type RenderResult<T> = Result<T, RenderError>;
