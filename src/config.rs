//! Engine configuration: preset tables, timing and voice parameters
//!
//! Configuration is plain data. It is read from TOML (every field has a
//! default, so a file only names what it overrides) and validated once at
//! load; nothing downstream re-checks it. Entries of the preset tables are
//! merged into the built-in ones: naming `[bands.theta]` replaces theta and
//! leaves the other bands in place.
//!
//! ```toml
//! default_base = "mi"
//! debounce_ms = 80
//!
//! [bands.theta]
//! min = 4.0
//! max = 8.0
//!
//! [drift]
//! step_hz = 0.5
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::drift::DriftDirection;
use crate::error::{ConfigError, ConfigResult};

/// Named beat-frequency range in Hz
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub min: f32,
    pub max: f32,
}

impl FrequencyBand {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn width(&self) -> f32 {
        self.max - self.min
    }

    pub fn contains(&self, hz: f32) -> bool {
        hz >= self.min && hz <= self.max
    }
}

/// Size of the pointer surface in surface-local pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    pub width: f32,
    pub height: f32,
}

impl Surface {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Clamp a coordinate into `[0, width] x [0, height]`
    pub fn clamp(&self, x: f32, y: f32) -> (f32, f32) {
        (x.clamp(0.0, self.width), y.clamp(0.0, self.height))
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        (0.0..=self.width).contains(&x) && (0.0..=self.height).contains(&y)
    }

    pub fn center(&self) -> (f32, f32) {
        (self.width / 2.0, self.height / 2.0)
    }
}

impl Default for Surface {
    fn default() -> Self {
        Self::new(400.0, 400.0)
    }
}

/// Drift sweep parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Tick period in milliseconds
    pub period_ms: u64,
    /// Beat change per tick in Hz
    pub step_hz: f32,
    /// Direction taken when drift is armed
    pub initial_direction: DriftDirection,
}

impl DriftConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            period_ms: 1000,
            step_hz: 1.0,
            initial_direction: DriftDirection::Descending,
        }
    }
}

/// Gains, pans and modulation of the four voices
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub tone_gain_db: f32,
    pub harmonic_gain_db: f32,
    /// Harmonic target as a multiple of the left frequency
    pub harmonic_ratio: f32,
    pub lfo_rate_hz: f32,
    /// LFO swing around the harmonic's center frequency (+/- Hz)
    pub lfo_depth_hz: f32,
    pub left_pan: f32,
    pub right_pan: f32,
    /// Linear noise volume applied at startup
    pub noise_volume: f32,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            tone_gain_db: -20.0,
            harmonic_gain_db: -20.0,
            harmonic_ratio: 1.5,
            lfo_rate_hz: 0.1,
            lfo_depth_hz: 20.0,
            left_pan: -1.0,
            right_pan: 1.0,
            noise_volume: 0.01,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub default_base: String,
    pub default_band: String,
    #[serde(deserialize_with = "merge_base_presets")]
    pub base_presets: BTreeMap<String, f32>,
    #[serde(deserialize_with = "merge_bands")]
    pub bands: BTreeMap<String, FrequencyBand>,
    /// Quiescence window of the update channel
    pub debounce_ms: u64,
    /// Left/right frequency ramp duration
    pub ramp_ms: u64,
    /// Harmonic frequency ramp duration
    pub harmonic_ramp_ms: u64,
    pub drift: DriftConfig,
    pub voices: VoiceConfig,
    pub surface: Surface,
}

fn default_base_presets() -> BTreeMap<String, f32> {
    [
        ("ut", 396.0),
        ("re", 417.0),
        ("mi", 528.0),
        ("fa", 639.0),
        ("sol", 741.0),
        ("la", 852.0),
        ("si", 963.0),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn default_bands() -> BTreeMap<String, FrequencyBand> {
    [
        ("delta", FrequencyBand::new(1.0, 4.0)),
        ("theta", FrequencyBand::new(4.0, 8.0)),
        ("alpha", FrequencyBand::new(8.0, 13.0)),
        ("beta", FrequencyBand::new(13.0, 30.0)),
        ("gamma", FrequencyBand::new(30.0, 50.0)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn merge_base_presets<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeMap<String, f32>, D::Error> {
    let mut presets = default_base_presets();
    presets.extend(BTreeMap::<String, f32>::deserialize(deserializer)?);
    Ok(presets)
}

fn merge_bands<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, FrequencyBand>, D::Error> {
    let mut bands = default_bands();
    bands.extend(BTreeMap::<String, FrequencyBand>::deserialize(deserializer)?);
    Ok(bands)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_base: "ut".to_string(),
            default_band: "alpha".to_string(),
            base_presets: default_base_presets(),
            bands: default_bands(),
            debounce_ms: 100,
            ramp_ms: 100,
            harmonic_ramp_ms: 1000,
            drift: DriftConfig::default(),
            voices: VoiceConfig::default(),
            surface: Surface::default(),
        }
    }
}

impl EngineConfig {
    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        debug!("Loading config from {:?}", path);
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: EngineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every invariant the engine relies on.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.base_presets.is_empty() {
            return Err(ConfigError::EmptyTable("base_presets"));
        }
        if self.bands.is_empty() {
            return Err(ConfigError::EmptyTable("bands"));
        }

        for (key, &hz) in &self.base_presets {
            if !hz.is_finite() || hz <= 0.0 {
                return Err(ConfigError::InvalidBase {
                    key: key.clone(),
                    hz,
                });
            }
        }

        for (key, band) in &self.bands {
            if !band.min.is_finite() || !band.max.is_finite() {
                return Err(ConfigError::NonFiniteBand {
                    key: key.clone(),
                    min: band.min,
                    max: band.max,
                });
            }
            if band.max < band.min {
                return Err(ConfigError::InvertedBand {
                    key: key.clone(),
                    min: band.min,
                    max: band.max,
                });
            }
            if band.min < 0.0 {
                return Err(ConfigError::NegativeBand {
                    key: key.clone(),
                    min: band.min,
                });
            }
        }

        if !self.base_presets.contains_key(&self.default_base) {
            return Err(ConfigError::UnknownDefault {
                table: "base_presets",
                key: self.default_base.clone(),
            });
        }
        if !self.bands.contains_key(&self.default_band) {
            return Err(ConfigError::UnknownDefault {
                table: "bands",
                key: self.default_band.clone(),
            });
        }

        let positive = [
            ("debounce_ms", self.debounce_ms > 0),
            ("ramp_ms", self.ramp_ms > 0),
            ("harmonic_ramp_ms", self.harmonic_ramp_ms > 0),
            ("drift.period_ms", self.drift.period_ms > 0),
            ("drift.step_hz", self.drift.step_hz > 0.0),
            ("surface.width", self.surface.width > 0.0),
            ("surface.height", self.surface.height > 0.0),
        ];
        if let Some(&(field, _)) = positive.iter().find(|(_, ok)| !*ok) {
            return Err(ConfigError::NonPositive { field });
        }

        Ok(())
    }

    pub fn base_hz(&self, key: &str) -> Option<f32> {
        self.base_presets.get(key).copied()
    }

    pub fn band(&self, key: &str) -> Option<FrequencyBand> {
        self.bands.get(key).copied()
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn ramp(&self) -> Duration {
        Duration::from_millis(self.ramp_ms)
    }

    pub fn harmonic_ramp(&self) -> Duration {
        Duration::from_millis(self.harmonic_ramp_ms)
    }

    /// Base presets ordered by frequency
    pub fn bases_by_frequency(&self) -> Vec<(&str, f32)> {
        let mut bases: Vec<_> = self
            .base_presets
            .iter()
            .map(|(k, &v)| (k.as_str(), v))
            .collect();
        bases.sort_by(|a, b| a.1.total_cmp(&b.1));
        bases
    }

    /// Bands ordered by lower bound
    pub fn bands_by_frequency(&self) -> Vec<(&str, FrequencyBand)> {
        let mut bands: Vec<_> = self.bands.iter().map(|(k, &v)| (k.as_str(), v)).collect();
        bands.sort_by(|a, b| a.1.min.total_cmp(&b.1.min));
        bands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.base_hz("ut"), Some(396.0));
        assert_eq!(config.band("alpha"), Some(FrequencyBand::new(8.0, 13.0)));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            debounce_ms = 50

            [drift]
            step_hz = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.drift.step_hz, 0.5);
        assert_eq!(config.drift.period_ms, 1000);
        assert_eq!(config.default_band, "alpha");
        assert_eq!(config.bands.len(), 5);
    }

    #[test]
    fn test_module_doc_example_loads() {
        let config = EngineConfig::from_toml_str(
            r#"
            default_base = "mi"
            debounce_ms = 80

            [bands.theta]
            min = 4.0
            max = 8.0

            [drift]
            step_hz = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.default_base, "mi");
        assert_eq!(config.debounce_ms, 80);
        assert_eq!(config.drift.step_hz, 0.5);
        assert_eq!(config.bands.len(), 5);
        assert_eq!(config.band("alpha"), Some(FrequencyBand::new(8.0, 13.0)));
    }

    #[test]
    fn test_table_entries_merge_into_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [base_presets]
            ut = 400.0
            om = 136.1

            [bands.theta]
            min = 5.0
            max = 7.0
            "#,
        )
        .unwrap();

        assert_eq!(config.base_hz("ut"), Some(400.0));
        assert_eq!(config.base_hz("om"), Some(136.1));
        assert_eq!(config.base_hz("la"), Some(852.0));
        assert_eq!(config.base_presets.len(), 8);
        assert_eq!(config.band("theta"), Some(FrequencyBand::new(5.0, 7.0)));
        assert_eq!(config.band("gamma"), Some(FrequencyBand::new(30.0, 50.0)));
    }

    #[test]
    fn test_non_finite_band_rejected() {
        let mut config = EngineConfig::default();
        config.bands.insert("odd".to_string(), FrequencyBand::new(f32::NAN, 8.0));
        assert!(matches!(config.validate(), Err(ConfigError::NonFiniteBand { .. })));

        let result = EngineConfig::from_toml_str(
            r#"
            [bands.wide]
            min = 1.0
            max = inf
            "#,
        );
        assert!(matches!(result, Err(ConfigError::NonFiniteBand { .. })));
    }

    #[test]
    fn test_inverted_band_fails_at_load() {
        let result = EngineConfig::from_toml_str(
            r#"
            default_band = "odd"

            [bands.odd]
            min = 9.0
            max = 3.0
            "#,
        );
        assert!(matches!(result, Err(ConfigError::InvertedBand { .. })));
    }

    #[test]
    fn test_unknown_default_fails() {
        let result = EngineConfig::from_toml_str(r#"default_base = "nope""#);
        assert!(matches!(
            result,
            Err(ConfigError::UnknownDefault {
                table: "base_presets",
                ..
            })
        ));
    }

    #[test]
    fn test_zero_debounce_rejected() {
        let result = EngineConfig::from_toml_str("debounce_ms = 0");
        assert!(matches!(
            result,
            Err(ConfigError::NonPositive {
                field: "debounce_ms"
            })
        ));
    }

    #[test]
    fn test_initial_direction_parses_lowercase() {
        let config = EngineConfig::from_toml_str(
            r#"
            [drift]
            initial_direction = "ascending"
            "#,
        )
        .unwrap();
        assert_eq!(config.drift.initial_direction, DriftDirection::Ascending);
    }

    #[test]
    fn test_bases_sorted_by_frequency() {
        let config = EngineConfig::default();
        let keys: Vec<_> = config.bases_by_frequency().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["ut", "re", "mi", "fa", "sol", "la", "si"]);
    }

    #[test]
    fn test_surface_clamp() {
        let surface = Surface::new(400.0, 300.0);
        assert_eq!(surface.clamp(-5.0, 500.0), (0.0, 300.0));
        assert_eq!(surface.clamp(200.0, 150.0), (200.0, 150.0));
        assert!(!surface.contains(401.0, 0.0));
    }
}
