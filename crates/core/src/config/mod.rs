use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Millis, Result, Tempo, TempoPresets};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tempo: TempoConfig,
    pub bank: BankConfig,
    pub host: HostConfig,
}

impl AppConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Reads a JSON configuration file. Missing sections keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }
}

/// Tempo the device boots with and the BPM button's cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    pub default_bpm: Tempo,
    pub presets: Vec<Tempo>,
}

impl Default for TempoConfig {
    fn default() -> Self {
        let presets = TempoPresets::default();
        Self {
            default_bpm: presets.default_tempo(),
            presets: presets.presets().to_vec(),
        }
    }
}

impl TempoConfig {
    pub fn presets(&self) -> TempoPresets {
        TempoPresets::new(self.presets.iter().copied(), self.default_bpm)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankConfig {
    pub patterns: usize,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self { patterns: 16 }
    }
}

/// Settings for the fake host loop used by the command line driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub frame_interval_ms: Millis,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 1_000.0 / 60.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config = AppConfig::from_json_str(r#"{ "tempo": { "default_bpm": 0 } }"#).unwrap();
        assert_eq!(config.tempo.default_bpm, Tempo::new(1));
        assert_eq!(config.tempo.presets.len(), 3);
        assert_eq!(config.bank.patterns, 16);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = AppConfig::from_json_str("{ tempo").unwrap_err();
        assert!(format!("{err}").contains("invalid json"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = AppConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, crate::PocketError::Io(_)));
    }
}
