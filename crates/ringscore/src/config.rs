//! JSON configuration for the scoring pipeline.

use crate::impact::ImpactParams;
use crate::rectify::CornerSource;
use crate::score::{CalibrationPreset, ScoringCalibration};
use crate::source::{DEFAULT_STREAM_PATH, DEFAULT_STREAM_PORT};
use ringscore_aruco::MarkerDetectorParams;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Scoring service endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Where the camera stream lives on the selected device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub port: u16,
    pub path: String,
    pub read_timeout_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_STREAM_PORT,
            path: DEFAULT_STREAM_PATH.to_string(),
            read_timeout_ms: 10_000,
        }
    }
}

impl StreamConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

/// A named preset (scaled to the canonical size) or explicit canonical values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CalibrationConfig {
    Preset(CalibrationPreset),
    Custom(ScoringCalibration),
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self::Preset(CalibrationPreset::Measured)
    }
}

impl CalibrationConfig {
    pub fn resolve(&self, canonical_size: u32) -> ScoringCalibration {
        match self {
            Self::Preset(p) => ScoringCalibration::preset(*p).scaled_to(canonical_size),
            Self::Custom(c) => c.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingscoreConfig {
    /// Side of the rectified square, pixels.
    pub canonical_size: u32,
    pub corner_source: CornerSource,
    pub marker: MarkerDetectorParams,
    pub impact: ImpactParams,
    pub calibration: CalibrationConfig,
    /// Minimum time between processed cycles.
    pub cycle_interval_ms: u64,
    pub service: ServiceConfig,
    pub stream: StreamConfig,
}

impl Default for RingscoreConfig {
    fn default() -> Self {
        Self {
            canonical_size: 500,
            corner_source: CornerSource::default(),
            marker: MarkerDetectorParams::default(),
            impact: ImpactParams::default(),
            calibration: CalibrationConfig::default(),
            cycle_interval_ms: 1000,
            service: ServiceConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

impl RingscoreConfig {
    /// Load a JSON config from disk; missing fields take their defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let cfg: Self = serde_json::from_str(&raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.canonical_size < 16 {
            return Err(ConfigError::Invalid(format!(
                "canonical_size {} is below 16 px",
                self.canonical_size
            )));
        }
        if let CornerSource::OuterCorners { offset_px } = self.corner_source {
            if !offset_px.is_finite() {
                return Err(ConfigError::Invalid("corner offset is not finite".into()));
            }
        }
        let c = self.scoring_calibration().center;
        if !(c.x.is_finite() && c.y.is_finite()) {
            return Err(ConfigError::Invalid("calibration center is not finite".into()));
        }
        Ok(())
    }

    pub fn scoring_calibration(&self) -> ScoringCalibration {
        self.calibration.resolve(self.canonical_size)
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_millis(self.cycle_interval_ms)
    }
}
