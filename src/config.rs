use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{SdfError, SdfResult};

/// Largest finite half float. Absent seeds resolve to this distance so the
/// saturated value is representable in either distance format.
pub const DEFAULT_MAX_DISTANCE: f32 = 65504.0;

/// Storage format of the output distance texture.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DistanceFormat {
    /// 32-bit float, single channel.
    #[default]
    R32f,
    /// 16-bit float, single channel. Needs extended storage formats.
    R16f,
}

impl DistanceFormat {
    pub fn name(self) -> &'static str {
        match self {
            Self::R32f => "r32f",
            Self::R16f => "r16f",
        }
    }

    /// Largest finite value the format stores.
    pub fn max_value(self) -> f32 {
        match self {
            Self::R32f => f32::MAX,
            Self::R16f => half::f16::MAX.to_f32(),
        }
    }
}

/// Filtering for the sampler handed to consumers of the distance texture.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SamplerFilter {
    #[default]
    Linear,
    Nearest,
}

/// Which physical device to prefer when several are present.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    #[default]
    Auto,
    Discrete,
    Integrated,
    Cpu,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SdfConfig {
    #[serde(default)]
    pub distance_format: DistanceFormat,
    #[serde(default)]
    pub filter: SamplerFilter,
    #[serde(default = "default_max_distance")]
    pub max_distance: f32,
    #[serde(default)]
    pub device: DevicePreference,
}

fn default_max_distance() -> f32 { DEFAULT_MAX_DISTANCE }

impl Default for SdfConfig {
    fn default() -> Self {
        Self {
            distance_format: DistanceFormat::default(),
            filter: SamplerFilter::default(),
            max_distance: DEFAULT_MAX_DISTANCE,
            device: DevicePreference::default(),
        }
    }
}

impl SdfConfig {
    fn config_dir() -> Option<PathBuf> {
        std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config").join("jfa-sdf"))
    }

    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("settings.json"))
    }

    /// Load the user settings file, falling back to defaults when it is
    /// missing or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(SdfError::ConfigIo(_)) => Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), "ignoring settings: {e}");
                Self::default()
            }
        }
    }

    /// Load and validate settings from an explicit path.
    pub fn load_from(path: &Path) -> SdfResult<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> SdfResult<Self> {
        let config: Self = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SdfResult<()> {
        if !self.max_distance.is_finite() || self.max_distance <= 0.0 {
            return Err(SdfError::InvalidConfig(format!(
                "max_distance must be finite and positive, got {}",
                self.max_distance
            )));
        }
        if self.max_distance > self.distance_format.max_value() {
            return Err(SdfError::InvalidConfig(format!(
                "max_distance {} overflows r16f",
                self.max_distance
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_is_default() {
        let config = SdfConfig::from_json("{}").unwrap();
        assert_eq!(config, SdfConfig::default());
    }

    #[test]
    fn test_parse_lowercase_enums() {
        let config = SdfConfig::from_json(
            r#"{ "distance_format": "r16f", "filter": "nearest", "device": "discrete", "max_distance": 1000.0 }"#,
        )
        .unwrap();
        assert_eq!(config.distance_format, DistanceFormat::R16f);
        assert_eq!(config.filter, SamplerFilter::Nearest);
        assert_eq!(config.device, DevicePreference::Discrete);
        assert_eq!(config.max_distance, 1000.0);
    }

    #[test]
    fn test_rejects_non_positive_max_distance() {
        let err = SdfConfig::from_json(r#"{ "max_distance": 0.0 }"#).unwrap_err();
        assert!(matches!(err, SdfError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_half_overflow() {
        let err = SdfConfig::from_json(r#"{ "distance_format": "r16f", "max_distance": 1e6 }"#)
            .unwrap_err();
        assert!(matches!(err, SdfError::InvalidConfig(_)));
    }

    #[test]
    fn test_half_float_limit_is_default_max_distance() {
        assert_eq!(DistanceFormat::R16f.max_value(), DEFAULT_MAX_DISTANCE);
        assert_eq!(DistanceFormat::R32f.max_value(), f32::MAX);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = SdfConfig::load_from(Path::new("/nonexistent/jfa-sdf/settings.json")).unwrap_err();
        assert!(matches!(err, SdfError::ConfigIo(_)));
    }
}
