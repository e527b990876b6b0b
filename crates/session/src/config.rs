use std::time::Duration;

use layers::buffers::SwapConfig;
use layers::levels::{LevelRange, LevelTable, LevelTableError};
use layers::ramp::ColorRamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Parse(String),
    Levels(LevelTableError),
    Invalid { field: &'static str, reason: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "config parse error: {msg}"),
            ConfigError::Levels(err) => write!(f, "invalid geography levels: {err}"),
            ConfigError::Invalid { field, reason } => write!(f, "invalid {field}: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Levels(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LevelTableError> for ConfigError {
    fn from(err: LevelTableError) -> Self {
        ConfigError::Levels(err)
    }
}

/// Engine configuration. Every field has a default, so a partial JSON
/// document only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Backend serving `/tiles/{z}/{x}/{y}` and `/detail`.
    pub base_url: String,
    pub origin_year: i32,
    pub initial_horizon: u32,
    pub levels: Vec<LevelRange>,
    pub hover_debounce_ms: u64,
    pub pan_debounce_ms: u64,
    pub swap_timeout_ms: u64,
    pub swap_settle_frames: u8,
    pub detail_cache_capacity: usize,
    pub domain_low_percentile: f64,
    pub domain_high_percentile: f64,
    pub color_ramp: ColorRamp,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            origin_year: 2024,
            initial_horizon: 0,
            levels: LevelTable::default().ranges().to_vec(),
            hover_debounce_ms: 500,
            pan_debounce_ms: 500,
            swap_timeout_ms: 600,
            swap_settle_frames: 2,
            detail_cache_capacity: 1000,
            domain_low_percentile: 0.10,
            domain_high_percentile: 0.90,
            color_ramp: ColorRamp::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(invalid("base_url", "must not be empty"));
        }
        if self.detail_cache_capacity == 0 {
            return Err(invalid("detail_cache_capacity", "must be at least 1"));
        }
        if self.swap_settle_frames == 0 {
            return Err(invalid("swap_settle_frames", "must be at least 1"));
        }
        let (lo, hi) = (self.domain_low_percentile, self.domain_high_percentile);
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
            return Err(invalid(
                "domain_low_percentile",
                format!("percentile band {lo}..{hi} must lie within 0..1 and be ordered"),
            ));
        }
        self.level_table()?;
        Ok(())
    }

    pub fn level_table(&self) -> Result<LevelTable, ConfigError> {
        Ok(LevelTable::new(self.levels.clone())?)
    }

    pub fn swap_config(&self) -> SwapConfig {
        SwapConfig {
            timeout: Duration::from_millis(self.swap_timeout_ms),
            settle_frames: self.swap_settle_frames,
        }
    }

    pub fn hover_debounce(&self) -> Duration {
        Duration::from_millis(self.hover_debounce_ms)
    }

    pub fn pan_debounce(&self) -> Duration {
        Duration::from_millis(self.pan_debounce_ms)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, EngineConfig};
    use foundation::ids::GeoLevel;
    use layers::levels::LevelTableError;

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{"origin_year": 2025, "swap_timeout_ms": 900}"#).unwrap();
        assert_eq!(config.origin_year, 2025);
        assert_eq!(config.swap_config().timeout.as_millis(), 900);
        assert_eq!(config.hover_debounce_ms, 500);
        assert_eq!(config.detail_cache_capacity, 1000);
        assert_eq!(config.levels.len(), 4);
    }

    #[test]
    fn rejects_overlapping_levels() {
        let mut config = EngineConfig::default();
        config.levels[1].min_zoom = 7.0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Levels(LevelTableError::Overlap {
                below: GeoLevel::District,
                above: GeoLevel::Tract
            }))
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"detail_cache_capacity": 0}"#),
            Err(ConfigError::Invalid { field: "detail_cache_capacity", .. })
        ));
        assert!(matches!(
            EngineConfig::from_json_str(
                r#"{"domain_low_percentile": 0.9, "domain_high_percentile": 0.1}"#
            ),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            EngineConfig::from_json_str("{"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn custom_level_table_parses() {
        let json = r#"{"levels": [
            {"level": "district", "source_layer": "districts", "min_zoom": 0, "max_zoom": 6},
            {"level": "tract", "source_layer": "tracts", "min_zoom": 6, "max_zoom": 11},
            {"level": "block_group", "source_layer": "bgs", "min_zoom": 11, "max_zoom": 15},
            {"level": "parcel", "source_layer": "parcels", "min_zoom": 15, "max_zoom": 22}
        ]}"#;
        let config = EngineConfig::from_json_str(json).unwrap();
        let table = config.level_table().unwrap();
        assert_eq!(table.level_for(6.5), GeoLevel::Tract);
        assert_eq!(table.range_for(12.0).source_layer, "bgs");
    }
}
