//! Map configuration
//!
//! Defaults suit the bundled Moscow network. A JSON file named by
//! `METROMAP_CONFIG` may override any subset of the fields.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use web_time::Duration;

use super::projection::GeoPoint;

/// Environment variable holding the path of an optional JSON config file
pub const CONFIG_ENV: &str = "METROMAP_CONFIG";

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub zoom_min: f64,
    pub zoom_max: f64,
    /// Zoom change per wheel notch
    pub zoom_wheel_step: f64,
    /// Latitude bound for the viewport center, in degrees
    pub lat_clamp: f64,
    pub hover_radius_px: f64,
    pub tap_radius_px: f64,
    pub tap_max_move_px: f64,
    pub tap_max_ms: u64,
    pub default_center: GeoPoint,
    pub default_zoom: f64,
    pub tile_url_template: String,
    pub tile_subdomains: Vec<String>,
    /// `None` keeps every tile ever loaded
    pub tile_cache_capacity: Option<usize>,
    pub user_agent: String,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            zoom_min: 9.0,
            zoom_max: 17.0,
            zoom_wheel_step: 0.3,
            lat_clamp: 85.0,
            hover_radius_px: 15.0,
            tap_radius_px: 20.0,
            tap_max_move_px: 15.0,
            tap_max_ms: 300,
            // Moscow, Kremlin
            default_center: GeoPoint::new(55.7558, 37.6173),
            default_zoom: 11.0,
            tile_url_template: "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            tile_subdomains: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            tile_cache_capacity: None,
            user_agent: "metromap/0.1".to_string(),
        }
    }
}

impl MapConfig {
    /// Parse a JSON config, filling missing fields with defaults
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: MapConfig = serde_json::from_str(json).context("invalid map config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("failed to load config {}", path.display()))
    }

    /// Load from `METROMAP_CONFIG` if set; fall back to defaults on any error
    pub fn from_env() -> Self {
        let Ok(path) = std::env::var(CONFIG_ENV) else {
            return Self::default();
        };
        match Self::load(&path) {
            Ok(config) => {
                log::info!("Loaded map config from {}", path);
                config
            }
            Err(e) => {
                log::warn!("{:#}; using default map config", e);
                Self::default()
            }
        }
    }

    pub fn tap_max_duration(&self) -> Duration {
        Duration::from_millis(self.tap_max_ms)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.zoom_min.is_finite() && self.zoom_max.is_finite() && self.zoom_min <= self.zoom_max,
            "zoom_min ({}) must not exceed zoom_max ({})",
            self.zoom_min,
            self.zoom_max
        );
        anyhow::ensure!(
            self.lat_clamp > 0.0 && self.lat_clamp < 90.0,
            "lat_clamp must be inside (0, 90), got {}",
            self.lat_clamp
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference() {
        let config = MapConfig::default();
        assert_eq!(config.zoom_min, 9.0);
        assert_eq!(config.zoom_max, 17.0);
        assert_eq!(config.zoom_wheel_step, 0.3);
        assert_eq!(config.tap_max_duration(), Duration::from_millis(300));
        assert_eq!(config.tile_cache_capacity, None);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = MapConfig::from_json(r#"{ "zoom_max": 18, "tile_cache_capacity": 512 }"#)
            .unwrap();
        assert_eq!(config.zoom_max, 18.0);
        assert_eq!(config.tile_cache_capacity, Some(512));
        assert_eq!(config.zoom_min, 9.0);
        assert_eq!(config.default_center, GeoPoint::new(55.7558, 37.6173));
    }

    #[test]
    fn test_inverted_zoom_range_rejected() {
        let err = MapConfig::from_json(r#"{ "zoom_min": 15, "zoom_max": 10 }"#).unwrap_err();
        assert!(err.to_string().contains("zoom_min"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(MapConfig::load("/nonexistent/metromap.json").is_err());
    }
}
