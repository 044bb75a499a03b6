//! Editor configuration.
//!
//! Values come from, in increasing priority: built-in defaults, a JSON file
//! (see [`EditorConfig::default_path`]), and `MARKUP_*` environment variables.

use crate::annotation::{AnnotationKind, Rgb, DEFAULT_FONT_SIZE};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_SCHEMA_VERSION: u32 = 1;
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to resolve configuration directory")]
    NoConfigDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue { key: key.to_string(), reason: reason.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Render oversampling factor between document points and view pixels at zoom 1.0.
    pub base_scale: f32,
    /// Multiplier applied by zoom in / zoom out.
    pub zoom_step: f32,
    /// Fraction of the viewport used when fitting a page.
    pub fit_margin: f32,
    pub default_font_size: f32,
    /// Below this drag distance on both axes, in view pixels, a press is a click.
    pub min_drag_px: f32,
    pub resize_debounce_ms: u64,
    /// Pages kept in the render cache.
    pub render_cache_pages: usize,
    pub default_color: Rgb,
    pub default_tool: AnnotationKind,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            min_zoom: 0.5,
            max_zoom: 3.0,
            base_scale: 2.0,
            zoom_step: 1.2,
            fit_margin: 0.95,
            default_font_size: DEFAULT_FONT_SIZE,
            min_drag_px: 5.0,
            resize_debounce_ms: 300,
            render_cache_pages: 16,
            default_color: Rgb::YELLOW,
            default_tool: AnnotationKind::Highlight,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ConfigEnvelope {
    version: u32,
    config: EditorConfig,
}

impl EditorConfig {
    pub fn with_zoom_range(mut self, min_zoom: f32, max_zoom: f32) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    pub fn with_base_scale(mut self, base_scale: f32) -> Self {
        self.base_scale = base_scale;
        self
    }

    pub fn with_zoom_step(mut self, zoom_step: f32) -> Self {
        self.zoom_step = zoom_step;
        self
    }

    pub fn with_default_font_size(mut self, font_size: f32) -> Self {
        self.default_font_size = font_size;
        self
    }

    pub fn with_min_drag_px(mut self, min_drag_px: f32) -> Self {
        self.min_drag_px = min_drag_px;
        self
    }

    pub fn with_resize_debounce_ms(mut self, millis: u64) -> Self {
        self.resize_debounce_ms = millis;
        self
    }

    pub fn with_render_cache_pages(mut self, pages: usize) -> Self {
        self.render_cache_pages = pages;
        self
    }

    pub fn with_default_color(mut self, color: Rgb) -> Self {
        self.default_color = color;
        self
    }

    pub fn with_default_tool(mut self, tool: AnnotationKind) -> Self {
        self.default_tool = tool;
        self
    }

    /// `<config dir>/config.json` for the current platform.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dirs = ProjectDirs::from("dev", "PdfMarkup", "PdfMarkup")
            .ok_or(ConfigError::NoConfigDirectory)?;

        Ok(dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Defaults overridden by environment variables.
    ///
    /// Recognized variables:
    /// - `MARKUP_MIN_ZOOM`
    /// - `MARKUP_MAX_ZOOM`
    /// - `MARKUP_BASE_SCALE`
    /// - `MARKUP_RENDER_CACHE_PAGES`
    ///
    /// # Errors
    /// Returns an error if a variable is set but cannot be parsed or the result is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies `MARKUP_*` overrides read through `lookup` and validates the result.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let float = |key: &str| -> Result<Option<f32>, ConfigError> {
            lookup(key)
                .map(|value| {
                    value
                        .trim()
                        .parse::<f32>()
                        .map_err(|err| ConfigError::invalid(key, err.to_string()))
                })
                .transpose()
        };

        if let Some(value) = float("MARKUP_MIN_ZOOM")? {
            self.min_zoom = value;
        }
        if let Some(value) = float("MARKUP_MAX_ZOOM")? {
            self.max_zoom = value;
        }
        if let Some(value) = float("MARKUP_BASE_SCALE")? {
            self.base_scale = value;
        }
        if let Some(value) = lookup("MARKUP_RENDER_CACHE_PAGES") {
            self.render_cache_pages = value
                .trim()
                .parse::<usize>()
                .map_err(|err| ConfigError::invalid("MARKUP_RENDER_CACHE_PAGES", err.to_string()))?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Loads a config file; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let bytes = fs::read(path)?;
        let envelope: ConfigEnvelope = serde_json::from_slice(&bytes)?;
        envelope.config.validate()?;

        Ok(envelope.config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let envelope = ConfigEnvelope { version: CONFIG_SCHEMA_VERSION, config: self.clone() };
        fs::write(path, serde_json::to_vec_pretty(&envelope)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_zoom.is_finite() && self.min_zoom > 0.0) {
            return Err(ConfigError::invalid("min_zoom", "must be positive"));
        }
        if !self.max_zoom.is_finite() || self.min_zoom > self.max_zoom {
            return Err(ConfigError::invalid("max_zoom", "must not be below min_zoom"));
        }
        if !(self.base_scale.is_finite() && self.base_scale > 0.0) {
            return Err(ConfigError::invalid("base_scale", "must be positive"));
        }
        if !(self.zoom_step.is_finite() && self.zoom_step > 1.0) {
            return Err(ConfigError::invalid("zoom_step", "must be greater than 1"));
        }
        if !(self.fit_margin.is_finite() && self.fit_margin > 0.0) {
            return Err(ConfigError::invalid("fit_margin", "must be positive"));
        }
        if !(self.default_font_size.is_finite() && self.default_font_size > 0.0) {
            return Err(ConfigError::invalid("default_font_size", "must be positive"));
        }
        if !(self.min_drag_px.is_finite() && self.min_drag_px >= 0.0) {
            return Err(ConfigError::invalid("min_drag_px", "must not be negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(key, value)| (key.to_string(), value.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = EditorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.resize_debounce_ms, 300);
        assert_eq!(config.default_tool, AnnotationKind::Highlight);
    }

    #[test]
    fn builders_override_fields() {
        let config = EditorConfig::default()
            .with_zoom_range(0.25, 4.0)
            .with_default_tool(AnnotationKind::Rectangle)
            .with_default_color(Rgb::RED)
            .with_render_cache_pages(4);

        assert_eq!((config.min_zoom, config.max_zoom), (0.25, 4.0));
        assert_eq!(config.default_tool, AnnotationKind::Rectangle);
        assert_eq!(config.default_color, Rgb::RED);
        assert_eq!(config.render_cache_pages, 4);
    }

    #[test]
    fn env_overrides_are_applied() {
        let config = EditorConfig::default()
            .apply_overrides(lookup(&[("MARKUP_MAX_ZOOM", "5"), ("MARKUP_RENDER_CACHE_PAGES", "3")]))
            .expect("overrides should apply");

        assert_eq!(config.max_zoom, 5.0);
        assert_eq!(config.render_cache_pages, 3);
        assert_eq!(config.min_zoom, 0.5);
    }

    #[test]
    fn env_overrides_reject_bad_values() {
        let err = EditorConfig::default()
            .apply_overrides(lookup(&[("MARKUP_BASE_SCALE", "fast")]))
            .expect_err("non-numeric value");
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "MARKUP_BASE_SCALE"));

        let err = EditorConfig::default()
            .apply_overrides(lookup(&[("MARKUP_MIN_ZOOM", "4")]))
            .expect_err("min above max");
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "max_zoom"));
    }

    #[test]
    fn validate_rejects_non_positive_zoom_and_scale() {
        assert!(EditorConfig::default().with_zoom_range(0.0, 3.0).validate().is_err());
        assert!(EditorConfig::default().with_base_scale(-1.0).validate().is_err());
    }

    #[test]
    fn config_round_trips_through_file() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("nested").join("config.json");
        let config = EditorConfig::default().with_default_font_size(16.0).with_default_color(Rgb::BLUE);

        config.save(&path).expect("save should succeed");
        let loaded = EditorConfig::load(&path).expect("load should succeed");

        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let loaded = EditorConfig::load(temp.path().join("absent.json")).expect("load should succeed");
        assert_eq!(loaded, EditorConfig::default());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let path = temp.path().join("config.json");
        fs::write(&path, r##"{"version":1,"config":{"max_zoom":4.0,"default_color":"#ff0000"}}"##)
            .expect("write should succeed");

        let loaded = EditorConfig::load(&path).expect("load should succeed");
        assert_eq!(loaded.max_zoom, 4.0);
        assert_eq!(loaded.default_color, Rgb::RED);
        assert_eq!(loaded.min_zoom, 0.5);
    }
}
