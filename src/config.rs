//! Service configuration (colorsense.yaml) parsing.
//!
//! The config file defines where persisted images go, the fill and blend
//! parameters, the optional segmentation model, and session lifetime.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ColorizeError, Result};

/// Default config filename looked up in the working directory.
pub const CONFIG_FILENAME: &str = "colorsense.yaml";

/// Service configuration loaded from colorsense.yaml.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory persisted images are written to.
    pub output_dir: PathBuf,

    /// URL prefix under which `output_dir` is served.
    pub media_url: String,

    /// JPEG quality for transport and persisted images (1-100).
    pub jpeg_quality: u8,

    pub fill: FillConfig,

    pub blend: BlendConfig,

    pub model: ModelConfig,

    pub session: SessionConfig,
}

/// Flood fill parameters for the classical selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillConfig {
    /// Maximum per-channel difference, applied both up and down.
    pub tolerance: u8,

    pub range: FillRange,
}

/// What a candidate pixel is compared against during a flood fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillRange {
    /// Compare against the adjacent pixel the fill grew from.
    Floating,
    /// Compare against the seed pixel.
    Fixed,
}

/// Tint parameters for the learned selector's masks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendConfig {
    /// Weight of the paint colour inside the mask (0.0-1.0).
    pub opacity: f32,

    pub mode: BlendMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    /// Straight alpha blend of the paint colour over the pixel.
    Alpha,
    /// Keep the pixel's lightness, take hue and chroma from the paint.
    Shade,
}

/// Point-promptable segmentation model files.
///
/// Both paths must be set for the learned selector to be attempted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub encoder: Option<PathBuf>,
    pub decoder: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle seconds before a session is evicted. 0 keeps sessions forever.
    pub ttl_secs: u64,

    /// Number of undo steps kept per session.
    pub history_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("media/colored_images"),
            media_url: "/media/colored_images/".to_string(),
            jpeg_quality: 90,
            fill: FillConfig::default(),
            blend: BlendConfig::default(),
            model: ModelConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            tolerance: 15,
            range: FillRange::Floating,
        }
    }
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            opacity: 0.7,
            mode: BlendMode::Alpha,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 30 * 60,
            history_limit: 20,
        }
    }
}

impl Config {
    /// Load config from a colorsense.yaml file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ColorizeError::Io {
            path: path.to_path_buf(),
            message: format!("Failed to read config: {}", e),
        })?;

        Self::parse(&content)
    }

    /// Load `path` if given, else `colorsense.yaml` in `dir` when it exists,
    /// else the defaults.
    pub fn discover(path: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        let candidate = dir.join(CONFIG_FILENAME);
        if candidate.is_file() {
            return Self::load(&candidate);
        }
        Ok(Self::default())
    }

    /// Parse config from YAML string.
    pub fn parse(content: &str) -> Result<Self> {
        // An empty document deserializes as unit, not as an empty mapping.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content).map_err(|e| ColorizeError::Config {
            message: format!("Invalid config: {}", e),
            help: Some(format!("Check {} syntax", CONFIG_FILENAME)),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.blend.opacity) {
            return Err(ColorizeError::Config {
                message: format!(
                    "blend.opacity must be within 0.0-1.0, got {}",
                    self.blend.opacity
                ),
                help: None,
            });
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ColorizeError::Config {
                message: format!("jpeg_quality must be within 1-100, got {}", self.jpeg_quality),
                help: None,
            });
        }
        Ok(())
    }

    /// Idle timeout, or `None` when eviction is disabled.
    pub fn session_ttl(&self) -> Option<Duration> {
        match self.session.ttl_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Model file pair, if both halves are configured.
    pub fn model_paths(&self) -> Option<(&Path, &Path)> {
        match (&self.model.encoder, &self.model.decoder) {
            (Some(encoder), Some(decoder)) => Some((encoder.as_path(), decoder.as_path())),
            _ => None,
        }
    }

    /// Public URL for a persisted file name.
    pub fn file_url(&self, filename: &str) -> String {
        if self.media_url.ends_with('/') {
            format!("{}{}", self.media_url, filename)
        } else {
            format!("{}/{}", self.media_url, filename)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_minimal_config() {
        let yaml = "output_dir: out";
        let config = Config::parse(yaml).unwrap();

        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.fill.tolerance, 15);
        assert!(config.model_paths().is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
output_dir: media/painted
media_url: https://cdn.example.com/painted
jpeg_quality: 80
fill:
  tolerance: 20
  range: fixed
blend:
  opacity: 0.5
  mode: shade
model:
  encoder: models/sam_encoder.onnx
  decoder: models/sam_decoder.onnx
session:
  ttl_secs: 0
  history_limit: 5
"#;
        let config = Config::parse(yaml).unwrap();

        assert_eq!(config.output_dir, PathBuf::from("media/painted"));
        assert_eq!(config.jpeg_quality, 80);
        assert_eq!(config.fill.tolerance, 20);
        assert_eq!(config.fill.range, FillRange::Fixed);
        assert_eq!(config.blend.opacity, 0.5);
        assert_eq!(config.blend.mode, BlendMode::Shade);
        assert_eq!(
            config.model_paths(),
            Some((
                Path::new("models/sam_encoder.onnx"),
                Path::new("models/sam_decoder.onnx")
            ))
        );
        assert_eq!(config.session_ttl(), None);
        assert_eq!(config.session.history_limit, 5);
        assert_eq!(config.file_url("a.jpg"), "https://cdn.example.com/painted/a.jpg");
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.output_dir, PathBuf::from("media/colored_images"));
        assert_eq!(config.blend.opacity, 0.7);
        assert_eq!(config.blend.mode, BlendMode::Alpha);
        assert_eq!(config.fill.range, FillRange::Floating);
        assert_eq!(config.session_ttl(), Some(Duration::from_secs(1800)));
        assert_eq!(config.file_url("x.jpg"), "/media/colored_images/x.jpg");
    }

    #[test]
    fn test_parse_empty_config() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_model_needs_both_paths() {
        let config = Config::parse("model:\n  encoder: enc.onnx\n").unwrap();
        assert!(config.model_paths().is_none());
    }

    #[test]
    fn test_rejects_bad_opacity() {
        let err = Config::parse("blend:\n  opacity: 1.5\n").unwrap_err();
        assert!(matches!(err, ColorizeError::Config { .. }));
    }

    #[test]
    fn test_rejects_bad_quality() {
        assert!(Config::parse("jpeg_quality: 0").is_err());
    }

    #[test]
    fn test_rejects_unknown_range() {
        assert!(Config::parse("fill:\n  range: sideways\n").is_err());
    }

    #[test]
    fn test_discover_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::discover(None, dir.path()).unwrap();
        assert_eq!(config, Config::default());

        std::fs::write(dir.path().join(CONFIG_FILENAME), "jpeg_quality: 75\n").unwrap();
        let config = Config::discover(None, dir.path()).unwrap();
        assert_eq!(config.jpeg_quality, 75);
    }
}
