//! Init command implementation.
//!
//! Writes a commented `colorsense.yaml` holding the default settings.

use std::fs;
use std::path::PathBuf;

use clap::Args;

use crate::config::CONFIG_FILENAME;
use crate::error::{ColorizeError, Result};
use crate::output::{display_path, Printer};

/// Default config, with every setting spelled out.
pub const DEFAULT_CONFIG: &str = r#"# colorsense configuration

# Persisted images are written to output_dir and served under media_url.
output_dir: media/colored_images
media_url: /media/colored_images/
jpeg_quality: 90

# Flood fill, used when no segmentation model is available.
fill:
  # Maximum per-channel difference between neighbouring pixels.
  tolerance: 15
  # floating: compare with the neighbour the fill grew from
  # fixed: compare with the clicked pixel
  range: floating

# Tint applied to masks from the segmentation model.
blend:
  opacity: 0.7
  # alpha, or shade to keep the photo's lightness
  mode: alpha

# ONNX encoder/decoder pair (needs a build with the onnx feature).
# model:
#   encoder: models/sam_encoder.onnx
#   decoder: models/sam_decoder.onnx

session:
  # Idle seconds before a session is dropped. 0 keeps sessions forever.
  ttl_secs: 1800
  # Undo steps kept per session. Each step is a full copy of the image
  # (width x height x 3 bytes, about 36 MB for a 12 MP photo), so a busy
  # session holds up to history_limit + 2 copies.
  history_limit: 20
"#;

/// Write a default colorsense.yaml
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to write into (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Overwrite an existing colorsense.yaml
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: InitArgs, printer: &Printer) -> Result<()> {
    let config_path = args.path.join(CONFIG_FILENAME);

    if config_path.exists() && !args.force {
        return Err(ColorizeError::Config {
            message: format!("{} already exists", display_path(&config_path)),
            help: Some("Use --force to overwrite".to_string()),
        });
    }

    fs::create_dir_all(&args.path).map_err(|e| ColorizeError::Io {
        path: args.path.clone(),
        message: format!("Failed to create directory: {}", e),
    })?;
    fs::write(&config_path, DEFAULT_CONFIG).map_err(|e| ColorizeError::Io {
        path: config_path.clone(),
        message: format!("Failed to write config: {}", e),
    })?;

    printer.status("Created", &display_path(&config_path));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_matches_defaults() {
        assert_eq!(Config::parse(DEFAULT_CONFIG).unwrap(), Config::default());
    }

    #[test]
    fn test_init_creates_config() {
        let dir = tempdir().unwrap();
        let args = InitArgs {
            path: dir.path().to_path_buf(),
            force: false,
        };

        run(args, &Printer::plain()).unwrap();

        let content = fs::read_to_string(dir.path().join(CONFIG_FILENAME)).unwrap();
        assert!(content.contains("tolerance: 15"));
    }

    #[test]
    fn test_init_errors_if_config_exists() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "jpeg_quality: 50").unwrap();

        let args = InitArgs {
            path: dir.path().to_path_buf(),
            force: false,
        };

        assert!(run(args, &Printer::plain()).is_err());
        let content = fs::read_to_string(dir.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(content, "jpeg_quality: 50");
    }

    #[test]
    fn test_init_force_overwrites() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILENAME), "jpeg_quality: 50").unwrap();

        let args = InitArgs {
            path: dir.path().to_path_buf(),
            force: true,
        };

        run(args, &Printer::plain()).unwrap();

        let config = Config::load(&dir.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config.jpeg_quality, 90);
    }

    #[test]
    fn test_init_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("deploy").join("colorsense");
        let args = InitArgs {
            path: target.clone(),
            force: false,
        };

        run(args, &Printer::plain()).unwrap();
        assert!(target.join(CONFIG_FILENAME).is_file());
    }
}
