//! The colorization service: sessions, clicks and persisted results.
//!
//! Every operation is synchronous and takes the target session's lock for
//! its whole duration. Failed operations leave the session exactly as it
//! was: new images are built aside and only committed once encoded.

use std::fs;
use std::path::Path;
use std::time::Instant;

use image::RgbImage;
use log::{debug, info, warn};
use serde::Serialize;

use crate::config::Config;
use crate::error::{ColorizeError, ErrorKind, Result};
use crate::render::{self, Tint};
use crate::select::{self, loader_from_config, ModelLoader, SelectorKind};
use crate::session::{Session, SessionId, SessionStore};
use crate::types::{Colour, Point};

/// Reply to `create_session`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionCreated {
    pub session_id: String,
    /// The decoded upload as a JPEG data URL.
    pub image: String,
    pub width: u32,
    pub height: u32,
    pub strategy: SelectorKind,
}

/// Reply carrying the session's current image as a JPEG data URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageReply {
    pub image: String,
}

/// Reply to `persist`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Persisted {
    pub file_path: String,
    pub file_url: String,
}

pub struct ColorizerService {
    config: Config,
    store: SessionStore,
    loader: ModelLoader,
}

impl ColorizerService {
    /// A service whose learned selector comes from `config.model`.
    pub fn new(config: Config) -> Self {
        let loader = loader_from_config(&config.model);
        Self::with_model_loader(config, loader)
    }

    /// A service that builds each session's model with `loader`.
    pub fn with_model_loader(config: Config, loader: ModelLoader) -> Self {
        let store = SessionStore::new(config.session_ttl());
        Self {
            config,
            store,
            loader,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Decode an upload and open a session on it.
    pub fn create_session(&self, image_bytes: &[u8]) -> Result<SessionCreated> {
        self.evict_idle();

        let image = render::decode(image_bytes)?;
        let (width, height) = image.dimensions();
        let selector = select::probe(&self.config, &self.loader, &image)?;
        let strategy = selector.kind();
        let data_url = render::to_data_url(&image, self.config.jpeg_quality)?;

        let id = SessionId::new();
        let session = Session::new(id.clone(), image, selector, self.config.session.history_limit);
        self.store.insert(session);
        info!("Created session {} ({}x{}, {})", id, width, height, strategy);

        Ok(SessionCreated {
            session_id: id.to_string(),
            image: data_url,
            width,
            height,
            strategy,
        })
    }

    /// Paint `colour` into the region under `(x, y)`.
    ///
    /// The colour is validated before the session is looked up, so a
    /// malformed colour never touches session state.
    pub fn recolor(&self, session_id: &str, x: i64, y: i64, colour: &str) -> Result<ImageReply> {
        let colour = Colour::from_hex(colour)?;
        let quality = self.config.jpeg_quality;

        let result = self.store.with(session_id, |session| {
            let (width, height) = session.current().dimensions();
            let point = Point::within(x, y, width, height).ok_or_else(|| ColorizeError::Input {
                message: format!("Point ({}, {}) is outside the {}x{} image", x, y, width, height),
                help: Some("Coordinates are zero-based pixel offsets from the top-left".to_string()),
            })?;

            let start = Instant::now();
            let mask = session.select(point)?.ok_or_else(|| {
                ColorizeError::segmentation(format!("no region found at ({}, {})", x, y))
            })?;

            let tint = Tint::for_selector(session.selector_kind(), &self.config.blend);
            let painted = render::apply(session.current(), &mask, colour, tint)?;
            let image = render::to_data_url(&painted, quality)?;
            session.commit(painted)?;

            debug!(
                "Recolored {} pixels at ({}, {}) with {} in {:.1}ms",
                mask.count(),
                x,
                y,
                colour,
                start.elapsed().as_secs_f64() * 1000.0
            );
            Ok(ImageReply { image })
        });

        if let Err(e) = &result {
            if e.kind() == ErrorKind::Recoverable {
                warn!("Recolor failed in session {}: {}", session_id, e);
            }
        }
        result
    }

    /// Restore the uploaded image. The reset can itself be undone.
    pub fn reset(&self, session_id: &str) -> Result<ImageReply> {
        let quality = self.config.jpeg_quality;
        self.store.with(session_id, |session| {
            let image = render::to_data_url(session.original(), quality)?;
            session.reset();
            Ok(ImageReply { image })
        })
    }

    pub fn current_image(&self, session_id: &str) -> Result<ImageReply> {
        let quality = self.config.jpeg_quality;
        self.store.with(session_id, |session| {
            let image = render::to_data_url(session.current(), quality)?;
            Ok(ImageReply { image })
        })
    }

    /// The current image's exact pixels, without JPEG encoding.
    pub fn current_pixels(&self, session_id: &str) -> Result<RgbImage> {
        self.store.with(session_id, |session| Ok(session.current().clone()))
    }

    pub fn undo(&self, session_id: &str) -> Result<ImageReply> {
        let quality = self.config.jpeg_quality;
        self.store.with(session_id, |session| {
            if !session.undo() {
                return Err(ColorizeError::input("Nothing to undo"));
            }
            let image = render::to_data_url(session.current(), quality)?;
            Ok(ImageReply { image })
        })
    }

    pub fn redo(&self, session_id: &str) -> Result<ImageReply> {
        let quality = self.config.jpeg_quality;
        self.store.with(session_id, |session| {
            if !session.redo() {
                return Err(ColorizeError::input("Nothing to redo"));
            }
            let image = render::to_data_url(session.current(), quality)?;
            Ok(ImageReply { image })
        })
    }

    /// Write the current image under `output_dir`.
    ///
    /// Without a filename the file is `colored_<first 8 id chars>.jpg`.
    pub fn persist(&self, session_id: &str, filename: Option<&str>) -> Result<Persisted> {
        let requested = filename.map(checked_filename).transpose()?;
        let output_dir = &self.config.output_dir;

        self.store.with(session_id, |session| {
            let filename = match &requested {
                Some(name) => name.clone(),
                None => format!("colored_{}.jpg", session.id().short()),
            };

            fs::create_dir_all(output_dir).map_err(|e| ColorizeError::Io {
                path: output_dir.clone(),
                message: format!("Failed to create output directory: {}", e),
            })?;
            let path = output_dir.join(&filename);
            render::write_image(session.current(), &path, self.config.jpeg_quality)?;
            info!("Saved session {} to {}", session.id(), path.display());

            Ok(Persisted {
                file_path: path.display().to_string(),
                file_url: self.config.file_url(&filename),
            })
        })
    }

    /// Drop a session. Returns false if it did not exist.
    pub fn destroy(&self, session_id: &str) -> bool {
        let removed = self.store.remove(session_id);
        if removed {
            info!("Destroyed session {}", session_id);
        }
        removed
    }

    pub fn active_sessions(&self) -> usize {
        self.store.len()
    }

    pub fn evict_idle(&self) -> usize {
        let evicted = self.store.evict_idle();
        if evicted > 0 {
            info!("Evicted {} idle session(s)", evicted);
        }
        evicted
    }

    pub fn selector_kind(&self, session_id: &str) -> Result<SelectorKind> {
        self.store.with(session_id, |session| Ok(session.selector_kind()))
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }
}

/// Validate a caller-supplied file name for `persist`.
///
/// The name must be a single path component. A name without an extension
/// gets `.jpg`; otherwise the extension must be one we can write.
fn checked_filename(name: &str) -> Result<String> {
    let name = name.trim();
    let invalid = |reason: &str| ColorizeError::Input {
        message: format!("Invalid filename {:?}: {}", name, reason),
        help: Some("Use a plain file name such as kitchen.jpg".to_string()),
    };

    if name.is_empty() {
        return Err(invalid("empty"));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(invalid("must not contain path separators or '..'"));
    }
    if name.starts_with('.') {
        return Err(invalid("must not be hidden"));
    }

    let name = if Path::new(name).extension().is_none() {
        format!("{}.jpg", name)
    } else {
        name.to_string()
    };
    render::output_format(Path::new(&name))?;
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::encode_png;
    use image::Rgb;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn service() -> ColorizerService {
        ColorizerService::new(Config::default())
    }

    fn upload(width: u32, height: u32, colour: [u8; 3]) -> Vec<u8> {
        encode_png(&RgbImage::from_pixel(width, height, Rgb(colour))).unwrap()
    }

    #[test]
    fn test_create_session_falls_back_to_flood_fill() {
        let service = service();
        let created = service.create_session(&upload(4, 3, [90, 90, 90])).unwrap();

        assert_eq!(created.width, 4);
        assert_eq!(created.height, 3);
        assert_eq!(created.strategy, SelectorKind::FloodFill);
        assert!(created.image.starts_with(render::DATA_URL_PREFIX));
        assert_eq!(service.active_sessions(), 1);
    }

    #[test]
    fn test_create_session_rejects_garbage() {
        let err = service().create_session(b"GIF89a nope").unwrap_err();
        assert!(matches!(err, ColorizeError::Decode { .. }));
    }

    #[test]
    fn test_recolor_whole_uniform_image() {
        let service = service();
        let id = service.create_session(&upload(5, 5, [90, 90, 90])).unwrap().session_id;

        service.recolor(&id, 2, 2, "#A3B18A").unwrap();

        let pixels = service.current_pixels(&id).unwrap();
        assert!(pixels.pixels().all(|p| p.0 == [0xA3, 0xB1, 0x8A]));
    }

    #[test]
    fn test_recolor_out_of_bounds_is_input_error() {
        let service = service();
        let id = service.create_session(&upload(2, 2, [0, 0, 0])).unwrap().session_id;

        for (x, y) in [(-1, 0), (2, 0), (0, 2)] {
            let err = service.recolor(&id, x, y, "#FFFFFF").unwrap_err();
            assert_eq!(err.status_code(), 400);
        }
        assert!(!service.store().with(&id, |s| Ok(s.history().can_undo())).unwrap());
    }

    #[test]
    fn test_undo_redo() {
        let service = service();
        let id = service.create_session(&upload(2, 2, [0, 0, 0])).unwrap().session_id;
        let original = service.current_pixels(&id).unwrap();

        service.recolor(&id, 0, 0, "#FF0000").unwrap();
        let red = service.current_pixels(&id).unwrap();

        service.undo(&id).unwrap();
        assert_eq!(service.current_pixels(&id).unwrap(), original);
        service.redo(&id).unwrap();
        assert_eq!(service.current_pixels(&id).unwrap(), red);

        let err = service.redo(&id).unwrap_err();
        assert!(matches!(err, ColorizeError::Input { .. }));
    }

    #[test]
    fn test_persist_default_filename() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.output_dir = dir.path().join("colored_images");
        let service = ColorizerService::new(config);
        let id = service.create_session(&upload(3, 3, [40, 80, 120])).unwrap().session_id;

        let persisted = service.persist(&id, None).unwrap();

        let expected_name = format!("colored_{}.jpg", &id[..8]);
        assert_eq!(persisted.file_url, format!("/media/colored_images/{}", expected_name));
        let path = PathBuf::from(&persisted.file_path);
        assert_eq!(path, dir.path().join("colored_images").join(&expected_name));
        assert!(path.is_file());
    }

    #[test]
    fn test_persist_png_is_lossless() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.output_dir = dir.path().to_path_buf();
        let service = ColorizerService::new(config);
        let id = service.create_session(&upload(3, 3, [40, 80, 120])).unwrap().session_id;
        service.recolor(&id, 1, 1, "#123456").unwrap();

        let persisted = service.persist(&id, Some("kitchen.png")).unwrap();

        let saved = image::open(&persisted.file_path).unwrap().to_rgb8();
        assert_eq!(saved, service.current_pixels(&id).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_persist_reports_failed_write() {
        if !std::path::Path::new("/dev/full").exists() {
            return;
        }
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.output_dir = dir.path().to_path_buf();
        let service = ColorizerService::new(config);
        let id = service.create_session(&upload(4, 4, [40, 80, 120])).unwrap().session_id;
        std::os::unix::fs::symlink("/dev/full", dir.path().join("full.jpg")).unwrap();

        let err = service.persist(&id, Some("full.jpg")).unwrap_err();

        assert!(matches!(err, ColorizeError::Io { .. }));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_checked_filename() {
        assert_eq!(checked_filename("kitchen").unwrap(), "kitchen.jpg");
        assert_eq!(checked_filename("kitchen.JPEG").unwrap(), "kitchen.JPEG");
        assert!(checked_filename("../etc/passwd").is_err());
        assert!(checked_filename("a/b.jpg").is_err());
        assert!(checked_filename("a\\b.jpg").is_err());
        assert!(checked_filename(".hidden").is_err());
        assert!(checked_filename("  ").is_err());
        assert!(checked_filename("room.gif").is_err());
    }

    #[test]
    fn test_persist_bad_filename_before_lookup() {
        let err = service().persist("missing", Some("../x.jpg")).unwrap_err();
        assert!(matches!(err, ColorizeError::Input { .. }));
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let service = service();
        let id = service.create_session(&upload(2, 2, [0, 0, 0])).unwrap().session_id;

        assert!(service.destroy(&id));
        assert!(!service.destroy(&id));
        assert_eq!(service.active_sessions(), 0);
    }
}
