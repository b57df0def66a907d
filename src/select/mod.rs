//! Region selection: turning a click into a mask.
//!
//! Two strategies share the [`RegionSelector`] contract:
//! - [`LearnedSelector`] prompts a point-promptable segmentation model with
//!   a cached image embedding.
//! - [`FloodFillSelector`] grows a 4-connected region of similar colour.
//!
//! [`probe`] picks the strategy for a new session: the learned selector if
//! its model loads and binds, otherwise flood fill.

mod flood;
mod learned;
#[cfg(feature = "onnx")]
mod onnx;

use std::fmt;

use image::RgbImage;
use log::{info, warn};
use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::types::{Mask, Point};

pub use flood::{flood_fill, FloodFillSelector};
pub use learned::{loader_from_config, LearnedSelector, MaskCandidate, ModelLoader, PromptModel};
#[cfg(feature = "onnx")]
pub use onnx::SamOnnxModel;

/// Which selection strategy a session ended up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectorKind {
    Learned,
    FloodFill,
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorKind::Learned => write!(f, "learned"),
            SelectorKind::FloodFill => write!(f, "flood-fill"),
        }
    }
}

/// Maps a click on an image to the region the user means.
///
/// A selector is bound once to a session's image. Every `select` call gets
/// the session's *current* image; when that image changes the session calls
/// [`invalidate`](RegionSelector::invalidate) so cached state can be rebuilt.
pub trait RegionSelector: Send {
    fn kind(&self) -> SelectorKind;

    /// Prepare for point queries against `image`.
    fn bind(&mut self, image: &RgbImage) -> Result<()>;

    /// Select the region under `point`.
    ///
    /// `Ok(None)` means the selector ran but found no usable region.
    /// `point` must lie inside `image`.
    fn select(&mut self, image: &RgbImage, point: Point) -> Result<Option<Mask>>;

    /// The bound image's pixels changed.
    fn invalidate(&mut self) {}
}

/// Choose and bind a selector for a freshly uploaded image.
///
/// Any failure of the learned strategy (no model configured, model fails to
/// load, embedding fails) falls back to flood fill. Only a flood fill bind
/// failure is returned to the caller.
pub fn probe(
    config: &Config,
    loader: &ModelLoader,
    image: &RgbImage,
) -> Result<Box<dyn RegionSelector>> {
    match bind_learned(loader, image) {
        Ok(selector) => {
            info!("Using learned segmentation ({}x{})", image.width(), image.height());
            Ok(Box::new(selector))
        }
        Err(e) => {
            warn!("Learned segmentation unavailable, using flood fill: {}", e);
            let mut selector = FloodFillSelector::new(config.fill.clone());
            selector.bind(image)?;
            Ok(Box::new(selector))
        }
    }
}

fn bind_learned(loader: &ModelLoader, image: &RgbImage) -> Result<LearnedSelector> {
    let model = loader()?;
    let mut selector = LearnedSelector::new(model);
    selector.bind(image)?;
    Ok(selector)
}
