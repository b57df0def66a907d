//! Learned point-prompt segmentation.

use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use log::debug;

use super::{RegionSelector, SelectorKind};
use crate::config::ModelConfig;
use crate::error::{ColorizeError, Result};
use crate::types::{Mask, Point};

/// One candidate region proposed by a model, with its confidence.
#[derive(Debug, Clone)]
pub struct MaskCandidate {
    pub mask: Mask,
    pub score: f32,
}

/// A point-promptable segmentation model.
///
/// `set_image` computes and caches the model's embedding of an image;
/// `predict` prompts that cached embedding with one foreground point and
/// returns every candidate mask the model proposes.
pub trait PromptModel: Send {
    fn set_image(&mut self, image: &RgbImage) -> Result<()>;

    fn predict(&mut self, point: Point) -> Result<Vec<MaskCandidate>>;
}

/// Builds a fresh model for each new session.
pub type ModelLoader = Arc<dyn Fn() -> Result<Box<dyn PromptModel>> + Send + Sync>;

/// Loader for the model described by `model`.
///
/// Loading fails when no model is configured or the crate was built without
/// an inference backend; sessions then fall back to flood fill.
pub fn loader_from_config(model: &ModelConfig) -> ModelLoader {
    let model = model.clone();
    Arc::new(move || load_model(&model))
}

#[cfg(feature = "onnx")]
fn load_model(model: &ModelConfig) -> Result<Box<dyn PromptModel>> {
    match (&model.encoder, &model.decoder) {
        (Some(encoder), Some(decoder)) => {
            let model = super::SamOnnxModel::load(encoder, decoder)?;
            Ok(Box::new(model))
        }
        _ => Err(ColorizeError::selector_init("no segmentation model configured")),
    }
}

#[cfg(not(feature = "onnx"))]
fn load_model(model: &ModelConfig) -> Result<Box<dyn PromptModel>> {
    if model.encoder.is_none() || model.decoder.is_none() {
        return Err(ColorizeError::selector_init("no segmentation model configured"));
    }
    Err(ColorizeError::selector_init(
        "built without the `onnx` feature; learned segmentation is unavailable",
    ))
}

/// Region selector backed by a [`PromptModel`].
///
/// The model's embedding is computed on bind and reused for every click
/// until the session's image changes; the next click after that re-embeds
/// the current image first.
pub struct LearnedSelector {
    model: Box<dyn PromptModel>,
    dimensions: Option<(u32, u32)>,
    stale: bool,
}

impl LearnedSelector {
    pub fn new(model: Box<dyn PromptModel>) -> Self {
        Self {
            model,
            dimensions: None,
            stale: true,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    fn embed(&mut self, image: &RgbImage) -> Result<()> {
        let start = Instant::now();
        self.model.set_image(image)?;
        self.dimensions = Some(image.dimensions());
        self.stale = false;
        debug!(
            "Embedded {}x{} image in {:.1}ms",
            image.width(),
            image.height(),
            start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(())
    }
}

impl RegionSelector for LearnedSelector {
    fn kind(&self) -> SelectorKind {
        SelectorKind::Learned
    }

    fn bind(&mut self, image: &RgbImage) -> Result<()> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ColorizeError::selector_init("cannot bind an empty image"));
        }
        self.embed(image)
            .map_err(|e| ColorizeError::selector_init(format!("embedding failed: {}", e)))
    }

    fn select(&mut self, image: &RgbImage, point: Point) -> Result<Option<Mask>> {
        if self.stale || self.dimensions != Some(image.dimensions()) {
            self.embed(image)
                .map_err(|e| ColorizeError::segmentation(format!("re-embedding failed: {}", e)))?;
        }

        let candidates = self
            .model
            .predict(point)
            .map_err(|e| ColorizeError::segmentation(e.to_string()))?;
        let total = candidates.len();

        let best = candidates
            .into_iter()
            .filter(|c| c.mask.dimensions() == image.dimensions() && !c.mask.is_empty())
            .filter(|c| c.score.is_finite())
            .max_by(|a, b| a.score.total_cmp(&b.score));

        match &best {
            Some(c) => debug!(
                "Picked mask with score {:.3} ({} pixels) from {} candidates",
                c.score,
                c.mask.count(),
                total
            ),
            None => debug!("No usable mask among {} candidates", total),
        }
        Ok(best.map(|c| c.mask))
    }

    fn invalidate(&mut self) {
        self.stale = true;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use image::Rgb;

    /// Proposes fixed candidates and counts embeddings.
    struct ScriptedModel {
        candidates: Vec<(f32, Vec<bool>)>,
        dims: (u32, u32),
        embeds: Arc<AtomicUsize>,
        fail_predict: bool,
    }

    impl ScriptedModel {
        fn new(candidates: Vec<(f32, Vec<bool>)>) -> (Self, Arc<AtomicUsize>) {
            let embeds = Arc::new(AtomicUsize::new(0));
            let model = Self {
                candidates,
                dims: (0, 0),
                embeds: Arc::clone(&embeds),
                fail_predict: false,
            };
            (model, embeds)
        }
    }

    impl PromptModel for ScriptedModel {
        fn set_image(&mut self, image: &RgbImage) -> Result<()> {
            self.dims = image.dimensions();
            self.embeds.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn predict(&mut self, _point: Point) -> Result<Vec<MaskCandidate>> {
            if self.fail_predict {
                return Err(ColorizeError::segmentation("device lost"));
            }
            Ok(self
                .candidates
                .iter()
                .filter_map(|(score, bits)| {
                    Mask::from_vec(self.dims.0, self.dims.1, bits.clone())
                        .map(|mask| MaskCandidate { mask, score: *score })
                })
                .collect())
        }
    }

    fn image() -> RgbImage {
        RgbImage::from_pixel(2, 2, Rgb([50, 50, 50]))
    }

    #[test]
    fn test_select_picks_highest_score() {
        let (model, _) = ScriptedModel::new(vec![
            (0.4, vec![true, false, false, false]),
            (0.9, vec![true, true, false, false]),
            (0.7, vec![true, true, true, false]),
        ]);
        let mut selector = LearnedSelector::new(Box::new(model));
        let img = image();
        selector.bind(&img).unwrap();

        let mask = selector.select(&img, Point::new(0, 0)).unwrap().unwrap();
        assert_eq!(mask.count(), 2);
    }

    #[test]
    fn test_select_without_candidates_is_none() {
        let (model, _) = ScriptedModel::new(vec![(0.9, vec![false; 4])]);
        let mut selector = LearnedSelector::new(Box::new(model));
        let img = image();
        selector.bind(&img).unwrap();

        assert!(selector.select(&img, Point::new(1, 1)).unwrap().is_none());
    }

    #[test]
    fn test_embedding_is_cached_until_invalidated() {
        let (model, embeds) = ScriptedModel::new(vec![(0.9, vec![true; 4])]);
        let mut selector = LearnedSelector::new(Box::new(model));
        let img = image();
        selector.bind(&img).unwrap();

        selector.select(&img, Point::new(0, 0)).unwrap();
        selector.select(&img, Point::new(1, 0)).unwrap();
        assert_eq!(embeds.load(Ordering::SeqCst), 1);

        selector.invalidate();
        assert!(selector.is_stale());
        selector.select(&img, Point::new(0, 1)).unwrap();
        assert_eq!(embeds.load(Ordering::SeqCst), 2);
        assert!(!selector.is_stale());
    }

    #[test]
    fn test_predict_failure_is_segmentation_error() {
        let (mut model, _) = ScriptedModel::new(vec![]);
        model.fail_predict = true;
        let mut selector = LearnedSelector::new(Box::new(model));
        let img = image();
        selector.bind(&img).unwrap();

        let err = selector.select(&img, Point::new(0, 0)).unwrap_err();
        assert!(matches!(err, ColorizeError::Segmentation { .. }));
    }

    #[test]
    fn test_unconfigured_loader_fails() {
        let loader = loader_from_config(&ModelConfig::default());
        assert!(matches!(loader(), Err(ColorizeError::SelectorInit { .. })));
    }
}
