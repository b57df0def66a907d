//! SAM-style encoder/decoder pair run through ONNX Runtime.
//!
//! Encoder: `image` [1, 3, 1024, 1024] -> `image_embeddings` [1, 256, 64, 64].
//! Decoder: embeddings + point prompt -> `masks` [1, K, H, W] logits at the
//! original resolution and `iou_predictions` [1, K].

use std::fmt;
use std::path::Path;

use image::imageops::FilterType;
use image::RgbImage;
use log::info;
use ndarray::{Array1, Array2, Array3, Array4};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;

use super::{MaskCandidate, PromptModel};
use crate::error::{ColorizeError, Result};
use crate::types::{Mask, Point};

/// Side length of the square encoder input.
const INPUT_SIZE: u32 = 1024;

/// Per-channel normalisation the encoder was trained with (0-255 scale).
const PIXEL_MEAN: [f32; 3] = [123.675, 116.28, 103.53];
const PIXEL_STD: [f32; 3] = [58.395, 57.12, 57.375];

/// Label the exported decoder expects for the padding point when no box
/// prompt is given.
const PADDING_LABEL: f32 = -1.0;

pub struct SamOnnxModel {
    encoder: Session,
    decoder: Session,
    embedding: Option<Array4<f32>>,
    /// Original (width, height) of the embedded image.
    image_size: (u32, u32),
}

impl SamOnnxModel {
    pub fn load(encoder: &Path, decoder: &Path) -> Result<Self> {
        let encoder = build_session(encoder)?;
        let decoder = build_session(decoder)?;
        Ok(Self {
            encoder,
            decoder,
            embedding: None,
            image_size: (0, 0),
        })
    }

    /// Scale from original pixels to encoder input pixels.
    fn scale(&self) -> f32 {
        let (w, h) = self.image_size;
        INPUT_SIZE as f32 / w.max(h) as f32
    }
}

fn build_session(path: &Path) -> Result<Session> {
    let session = Session::builder()
        .map_err(|e| init_err(path, e))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| init_err(path, e))?
        .commit_from_file(path)
        .map_err(|e| init_err(path, e))?;
    info!("Loaded segmentation model {}", path.display());
    Ok(session)
}

fn init_err(path: &Path, e: impl fmt::Display) -> ColorizeError {
    ColorizeError::selector_init(format!("{}: {}", path.display(), e))
}

fn model_err(e: impl fmt::Display) -> ColorizeError {
    ColorizeError::segmentation(e.to_string())
}

/// Resize so the longest side is `INPUT_SIZE`, normalise, and zero-pad to a
/// square NCHW tensor.
fn preprocess(image: &RgbImage) -> Array4<f32> {
    let (w, h) = image.dimensions();
    let scale = INPUT_SIZE as f32 / w.max(h) as f32;
    let new_w = ((w as f32 * scale).round() as u32).clamp(1, INPUT_SIZE);
    let new_h = ((h as f32 * scale).round() as u32).clamp(1, INPUT_SIZE);
    let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);

    let mut input = Array4::<f32>::zeros((1, 3, INPUT_SIZE as usize, INPUT_SIZE as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            let v = (pixel[c] as f32 - PIXEL_MEAN[c]) / PIXEL_STD[c];
            input[[0, c, y as usize, x as usize]] = v;
        }
    }
    input
}

impl PromptModel for SamOnnxModel {
    fn set_image(&mut self, image: &RgbImage) -> Result<()> {
        let input = Value::from_array(preprocess(image)).map_err(model_err)?;

        let outputs = self
            .encoder
            .run(ort::inputs!["image" => input])
            .map_err(model_err)?;
        let (_, data) = outputs["image_embeddings"]
            .try_extract_tensor::<f32>()
            .map_err(model_err)?;
        let embedding = Array4::from_shape_vec((1, 256, 64, 64), data.to_vec()).map_err(model_err)?;
        drop(outputs);

        self.embedding = Some(embedding);
        self.image_size = image.dimensions();
        Ok(())
    }

    fn predict(&mut self, point: Point) -> Result<Vec<MaskCandidate>> {
        let embedding = self
            .embedding
            .clone()
            .ok_or_else(|| ColorizeError::segmentation("no image embedded"))?;
        let scale = self.scale();
        let (width, height) = self.image_size;

        let coords = Array3::from_shape_vec(
            (1, 2, 2),
            vec![point.x as f32 * scale, point.y as f32 * scale, 0.0, 0.0],
        )
        .map_err(model_err)?;
        let labels = Array2::from_shape_vec((1, 2), vec![1.0, PADDING_LABEL]).map_err(model_err)?;
        let mask_input = Array4::<f32>::zeros((1, 1, 256, 256));
        let has_mask_input = Array1::<f32>::from_vec(vec![0.0]);
        let orig_im_size = Array1::<f32>::from_vec(vec![height as f32, width as f32]);

        let outputs = self
            .decoder
            .run(ort::inputs![
                "image_embeddings" => Value::from_array(embedding).map_err(model_err)?,
                "point_coords" => Value::from_array(coords).map_err(model_err)?,
                "point_labels" => Value::from_array(labels).map_err(model_err)?,
                "mask_input" => Value::from_array(mask_input).map_err(model_err)?,
                "has_mask_input" => Value::from_array(has_mask_input).map_err(model_err)?,
                "orig_im_size" => Value::from_array(orig_im_size).map_err(model_err)?,
            ])
            .map_err(model_err)?;

        let (mask_shape, mask_data) = outputs["masks"]
            .try_extract_tensor::<f32>()
            .map_err(model_err)?;
        let shape: &[i64] = mask_shape.as_ref();
        if shape.len() != 4 || shape[2] != height as i64 || shape[3] != width as i64 {
            return Err(ColorizeError::segmentation(format!(
                "unexpected mask shape {:?} for {}x{} image",
                shape, width, height
            )));
        }
        let count = shape[1] as usize;
        let plane = width as usize * height as usize;

        let (_, scores) = outputs["iou_predictions"]
            .try_extract_tensor::<f32>()
            .map_err(model_err)?;

        let mut candidates = Vec::with_capacity(count);
        for (k, &score) in scores.iter().enumerate().take(count) {
            let logits = &mask_data[k * plane..(k + 1) * plane];
            let bits = logits.iter().map(|&v| v > 0.0).collect();
            if let Some(mask) = Mask::from_vec(width, height, bits) {
                candidates.push(MaskCandidate { mask, score });
            }
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_preprocess_pads_short_side() {
        let img = RgbImage::from_pixel(64, 32, Rgb([255, 255, 255]));
        let input = preprocess(&img);

        assert_eq!(input.shape(), &[1, 3, 1024, 1024]);
        let expected = (255.0 - PIXEL_MEAN[0]) / PIXEL_STD[0];
        assert!((input[[0, 0, 0, 0]] - expected).abs() < 1e-4);
        // Resized to 1024x512; rows below are padding.
        assert_eq!(input[[0, 0, 700, 10]], 0.0);
    }
}
