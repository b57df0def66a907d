//! Classical flood fill selector.

use image::RgbImage;
use log::debug;

use super::{RegionSelector, SelectorKind};
use crate::config::{FillConfig, FillRange};
use crate::error::{ColorizeError, Result};
use crate::types::{Mask, Point};

/// Selects the 4-connected region of similar colour around a click.
///
/// Needs no precomputation: every `select` runs against the image it is
/// handed, so repeated edits always see the latest pixels.
#[derive(Debug, Clone)]
pub struct FloodFillSelector {
    fill: FillConfig,
    dimensions: Option<(u32, u32)>,
}

impl FloodFillSelector {
    pub fn new(fill: FillConfig) -> Self {
        Self {
            fill,
            dimensions: None,
        }
    }
}

impl RegionSelector for FloodFillSelector {
    fn kind(&self) -> SelectorKind {
        SelectorKind::FloodFill
    }

    fn bind(&mut self, image: &RgbImage) -> Result<()> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ColorizeError::selector_init("cannot bind an empty image"));
        }
        self.dimensions = Some(image.dimensions());
        Ok(())
    }

    fn select(&mut self, image: &RgbImage, point: Point) -> Result<Option<Mask>> {
        if self.dimensions != Some(image.dimensions()) {
            return Err(ColorizeError::segmentation("image does not match the bound dimensions"));
        }
        if point.x >= image.width() || point.y >= image.height() {
            return Err(ColorizeError::input(format!(
                "Point ({}, {}) is outside the {}x{} image",
                point.x,
                point.y,
                image.width(),
                image.height()
            )));
        }

        let mask = flood_fill(image, point, self.fill.tolerance, self.fill.range);
        debug!("Flood fill at ({}, {}) selected {} pixels", point.x, point.y, mask.count());
        Ok(Some(mask))
    }
}

/// Flood fill from `seed`, returning the selected region.
///
/// A neighbour joins the region when every channel is within `tolerance` of
/// its reference pixel, in both directions. With [`FillRange::Floating`] the
/// reference is the adjacent pixel already in the region; with
/// [`FillRange::Fixed`] it is the seed. A seed outside the image yields an
/// empty mask.
pub fn flood_fill(image: &RgbImage, seed: Point, tolerance: u8, range: FillRange) -> Mask {
    let (width, height) = image.dimensions();
    let mut mask = Mask::new(width, height);
    if seed.x >= width || seed.y >= height {
        return mask;
    }

    let w = width as usize;
    let h = height as usize;
    let pixels = image.as_raw();
    let mut selected = vec![false; w * h];

    #[inline(always)]
    fn pix(flat: &[u8], idx: usize) -> [u8; 3] {
        let o = idx * 3;
        [flat[o], flat[o + 1], flat[o + 2]]
    }

    #[inline(always)]
    fn within(p: [u8; 3], reference: [u8; 3], tol: u8) -> bool {
        p.iter()
            .zip(reference.iter())
            .all(|(&a, &b)| a.abs_diff(b) <= tol)
    }

    let seed_idx = seed.y as usize * w + seed.x as usize;
    let seed_colour = pix(pixels, seed_idx);

    // Pixels are only marked once accepted, so a neighbour rejected from one
    // side can still join from another in floating mode.
    let mut stack: Vec<usize> = Vec::with_capacity(4096);
    selected[seed_idx] = true;
    stack.push(seed_idx);

    while let Some(idx) = stack.pop() {
        let x = idx % w;
        let y = idx / w;
        let reference = match range {
            FillRange::Floating => pix(pixels, idx),
            FillRange::Fixed => seed_colour,
        };

        let mut visit = |ni: usize| {
            if !selected[ni] && within(pix(pixels, ni), reference, tolerance) {
                selected[ni] = true;
                stack.push(ni);
            }
        };

        if x > 0 {
            visit(idx - 1);
        }
        if x + 1 < w {
            visit(idx + 1);
        }
        if y > 0 {
            visit(idx - w);
        }
        if y + 1 < h {
            visit(idx + w);
        }
    }

    for (idx, &s) in selected.iter().enumerate() {
        if s {
            mask.set((idx % w) as u32, (idx / w) as u32, true);
        }
    }
    mask
}
