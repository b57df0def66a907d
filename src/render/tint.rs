//! Compositing paint colour into a masked region.

use image::{Rgb, RgbImage};
use palette::{FromColor, Lab, Srgb};

use crate::config::{BlendConfig, BlendMode};
use crate::error::{ColorizeError, Result};
use crate::select::SelectorKind;
use crate::types::{Colour, Mask};

/// How paint is laid over the selected pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tint {
    /// Masked pixels become the paint colour exactly.
    Replace,
    /// `pixel * (1 - opacity) + paint * opacity` inside the mask.
    Blend { opacity: f32 },
    /// Keep each pixel's L*, take a*/b* from the paint, then blend at `opacity`.
    Shade { opacity: f32 },
}

impl Tint {
    /// Tint used for masks from a given selector.
    ///
    /// Flood fill regions are already bounded by colour similarity and get a
    /// hard replace; learned masks are blended so texture shows through.
    pub fn for_selector(kind: SelectorKind, blend: &BlendConfig) -> Self {
        match (kind, blend.mode) {
            (SelectorKind::FloodFill, _) => Tint::Replace,
            (SelectorKind::Learned, BlendMode::Alpha) => Tint::Blend { opacity: blend.opacity },
            (SelectorKind::Learned, BlendMode::Shade) => Tint::Shade { opacity: blend.opacity },
        }
    }
}

/// Paint `colour` into the pixels of `image` selected by `mask`.
///
/// Returns a new image; pixels outside the mask are copied unchanged.
pub fn apply(image: &RgbImage, mask: &Mask, colour: Colour, tint: Tint) -> Result<RgbImage> {
    if mask.dimensions() != image.dimensions() {
        return Err(ColorizeError::Apply {
            message: format!(
                "mask is {}x{} but image is {}x{}",
                mask.width(),
                mask.height(),
                image.width(),
                image.height()
            ),
        });
    }
    if let Tint::Blend { opacity } | Tint::Shade { opacity } = tint {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(ColorizeError::Apply {
                message: format!("opacity {} is outside 0.0-1.0", opacity),
            });
        }
    }

    let paint = colour.to_array();
    let paint_lab: Lab = Lab::from_color(to_srgb(paint));

    let mut out = image.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        if !mask.get(x, y) {
            continue;
        }
        *pixel = match tint {
            Tint::Replace => colour.to_pixel(),
            Tint::Blend { opacity } => Rgb(blend(pixel.0, paint, opacity)),
            Tint::Shade { opacity } => {
                let shaded = shade(pixel.0, paint_lab);
                Rgb(blend(pixel.0, shaded, opacity))
            }
        };
    }
    Ok(out)
}

/// Weighted sum of two pixels, rounded and saturated to 0-255.
pub fn blend(base: [u8; 3], overlay: [u8; 3], opacity: f32) -> [u8; 3] {
    let mut out = [0u8; 3];
    for c in 0..3 {
        let v = base[c] as f32 * (1.0 - opacity) + overlay[c] as f32 * opacity;
        out[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// The paint colour at this pixel's lightness.
fn shade(pixel: [u8; 3], paint: Lab) -> [u8; 3] {
    let lab: Lab = Lab::from_color(to_srgb(pixel));
    let shaded: Lab = Lab::new(lab.l, paint.a, paint.b);
    from_srgb(Srgb::from_color(shaded))
}

fn to_srgb(rgb: [u8; 3]) -> Srgb {
    Srgb::new(
        rgb[0] as f32 / 255.0,
        rgb[1] as f32 / 255.0,
        rgb[2] as f32 / 255.0,
    )
}

fn from_srgb(srgb: Srgb) -> [u8; 3] {
    [
        (srgb.red.clamp(0.0, 1.0) * 255.0).round() as u8,
        (srgb.green.clamp(0.0, 1.0) * 255.0).round() as u8,
        (srgb.blue.clamp(0.0, 1.0) * 255.0).round() as u8,
    ]
}
