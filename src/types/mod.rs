//! Core domain types for colorsense.
//!
//! - `Colour` - opaque paint colours parsed from `#RRGGBB`
//! - `Mask` - boolean region masks produced by selectors
//! - `Point` - a click position in image pixels

mod colour;
mod mask;

pub use colour::Colour;
pub use mask::Mask;

/// A click position in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Check a signed click against image bounds.
    pub fn within(x: i64, y: i64, width: u32, height: u32) -> Option<Self> {
        if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
            return None;
        }
        Some(Self::new(x as u32, y as u32))
    }
}
