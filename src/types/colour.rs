//! Paint colour type and parsing.

use std::fmt;
use std::str::FromStr;

use image::Rgb;

use crate::error::{ColorizeError, Result};

/// An opaque paint colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Colour {
    /// Create a new colour from RGB components.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Black.
    pub const BLACK: Self = Self::rgb(0, 0, 0);

    /// White.
    pub const WHITE: Self = Self::rgb(255, 255, 255);

    /// Parse a `#RRGGBB` colour string.
    ///
    /// Hex digits are case-insensitive. The leading `#` is required and no
    /// other length is accepted, so `#FFF` and `red` are both rejected.
    pub fn from_hex(s: &str) -> Result<Self> {
        let hex = s
            .strip_prefix('#')
            .filter(|h| h.len() == 6 && h.is_ascii())
            .ok_or_else(|| invalid_colour(s))?;

        let r = parse_hex_byte(&hex[0..2]).ok_or_else(|| invalid_colour(s))?;
        let g = parse_hex_byte(&hex[2..4]).ok_or_else(|| invalid_colour(s))?;
        let b = parse_hex_byte(&hex[4..6]).ok_or_else(|| invalid_colour(s))?;
        Ok(Self::rgb(r, g, b))
    }

    /// Channels in the order the compositor works in.
    pub fn to_pixel(self) -> Rgb<u8> {
        Rgb([self.r, self.g, self.b])
    }

    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl FromStr for Colour {
    type Err = ColorizeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

fn invalid_colour(s: &str) -> ColorizeError {
    ColorizeError::Input {
        message: format!("Invalid colour: {:?}", s),
        help: Some("Use the #RRGGBB format, e.g. #A3B18A".to_string()),
    }
}

/// Parse a two-character hex byte. Rejects the sign prefixes
/// `from_str_radix` would otherwise let through.
fn parse_hex_byte(s: &str) -> Option<u8> {
    if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(s, 16).ok()
}
