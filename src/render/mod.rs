//! Pixel work on session images.
//!
//! This module composites paint into selected regions and handles moving
//! images in and out of the service (decoding, JPEG data URLs, files).

mod encode;
mod tint;

pub use encode::{
    decode, encode_jpeg, encode_png, from_base64, output_format, to_data_url, write_image,
    DATA_URL_PREFIX,
};
pub use tint::{apply, blend, Tint};
