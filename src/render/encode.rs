//! Image decoding, JPEG/data-URL encoding, and file output.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};

use crate::error::{ColorizeError, Result};

/// Prefix of the data URLs images are returned as.
pub const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Decode uploaded bytes (any format the `image` crate reads) to RGB.
pub fn decode(bytes: &[u8]) -> Result<RgbImage> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| ColorizeError::Decode {
            message: e.to_string(),
        })?
        .to_rgb8();

    if image.width() == 0 || image.height() == 0 {
        return Err(ColorizeError::Decode {
            message: "image has no pixels".to_string(),
        });
    }
    Ok(image)
}

/// Encode to JPEG bytes at the given quality (1-100).
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    encoder.encode_image(image).map_err(|e| ColorizeError::Encode {
        message: e.to_string(),
    })?;
    Ok(buf)
}

/// Encode to a `data:image/jpeg;base64,...` URL.
pub fn to_data_url(image: &RgbImage, quality: u8) -> Result<String> {
    let jpeg = encode_jpeg(image, quality)?;
    Ok(format!("{}{}", DATA_URL_PREFIX, STANDARD.encode(jpeg)))
}

/// Decode a data URL or bare base64 string back to raw bytes.
pub fn from_base64(payload: &str) -> Result<Vec<u8>> {
    let data = match payload.split_once(";base64,") {
        Some((scheme, data)) if scheme.starts_with("data:") => data,
        _ => payload,
    };
    STANDARD.decode(data.trim()).map_err(|e| ColorizeError::Input {
        message: format!("Invalid base64 image data: {}", e),
        help: Some("Send a data URL (data:image/...;base64,...) or plain base64".to_string()),
    })
}

/// Write an image to `path`, choosing the format from its extension.
///
/// `.jpg`/`.jpeg` are written at `quality`; `.png` is lossless. The image is
/// encoded in memory first, so any failure of the write itself is returned
/// and a partially written file is removed.
pub fn write_image(image: &RgbImage, path: &Path, quality: u8) -> Result<()> {
    let bytes = match output_format(path)? {
        ImageFormat::Jpeg => encode_jpeg(image, quality)?,
        _ => encode_png(image)?,
    };

    fs::write(path, &bytes).map_err(|e| {
        let _ = fs::remove_file(path);
        ColorizeError::Io {
            path: path.to_path_buf(),
            message: format!("Failed to write image: {}", e),
        }
    })
}

/// Supported output format for a file name.
pub fn output_format(path: &Path) -> Result<ImageFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => Ok(ImageFormat::Jpeg),
        Some("png") => Ok(ImageFormat::Png),
        _ => Err(ColorizeError::Input {
            message: format!("Unsupported output file: {}", path.display()),
            help: Some("Use a .jpg, .jpeg or .png file name".to_string()),
        }),
    }
}

/// Encode as PNG in memory. Lossless, so handy for feeding exact pixels
/// back through [`decode`].
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| ColorizeError::Encode {
            message: e.to_string(),
        })?;
    Ok(buf.into_inner())
}
