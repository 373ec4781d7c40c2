use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::imageops::FilterType;
use image::{codecs::jpeg::JpegEncoder, ColorType};
use thiserror::Error;

use crate::config::MediaConfig;

pub const ALLOWED_MIME: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("unsupported image format '{0}'; use JPG, PNG, GIF or WebP")]
    UnsupportedFormat(String),
    #[error("image too large ({size} bytes); maximum is {max} bytes")]
    TooLarge { size: usize, max: usize },
    #[error("could not process image: {0}")]
    Decode(String),
    #[error("image worker failed: {0}")]
    Worker(String),
}

/// Checks type and size before any decoding work happens.
pub fn validate_image(mime: &str, size: usize, cfg: &MediaConfig) -> Result<(), MediaError> {
    if !ALLOWED_MIME.contains(&mime) {
        return Err(MediaError::UnsupportedFormat(mime.to_string()));
    }
    if size > cfg.max_bytes {
        return Err(MediaError::TooLarge { size, max: cfg.max_bytes });
    }
    Ok(())
}

/// Scale-to-fit target size. Landscape images are bounded by `max_width`,
/// portrait and square ones by `max_height`; nothing is ever upscaled.
/// The derived side is truncated, as a canvas would, and kept >= 1.
pub fn scaled_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let scale = |side: u32, bound: u32, other: u32| -> u32 {
        ((u64::from(side) * u64::from(bound)) / u64::from(other)).max(1) as u32
    };
    if width > height {
        if width > max_width {
            return (max_width, scale(height, max_width, width));
        }
    } else if height > max_height {
        return (scale(width, max_height, height), max_height);
    }
    (width, height)
}

/// Decodes, shrinks and re-encodes an upload as a JPEG data URI.
/// Returns the URI together with the output dimensions.
pub fn resize_to_data_uri(bytes: &[u8], cfg: &MediaConfig) -> Result<(String, u32, u32), MediaError> {
    let img = image::load_from_memory(bytes).map_err(|e| MediaError::Decode(e.to_string()))?;
    let (w, h) = scaled_dimensions(img.width(), img.height(), cfg.max_width, cfg.max_height);
    let img = if (w, h) == (img.width(), img.height()) {
        img
    } else {
        img.resize_exact(w, h, FilterType::Triangle)
    };
    // JPEG has no alpha channel
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, cfg.jpeg_quality)
        .encode(rgb.as_raw(), w, h, ColorType::Rgb8)
        .map_err(|e| MediaError::Decode(e.to_string()))?;
    Ok((format!("data:image/jpeg;base64,{}", STANDARD.encode(&out)), w, h))
}

/// Shape check for `data:image/<subtype>;base64,<payload>`; the payload is not decoded.
pub fn is_image_data_uri(uri: &str) -> bool {
    uri.strip_prefix("data:image/")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(subtype, payload)| !subtype.is_empty() && !payload.is_empty())
        .unwrap_or(false)
}
