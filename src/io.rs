use base64::{Engine as _, engine::general_purpose};
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::error::CanvasError;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Encode an RGBA image as an in-memory PNG.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, CanvasError> {
    let mut bytes = Vec::with_capacity(image.as_raw().len() / 8);
    PngEncoder::new(&mut bytes).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgba8,
    )?;
    Ok(bytes)
}

/// `data:image/png;base64,...` form expected by the recognition service.
pub fn png_data_url(png: &[u8]) -> String {
    format!("{}{}", PNG_DATA_URL_PREFIX, general_purpose::STANDARD.encode(png))
}

/// Decode an image payload returned by the service. Accepts a `data:` URL of
/// any image MIME type or bare base64.
pub fn decode_image_payload(payload: &str) -> Result<RgbaImage, CanvasError> {
    let payload = payload.trim();
    let b64 = match payload.strip_prefix("data:") {
        Some(rest) => match rest.split_once(',') {
            Some((meta, data)) if meta.ends_with(";base64") => data,
            _ => {
                return Err(CanvasError::TransportFailure(
                    "image payload is not a base64 data URL".to_string(),
                ));
            }
        },
        None => payload,
    };
    let bytes = general_purpose::STANDARD
        .decode(b64)
        .map_err(|e| CanvasError::TransportFailure(format!("bad base64 image: {}", e)))?;
    let image = image::load_from_memory(&bytes)
        .map_err(|e| CanvasError::TransportFailure(format!("undecodable image: {}", e)))?;
    Ok(image.into_rgba8())
}

/// Load any supported image file as RGBA (CLI input).
pub fn load_image_sync(path: &Path) -> Result<RgbaImage, CanvasError> {
    let image = image::open(path)?;
    Ok(image.into_rgba8())
}

/// Write an RGBA image to `path` as PNG.
pub fn write_png(image: &RgbaImage, path: &Path) -> Result<(), CanvasError> {
    let file = File::create(path)
        .map_err(|e| CanvasError::EncodingFailure(format!("{}: {}", path.display(), e)))?;
    let mut writer = BufWriter::new(file);
    PngEncoder::new(&mut writer).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ColorType::Rgba8,
    )?;
    Ok(())
}
