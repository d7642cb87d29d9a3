// ============================================================================
// Mask I/O: PNG encoding, data URIs, design/image loading
// ============================================================================

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, GrayImage, ImageEncoder, RgbaImage};

use crate::design::DesignDocument;
use crate::error::{MaskError, Result};

const PNG_DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Lossless RGBA PNG, alpha preserved.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(bytes)
}

/// Single-channel PNG for refined masks.
pub fn encode_gray_png(mask: &GrayImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(
        mask.as_raw(),
        mask.width(),
        mask.height(),
        image::ColorType::L8,
    )?;
    Ok(bytes)
}

/// `data:image/png;base64,...`: the form attached to generation requests.
pub fn to_data_uri(png: &[u8]) -> String {
    let mut uri = String::with_capacity(PNG_DATA_URI_PREFIX.len() + png.len() * 4 / 3 + 4);
    uri.push_str(PNG_DATA_URI_PREFIX);
    STANDARD.encode_string(png, &mut uri);
    uri
}

/// Decode any base64 `data:` URI to its raw bytes. Plain base64 without a
/// `data:` header is accepted too.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let payload = match uri.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| MaskError::DataUri("missing ',' after header".into()))?;
            if !header.ends_with(";base64") {
                return Err(MaskError::DataUri(format!(
                    "only base64 payloads are supported (header '{header}')"
                )));
            }
            data
        }
        None => uri,
    };
    STANDARD
        .decode(payload.trim())
        .map_err(|e| MaskError::DataUri(e.to_string()))
}

/// Write encoded bytes to `path`.
pub fn write_bytes(bytes: &[u8], path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(())
}

/// Load an editor design document from a JSON file.
pub fn load_design(path: &Path) -> Result<DesignDocument> {
    let file = File::open(path)?;
    DesignDocument::from_reader(BufReader::new(file))
}

/// Load an image from a path, or from a data URI when the argument starts
/// with `data:`.
pub fn load_image(source: &str) -> Result<DynamicImage> {
    if source.starts_with("data:") {
        let bytes = decode_data_uri(source)?;
        return Ok(image::load_from_memory(&bytes)?);
    }
    Ok(image::open(Path::new(source))?)
}
