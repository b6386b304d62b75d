use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::{ALLOWED_IMAGE_TYPES, ImageData};

/// Decode a `data:<mime>;base64,<payload>` image, as produced by a browser
/// `FileReader.readAsDataURL`. Rejects non-image types and payloads larger
/// than `max_bytes` once decoded.
pub fn decode_data_url(data_url: &str, max_bytes: usize) -> Result<ImageData, String> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or("Image must be a data URL")?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or("Malformed data URL: missing payload")?;
    let content_type = header
        .strip_suffix(";base64")
        .ok_or("Image data must be base64-encoded")?
        .trim()
        .to_ascii_lowercase();

    if !ALLOWED_IMAGE_TYPES.contains(&content_type.as_str()) {
        return Err(format!("Unsupported image type: {content_type}"));
    }

    // Reject obviously oversized payloads before allocating for them.
    if payload.len() / 4 * 3 > max_bytes + 3 {
        return Err(too_large(max_bytes));
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| format!("Invalid base64 image data: {e}"))?;
    if bytes.is_empty() {
        return Err("Image is empty".into());
    }
    if bytes.len() > max_bytes {
        return Err(too_large(max_bytes));
    }

    Ok(ImageData {
        content_type,
        bytes,
    })
}

fn too_large(max_bytes: usize) -> String {
    format!(
        "Image too large (max {} MB)",
        max_bytes.div_ceil(1024 * 1024)
    )
}
