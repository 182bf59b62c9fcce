//! Uploaded media storage.
//!
//! Files live under the configured media root and are referenced by their
//! path relative to it (`uploads/recipe/<uuid>.<ext>`).

use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, ImageReader};
use tracing::{debug, warn};
use uuid::Uuid;

/// URL prefix the media root is served under.
pub const MEDIA_URL: &str = "/media";

/// Directory, relative to the media root, holding recipe images.
pub const RECIPE_IMAGE_DIR: &str = "uploads/recipe";

/// Accepted image formats.
pub const ALLOWED_FORMATS: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// Public URL of a stored file.
pub fn url(relative: &str) -> String {
    format!("{MEDIA_URL}/{relative}")
}

/// Sniff the format from the bytes and make sure the header decodes.
pub fn validate_image(data: &[u8]) -> Result<ImageFormat, String> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|_| INVALID_IMAGE.to_string())?;
    let format = reader
        .format()
        .filter(|f| ALLOWED_FORMATS.contains(f))
        .ok_or_else(|| INVALID_IMAGE.to_string())?;
    reader
        .into_dimensions()
        .map_err(|_| INVALID_IMAGE.to_string())?;
    Ok(format)
}

fn extension(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("img")
}

/// Write a validated recipe image under a fresh name and return its relative
/// path.
pub async fn save_recipe_image(
    media_root: &Path,
    data: &[u8],
    format: ImageFormat,
) -> std::io::Result<String> {
    let relative = format!("{RECIPE_IMAGE_DIR}/{}.{}", Uuid::new_v4(), extension(format));
    let target = media_root.join(&relative);
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&target, data).await?;
    debug!(path = %relative, bytes = data.len(), "stored media file");
    Ok(relative)
}

/// Remove a stored file. Failures are logged and otherwise ignored.
pub async fn remove_file(media_root: &Path, relative: &str) {
    if relative.split('/').any(|segment| segment == "..") {
        warn!(path = %relative, "refusing to remove media path outside the root");
        return;
    }
    match tokio::fs::remove_file(media_root.join(relative)).await {
        Ok(()) => debug!(path = %relative, "removed media file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %relative, error = %e, "failed to remove media file"),
    }
}
