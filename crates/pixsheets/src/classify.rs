//! Deciding whether a cell value names a fetchable image

use once_cell::sync::Lazy;
use regex::Regex;

use pixsheets_core::CellValue;

/// Extensions recognized at the end of an image URL (lowercase, no dot)
pub const SUPPORTED_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "gif", "bmp", "svg", "webp"];

static IMAGE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://.*\.(jpg|jpeg|png|gif|bmp|svg|webp)$").expect("image URL pattern is valid")
});

/// True when the cell holds plain text naming an http(s) image.
///
/// Numbers, booleans, errors, empty cells and formulas are never image
/// references, whatever their cached result.
pub fn is_image_reference(value: &CellValue) -> bool {
    value.as_string().is_some_and(is_image_url)
}

/// True when `text`, trimmed and lowercased, is an http(s) URL ending in a
/// supported image extension
pub fn is_image_url(text: &str) -> bool {
    IMAGE_URL.is_match(&text.trim().to_lowercase())
}
