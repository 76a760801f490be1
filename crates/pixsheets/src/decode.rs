//! Image validation

use image::{GenericImageView, ImageFormat};
use pixsheets_core::PictureFormat;

/// What a successful decode tells us about an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub format: PictureFormat,
}

/// Fully decode `bytes` and report the natural size and format.
///
/// Truncated bodies fail here, not just unknown headers.
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage, String> {
    let format = image::guess_format(bytes).map_err(|e| e.to_string())?;
    let format = picture_format(format).ok_or_else(|| format!("unsupported format {:?}", format))?;
    let img = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(format!("empty image {}x{}", width, height));
    }
    Ok(DecodedImage {
        width,
        height,
        format,
    })
}

fn picture_format(format: ImageFormat) -> Option<PictureFormat> {
    match format {
        ImageFormat::Png => Some(PictureFormat::Png),
        ImageFormat::Jpeg => Some(PictureFormat::Jpeg),
        ImageFormat::Gif => Some(PictureFormat::Gif),
        ImageFormat::Bmp => Some(PictureFormat::Bmp),
        ImageFormat::WebP => Some(PictureFormat::Webp),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 40]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .unwrap();
    out.into_inner()
}
