//! Pictures floating over worksheet cells

use std::fmt;
use std::sync::Arc;

use crate::cell::CellAddress;

/// Raster formats a picture payload can be stored as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PictureFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Webp,
}

impl PictureFormat {
    /// File extension used for the media part (without the dot)
    pub fn extension(&self) -> &'static str {
        match self {
            PictureFormat::Png => "png",
            PictureFormat::Jpeg => "jpeg",
            PictureFormat::Gif => "gif",
            PictureFormat::Bmp => "bmp",
            PictureFormat::Webp => "webp",
        }
    }

    /// MIME type registered for the extension in `[Content_Types].xml`
    pub fn content_type(&self) -> &'static str {
        match self {
            PictureFormat::Png => "image/png",
            PictureFormat::Jpeg => "image/jpeg",
            PictureFormat::Gif => "image/gif",
            PictureFormat::Bmp => "image/bmp",
            PictureFormat::Webp => "image/webp",
        }
    }
}

/// An image anchored to the top-left corner of a cell
#[derive(Clone, PartialEq)]
pub struct Picture {
    /// Cell whose top-left corner the picture is pinned to
    pub anchor: CellAddress,
    /// Displayed width in pixels
    pub width_px: u32,
    /// Displayed height in pixels
    pub height_px: u32,
    /// Encoding of `data`
    pub format: PictureFormat,
    /// Identifies the payload; pictures sharing a key share one media part
    pub media_key: String,
    /// Encoded image bytes
    pub data: Arc<[u8]>,
}

impl Picture {
    pub fn new(
        anchor: CellAddress,
        width_px: u32,
        height_px: u32,
        format: PictureFormat,
        media_key: impl Into<String>,
        data: Arc<[u8]>,
    ) -> Self {
        Self {
            anchor,
            width_px,
            height_px,
            format,
            media_key: media_key.into(),
            data,
        }
    }
}

impl fmt::Debug for Picture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Picture")
            .field("anchor", &self.anchor.to_a1_string())
            .field("width_px", &self.width_px)
            .field("height_px", &self.height_px)
            .field("format", &self.format)
            .field("media_key", &self.media_key)
            .field("bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_omits_payload() {
        let pic = Picture::new(
            CellAddress::new(1, 1),
            100,
            25,
            PictureFormat::Png,
            "abc",
            Arc::from(vec![0u8; 4096]),
        );
        let text = format!("{:?}", pic);
        assert!(text.contains("\"B2\""));
        assert!(text.contains("bytes: 4096"));
    }
}
