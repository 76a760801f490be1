//! Attaching downloaded images to cells

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ahash::AHashMap;
use pixsheets_core::{CellAddress, Picture, Workbook};

use crate::decode::{decode_image, DecodedImage};
use crate::error::EmbedError;

/// Display size of a `width` x `height` image shrunk to fit a `bound` x `bound`
/// box, keeping its aspect ratio. Never enlarges; never returns a zero side.
pub fn thumbnail_size(width: u32, height: u32, bound: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width.max(1), height.max(1));
    }
    let bound = f64::from(bound);
    let scale = (bound / f64::from(width))
        .min(bound / f64::from(height))
        .min(1.0);
    let scaled = |side: u32| ((f64::from(side) * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}

#[derive(Debug, Clone)]
struct PreparedImage {
    data: Arc<[u8]>,
    decoded: DecodedImage,
    media_key: String,
}

/// Places pictures on worksheet cells.
///
/// Each image file is read and decoded once per embedder; cells sharing a
/// file share its bytes and media key.
#[derive(Debug)]
pub struct Embedder {
    thumbnail_box: u32,
    prepared: AHashMap<PathBuf, PreparedImage>,
}

impl Embedder {
    pub fn new(thumbnail_box: u32) -> Self {
        Self {
            thumbnail_box,
            prepared: AHashMap::new(),
        }
    }

    /// Attach the image at `image_path` to the top-left corner of cell
    /// (`row`, `col`) on sheet `sheet`, all 0-based.
    ///
    /// Returns the displayed size in pixels.
    pub fn embed(
        &mut self,
        workbook: &mut Workbook,
        sheet: usize,
        row: u32,
        col: u16,
        image_path: &Path,
    ) -> Result<(u32, u32), EmbedError> {
        let count = workbook.sheet_count();
        let worksheet = workbook
            .worksheet_mut(sheet)
            .ok_or(EmbedError::SheetOutOfRange { index: sheet, count })?;
        let anchor = CellAddress::checked(row, col)?;

        let bound = self.thumbnail_box;
        let image = self.prepare(image_path)?;
        let (width, height) = thumbnail_size(image.decoded.width, image.decoded.height, bound);

        worksheet.add_picture(Picture::new(
            anchor,
            width,
            height,
            image.decoded.format,
            image.media_key.clone(),
            Arc::clone(&image.data),
        ));
        Ok((width, height))
    }

    /// Distinct image files decoded so far
    pub fn prepared_count(&self) -> usize {
        self.prepared.len()
    }

    fn prepare(&mut self, path: &Path) -> Result<&PreparedImage, EmbedError> {
        if !self.prepared.contains_key(path) {
            let bytes = std::fs::read(path).map_err(|source| match source.kind() {
                ErrorKind::NotFound => EmbedError::MissingFile(path.to_path_buf()),
                _ => EmbedError::Read {
                    path: path.to_path_buf(),
                    source,
                },
            })?;
            let decoded = decode_image(&bytes).map_err(|reason| EmbedError::Decode {
                path: path.to_path_buf(),
                reason,
            })?;
            let media_key = path.to_string_lossy().into_owned();
            self.prepared.insert(
                path.to_path_buf(),
                PreparedImage {
                    data: Arc::from(bytes),
                    decoded,
                    media_key,
                },
            );
        }
        self.prepared
            .get(path)
            .ok_or_else(|| EmbedError::MissingFile(path.to_path_buf()))
    }
}
