//! Scanning selected sheets for image links
//!
//! One pass over the requested sheets yields both the deduplicated download
//! list and every cell that has to receive a picture afterwards.

use std::path::{Path, PathBuf};

use ahash::{AHashMap, AHashSet};
use md5::{Digest, Md5};
use pixsheets_core::{CellAddress, Workbook};

use crate::classify::{is_image_reference, SUPPORTED_EXTENSIONS};

/// Extension used when the URL does not end in a supported one
pub const DEFAULT_EXTENSION: &str = ".jpg";

/// One URL to fetch and where its image is cached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,
    pub path: PathBuf,
}

/// A cell whose value is an image URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCell {
    /// 0-based sheet index
    pub sheet: usize,
    /// 0-based row
    pub row: u32,
    /// 0-based column
    pub col: u16,
    /// Trimmed URL
    pub url: String,
}

impl LinkCell {
    pub fn address(&self) -> CellAddress {
        CellAddress::new(self.row, self.col)
    }
}

/// Result of scanning one workbook
#[derive(Debug, Clone, Default)]
pub struct CollectedLinks {
    tasks: Vec<DownloadTask>,
    by_url: AHashMap<String, usize>,
    cells: Vec<LinkCell>,
    skipped_sheets: Vec<usize>,
}

impl CollectedLinks {
    /// Distinct URLs in first-seen order
    pub fn tasks(&self) -> &[DownloadTask] {
        &self.tasks
    }

    /// Matching cells in scan order (sheet order as requested, then row, then column)
    pub fn cells(&self) -> &[LinkCell] {
        &self.cells
    }

    /// Requested sheet indices that do not exist in the workbook
    pub fn skipped_sheets(&self) -> &[usize] {
        &self.skipped_sheets
    }

    /// Number of distinct URLs
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when no image link was found
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Cache path assigned to `url`, if it was collected
    pub fn path_for(&self, url: &str) -> Option<&Path> {
        self.by_url
            .get(url)
            .map(|&i| self.tasks[i].path.as_path())
    }

    fn push(&mut self, cell: LinkCell, image_dir: &Path) {
        if !self.by_url.contains_key(&cell.url) {
            self.by_url.insert(cell.url.clone(), self.tasks.len());
            self.tasks.push(DownloadTask {
                path: save_path(image_dir, &cell.url),
                url: cell.url.clone(),
            });
        }
        self.cells.push(cell);
    }
}

/// Scan `sheet_indices` of `workbook` for image URLs.
///
/// Out-of-range indices are logged and recorded as skipped. Repeated indices
/// are scanned once. A URL found on several cells or sheets yields one task.
pub fn collect(workbook: &Workbook, sheet_indices: &[usize], image_dir: &Path) -> CollectedLinks {
    let mut links = CollectedLinks::default();
    let mut seen = AHashSet::new();

    for &index in sheet_indices {
        if !seen.insert(index) {
            continue;
        }
        let Some(sheet) = workbook.worksheet(index) else {
            tracing::warn!(
                sheet = index,
                sheets = workbook.sheet_count(),
                "sheet index out of range, skipping"
            );
            links.skipped_sheets.push(index);
            continue;
        };

        for (row, col, value) in sheet.iter_cells() {
            if !is_image_reference(value) {
                continue;
            }
            if let Some(text) = value.as_string() {
                links.push(
                    LinkCell {
                        sheet: index,
                        row,
                        col,
                        url: text.trim().to_string(),
                    },
                    image_dir,
                );
            }
        }
    }

    links
}

/// Cache path of `url`: `{image_dir}/{md5(url) as hex}{ext}`
pub fn save_path(image_dir: &Path, url: &str) -> PathBuf {
    let digest = Md5::digest(url.as_bytes());
    image_dir.join(format!("{:x}{}", digest, url_extension(url)))
}

/// Lowercase extension (with dot) of the URL path when supported, else `.jpg`
pub fn url_extension(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    let Some((_, ext)) = file.rsplit_once('.') else {
        return DEFAULT_EXTENSION;
    };
    let ext = ext.to_ascii_lowercase();
    match SUPPORTED_EXTENSIONS.iter().position(|e| *e == ext) {
        Some(i) => DOTTED_EXTENSIONS[i],
        None => DEFAULT_EXTENSION,
    }
}

const DOTTED_EXTENSIONS: [&str; 7] = [".jpg", ".jpeg", ".png", ".gif", ".bmp", ".svg", ".webp"];
