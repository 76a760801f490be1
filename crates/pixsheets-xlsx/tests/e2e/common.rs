//! Common utilities for E2E tests.

use std::path::PathBuf;
use std::sync::Arc;

use pixsheets_core::{CellAddress, Picture, PictureFormat, Workbook};
use pixsheets_xlsx::{XlsxDocument, XlsxPackage};

/// Payload standing in for encoded image bytes; the writer treats media as opaque.
pub fn fake_image(tag: &str) -> Arc<[u8]> {
    Arc::from(format!("\u{89}PNG-{}", tag).into_bytes())
}

/// A picture anchored at `cell` ("B2") with the given display size
pub fn picture_at(cell: &str, width: u32, height: u32, key: &str) -> Picture {
    Picture::new(
        CellAddress::parse(cell).unwrap(),
        width,
        height,
        PictureFormat::Png,
        key,
        fake_image(key),
    )
}

/// Two sheets of links, the shape the embedding pipeline typically sees
pub fn links_workbook() -> Workbook {
    let mut workbook = Workbook::empty();
    workbook.add_worksheet_with_name("Products").unwrap();
    workbook.add_worksheet_with_name("Gallery").unwrap();

    let products = workbook.worksheet_mut(0).unwrap();
    products.set_cell_value("A1", "name").unwrap();
    products.set_cell_value("B1", "image").unwrap();
    products.set_cell_value("A2", "cat").unwrap();
    products
        .set_cell_value("B2", "https://example.com/cat.png")
        .unwrap();
    products
        .set_cell_value("C2", "https://example.com/cat.png")
        .unwrap();
    products.set_cell_value("D2", 19.99).unwrap();

    let gallery = workbook.worksheet_mut(1).unwrap();
    gallery
        .set_cell_value("A1", "https://example.com/dog.jpg")
        .unwrap();

    workbook
}

pub fn links_document() -> XlsxDocument {
    XlsxDocument::from_workbook(links_workbook()).unwrap()
}

/// Temp directory plus an `.xlsx` path inside it
pub fn temp_xlsx(name: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    (dir, path)
}

/// A part decoded as UTF-8, panicking when absent
pub fn part_str<'a>(package: &'a XlsxPackage, name: &str) -> &'a str {
    let bytes = package
        .part(name)
        .unwrap_or_else(|| panic!("missing part {}", name));
    std::str::from_utf8(bytes).unwrap()
}
