//! XLSX writer

pub(crate) mod content_types;
mod drawing;

pub use drawing::EMU_PER_PIXEL;

use std::io::{Seek, Write};
use std::path::Path;

use crate::document::XlsxDocument;
use crate::error::{XlsxError, XlsxResult};
use crate::package::XlsxPackage;
use content_types::{ContentTypes, CONTENT_TYPES_PART};
use drawing::{attach_pictures, MediaParts};

/// XLSX file writer
pub struct XlsxWriter;

impl XlsxWriter {
    /// Write a document to a file path
    pub fn write_file<P: AsRef<Path>>(document: &XlsxDocument, path: P) -> XlsxResult<()> {
        let package = Self::to_package(document)?;
        package.write_file(path)
    }

    /// Write a document to a writer
    pub fn write<W: Write + Seek>(document: &XlsxDocument, writer: W) -> XlsxResult<()> {
        Self::to_package(document)?.write(writer)
    }

    /// The package as it will be written: the original parts, with drawings,
    /// media, relationships and content types added for placed pictures.
    pub fn to_package(document: &XlsxDocument) -> XlsxResult<XlsxPackage> {
        let mut package = document.package().clone();
        if document.workbook().picture_count() == 0 {
            return Ok(package);
        }

        let types_xml = package
            .part(CONTENT_TYPES_PART)
            .ok_or_else(|| XlsxError::MissingPart(CONTENT_TYPES_PART.into()))?;
        let mut content_types = ContentTypes::parse(types_xml)?;
        let mut media = MediaParts::new(&package);

        for (index, sheet) in document.workbook().worksheets().enumerate() {
            if sheet.pictures().is_empty() {
                continue;
            }
            let sheet_part = document.sheet_part(index).ok_or_else(|| {
                XlsxError::InvalidFormat(format!(
                    "worksheet '{}' has no part in the package",
                    sheet.name()
                ))
            })?;
            attach_pictures(
                &mut package,
                &mut content_types,
                &mut media,
                sheet_part,
                sheet.pictures(),
            )?;
        }

        package.set_part(CONTENT_TYPES_PART, content_types.to_xml().into_bytes());
        Ok(package)
    }
}
