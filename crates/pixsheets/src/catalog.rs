//! Listing the sheets of input files
//!
//! Callers use this to decide which sheet indices to hand to the batch.

use std::path::{Path, PathBuf};

use pixsheets_xlsx::XlsxReader;

use crate::batch::SheetSelection;

/// Sheets of one readable workbook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSheets {
    pub file: PathBuf,
    /// `(0-based index, name)` in tab order
    pub sheets: Vec<(usize, String)>,
}

impl FileSheets {
    /// File name used as the key of a [`SheetSelection`]
    pub fn key(&self) -> String {
        self.file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Read the sheet names of every file. Files that cannot be read are logged
/// and left out.
pub fn sheet_catalog<P: AsRef<Path>>(paths: &[P]) -> Vec<FileSheets> {
    let mut catalog = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        match XlsxReader::read_file(path) {
            Ok(document) => catalog.push(FileSheets {
                file: path.to_path_buf(),
                sheets: document
                    .workbook()
                    .sheet_names()
                    .into_iter()
                    .enumerate()
                    .map(|(i, name)| (i, name.to_string()))
                    .collect(),
            }),
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "cannot list sheets");
            }
        }
    }
    catalog
}

/// Select every sheet of every catalogued file
pub fn select_all(catalog: &[FileSheets]) -> SheetSelection {
    catalog
        .iter()
        .map(|entry| {
            (
                entry.key(),
                entry.sheets.iter().map(|(i, _)| *i).collect(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixsheets_core::Workbook;
    use pixsheets_xlsx::{XlsxDocument, XlsxWriter};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_catalog_lists_sheets_and_skips_bad_files() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.xlsx");
        let mut workbook = Workbook::new();
        workbook.add_worksheet_with_name("Links").unwrap();
        XlsxWriter::write_file(&XlsxDocument::from_workbook(workbook).unwrap(), &good).unwrap();

        let bad = dir.path().join("bad.xlsx");
        std::fs::write(&bad, b"not a zip").unwrap();
        let missing = dir.path().join("missing.xlsx");

        let catalog = sheet_catalog(&[&good, &bad, &missing]);
        assert_eq!(
            catalog,
            vec![FileSheets {
                file: good.clone(),
                sheets: vec![(0, "Sheet1".to_string()), (1, "Links".to_string())],
            }]
        );

        let selection = select_all(&catalog);
        assert_eq!(selection.get("good.xlsx"), Some(&vec![0, 1]));
        assert_eq!(selection.len(), 1);
    }
}
