//! # pixsheets-core
//!
//! Core data structures for the pixsheets workspace.
//!
//! - [`CellValue`] - values read from cells (numbers, strings, booleans, errors, formulas)
//! - [`CellAddress`] - 0-based cell coordinates with A1 conversion
//! - [`Picture`] - an image pinned to a cell's top-left corner
//! - [`Workbook`], [`Worksheet`] - the document structures
//!
//! ## Example
//!
//! ```rust
//! use pixsheets_core::{CellValue, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! sheet.set_cell_value("B2", "https://example.com/cat.png").unwrap();
//! sheet.set_cell_value_at(2, 1, CellValue::Number(3.0)).unwrap();
//!
//! assert_eq!(sheet.cell_count(), 2);
//! ```

pub mod cell;
pub mod error;
pub mod picture;
pub mod workbook;
pub mod worksheet;

pub use cell::{CellAddress, CellError, CellValue, SharedString};
pub use error::{Error, Result};
pub use picture::{Picture, PictureFormat};
pub use workbook::Workbook;
pub use worksheet::Worksheet;

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
