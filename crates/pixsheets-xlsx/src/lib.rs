//! # pixsheets-xlsx
//!
//! XLSX (Office Open XML) reader and writer for pixsheets.
//!
//! Reading keeps every part of the package; writing emits those parts
//! unchanged except where pictures were placed, so workbooks round-trip with
//! their formatting intact.

pub mod document;
pub mod error;
pub mod package;
pub mod reader;
pub mod rels;
pub mod writer;

pub use document::XlsxDocument;
pub use error::{XlsxError, XlsxResult};
pub use package::XlsxPackage;
pub use reader::XlsxReader;
pub use writer::{XlsxWriter, EMU_PER_PIXEL};
