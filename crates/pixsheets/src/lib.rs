//! # pixsheets
//!
//! Embed the images that spreadsheet cells point to into the cells themselves.
//!
//! Give the engine a list of `.xlsx` files and the sheets to look at. Every
//! cell whose text is an `http(s)` URL ending in an image extension gets the
//! downloaded image pinned to its top-left corner, shrunk to fit a 100x100
//! pixel box. Each file with at least one embedded picture is written to
//! `excel_with_images/{name}_with_images.xlsx`.
//!
//! ## Features
//!
//! - Link detection on plain string cells (formulas are never followed)
//! - Downloads with bounded concurrency, timeout and retry on 502/503/504
//! - Image validation by full decode, with a reusable on-disk cache
//! - Pictures written into the original package, other parts untouched
//! - Per-file and per-batch reports, progress callback, cooperative cancellation
//!
//! ## Example
//!
//! ```rust,no_run
//! use pixsheets::prelude::*;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let files = vec![std::path::PathBuf::from("products.xlsx")];
//! let selection = select_all(&sheet_catalog(&files));
//!
//! let driver = BatchDriver::new(EmbedConfig::default())?;
//! let report = driver
//!     .run(&files, &selection, &|line: &str| println!("{}", line))
//!     .await?;
//!
//! for path in report.outputs() {
//!     println!("wrote {}", path.display());
//! }
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod catalog;
pub mod classify;
pub mod collect;
pub mod config;
pub mod decode;
pub mod embed;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod prelude;
pub mod progress;
pub mod report;

pub use batch::{BatchDriver, SheetSelection};
pub use catalog::{select_all, sheet_catalog, FileSheets};
pub use classify::{is_image_reference, is_image_url};
pub use collect::{collect, save_path, CollectedLinks, DownloadTask, LinkCell};
pub use config::EmbedConfig;
pub use decode::{decode_image, DecodedImage};
pub use embed::{thumbnail_size, Embedder};
pub use error::{EmbedError, FetchError, PipelineError, PreflightError};
pub use fetch::{DownloadResults, Fetched, Fetcher, FetchedUrls};
pub use pipeline::{output_path, WorkbookPipeline};
pub use progress::{NoProgress, ProgressSink};
pub use report::{BatchReport, DownloadSummary, EmbedOutcome, FileOutcome, FileReport};

// Re-export the document types the engine works on
pub use pixsheets_core::{CellAddress, CellValue, Picture, PictureFormat, Workbook, Worksheet};
pub use pixsheets_xlsx::{XlsxDocument, XlsxError, XlsxPackage, XlsxReader, XlsxWriter};
