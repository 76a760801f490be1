//! Prelude module - common imports for pixsheets users
//!
//! ```rust
//! use pixsheets::prelude::*;
//! ```

pub use crate::{
    // Engine
    BatchDriver,
    BatchReport,
    EmbedConfig,
    FileOutcome,
    FileReport,
    SheetSelection,
    WorkbookPipeline,

    // Sheet selection
    select_all,
    sheet_catalog,
    FileSheets,

    // Progress
    NoProgress,
    ProgressSink,

    // Errors
    PreflightError,

    // Documents
    CellValue,
    Workbook,
    XlsxDocument,
    XlsxReader,
    XlsxWriter,
};
