//! Error types for the embedding engine
//!
//! Only [`PreflightError`] ever stops a batch. The other errors are recorded
//! against the URL, cell or file they concern and the work moves on.

use std::path::PathBuf;

use thiserror::Error;

/// Batch-wide precondition failures, raised before any file is opened
#[derive(Debug, Error)]
pub enum PreflightError {
    /// More input files than the configured maximum
    #[error("too many files: {count} selected, at most {limit} allowed")]
    TooManyFiles { count: usize, limit: usize },

    /// Combined size of the inputs exceeds the configured maximum
    #[error("batch too large: {total} bytes selected, at most {limit} allowed")]
    BatchTooLarge { total: u64, limit: u64 },

    /// An input path does not exist or is not a regular file
    #[error("input file not found: {}", .0.display())]
    MissingInput(PathBuf),

    /// Two inputs would be written to the same output file
    #[error("{} and {} would both be written to {}", .first.display(), .second.display(), .output.display())]
    OutputCollision {
        first: PathBuf,
        second: PathBuf,
        output: PathBuf,
    },

    /// An input path exists but its metadata cannot be read
    #[error("cannot read input file {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why one URL could not be turned into a valid local image
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered with a non-success status
    #[error("HTTP status {0}")]
    Status(u16),

    /// The request did not complete within the timeout
    #[error("request timed out")]
    Timeout,

    /// No connection could be established
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other transport failure
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Writing or removing the cached file failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The downloaded bytes are not a decodable image
    #[error("not a valid image: {0}")]
    InvalidImage(String),

    /// A blocking decode task panicked or was cancelled
    #[error("background task failed: {0}")]
    Join(String),
}

impl FetchError {
    /// Whether another attempt may succeed (502/503/504, timeouts, refused connections)
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Status(code) => matches!(code, 502 | 503 | 504),
            FetchError::Timeout | FetchError::Connect(_) => true,
            _ => false,
        }
    }

    /// Map a transport error onto the retry-relevant variants
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_connect() {
            FetchError::Connect(err.to_string())
        } else {
            FetchError::Request(err)
        }
    }
}

/// Why one cell did not receive its picture
#[derive(Debug, Error)]
pub enum EmbedError {
    /// The URL has no downloaded file
    #[error("image for {0} was not downloaded")]
    NotDownloaded(String),

    /// The image file is gone
    #[error("image file not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// The image file could not be read
    #[error("cannot read image file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The image file is not a decodable raster image
    #[error("cannot decode image {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    /// The sheet index does not exist in the workbook
    #[error("sheet index {index} out of range ({count} sheets)")]
    SheetOutOfRange { index: usize, count: usize },

    /// The picture could not be placed on the sheet
    #[error("cannot attach picture: {0}")]
    Attach(#[from] pixsheets_core::Error),
}

/// Why one file produced no output
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The workbook could not be opened
    #[error("cannot open workbook: {0}")]
    Open(#[source] pixsheets_xlsx::XlsxError),

    /// The rewritten workbook could not be written
    #[error("cannot save workbook: {0}")]
    Save(#[source] pixsheets_xlsx::XlsxError),

    /// A blocking task panicked or was cancelled
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
