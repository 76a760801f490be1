//! Outcomes reported per file and per batch

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Per-file embedding counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmbedOutcome {
    /// Cells whose value classified as an image URL
    pub attempted: usize,
    /// Cells that received their picture
    pub embedded: usize,
    /// Cells that did not (download failed, decode failed, attach failed)
    pub failed: usize,
    /// Requested sheet indices that do not exist in the workbook
    pub sheets_skipped: usize,
}

/// Per-file download counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    /// Distinct URLs submitted
    pub requested: usize,
    /// Fetched over the network and validated
    pub downloaded: usize,
    /// Already on disk and valid, no request made
    pub reused: usize,
    /// No usable image
    pub failed: usize,
}

impl DownloadSummary {
    /// URLs with a usable local file
    pub fn succeeded(&self) -> usize {
        self.downloaded + self.reused
    }
}

/// How processing one input file ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// The rewritten workbook was written here
    Saved(PathBuf),
    /// Links were found but no picture could be embedded; nothing written
    NothingEmbedded,
    /// The selected sheets contain no image links; nothing written
    NoLinks,
    /// The caller selected no sheets for this file; it was not opened
    NoSheetsSelected,
    /// The workbook could not be opened
    OpenFailed(String),
    /// The embedding stage itself broke down
    EmbedFailed(String),
    /// Writing the output failed
    SaveFailed(String),
    /// The batch was cancelled before this file was reached
    Cancelled,
}

impl FileOutcome {
    /// Whether an output file was produced
    pub fn is_saved(&self) -> bool {
        matches!(self, FileOutcome::Saved(_))
    }

    /// Whether the file went through the pipeline (skipped and cancelled files did not)
    pub fn was_processed(&self) -> bool {
        !matches!(self, FileOutcome::NoSheetsSelected | FileOutcome::Cancelled)
    }
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileOutcome::Saved(path) => write!(f, "saved to {}", path.display()),
            FileOutcome::NothingEmbedded => f.write_str("no image embedded, no output"),
            FileOutcome::NoLinks => f.write_str("no image links found"),
            FileOutcome::NoSheetsSelected => f.write_str("no sheets selected"),
            FileOutcome::OpenFailed(reason)
            | FileOutcome::EmbedFailed(reason)
            | FileOutcome::SaveFailed(reason) => f.write_str(reason),
            FileOutcome::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// What happened to one input file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub file: PathBuf,
    pub outcome: FileOutcome,
    pub counts: EmbedOutcome,
    pub downloads: DownloadSummary,
}

impl FileReport {
    pub(crate) fn new(file: PathBuf, outcome: FileOutcome) -> Self {
        Self {
            file,
            outcome,
            counts: EmbedOutcome::default(),
            downloads: DownloadSummary::default(),
        }
    }
}

/// Totals for a whole batch
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// One entry per input file, in input order
    pub files: Vec<FileReport>,
    /// Wall-clock time from pre-flight to the last file
    pub elapsed: Duration,
    /// The cancel token fired before every file was processed
    pub cancelled: bool,
}

impl BatchReport {
    /// Files that went through the pipeline
    pub fn files_processed(&self) -> usize {
        self.files
            .iter()
            .filter(|r| r.outcome.was_processed())
            .count()
    }

    /// Files with an output written
    pub fn outputs_produced(&self) -> usize {
        self.files.iter().filter(|r| r.outcome.is_saved()).count()
    }

    /// Paths of the written outputs
    pub fn outputs(&self) -> impl Iterator<Item = &PathBuf> {
        self.files.iter().filter_map(|r| match &r.outcome {
            FileOutcome::Saved(path) => Some(path),
            _ => None,
        })
    }
}
