//! Processing one workbook: open, collect, download, embed, save
//!
//! The document is owned by exactly one stage at a time. Blocking stages
//! (parsing, decoding, writing) take it onto the blocking pool and hand it
//! back when done.

use std::path::{Path, PathBuf};

use pixsheets_xlsx::{XlsxDocument, XlsxError, XlsxReader, XlsxWriter};

use crate::collect::{collect, CollectedLinks};
use crate::config::{EmbedConfig, OUTPUT_SUFFIX};
use crate::embed::Embedder;
use crate::error::{EmbedError, FetchError, PipelineError};
use crate::fetch::{DownloadResults, Fetcher, FetchedUrls};
use crate::progress::{emit, ProgressSink};
use crate::report::{EmbedOutcome, FileOutcome, FileReport};

/// Runs one input file through the whole embedding process
#[derive(Debug, Clone)]
pub struct WorkbookPipeline {
    config: EmbedConfig,
    fetcher: Fetcher,
}

impl WorkbookPipeline {
    pub fn new(config: EmbedConfig) -> Result<Self, FetchError> {
        let fetcher = Fetcher::new(&config)?;
        Ok(Self { config, fetcher })
    }

    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }

    /// Where the output for `input` is written
    pub fn output_path(&self, input: &Path) -> PathBuf {
        output_path(&self.config.output_dir, input)
    }

    /// Process `sheets` (0-based) of the workbook at `path`.
    ///
    /// Never fails: every problem ends up in the returned report. `fetched`
    /// is this file's dedup set; it comes back holding the URLs resolved
    /// during the pass.
    pub async fn process(
        &self,
        path: &Path,
        sheets: &[usize],
        mut fetched: FetchedUrls,
        progress: &dyn ProgressSink,
    ) -> (FileReport, FetchedUrls) {
        let name = display_name(path);
        let mut report = FileReport::new(path.to_path_buf(), FileOutcome::NoLinks);

        emit(progress, format!("Processing {}", name));
        let document = match open_document(path).await {
            Ok(document) => document,
            Err(e) => {
                tracing::error!(file = %path.display(), error = %e, "cannot open workbook");
                emit(progress, format!("Skipping {}: {}", name, e));
                report.outcome = FileOutcome::OpenFailed(e.to_string());
                return (report, fetched);
            }
        };

        emit(
            progress,
            format!("Collecting image links from {} sheet(s) of {}", sheets.len(), name),
        );
        let links = collect(document.workbook(), sheets, &self.config.image_dir);
        report.counts.sheets_skipped = links.skipped_sheets().len();
        for index in links.skipped_sheets() {
            emit(
                progress,
                format!("Sheet {} does not exist in {}, skipped", index, name),
            );
        }
        if links.is_empty() {
            emit(progress, format!("No image links found in {}", name));
            return (report, fetched);
        }

        emit(
            progress,
            format!(
                "Found {} image link(s) in {} cell(s), downloading",
                links.len(),
                links.cells().len()
            ),
        );
        let results = self.fetcher.fetch_all(links.tasks(), &mut fetched).await;
        report.downloads = results.summary();
        emit(
            progress,
            format!(
                "Downloaded {} of {} image(s), {} failed",
                report.downloads.succeeded(),
                report.downloads.requested,
                report.downloads.failed
            ),
        );

        emit(progress, format!("Embedding images into {} cell(s)", links.cells().len()));
        let thumbnail_box = self.config.thumbnail_box;
        let embedded = tokio::task::spawn_blocking(move || {
            let mut document = document;
            let counts = embed_links(&mut document, &links, &results, thumbnail_box);
            (document, counts)
        })
        .await;
        let (document, counts) = match embedded {
            Ok(done) => done,
            Err(e) => {
                tracing::error!(file = %path.display(), error = %e, "embedding task failed");
                report.outcome = FileOutcome::EmbedFailed(PipelineError::from(e).to_string());
                return (report, fetched);
            }
        };
        report.counts.attempted = counts.attempted;
        report.counts.embedded = counts.embedded;
        report.counts.failed = counts.failed;
        emit(
            progress,
            format!("Embedded {} image(s), {} failed", counts.embedded, counts.failed),
        );

        if counts.embedded == 0 {
            emit(progress, format!("No image embedded in {}, no output written", name));
            report.outcome = FileOutcome::NothingEmbedded;
            return (report, fetched);
        }

        let output = self.output_path(path);
        report.outcome = match save_document(document, output.clone()).await {
            Ok(()) => {
                tracing::info!(file = %path.display(), output = %output.display(), "workbook saved");
                emit(progress, format!("Saved {}", output.display()));
                FileOutcome::Saved(output)
            }
            Err(e) => {
                tracing::error!(file = %path.display(), output = %output.display(), error = %e, "cannot save workbook");
                emit(progress, format!("{}: {}", name, e));
                FileOutcome::SaveFailed(e.to_string())
            }
        };
        (report, fetched)
    }
}

/// `{output_dir}/{stem}_with_images.xlsx`
pub fn output_path(output_dir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workbook".to_string());
    output_dir.join(format!("{}{}.xlsx", stem, OUTPUT_SUFFIX))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Attach every collected cell's image; a cell whose URL has no file counts as failed
fn embed_links(
    document: &mut XlsxDocument,
    links: &CollectedLinks,
    results: &DownloadResults,
    thumbnail_box: u32,
) -> EmbedOutcome {
    let mut embedder = Embedder::new(thumbnail_box);
    let mut counts = EmbedOutcome::default();
    let workbook = document.workbook_mut();

    for cell in links.cells() {
        counts.attempted += 1;
        let outcome = match results.path(&cell.url) {
            Some(image) => embedder
                .embed(workbook, cell.sheet, cell.row, cell.col, image)
                .map(|_| ()),
            None => Err(EmbedError::NotDownloaded(cell.url.clone())),
        };
        match outcome {
            Ok(()) => counts.embedded += 1,
            Err(e) => {
                tracing::error!(
                    sheet = cell.sheet,
                    cell = %cell.address(),
                    url = %cell.url,
                    error = %e,
                    "cannot embed image"
                );
                counts.failed += 1;
            }
        }
    }
    counts
}

async fn open_document(path: &Path) -> Result<XlsxDocument, PipelineError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || XlsxReader::read_file(&path))
        .await?
        .map_err(PipelineError::Open)
}

/// Write to `output` as a plain `.xlsx`, removing whatever partial file a
/// failed write leaves behind
async fn save_document(mut document: XlsxDocument, output: PathBuf) -> Result<(), PipelineError> {
    tokio::task::spawn_blocking(move || {
        let written = document
            .make_plain_xlsx()
            .map(|converted| {
                if converted {
                    tracing::info!(output = %output.display(), "macro-enabled workbook saved as plain xlsx");
                }
            })
            .and_then(|()| {
                output
                    .parent()
                    .map_or(Ok(()), std::fs::create_dir_all)
                    .map_err(XlsxError::from)
            })
            .and_then(|()| XlsxWriter::write_file(&document, &output));
        if written.is_err() && output.exists() {
            if let Err(e) = std::fs::remove_file(&output) {
                tracing::warn!(output = %output.display(), error = %e, "cannot remove partial output");
            }
        }
        written
    })
    .await?
    .map_err(PipelineError::Save)
}
