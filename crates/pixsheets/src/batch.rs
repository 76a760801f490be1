//! Running the pipeline over a list of files

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::config::EmbedConfig;
use crate::error::{FetchError, PreflightError};
use crate::fetch::FetchedUrls;
use crate::pipeline::{output_path, WorkbookPipeline};
use crate::progress::{emit, ProgressSink};
use crate::report::{BatchReport, FileOutcome, FileReport};

/// Sheets to process per input file, keyed by file name (`a.xlsx`), 0-based
pub type SheetSelection = HashMap<String, Vec<usize>>;

/// Processes files one after another, sharing one HTTP client and image cache
#[derive(Debug, Clone)]
pub struct BatchDriver {
    pipeline: WorkbookPipeline,
    cancel: CancellationToken,
}

impl BatchDriver {
    pub fn new(config: EmbedConfig) -> Result<Self, FetchError> {
        Ok(Self {
            pipeline: WorkbookPipeline::new(config)?,
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &EmbedConfig {
        self.pipeline.config()
    }

    /// Token that stops the batch before the next file is opened
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Check the batch limits without opening any file. Returns the combined
    /// size of the inputs in bytes.
    pub fn preflight(&self, files: &[PathBuf]) -> Result<u64, PreflightError> {
        let config = self.config();
        if files.len() > config.max_files {
            return Err(PreflightError::TooManyFiles {
                count: files.len(),
                limit: config.max_files,
            });
        }

        let mut outputs: HashMap<PathBuf, &PathBuf> = HashMap::with_capacity(files.len());
        for file in files {
            let output = output_path(&config.output_dir, file);
            if let Some(first) = outputs.get(&output) {
                return Err(PreflightError::OutputCollision {
                    first: (*first).clone(),
                    second: file.clone(),
                    output,
                });
            }
            outputs.insert(output, file);
        }

        let mut total: u64 = 0;
        for file in files {
            let metadata = match std::fs::metadata(file) {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return Err(PreflightError::MissingInput(file.clone()))
                }
                Err(source) => {
                    return Err(PreflightError::Unreadable {
                        path: file.clone(),
                        source,
                    })
                }
            };
            if !metadata.is_file() {
                return Err(PreflightError::MissingInput(file.clone()));
            }
            total = total.saturating_add(metadata.len());
        }

        if total > config.max_total_bytes {
            return Err(PreflightError::BatchTooLarge {
                total,
                limit: config.max_total_bytes,
            });
        }
        Ok(total)
    }

    /// Process `files` in order.
    ///
    /// Fails only when pre-flight rejects the batch; per-file problems are in
    /// the returned report. A file without an entry in `selection` (or with
    /// an empty one) is skipped unopened.
    pub async fn run(
        &self,
        files: &[PathBuf],
        selection: &SheetSelection,
        progress: &dyn ProgressSink,
    ) -> Result<BatchReport, PreflightError> {
        let started = Instant::now();
        emit(
            progress,
            format!("Starting batch of {} file(s): {}", files.len(), file_list(files)),
        );

        let total_bytes = match self.preflight(files) {
            Ok(total) => total,
            Err(e) => {
                tracing::error!(error = %e, "batch rejected");
                emit(progress, format!("Batch rejected: {}", e));
                return Err(e);
            }
        };
        tracing::info!(files = files.len(), total_bytes, "pre-flight passed");

        let mut report = BatchReport::default();
        let mut fetched = FetchedUrls::new();

        for (position, file) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                let remaining = &files[position..];
                emit(
                    progress,
                    format!("Batch cancelled, {} file(s) not processed", remaining.len()),
                );
                report.cancelled = true;
                report.files.extend(
                    remaining
                        .iter()
                        .map(|f| FileReport::new(f.clone(), FileOutcome::Cancelled)),
                );
                break;
            }

            let name = file_name(file);
            let Some(sheets) = selection.get(&name).filter(|s| !s.is_empty()) else {
                emit(progress, format!("No sheets selected for {}, skipped", name));
                report
                    .files
                    .push(FileReport::new(file.clone(), FileOutcome::NoSheetsSelected));
                continue;
            };

            tracing::info!(
                file = %file.display(),
                position = position + 1,
                of = files.len(),
                "processing file"
            );
            fetched.clear();
            let (file_report, returned) =
                self.pipeline.process(file, sheets, fetched, progress).await;
            fetched = returned;
            report.files.push(file_report);
        }

        report.elapsed = started.elapsed();
        emit(
            progress,
            format!(
                "Finished: {} file(s) processed, {} output(s) written in {:.2} seconds",
                report.files_processed(),
                report.outputs_produced(),
                report.elapsed.as_secs_f64()
            ),
        );
        Ok(report)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn file_list(files: &[PathBuf]) -> String {
    files
        .iter()
        .map(|f| file_name(f))
        .collect::<Vec<_>>()
        .join(", ")
}
