//! Downloading and validating images
//!
//! Downloads fan out over a bounded stream (`buffer_unordered`) and fan back
//! in with `collect`, so the results map is complete before anyone reads it.
//! A failing URL only ever produces a `None` entry for itself.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use ahash::{AHashMap, AHashSet};
use futures::stream::{self, StreamExt};
use tokio::io::AsyncWriteExt;

use crate::collect::DownloadTask;
use crate::config::EmbedConfig;
use crate::decode::decode_image;
use crate::error::FetchError;
use crate::report::DownloadSummary;

/// URLs already resolved to a valid local file during the current file's pass.
///
/// Owned by whoever processes the file; cleared between files.
#[derive(Debug, Clone, Default)]
pub struct FetchedUrls {
    urls: AHashSet<String>,
}

impl FetchedUrls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn insert(&mut self, url: impl Into<String>) -> bool {
        self.urls.insert(url.into())
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn clear(&mut self) {
        self.urls.clear();
    }
}

/// Outcome of [`Fetcher::fetch_all`]: every submitted URL maps to its local
/// path, or to `None` when no valid image could be obtained
#[derive(Debug, Clone, Default)]
pub struct DownloadResults {
    paths: AHashMap<String, Option<PathBuf>>,
    summary: DownloadSummary,
}

impl DownloadResults {
    /// Local file for `url`, if it was fetched successfully
    pub fn path(&self, url: &str) -> Option<&Path> {
        self.paths.get(url).and_then(|p| p.as_deref())
    }

    /// Whether `url` was part of the submitted tasks
    pub fn contains(&self, url: &str) -> bool {
        self.paths.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn summary(&self) -> DownloadSummary {
        self.summary
    }

    /// URLs with no usable file
    pub fn failed_urls(&self) -> impl Iterator<Item = &str> {
        self.paths
            .iter()
            .filter(|(_, p)| p.is_none())
            .map(|(url, _)| url.as_str())
    }
}

/// How a task obtained its file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    /// Requested over HTTP and validated
    Downloaded(PathBuf),
    /// A valid file was already on disk
    Reused(PathBuf),
}

impl Fetched {
    pub fn path(&self) -> &Path {
        match self {
            Fetched::Downloaded(path) | Fetched::Reused(path) => path,
        }
    }
}

/// HTTP image downloader with bounded concurrency and retry
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    config: EmbedConfig,
}

impl Fetcher {
    pub fn new(config: &EmbedConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.request_timeout);
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Fetch every task, at most `concurrency` at a time, and wait for all of them.
    ///
    /// URLs resolved successfully are added to `fetched`.
    pub async fn fetch_all(
        &self,
        tasks: &[DownloadTask],
        fetched: &mut FetchedUrls,
    ) -> DownloadResults {
        let known: &FetchedUrls = fetched;
        let outcomes: Vec<(&DownloadTask, Result<Fetched, FetchError>)> = stream::iter(tasks)
            .map(|task| {
                let already = known.contains(&task.url);
                async move { (task, self.fetch_one(task, already).await) }
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut results = DownloadResults::default();
        results.summary.requested = tasks.len();
        for (task, outcome) in outcomes {
            let path = match outcome {
                Ok(done) => {
                    match done {
                        Fetched::Downloaded(_) => results.summary.downloaded += 1,
                        Fetched::Reused(_) => results.summary.reused += 1,
                    }
                    fetched.insert(task.url.clone());
                    Some(task.path.clone())
                }
                Err(e) => {
                    tracing::error!(url = %task.url, error = %e, "image download failed");
                    results.summary.failed += 1;
                    None
                }
            };
            results.paths.insert(task.url.clone(), path);
        }
        results
    }

    /// Resolve one task to a valid local image.
    ///
    /// `already_fetched` skips validation when this pass already produced the file.
    pub async fn fetch_one(
        &self,
        task: &DownloadTask,
        already_fetched: bool,
    ) -> Result<Fetched, FetchError> {
        let exists = tokio::fs::try_exists(&task.path).await?;
        if exists && already_fetched {
            return Ok(Fetched::Reused(task.path.clone()));
        }
        if exists {
            match validate_file(task.path.clone()).await {
                Ok(()) => {
                    tracing::debug!(url = %task.url, path = %task.path.display(), "reusing cached image");
                    return Ok(Fetched::Reused(task.path.clone()));
                }
                Err(e) => {
                    tracing::warn!(
                        url = %task.url,
                        path = %task.path.display(),
                        error = %e,
                        "cached image is corrupt, fetching again"
                    );
                    remove_if_exists(&task.path).await?;
                }
            }
        }

        if let Some(parent) = task.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut attempt = 1;
        loop {
            match self.download(task).await {
                Ok(()) => break,
                Err(e) if e.is_transient() && attempt < self.config.max_attempts => {
                    let delay = self.config.backoff_for(attempt);
                    tracing::debug!(
                        url = %task.url,
                        attempt,
                        error = %e,
                        delay_ms = delay.as_millis() as u64,
                        "transient download failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }

        if let Err(e) = validate_file(task.path.clone()).await {
            remove_if_exists(&task.path).await?;
            return Err(e);
        }
        tracing::debug!(url = %task.url, path = %task.path.display(), attempt, "image downloaded");
        Ok(Fetched::Downloaded(task.path.clone()))
    }

    /// One GET, streamed to `<path>.part` and renamed into place when complete
    async fn download(&self, task: &DownloadTask) -> Result<(), FetchError> {
        let mut response = self
            .client
            .get(&task.url)
            .send()
            .await
            .map_err(FetchError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let part = part_path(&task.path);
        let mut file = tokio::fs::File::create(&part).await?;
        let written = async {
            while let Some(chunk) = response.chunk().await.map_err(FetchError::from_transport)? {
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok::<_, FetchError>(())
        }
        .await;
        drop(file);

        match written {
            Ok(()) => {
                tokio::fs::rename(&part, &task.path).await?;
                Ok(())
            }
            Err(e) => {
                remove_if_exists(&part).await?;
                Err(e)
            }
        }
    }
}

/// Read and fully decode `path` off the async runtime
async fn validate_file(path: PathBuf) -> Result<(), FetchError> {
    tokio::task::spawn_blocking(move || {
        let bytes = std::fs::read(&path)?;
        decode_image(&bytes)
            .map(|_| ())
            .map_err(FetchError::InvalidImage)
    })
    .await
    .map_err(|e| FetchError::Join(e.to_string()))?
}

async fn remove_if_exists(path: &Path) -> Result<(), FetchError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}
