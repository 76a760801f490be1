//! Engine configuration

use std::path::PathBuf;
use std::time::Duration;

/// Most files accepted in one batch
pub const DEFAULT_MAX_FILES: usize = 10;

/// Largest combined size of a batch's input files (500 MiB)
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 500 * 1024 * 1024;

/// Downloads running at once within one file
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Requests made for one URL before giving up on transient errors
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Pause before the first retry; doubles for each further retry
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Side of the square images are shrunk to fit into, in pixels
pub const DEFAULT_THUMBNAIL_BOX: u32 = 100;

/// Cache directory for downloaded images
pub const DEFAULT_IMAGE_DIR: &str = "downloaded_images";

/// Directory receiving the rewritten workbooks
pub const DEFAULT_OUTPUT_DIR: &str = "excel_with_images";

/// Suffix appended to an input's file stem to name its output
pub const OUTPUT_SUFFIX: &str = "_with_images";

/// Settings for a batch run
#[derive(Debug, Clone)]
pub struct EmbedConfig {
    /// Pre-flight: most input files per batch
    pub max_files: usize,
    /// Pre-flight: largest combined input size in bytes
    pub max_total_bytes: u64,
    /// Concurrent downloads within one file
    pub concurrency: usize,
    /// Timeout applied to each HTTP request
    pub request_timeout: Duration,
    /// Total requests per URL when the server keeps answering 502/503/504
    pub max_attempts: u32,
    /// Base delay between attempts
    pub retry_backoff: Duration,
    /// Where downloaded images are cached, shared by every file of a batch
    pub image_dir: PathBuf,
    /// Where `{stem}_with_images.xlsx` files are written
    pub output_dir: PathBuf,
    /// Bounding box (pixels) embedded images are shrunk into
    pub thumbnail_box: u32,
    /// Honor `HTTP(S)_PROXY` environment variables
    pub use_system_proxy: bool,
    /// `User-Agent` header sent with downloads
    pub user_agent: String,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            max_files: DEFAULT_MAX_FILES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
            concurrency: DEFAULT_CONCURRENCY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            image_dir: PathBuf::from(DEFAULT_IMAGE_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            thumbnail_box: DEFAULT_THUMBNAIL_BOX,
            use_system_proxy: true,
            user_agent: concat!("pixsheets/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl EmbedConfig {
    /// Delay before retry number `retry` (1-based)
    pub fn backoff_for(&self, retry: u32) -> Duration {
        self.retry_backoff
            .saturating_mul(1u32 << retry.saturating_sub(1).min(16))
    }
}
