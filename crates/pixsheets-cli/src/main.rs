//! Pixsheets CLI - embed images referenced by URL into spreadsheet cells

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use pixsheets::config::{
    DEFAULT_CONCURRENCY, DEFAULT_IMAGE_DIR, DEFAULT_MAX_FILES, DEFAULT_OUTPUT_DIR,
};
use pixsheets::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "pixsheets")]
#[command(
    author,
    version,
    about = "Embed the images that spreadsheet cells link to"
)]
struct Cli {
    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download linked images and write `<name>_with_images.xlsx` copies
    Embed {
        /// Input workbooks (.xlsx)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Sheets to process for one file, e.g. `products.xlsx=0,2`.
        /// Files without an entry are processed on every sheet.
        #[arg(long = "sheets", value_name = "FILE=INDEXES", value_parser = parse_sheet_spec)]
        sheets: Vec<(String, Vec<usize>)>,

        /// Directory receiving the rewritten workbooks
        #[arg(long, env = "PIXSHEETS_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,

        /// Directory caching downloaded images
        #[arg(long, env = "PIXSHEETS_IMAGE_DIR", default_value = DEFAULT_IMAGE_DIR)]
        image_dir: PathBuf,

        /// Downloads running at once
        #[arg(long, env = "PIXSHEETS_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,

        /// Per-request timeout in seconds
        #[arg(long, env = "PIXSHEETS_TIMEOUT_SECS", default_value_t = 10)]
        timeout_secs: u64,

        /// Most files accepted in one run
        #[arg(long, env = "PIXSHEETS_MAX_FILES", default_value_t = DEFAULT_MAX_FILES)]
        max_files: usize,

        /// Largest combined input size in MiB
        #[arg(long, env = "PIXSHEETS_MAX_TOTAL_MB", default_value_t = 500)]
        max_total_mb: u64,
    },

    /// List the sheets of each workbook
    Sheets {
        /// Input workbooks (.xlsx)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Embed {
            files,
            sheets,
            output_dir,
            image_dir,
            concurrency,
            timeout_secs,
            max_files,
            max_total_mb,
        } => {
            let config = EmbedConfig {
                max_files,
                max_total_bytes: max_total_mb.saturating_mul(1024 * 1024),
                concurrency: concurrency.max(1),
                request_timeout: Duration::from_secs(timeout_secs),
                image_dir,
                output_dir,
                ..EmbedConfig::default()
            };
            embed(&files, sheets, config).await
        }
        Commands::Sheets { files } => list_sheets(&files),
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn embed(
    files: &[PathBuf],
    explicit: Vec<(String, Vec<usize>)>,
    config: EmbedConfig,
) -> Result<()> {
    let driver = BatchDriver::new(config).context("Failed to create HTTP client")?;
    let selection = prepare(&driver, files, explicit)?;
    tracing::debug!(config = ?driver.config(), ?selection, "starting batch");

    let cancel = driver.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, stopping after the current file");
            cancel.cancel();
        }
    });

    let report = driver
        .run(files, &selection, &|line: &str| println!("{}", line))
        .await
        .context("Batch rejected")?;

    println!();
    for file in &report.files {
        println!("{}: {}", file.file.display(), file.outcome);
        if file.counts.attempted > 0 {
            println!(
                "    {} embedded, {} failed, {} image(s) downloaded, {} reused",
                file.counts.embedded,
                file.counts.failed,
                file.downloads.downloaded,
                file.downloads.reused
            );
        }
    }
    Ok(())
}

/// Reject the batch before any workbook is opened, then pick its sheets
fn prepare(
    driver: &BatchDriver,
    files: &[PathBuf],
    explicit: Vec<(String, Vec<usize>)>,
) -> Result<SheetSelection> {
    driver.preflight(files).context("Batch rejected")?;
    Ok(build_selection(files, explicit))
}

/// Explicit `--sheets` entries, plus every sheet of each file without one
fn build_selection(files: &[PathBuf], explicit: Vec<(String, Vec<usize>)>) -> SheetSelection {
    let mut selection: SheetSelection = explicit.into_iter().collect();
    let unselected: Vec<&PathBuf> = files
        .iter()
        .filter(|f| !selection.contains_key(&file_key(f)))
        .collect();
    for (key, sheets) in select_all(&sheet_catalog(&unselected)) {
        selection.entry(key).or_insert(sheets);
    }
    selection
}

fn file_key(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn list_sheets(files: &[PathBuf]) -> Result<()> {
    let catalog = sheet_catalog(files);
    for file in files {
        let Some(entry) = catalog.iter().find(|e| &e.file == file) else {
            eprintln!("{}: cannot be read", file.display());
            continue;
        };
        println!("{}", file.display());
        for (index, name) in &entry.sheets {
            println!("  {}\t{}", index, name);
        }
    }
    Ok(())
}

/// Parse `name.xlsx=0,2` into the file name and its sheet indexes
fn parse_sheet_spec(spec: &str) -> std::result::Result<(String, Vec<usize>), String> {
    let (name, indexes) = spec
        .rsplit_once('=')
        .ok_or_else(|| format!("expected FILE=INDEXES, got '{}'", spec))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing file name in '{}'", spec));
    }
    let indexes = indexes
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| format!("invalid sheet index '{}' in '{}'", s, spec))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let key = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    Ok((key, indexes))
}
