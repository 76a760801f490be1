//! Raw OPC package: every ZIP part of an XLSX file, kept in archive order.
//!
//! Parts the writer does not touch are emitted byte-for-byte, so styles,
//! charts, comments and anything else this crate does not model survive a
//! read/write cycle.

use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;

use crate::error::{XlsxError, XlsxResult};

/// Largest uncompressed part accepted from an archive
pub const MAX_PART_SIZE: u64 = 512 * 1024 * 1024;

/// One named part of the package
#[derive(Debug, Clone)]
struct Part {
    name: String,
    data: Vec<u8>,
}

/// All parts of an XLSX archive
#[derive(Debug, Clone, Default)]
pub struct XlsxPackage {
    parts: Vec<Part>,
}

impl XlsxPackage {
    /// Create an empty package
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every file entry of a ZIP archive
    pub fn from_archive<R: Read + Seek>(reader: R) -> XlsxResult<Self> {
        Self::from_archive_limited(reader, MAX_PART_SIZE)
    }

    /// Load every file entry, failing on any entry that inflates past `limit` bytes.
    ///
    /// The sizes declared in the archive headers are not trusted.
    pub(crate) fn from_archive_limited<R: Read + Seek>(reader: R, limit: u64) -> XlsxResult<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut parts = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().trim_start_matches('/').to_string();
            let mut data = Vec::new();
            (&mut entry).take(limit + 1).read_to_end(&mut data)?;
            if data.len() as u64 > limit {
                return Err(XlsxError::InvalidFormat(format!(
                    "part {} is larger than {} bytes",
                    name, limit
                )));
            }
            parts.push(Part { name, data });
        }

        Ok(Self { parts })
    }

    /// Number of parts
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// Check if the package has no parts
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Part names in archive order
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name.as_str())
    }

    /// Bytes of a part. Part names compare case-insensitively, as OPC requires.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.position(name).map(|i| self.parts[i].data.as_slice())
    }

    /// Check if a part exists
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Replace a part's bytes, or append it when it does not exist yet
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.position(name) {
            Some(i) => self.parts[i].data = data,
            None => self.parts.push(Part {
                name: name.trim_start_matches('/').to_string(),
                data,
            }),
        }
    }

    /// Remove a part, returning whether it existed
    pub fn remove_part(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(i) => {
                self.parts.remove(i);
                true
            }
            None => false,
        }
    }

    /// Highest `N` among parts named `{prefix}N{suffix}` (0 when none).
    ///
    /// `suffix` of `None` accepts any extension, which is how media parts
    /// (`xl/media/image3.png`, `xl/media/image4.jpeg`) share a counter.
    pub fn max_numbered(&self, prefix: &str, suffix: Option<&str>) -> u32 {
        self.parts
            .iter()
            .filter_map(|p| p.name.strip_prefix(prefix))
            .filter_map(|rest| {
                let digits = match suffix {
                    Some(suffix) => rest.strip_suffix(suffix)?,
                    None => rest.split('.').next()?,
                };
                digits.parse::<u32>().ok()
            })
            .max()
            .unwrap_or(0)
    }

    /// Write all parts to a file
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> XlsxResult<()> {
        let file = File::create(path)?;
        self.write(file)
    }

    /// Write all parts as a ZIP archive
    pub fn write<W: Write + Seek>(&self, writer: W) -> XlsxResult<()> {
        let mut zip = zip::ZipWriter::new(writer);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        for part in &self.parts {
            zip.start_file(part.name.as_str(), options)?;
            zip.write_all(&part.data)?;
        }

        zip.finish()?;
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        let name = name.trim_start_matches('/');
        self.parts
            .iter()
            .position(|p| p.name == name)
            .or_else(|| {
                self.parts
                    .iter()
                    .position(|p| p.name.eq_ignore_ascii_case(name))
            })
    }
}

/// Path of the relationships part belonging to `part`.
///
/// `xl/worksheets/sheet1.xml` -> `xl/worksheets/_rels/sheet1.xml.rels`
pub fn rels_path_for(part: &str) -> String {
    let part = part.trim_start_matches('/');
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target against the part that owns the relationship.
///
/// Absolute targets (`/xl/worksheets/sheet1.xml`) are taken from the package
/// root; relative ones (`../drawings/drawing1.xml`) from the source part's
/// directory.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return normalize(absolute);
    }
    let base = source_part
        .trim_start_matches('/')
        .rsplit_once('/')
        .map(|(dir, _)| dir)
        .unwrap_or("");
    if base.is_empty() {
        normalize(target)
    } else {
        normalize(&format!("{}/{}", base, target))
    }
}

/// Target string that reaches `target_part` from `source_part`'s directory
pub fn relative_target(source_part: &str, target_part: &str) -> String {
    let source_dir: Vec<&str> = match source_part.trim_start_matches('/').rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let target: Vec<&str> = target_part.trim_start_matches('/').split('/').collect();

    let common = source_dir
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count()
        .min(target.len().saturating_sub(1));

    let mut segments: Vec<&str> = std::iter::repeat("..")
        .take(source_dir.len() - common)
        .collect();
    segments.extend_from_slice(&target[common..]);
    segments.join("/")
}

fn normalize(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            s => out.push(s),
        }
    }
    out.join("/")
}
