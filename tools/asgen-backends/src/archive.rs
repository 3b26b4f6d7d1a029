//! Streaming access to package archives.
//!
//! Archives are read entry-by-entry on every access instead of being
//! unpacked to disk; package payloads are small enough that re-scanning
//! beats holding extracted trees around. Paths are normalized to absolute
//! form (`./usr/...` and `usr/...` both become `/usr/...`).

use crate::{error, Result};
use flate2::read::GzDecoder;
use snafu::ResultExt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::Archive;

pub struct ArchiveDecompressor {
    path: PathBuf,
}

impl ArchiveDecompressor {
    pub fn new(path: &Path) -> ArchiveDecompressor {
        ArchiveDecompressor {
            path: path.to_path_buf(),
        }
    }

    fn open(&self) -> Result<Archive<Box<dyn Read>>> {
        let file = File::open(&self.path).context(error::ArchiveOpenSnafu { path: &self.path })?;
        let reader: Box<dyn Read> = if self
            .path
            .extension()
            .map(|e| e == "gz" || e == "tgz")
            .unwrap_or(false)
        {
            Box::new(GzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(Archive::new(reader))
    }

    /// List all regular files in the archive, absolute paths.
    pub fn read_contents(&self) -> Result<Vec<String>> {
        let mut archive = self.open()?;
        let mut paths = Vec::new();
        let entries = archive
            .entries()
            .context(error::ArchiveReadSnafu { path: &self.path })?;
        for entry in entries {
            let entry = entry.context(error::ArchiveReadSnafu { path: &self.path })?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let path = entry
                .path()
                .context(error::ArchiveReadSnafu { path: &self.path })?;
            if let Some(normalized) = normalize_path(&path) {
                paths.push(normalized);
            }
        }
        Ok(paths)
    }

    /// Read one file out of the archive by its absolute path.
    pub fn read_data(&self, wanted: &str) -> Result<Vec<u8>> {
        let mut archive = self.open()?;
        let entries = archive
            .entries()
            .context(error::ArchiveReadSnafu { path: &self.path })?;
        for entry in entries {
            let mut entry = entry.context(error::ArchiveReadSnafu { path: &self.path })?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let path = entry
                .path()
                .context(error::ArchiveReadSnafu { path: &self.path })?;
            let Some(normalized) = normalize_path(&path) else {
                continue;
            };
            if normalized == wanted {
                let mut data = Vec::new();
                entry
                    .read_to_end(&mut data)
                    .context(error::ArchiveReadSnafu { path: &self.path })?;
                return Ok(data);
            }
        }
        error::FileNotInArchiveSnafu {
            path: &self.path,
            name: wanted,
        }
        .fail()
    }
}

fn normalize_path(path: &Path) -> Option<String> {
    let raw = path.to_str()?;
    let trimmed = raw.trim_start_matches("./").trim_start_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    Some(format!("/{}", trimmed))
}
