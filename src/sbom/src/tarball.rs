//! Tar extraction engine.
//!
//! Streams plain and gzip-compressed tar archives into a temporary directory,
//! skipping OCI whiteout files and refusing entries that would escape the
//! extraction root. Also parses the Docker archive `manifest.json`.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use ocibom_core::error::{BomError, Result};
use serde::{Deserialize, Serialize};
use tar::Archive;
use tempfile::TempDir;

/// Name of the manifest file at the root of a Docker image archive.
pub const ARCHIVE_MANIFEST_FILENAME: &str = "manifest.json";

/// First bytes of a gzip member with deflate compression.
const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

/// Base-name prefix of OCI whiteout entries.
const WHITEOUT_PREFIX: &str = ".wh";

/// The Docker archive manifest entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveManifest {
    #[serde(rename = "Config", default)]
    pub config: String,

    #[serde(rename = "RepoTags", default)]
    pub repo_tags: Vec<String>,

    #[serde(rename = "Layers", default)]
    pub layer_files: Vec<String>,
}

/// A tarball extracted to a temporary directory.
///
/// The directory is owned by this value and removed when it drops, on every
/// exit path of the caller.
#[derive(Debug)]
pub struct ExtractedTarball {
    dir: TempDir,

    /// Number of extracted files (directories and whiteouts excluded).
    pub file_count: usize,
}

impl ExtractedTarball {
    /// Root of the extracted tree.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Extract a tarball to a fresh temporary directory.
///
/// Compression is detected from the first three bytes of the stream.
/// Directory entries are skipped (parents are created from file paths) and
/// whiteout entries are never extracted.
///
/// # Errors
///
/// I/O failures, truncated streams, and path-traversal attempts are fatal;
/// the partial directory is removed when the returned guard would have been.
pub fn extract_tarball_to_temp(tar_path: &Path) -> Result<ExtractedTarball> {
    let dir = tempfile::Builder::new()
        .prefix("spdx-tar-extract-")
        .tempdir()
        .map_err(|e| {
            BomError::Extract(format!(
                "creating temporary directory for tar extraction: {}",
                e
            ))
        })?;

    let mut file = File::open(tar_path)
        .map_err(|e| BomError::Extract(format!("opening tarball {}: {}", tar_path.display(), e)))?;

    let mut sample = [0u8; 3];
    file.read_exact(&mut sample)
        .map_err(|e| BomError::Extract(format!("sampling bytes from file header: {}", e)))?;
    file.seek(SeekFrom::Start(0))
        .map_err(|e| BomError::Extract(format!("rewinding read pointer: {}", e)))?;

    let reader: Box<dyn Read> = if sample == GZIP_MAGIC {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let mut archive = Archive::new(reader);
    let mut file_count = 0usize;

    let entries = archive
        .entries()
        .map_err(|e| BomError::Extract(format!("reading tarfile {}: {}", tar_path.display(), e)))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| {
            BomError::Extract(format!("reading tarfile {}: {}", tar_path.display(), e))
        })?;

        if entry.header().entry_type().is_dir() {
            continue;
        }

        let entry_path = entry
            .path()
            .map_err(|e| BomError::Extract(format!("reading entry path: {}", e)))?
            .into_owned();

        if entry_path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(WHITEOUT_PREFIX))
        {
            tracing::debug!(entry = %entry_path.display(), "skipping whiteout entry");
            continue;
        }

        let dest = sanitize_extract_path(dir.path(), &entry_path)?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                BomError::Extract(format!("creating image directory structure: {}", e))
            })?;
        }

        let size = entry.header().size().map_err(|e| {
            BomError::Extract(format!("reading size of {}: {}", entry_path.display(), e))
        })?;
        let mut out = File::create(&dest)
            .map_err(|e| BomError::Extract(format!("creating image layer file: {}", e)))?;
        let copied = io::copy(&mut entry, &mut out)
            .map_err(|e| BomError::Extract(format!("extracting image data: {}", e)))?;
        if copied != size {
            return Err(BomError::Extract(format!(
                "extracting {}: short read, {} of {} bytes",
                entry_path.display(),
                copied,
                size
            )));
        }

        file_count += 1;
    }

    tracing::info!(
        files = file_count,
        tarball = %tar_path.display(),
        "extracted tarball to temporary directory"
    );

    Ok(ExtractedTarball { dir, file_count })
}

// Zip-Slip guard: the lexically cleaned destination must stay a strict
// descendant of the extraction root.
fn sanitize_extract_path(root: &Path, file_path: &Path) -> Result<PathBuf> {
    let mut dest = root.to_path_buf();
    for component in file_path.components() {
        match component {
            Component::Normal(part) => dest.push(part),
            Component::ParentDir => {
                dest.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    if dest == root || !dest.starts_with(root) {
        return Err(BomError::IllegalPath(file_path.display().to_string()));
    }
    Ok(dest)
}

/// Read the Docker archive manifest from an extracted image root.
pub fn read_archive_manifest(manifest_path: &Path) -> Result<ArchiveManifest> {
    if !manifest_path.exists() {
        return Err(BomError::Manifest(format!(
            "unable to find manifest file {}",
            manifest_path.display()
        )));
    }

    let data = fs::read(manifest_path)
        .map_err(|e| BomError::Manifest(format!("reading archive manifest: {}", e)))?;
    let mut entries: Vec<ArchiveManifest> = serde_json::from_slice(&data)
        .map_err(|e| BomError::Manifest(format!("unmarshalling image manifest: {}", e)))?;

    if entries.is_empty() {
        return Err(BomError::Manifest(
            "image manifest does not contain any entries".to_string(),
        ));
    }
    Ok(entries.remove(0))
}
