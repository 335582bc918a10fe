//! License classification face.
//!
//! The pipeline only needs two operations from a license reader: classify a
//! single file and classify the top of a directory tree. The heavyweight
//! classifier corpus stays outside; [`TagReader`] is a small built-in
//! implementation good enough for SPDX-tagged sources and conventionally
//! named license files.

use std::fs;
use std::path::{Path, PathBuf};

use ocibom_core::error::{BomError, Result};

/// A classified license.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct License {
    /// Stable SPDX license identifier, e.g. `Apache-2.0`.
    pub license_id: String,
}

/// A license found for a directory.
#[derive(Debug, Clone)]
pub struct LicenseMatch {
    pub license: License,

    /// File the match was derived from.
    pub file: PathBuf,
}

/// Construction options for a license reader.
#[derive(Debug, Clone, Default)]
pub struct ReaderOptions {
    /// Directory for classifier caches.
    pub cache_dir: PathBuf,

    /// Directory holding license data.
    pub license_dir: PathBuf,
}

/// License classification operations consumed by the scanner and assembler.
pub trait LicenseReader: Send + Sync {
    /// Classify the license governing a directory tree.
    ///
    /// Absence of a match is not an error.
    fn read_top_license(&self, path: &Path) -> Result<Option<LicenseMatch>>;

    /// Classify the license of a single file.
    fn license_from_file(&self, path: &Path) -> Result<Option<License>>;
}

/// How much of a file the tag scan reads.
const TAG_SCAN_BYTES: usize = 16 * 1024;

/// File names probed for a directory's license, in order.
const LICENSE_FILE_NAMES: &[&str] = &[
    "LICENSE",
    "LICENSE.txt",
    "LICENSE.md",
    "COPYING",
    "COPYING.txt",
];

// Well-known license headers and the identifiers they imply.
const HEADER_TABLE: &[(&str, &str)] = &[
    ("Apache License", "Apache-2.0"),
    ("MIT License", "MIT"),
    ("Mozilla Public License", "MPL-2.0"),
    ("ISC License", "ISC"),
    ("GNU GENERAL PUBLIC LICENSE", "GPL-3.0-only"),
    ("GNU LESSER GENERAL PUBLIC LICENSE", "LGPL-3.0-only"),
    ("Redistribution and use in source and binary forms", "BSD-3-Clause"),
];

/// Built-in reader that recognizes `SPDX-License-Identifier` tags and
/// well-known license file headers.
pub struct TagReader {
    #[allow(dead_code)]
    options: ReaderOptions,
}

impl TagReader {
    /// Create a reader, preparing its cache directory when one is configured.
    pub fn new(options: ReaderOptions) -> Result<Self> {
        if !options.cache_dir.as_os_str().is_empty() && !options.cache_dir.exists() {
            fs::create_dir_all(&options.cache_dir).map_err(|e| {
                BomError::License(format!(
                    "creating license cache directory {}: {}",
                    options.cache_dir.display(),
                    e
                ))
            })?;
        }
        Ok(Self { options })
    }

    fn scan_prefix(&self, path: &Path) -> Result<String> {
        let data = fs::read(path)
            .map_err(|e| BomError::License(format!("reading {}: {}", path.display(), e)))?;
        let prefix = &data[..data.len().min(TAG_SCAN_BYTES)];
        Ok(String::from_utf8_lossy(prefix).into_owned())
    }

    fn tag_in_text(text: &str) -> Option<License> {
        for line in text.lines() {
            if let Some(pos) = line.find("SPDX-License-Identifier:") {
                let id = line[pos + "SPDX-License-Identifier:".len()..]
                    .trim()
                    .trim_end_matches("*/")
                    .trim_end_matches("-->")
                    .trim();
                if !id.is_empty() {
                    return Some(License {
                        license_id: id.to_string(),
                    });
                }
            }
        }
        None
    }

    fn header_in_text(text: &str) -> Option<License> {
        let head: String = text.lines().take(20).collect::<Vec<_>>().join("\n");
        for (needle, id) in HEADER_TABLE {
            if head.contains(needle) {
                return Some(License {
                    license_id: (*id).to_string(),
                });
            }
        }
        None
    }
}

impl LicenseReader for TagReader {
    fn read_top_license(&self, path: &Path) -> Result<Option<LicenseMatch>> {
        for name in LICENSE_FILE_NAMES {
            let candidate = path.join(name);
            if !candidate.is_file() {
                continue;
            }
            let text = self.scan_prefix(&candidate)?;
            if let Some(license) = Self::tag_in_text(&text).or_else(|| Self::header_in_text(&text))
            {
                return Ok(Some(LicenseMatch {
                    license,
                    file: candidate,
                }));
            }
        }
        Ok(None)
    }

    fn license_from_file(&self, path: &Path) -> Result<Option<License>> {
        let text = self.scan_prefix(path)?;
        Ok(Self::tag_in_text(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn reader() -> TagReader {
        TagReader::new(ReaderOptions::default()).unwrap()
    }

    #[test]
    fn test_license_from_file_spdx_tag() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("main.rs");
        fs::write(&path, "// SPDX-License-Identifier: Apache-2.0\nfn main() {}\n").unwrap();

        let license = reader().license_from_file(&path).unwrap().unwrap();
        assert_eq!(license.license_id, "Apache-2.0");
    }

    #[test]
    fn test_license_from_file_block_comment_tag() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("lib.c");
        fs::write(&path, "/* SPDX-License-Identifier: MIT */\n").unwrap();

        let license = reader().license_from_file(&path).unwrap().unwrap();
        assert_eq!(license.license_id, "MIT");
    }

    #[test]
    fn test_license_from_file_no_match() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.bin");
        fs::write(&path, [0u8, 159, 146, 150]).unwrap();

        assert!(reader().license_from_file(&path).unwrap().is_none());
    }

    #[test]
    fn test_read_top_license_from_header() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("LICENSE"),
            "                              Apache License\n                        Version 2.0, January 2004\n",
        )
        .unwrap();

        let m = reader().read_top_license(tmp.path()).unwrap().unwrap();
        assert_eq!(m.license.license_id, "Apache-2.0");
        assert!(m.file.ends_with("LICENSE"));
    }

    #[test]
    fn test_read_top_license_absent_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        assert!(reader().read_top_license(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn test_cache_dir_is_created() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache/licenses");
        TagReader::new(ReaderOptions {
            cache_dir: cache.clone(),
            license_dir: PathBuf::new(),
        })
        .unwrap();
        assert!(cache.is_dir());
    }
}
