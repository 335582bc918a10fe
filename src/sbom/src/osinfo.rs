//! OS package database scanning face.
//!
//! The assembler asks a [`ContainerScanner`] which layer carries the OS
//! package database and what it contains. [`OsDatabaseScanner`] is a loose
//! built-in implementation that recognizes APK and DPKG databases inside
//! extracted layers; it makes no attempt to reproduce either package manager
//! bit-exactly.

use std::fs;
use std::path::{Path, PathBuf};

use ocibom_core::error::{BomError, Result};
use packageurl::PackageUrl;

use crate::tarball::extract_tarball_to_temp;

/// One entry parsed from an OS package database.
#[derive(Debug, Clone, Default)]
pub struct OsPackageEntry {
    pub package: String,
    pub version: String,
    pub home_page: String,
    pub maintainer_name: String,
    pub maintainer_email: String,
    pub purl: String,
}

impl OsPackageEntry {
    /// Package URL of the entry; empty when one could not be built.
    pub fn package_url(&self) -> &str {
        &self.purl
    }
}

/// Scans container layers for OS package data.
pub trait ContainerScanner: Send + Sync {
    /// Inspect the layers (bottom to top) and return the index of the layer
    /// whose OS database was read together with its entries, or `None` when
    /// no database was found.
    fn read_os_packages(&self, layers: &[PathBuf]) -> Result<Option<(usize, Vec<OsPackageEntry>)>>;
}

/// APK package database path inside a layer.
const APK_DB_PATH: &str = "lib/apk/db/installed";

/// DPKG status file path inside a layer.
const DPKG_STATUS_PATH: &str = "var/lib/dpkg/status";

/// Built-in scanner recognizing APK and DPKG databases.
#[derive(Debug, Default)]
pub struct OsDatabaseScanner;

impl OsDatabaseScanner {
    pub fn new() -> Self {
        Self
    }
}

impl ContainerScanner for OsDatabaseScanner {
    fn read_os_packages(&self, layers: &[PathBuf]) -> Result<Option<(usize, Vec<OsPackageEntry>)>> {
        for (index, layer) in layers.iter().enumerate() {
            let extracted = extract_tarball_to_temp(layer)
                .map_err(|e| BomError::Scan(format!("extracting layer for OS scan: {}", e)))?;

            let apk = extracted.path().join(APK_DB_PATH);
            if apk.is_file() {
                tracing::info!(layer = index, "found APK package database");
                return Ok(Some((index, parse_apk_db(&apk)?)));
            }

            let dpkg = extracted.path().join(DPKG_STATUS_PATH);
            if dpkg.is_file() {
                tracing::info!(layer = index, "found DPKG status database");
                return Ok(Some((index, parse_dpkg_status(&dpkg)?)));
            }
        }
        Ok(None)
    }
}

// "Maintainer Name <email@host>" -> (name, email)
fn split_maintainer(raw: &str) -> (String, String) {
    match raw.split_once('<') {
        Some((name, rest)) => (
            name.trim().to_string(),
            rest.trim_end().trim_end_matches('>').trim().to_string(),
        ),
        None => (raw.trim().to_string(), String::new()),
    }
}

fn os_purl(purl_type: &str, namespace: &str, entry: &OsPackageEntry) -> String {
    let build = || -> Option<String> {
        let mut purl = PackageUrl::new(purl_type, entry.package.clone()).ok()?;
        purl.with_namespace(namespace.to_string());
        if !entry.version.is_empty() {
            purl.with_version(entry.version.clone());
        }
        Some(purl.to_string())
    };
    build().unwrap_or_default()
}

// APK installed database: one-letter keys, stanzas separated by blank lines.
fn parse_apk_db(path: &Path) -> Result<Vec<OsPackageEntry>> {
    let content = fs::read_to_string(path)
        .map_err(|e| BomError::Scan(format!("reading APK database: {}", e)))?;

    let mut entries = Vec::new();
    let mut current = OsPackageEntry::default();

    for line in content.lines().chain(std::iter::once("")) {
        if line.is_empty() {
            if !current.package.is_empty() {
                current.purl = os_purl("apk", "alpine", &current);
                entries.push(std::mem::take(&mut current));
            }
            current = OsPackageEntry::default();
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            match key {
                "P" => current.package = value.to_string(),
                "V" => current.version = value.to_string(),
                "U" => current.home_page = value.to_string(),
                "m" => {
                    let (name, email) = split_maintainer(value);
                    current.maintainer_name = name;
                    current.maintainer_email = email;
                }
                _ => {}
            }
        }
    }

    Ok(entries)
}

// DPKG status file: RFC 822-style stanzas separated by blank lines.
fn parse_dpkg_status(path: &Path) -> Result<Vec<OsPackageEntry>> {
    let content = fs::read_to_string(path)
        .map_err(|e| BomError::Scan(format!("reading DPKG status: {}", e)))?;

    let mut entries = Vec::new();
    let mut current = OsPackageEntry::default();

    for line in content.lines().chain(std::iter::once("")) {
        if line.is_empty() {
            if !current.package.is_empty() {
                current.purl = os_purl("deb", "debian", &current);
                entries.push(std::mem::take(&mut current));
            }
            current = OsPackageEntry::default();
            continue;
        }
        // Continuation lines (leading whitespace) belong to fields we ignore
        if line.starts_with(' ') || line.starts_with('\t') {
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let value = value.trim();
            match key {
                "Package" => current.package = value.to_string(),
                "Version" => current.version = value.to_string(),
                "Homepage" => current.home_page = value.to_string(),
                "Maintainer" => {
                    let (name, email) = split_maintainer(value);
                    current.maintainer_name = name;
                    current.maintainer_email = email;
                }
                _ => {}
            }
        }
    }

    Ok(entries)
}
