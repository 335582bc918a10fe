//! Generator options.

use std::path::PathBuf;

/// Options controlling SBOM generation.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Expand tar contents as individual files.
    pub add_tar_files: bool,

    /// Run the layer analyzer plug-in after building each layer package.
    pub analyze_layers: bool,

    /// Run the OS package database scanner on container layers.
    pub scan_images: bool,

    /// Enable license classification for scanned files and Go modules.
    pub scan_licenses: bool,

    /// For Go modules, do not include transitive dependencies.
    pub only_direct_deps: bool,

    /// Extra `.gitignore`-style patterns applied to directory scans.
    pub ignore_patterns: Vec<String>,

    /// Suppress reading `.gitignore` at the scan root.
    pub no_gitignore: bool,

    /// Cache directory handed to the license reader.
    pub license_cache_dir: PathBuf,

    /// License data directory handed to the license reader.
    pub license_data: PathBuf,
}

/// Options for building a package from a tarball.
#[derive(Debug, Clone, Default)]
pub struct TarballOptions {
    /// Directory the archive was extracted to; stripped from stored file
    /// paths so emitted documents are portable.
    pub extract_dir: PathBuf,

    /// Expand the tarball and describe its contents as individual files.
    pub add_files: bool,
}
