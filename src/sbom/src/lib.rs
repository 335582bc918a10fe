//! Ocibom - SPDX package generation for container images and file trees.
//!
//! This crate turns a user reference into a tree of SPDX packages, files and
//! typed relationships:
//!
//! - OCI image references (single images and multi-arch indexes) are resolved
//!   against their registry, downloaded with a bounded number of concurrent
//!   fetches,
//!   and described layer by layer
//! - tar archives are extracted (gzip detected from the stream) and scanned
//! - directory trees are walked with `.gitignore` semantics, every file
//!   hashed and license-classified concurrently
//!
//! The entry point is [`assembler::SbomBuilder`]; one builder produces one
//! document with deterministic, collision-free identifiers.

pub mod assembler;
pub mod gomod;
pub mod ids;
pub mod license;
pub mod oci;
pub mod options;
pub mod osinfo;
pub mod package;
pub mod scan;
pub mod tarball;

// Re-export the commonly used surface
pub use assembler::{LayerAnalyzer, NoopLayerAnalyzer, SbomBuilder};
pub use gomod::{go_dependencies, GoDependency, GoModFileResolver, GoModuleResolver};
pub use ids::IdRegistry;
pub use license::{License, LicenseMatch, LicenseReader, ReaderOptions, TagReader};
pub use oci::{
    pull_images_to_archive, purl_from_image, resolve, ContentDigest, DistributionClient,
    ImageReference, ImageReferenceInfo, IndexEntry, ReferenceKind, RegistryAuth, RegistryClient,
    RemoteDescriptor, RemoteManifest, DOWNLOAD_WORKERS,
};
pub use options::{Options, TarballOptions};
pub use osinfo::{ContainerScanner, OsDatabaseScanner, OsPackageEntry};
pub use package::{
    Checksums, ExternalRef, FileData, ObjectOptions, Package, Relationship, RelationshipKind,
    RelationshipTarget, Supplier, NOASSERTION, NONE,
};
pub use scan::{apply_ignore_patterns, directory_tree, ignore_patterns, scan_directory, SCAN_WORKERS};
pub use tarball::{
    extract_tarball_to_temp, read_archive_manifest, ArchiveManifest, ExtractedTarball,
    ARCHIVE_MANIFEST_FILENAME,
};

/// Ocibom version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
