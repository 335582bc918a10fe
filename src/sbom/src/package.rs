//! SPDX entity model.
//!
//! Packages, files, and the typed relationships between them. A package owns
//! its files and sub-packages; relationship back-edges reference their peer by
//! identifier only, so a multi-arch index and its variants never form an
//! owning cycle.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use ocibom_core::error::{BomError, Result};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use uuid::Uuid;

/// SPDX tag for "no license information".
pub const NONE: &str = "NONE";

/// SPDX tag for "no assertion is made".
pub const NOASSERTION: &str = "NOASSERTION";

/// Per-object rendering options.
#[derive(Debug, Clone, Default)]
pub struct ObjectOptions {
    /// Prefix stripped from stored paths when the document is emitted.
    pub work_dir: PathBuf,

    /// Name prefix for identifiers derived from this object.
    pub prefix: String,
}

/// Content hashes of a file or package source.
#[derive(Debug, Clone, Default)]
pub struct Checksums {
    pub sha1: Option<String>,
    pub sha256: Option<String>,
    pub sha512: Option<String>,
}

/// Supplier of a package.
#[derive(Debug, Clone, Default)]
pub struct Supplier {
    pub person: Option<String>,
    pub organization: Option<String>,
}

/// An external reference attached to a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalRef {
    pub category: String,
    pub ref_type: String,
    pub locator: String,
}

impl ExternalRef {
    /// A `(PACKAGE-MANAGER, purl)` reference.
    pub fn purl(locator: impl Into<String>) -> Self {
        Self {
            category: "PACKAGE-MANAGER".to_string(),
            ref_type: "purl".to_string(),
            locator: locator.into(),
        }
    }
}

/// Relationship taxonomy used by the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    Contains,
    VariantOf,
    DependsOn,
    Describes,
}

impl std::fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Contains => "CONTAINS",
            Self::VariantOf => "VARIANT_OF",
            Self::DependsOn => "DEPENDS_ON",
            Self::Describes => "DESCRIBES",
        };
        write!(f, "{}", s)
    }
}

/// Peer of a relationship.
///
/// Forward edges that should be rendered inline own their peer; back-edges
/// carry the peer's identifier only (weak reference).
#[derive(Debug, Clone)]
pub enum RelationshipTarget {
    Package(Box<Package>),
    Ref(String),
}

/// Typed directed edge between two packages.
#[derive(Debug, Clone)]
pub struct Relationship {
    pub kind: RelationshipKind,
    pub target: RelationshipTarget,

    /// Emit the peer's whole sub-tree inline.
    pub full_render: bool,

    pub comment: Option<String>,
}

/// A file described by a package.
#[derive(Debug, Clone, Default)]
pub struct FileData {
    pub id: String,

    /// Path relative to the work dir; never contains `..` segments.
    pub path: PathBuf,

    pub checksums: Checksums,
    pub license_info_in_file: String,
    pub license_concluded: String,
    pub options: ObjectOptions,
}

impl FileData {
    pub fn new() -> Self {
        Self {
            license_info_in_file: NONE.to_string(),
            ..Self::default()
        }
    }

    /// Hash the file at `path` in a single read pass.
    pub fn read_source_file(&mut self, path: &Path) -> Result<()> {
        self.checksums = hash_file(path)?;
        Ok(())
    }
}

/// An SPDX package.
#[derive(Debug, Clone)]
pub struct Package {
    pub id: String,
    pub name: String,
    pub version: String,
    pub download_location: String,
    pub home_page: String,
    pub license_concluded: String,
    pub supplier: Supplier,
    pub files_analyzed: bool,

    /// Hashes of the source artifact this package was built from.
    pub checksums: Checksums,
    pub source_file: Option<PathBuf>,

    pub external_refs: Vec<ExternalRef>,
    pub files: Vec<FileData>,
    pub packages: Vec<Package>,
    pub relationships: Vec<Relationship>,
    pub options: ObjectOptions,
}

impl Default for Package {
    fn default() -> Self {
        Self::new()
    }
}

impl Package {
    /// Create an empty package with a fresh random identifier.
    ///
    /// Callers that need reproducible documents replace the identifier with
    /// one minted by [`crate::ids::IdRegistry`].
    pub fn new() -> Self {
        Self {
            id: format!("SPDXRef-Package-{}", Uuid::new_v4()),
            name: String::new(),
            version: String::new(),
            download_location: String::new(),
            home_page: String::new(),
            license_concluded: String::new(),
            supplier: Supplier::default(),
            files_analyzed: false,
            checksums: Checksums::default(),
            source_file: None,
            external_refs: Vec::new(),
            files: Vec::new(),
            packages: Vec::new(),
            relationships: Vec::new(),
            options: ObjectOptions::default(),
        }
    }

    /// Add a file to the package.
    pub fn add_file(&mut self, file: FileData) {
        self.files.push(file);
    }

    /// Nest a sub-package, rejecting identifier collisions.
    pub fn add_package(&mut self, pkg: Package) -> Result<()> {
        if pkg.id.is_empty() {
            return Err(BomError::Other(
                "refusing to add a sub-package without an identifier".to_string(),
            ));
        }
        if self.packages.iter().any(|p| p.id == pkg.id) {
            return Err(BomError::Other(format!(
                "sub-package identifier {} already present in {}",
                pkg.id, self.id
            )));
        }
        self.packages.push(pkg);
        Ok(())
    }

    /// Add a relationship to a peer package.
    ///
    /// `VARIANT_OF` edges are back-edges and must reference their peer by
    /// identifier; owning the peer there would create a cycle with the
    /// forward `CONTAINS` edge.
    pub fn add_relationship(&mut self, rel: Relationship) -> Result<()> {
        if rel.kind == RelationshipKind::VariantOf {
            if let RelationshipTarget::Package(_) = rel.target {
                return Err(BomError::Other(
                    "VARIANT_OF relationships must reference their peer by identifier"
                        .to_string(),
                ));
            }
        }
        self.relationships.push(rel);
        Ok(())
    }

    /// Hash the source artifact this package describes.
    ///
    /// Sets the package checksums and, when the package has no name yet, the
    /// base name of the source file.
    pub fn read_source_file(&mut self, path: &Path) -> Result<()> {
        self.checksums = hash_file(path)?;
        self.source_file = Some(path.to_path_buf());
        if self.name.is_empty() {
            if let Some(base) = path.file_name().and_then(|n| n.to_str()) {
                self.name = base.to_string();
            }
        }
        Ok(())
    }

    /// SPDX package verification code: SHA-1 over the sorted SHA-1s of the
    /// package's files. Only meaningful when `files_analyzed` is set.
    pub fn verification_code(&self) -> Option<String> {
        if !self.files_analyzed {
            return None;
        }
        let mut hashes: Vec<&str> = self
            .files
            .iter()
            .filter_map(|f| f.checksums.sha1.as_deref())
            .collect();
        hashes.sort_unstable();

        let mut hasher = Sha1::new();
        for h in hashes {
            hasher.update(h.as_bytes());
        }
        Some(hex::encode(hasher.finalize()))
    }
}

/// Compute SHA-1, SHA-256 and SHA-512 of a file in one read pass.
pub(crate) fn hash_file(path: &Path) -> Result<Checksums> {
    let mut file = File::open(path)
        .map_err(|e| BomError::Io(std::io::Error::new(e.kind(), format!("opening {}: {}", path.display(), e))))?;

    let mut sha1 = Sha1::new();
    let mut sha256 = Sha256::new();
    let mut sha512 = Sha512::new();

    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        sha1.update(&buf[..n]);
        sha256.update(&buf[..n]);
        sha512.update(&buf[..n]);
    }

    Ok(Checksums {
        sha1: Some(hex::encode(sha1.finalize())),
        sha256: Some(hex::encode(sha256.finalize())),
        sha512: Some(hex::encode(sha512.finalize())),
    })
}
