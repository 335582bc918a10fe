//! OCI image reference parsing.
//!
//! Parses references like `ghcr.io/org/image:v1` or
//! `registry.example.com/repo@sha256:abc...` into structured components. A
//! reference is either tag-shaped or digest-shaped; both render a canonical
//! digest-form string once a digest is known.

use ocibom_core::error::{BomError, Result};

/// Default registry when none is specified.
const DEFAULT_REGISTRY: &str = "docker.io";

/// Default tag when none is specified.
const DEFAULT_TAG: &str = "latest";

/// A content digest, `algorithm:hex`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDigest {
    pub algorithm: String,
    pub hex: String,
}

impl ContentDigest {
    /// Parse an `algorithm:hex` digest string.
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((algorithm, hex)) if !algorithm.is_empty() && !hex.is_empty() => Ok(Self {
                algorithm: algorithm.to_string(),
                hex: hex.to_string(),
            }),
            _ => Err(BomError::Reference(format!(
                "invalid digest '{}': expected algorithm:hex",
                s
            ))),
        }
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

/// Whether a reference names its image by tag or by digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceKind {
    Tag(String),
    Digest(ContentDigest),
}

/// Parsed OCI image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry hostname (e.g., "ghcr.io", "docker.io")
    pub registry: String,
    /// Repository path (e.g., "library/nginx")
    pub repository: String,
    /// Tag or digest.
    pub kind: ReferenceKind,
}

impl ImageReference {
    /// Parse an image reference string.
    ///
    /// Supports formats:
    /// - `nginx` → docker.io/library/nginx:latest
    /// - `nginx:1.25` → docker.io/library/nginx:1.25
    /// - `ghcr.io/org/image:tag`
    /// - `ghcr.io/org/image@sha256:abc...`
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(BomError::Reference("empty image reference".to_string()));
        }

        // Split off a digest first (@ separator)
        let (name_part, digest) = match reference.rsplit_once('@') {
            Some((name, digest_part)) => (name, Some(ContentDigest::parse(digest_part)?)),
            None => (reference, None),
        };

        // Split a tag: the last colon after the last slash
        let (name, tag) = match name_part.rfind('/') {
            Some(slash) => match name_part[slash + 1..].rfind(':') {
                Some(colon) => (
                    &name_part[..slash + 1 + colon],
                    Some(name_part[slash + 1 + colon + 1..].to_string()),
                ),
                None => (name_part, None),
            },
            None => match name_part.rfind(':') {
                // A colon in a single-component name could be registry:port;
                // ports are all-numeric, tags are not required to be
                Some(colon) if !name_part[colon + 1..].chars().all(|c| c.is_ascii_digit()) => {
                    (&name_part[..colon], Some(name_part[colon + 1..].to_string()))
                }
                _ => (name_part, None),
            },
        };

        let (registry, repository) = split_registry_repository(name)?;

        let kind = match (digest, tag) {
            (Some(d), _) => ReferenceKind::Digest(d),
            (None, Some(t)) => ReferenceKind::Tag(t),
            (None, None) => ReferenceKind::Tag(DEFAULT_TAG.to_string()),
        };

        Ok(Self {
            registry,
            repository,
            kind,
        })
    }

    /// Registry and repository joined, without tag or digest.
    pub fn name(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }

    /// The tag, when this reference is tag-shaped.
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            ReferenceKind::Tag(t) => Some(t),
            ReferenceKind::Digest(_) => None,
        }
    }

    /// The digest, when this reference is digest-shaped.
    pub fn digest(&self) -> Option<&ContentDigest> {
        match &self.kind {
            ReferenceKind::Tag(_) => None,
            ReferenceKind::Digest(d) => Some(d),
        }
    }

    /// Canonical digest-form reference string for the given digest:
    /// `registry/repo@algorithm:hex`.
    pub fn digest_reference(&self, digest: &ContentDigest) -> String {
        format!("{}/{}@{}", self.registry, self.repository, digest)
    }

    /// Get the full reference string.
    pub fn full_reference(&self) -> String {
        match &self.kind {
            ReferenceKind::Tag(tag) => format!("{}/{}:{}", self.registry, self.repository, tag),
            ReferenceKind::Digest(d) => self.digest_reference(d),
        }
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_reference())
    }
}

// Split a name into registry and repository components. The first component
// is a registry when it contains a dot or colon, or is "localhost".
fn split_registry_repository(name: &str) -> Result<(String, String)> {
    if let Some(slash) = name.find('/') {
        let first = &name[..slash];
        if first.contains('.') || first.contains(':') || first == "localhost" {
            let repo = &name[slash + 1..];
            if repo.is_empty() {
                return Err(BomError::Reference(format!(
                    "empty repository in reference '{}'",
                    name
                )));
            }
            return Ok((first.to_string(), repo.to_string()));
        }
    }

    // No registry detected, use Docker Hub conventions
    let repository = if name.contains('/') {
        name.to_string()
    } else {
        format!("library/{}", name)
    };

    Ok((DEFAULT_REGISTRY.to_string(), repository))
}
