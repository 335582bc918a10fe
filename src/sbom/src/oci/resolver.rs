//! Remote reference resolution.
//!
//! Classifies a user-supplied reference as a single image or a multi-arch
//! index and enumerates the per-platform manifests. The registry protocol
//! itself lives behind [`RegistryClient`] so the pipeline can be exercised
//! with stubs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ocibom_core::error::Result;

use super::reference::{ContentDigest, ImageReference};

/// One resolved image reference, possibly with per-platform children.
#[derive(Debug, Clone, Default)]
pub struct ImageReferenceInfo {
    /// Reference string this record was resolved from. For children of an
    /// index this is their canonical digest-form reference.
    pub reference: Option<String>,

    /// Canonical digest string, `registry/repo@algorithm:hex`.
    pub digest: String,

    /// Manifest media type.
    pub media_type: String,

    /// Platform architecture; empty when the manifest has no platform block.
    pub arch: String,

    /// Platform OS; empty when the manifest has no platform block.
    pub os: String,

    /// Local Docker-archive tarball, once downloaded.
    pub archive: Option<PathBuf>,

    /// Per-platform children of an image index.
    pub images: Vec<ImageReferenceInfo>,
}

/// What a remote descriptor turned out to be.
#[derive(Debug, Clone)]
pub enum RemoteManifest {
    /// A single image, with platform data from its config.
    Image { architecture: String, os: String },

    /// An image index listing per-platform manifests.
    Index { entries: Vec<IndexEntry> },
}

/// One manifest listed by an image index.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub digest: ContentDigest,
    pub media_type: String,

    /// Empty strings when the entry has no platform block.
    pub architecture: String,
    pub os: String,
}

/// Descriptor returned by the registry for a reference.
#[derive(Debug, Clone)]
pub struct RemoteDescriptor {
    /// Digest of the fetched manifest.
    pub digest: ContentDigest,

    /// Media type of the fetched manifest.
    pub media_type: String,

    pub manifest: RemoteManifest,
}

/// Remote registry operations the pipeline depends on.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Fetch the descriptor for a reference, using ambient credentials.
    async fn describe(&self, reference: &ImageReference) -> Result<RemoteDescriptor>;

    /// Download an image and write it as a Docker archive tagged `repo_tag`.
    async fn pull_to_archive(
        &self,
        reference: &ImageReference,
        repo_tag: &str,
        dest: &Path,
    ) -> Result<()>;
}

/// Resolve a reference string into its image reference tree.
///
/// Single images come back with an empty child list; indexes carry one child
/// per listed manifest, each with a synthesized digest-form reference and the
/// platform fields from its platform block (empty when absent).
pub async fn resolve(
    client: &dyn RegistryClient,
    reference_string: &str,
) -> Result<ImageReferenceInfo> {
    let reference = ImageReference::parse(reference_string)?;
    let descriptor = client.describe(&reference).await?;

    let mut info = ImageReferenceInfo {
        reference: Some(reference_string.to_string()),
        digest: reference.digest_reference(&descriptor.digest),
        media_type: descriptor.media_type.clone(),
        ..ImageReferenceInfo::default()
    };

    match descriptor.manifest {
        RemoteManifest::Image { architecture, os } => {
            tracing::info!(
                reference = reference_string,
                digest = %info.digest,
                "reference points to a single image"
            );
            info.arch = architecture;
            info.os = os;
        }
        RemoteManifest::Index { entries } => {
            tracing::info!(
                reference = reference_string,
                manifests = entries.len(),
                "reference points to an image index"
            );
            for entry in entries {
                let child_reference = reference.digest_reference(&entry.digest);
                tracing::debug!(
                    child = %child_reference,
                    arch = %entry.architecture,
                    os = %entry.os,
                    "adding index child"
                );
                info.images.push(ImageReferenceInfo {
                    reference: Some(child_reference.clone()),
                    digest: child_reference,
                    media_type: entry.media_type,
                    arch: entry.architecture,
                    os: entry.os,
                    ..ImageReferenceInfo::default()
                });
            }
        }
    }

    Ok(info)
}
