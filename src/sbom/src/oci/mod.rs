//! OCI image support for the SBOM generator.
//!
//! This module turns a user-supplied image reference into local
//! Docker-archive tarballs ready for package assembly:
//!
//! - reference parsing (tag- and digest-shaped)
//! - remote resolution of single images and multi-arch indexes
//! - bounded-concurrency download of per-platform variants
//! - OCI purl construction

pub mod pull;
pub mod purl;
pub mod reference;
pub mod registry;
pub mod resolver;

pub use pull::{pull_images_to_archive, DOWNLOAD_WORKERS};
pub use purl::purl_from_image;
pub use reference::{ContentDigest, ImageReference, ReferenceKind};
pub use registry::{DistributionClient, RegistryAuth};
pub use resolver::{
    resolve, ImageReferenceInfo, IndexEntry, RegistryClient, RemoteDescriptor, RemoteManifest,
};
