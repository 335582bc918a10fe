//! Parallel image fetching.
//!
//! Downloads every platform variant of a reference into a local directory of
//! Docker-archive tarballs, at most [`DOWNLOAD_WORKERS`] downloads in flight.

use std::path::Path;
use std::sync::Arc;

use ocibom_core::error::{BomError, Result};
use ocibom_core::pool::WorkerPool;
use tokio::sync::Mutex;

use super::reference::ImageReference;
use super::resolver::{resolve, ImageReferenceInfo, RegistryClient};

/// Concurrent downloads allowed at any moment.
pub const DOWNLOAD_WORKERS: usize = 4;

/// Resolve a reference and download each of its images to `out_dir`.
///
/// Children come back with their `archive` paths set, ordered by task
/// completion; the order is not part of the contract. The first error from
/// any download fails the whole pull, but in-flight downloads are still
/// awaited and their partial archives are left in `out_dir` for the caller to
/// inspect or clean with it.
///
/// A reference that resolves to a single image (no children) is downloaded
/// directly and its archive recorded on the returned record itself.
pub async fn pull_images_to_archive(
    client: Arc<dyn RegistryClient>,
    reference_string: &str,
    out_dir: &Path,
) -> Result<ImageReferenceInfo> {
    let mut references = resolve(client.as_ref(), reference_string).await?;

    if !out_dir.exists() {
        std::fs::create_dir_all(out_dir)
            .map_err(|e| BomError::Extract(format!("creating image directory: {}", e)))?;
    }

    // Single image: pull it straight to its archive
    if references.images.is_empty() {
        let (tar_path, _) = archive_target(&references.digest, out_dir)?;
        let parsed = ImageReference::parse(&references.digest)?;
        let repo_tag = repo_tag_for(&parsed)?;
        client
            .pull_to_archive(&parsed, &repo_tag, &tar_path)
            .await?;
        references.archive = Some(tar_path);
        return Ok(references);
    }

    let collected: Arc<Mutex<Vec<ImageReferenceInfo>>> = Arc::new(Mutex::new(Vec::new()));
    let mut pool = WorkerPool::new(DOWNLOAD_WORKERS);

    for child in references.images.clone() {
        let client = Arc::clone(&client);
        let collected = Arc::clone(&collected);
        let out_dir = out_dir.to_path_buf();

        pool.submit(async move {
            let (tar_path, parsed) = archive_target(&child.digest, &out_dir)?;
            let repo_tag = repo_tag_for(&parsed)?;

            tracing::debug!(
                digest = %child.digest,
                archive = %tar_path.display(),
                "downloading image variant"
            );
            client
                .pull_to_archive(&parsed, &repo_tag, &tar_path)
                .await?;

            // Record the archive on a copy of the child and publish it
            let mut done = child.clone();
            done.archive = Some(tar_path);
            collected.lock().await.push(done);
            Ok(())
        })
        .await?;
    }

    pool.wait().await?;

    let mut children = collected.lock().await;
    references.images = std::mem::take(&mut *children);
    Ok(references)
}

// Derive the archive path `<digest-hex>.tar` for a digest-form reference.
fn archive_target(
    digest_reference: &str,
    out_dir: &Path,
) -> Result<(std::path::PathBuf, ImageReference)> {
    let parsed = ImageReference::parse(digest_reference)?;
    let digest = parsed.digest().ok_or_else(|| {
        BomError::Reference(format!(
            "reference '{}' is not digest-shaped",
            digest_reference
        ))
    })?;
    Ok((out_dir.join(format!("{}.tar", digest.hex)), parsed))
}

// The archive is tagged `<repo>:<digest-hex>`.
fn repo_tag_for(reference: &ImageReference) -> Result<String> {
    let digest = reference.digest().ok_or_else(|| {
        BomError::Reference(format!(
            "reference '{}' is not digest-shaped",
            reference.full_reference()
        ))
    })?;
    Ok(format!("{}:{}", reference.name(), digest.hex))
}
