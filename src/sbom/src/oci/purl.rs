//! OCI Package URL construction.
//!
//! Builds `pkg:oci/...` purls from resolved image references. OCI purls have
//! no namespace; the registry prefix travels in the `repository_url`
//! qualifier. Construction that cannot succeed yields an empty string.

use packageurl::PackageUrl;

use super::reference::{ImageReference, ReferenceKind};
use super::resolver::ImageReferenceInfo;

/// Build the canonical purl string for a resolved image, or an empty string
/// when the reference material is insufficient.
pub fn purl_from_image(info: &ImageReferenceInfo) -> String {
    let ref_str = match info.reference.as_deref().filter(|r| !r.is_empty()) {
        Some(r) => r,
        None if !info.digest.is_empty() => info.digest.as_str(),
        None => return String::new(),
    };

    let reference = match ImageReference::parse(ref_str) {
        Ok(r) => r,
        Err(_) => return String::new(),
    };

    // A digest-shaped reference carries its own digest; tag-shaped ones use
    // the digest the resolver recorded
    let digest = match &reference.kind {
        ReferenceKind::Digest(d) => d.to_string(),
        ReferenceKind::Tag(_) => match info.digest.rsplit_once('@') {
            Some((_, d)) => d.to_string(),
            None => return String::new(),
        },
    };

    // Last path segment is the purl name, the rest is the repository URL
    let name = reference.name();
    let (repository_url, image_name) = match name.rsplit_once('/') {
        Some((prefix, last)) => (prefix.to_string(), last.to_string()),
        None => return String::new(),
    };

    build_purl(&reference, info, &image_name, &digest, &repository_url)
        .unwrap_or_default()
}

fn build_purl(
    reference: &ImageReference,
    info: &ImageReferenceInfo,
    image_name: &str,
    digest: &str,
    repository_url: &str,
) -> Option<String> {
    let mut purl = PackageUrl::new("oci", image_name.to_string()).ok()?;
    purl.with_version(digest.to_string());
    purl.add_qualifier("repository_url", repository_url.to_string())
        .ok()?;

    if !info.arch.is_empty() {
        purl.add_qualifier("arch", info.arch.clone()).ok()?;
    }
    if !info.os.is_empty() {
        purl.add_qualifier("os", info.os.clone()).ok()?;
    }
    if let ReferenceKind::Tag(_) = reference.kind {
        purl.add_qualifier("tag", reference.full_reference()).ok()?;
    }
    if !info.media_type.is_empty() {
        purl.add_qualifier("mediaType", info.media_type.clone())
            .ok()?;
    }

    Some(purl.to_string())
}
