//! End-to-end tests of the image pipeline with a stub registry.
//!
//! The stub serves an in-memory index and materializes Docker archives on
//! pull, so the full path from reference resolution to the assembled package
//! tree runs without a network.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use ocibom::{
    ContentDigest, ImageReference, IndexEntry, Options, Package, RegistryClient,
    RelationshipKind, RelationshipTarget, RemoteDescriptor, RemoteManifest, SbomBuilder,
};
use ocibom_core::error::Result;

const IMAGE_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
const INDEX_MANIFEST: &str = "application/vnd.oci.image.index.v1+json";

/// Registry stub: an optional index of platform variants, single image
/// otherwise.
struct StubRegistry {
    variants: Vec<(&'static str, &'static str, &'static str)>, // (hex, arch, os)
}

#[async_trait]
impl RegistryClient for StubRegistry {
    async fn describe(&self, _reference: &ImageReference) -> Result<RemoteDescriptor> {
        let digest = ContentDigest {
            algorithm: "sha256".to_string(),
            hex: "1dec5".to_string(),
        };
        if self.variants.is_empty() {
            return Ok(RemoteDescriptor {
                digest,
                media_type: IMAGE_MANIFEST.to_string(),
                manifest: RemoteManifest::Image {
                    architecture: "amd64".to_string(),
                    os: "linux".to_string(),
                },
            });
        }
        Ok(RemoteDescriptor {
            digest,
            media_type: INDEX_MANIFEST.to_string(),
            manifest: RemoteManifest::Index {
                entries: self
                    .variants
                    .iter()
                    .map(|(hex, arch, os)| IndexEntry {
                        digest: ContentDigest {
                            algorithm: "sha256".to_string(),
                            hex: (*hex).to_string(),
                        },
                        media_type: IMAGE_MANIFEST.to_string(),
                        architecture: (*arch).to_string(),
                        os: (*os).to_string(),
                    })
                    .collect(),
            },
        })
    }

    async fn pull_to_archive(
        &self,
        _reference: &ImageReference,
        repo_tag: &str,
        dest: &Path,
    ) -> Result<()> {
        write_docker_archive(repo_tag, dest);
        Ok(())
    }
}

// A one-layer Docker archive with the given repo tag.
fn write_docker_archive(repo_tag: &str, dest: &Path) {
    let mut inner = tar::Builder::new(Vec::new());
    append(&mut inner, "bin/app", b"binary bits");
    let layer_bytes = inner.into_inner().unwrap();

    let mut outer = tar::Builder::new(Vec::new());
    append(&mut outer, "layer0.tar", &layer_bytes);
    let manifest = format!(
        r#"[{{"Config":"config.json","RepoTags":["{}"],"Layers":["layer0.tar"]}}]"#,
        repo_tag
    );
    append(&mut outer, "manifest.json", manifest.as_bytes());

    std::fs::write(dest, outer.into_inner().unwrap()).unwrap();
}

fn append(builder: &mut tar::Builder<Vec<u8>>, name: &str, data: &[u8]) {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, name, data).unwrap();
}

fn contains_children(pkg: &Package) -> Vec<&Package> {
    pkg.relationships
        .iter()
        .filter(|r| r.kind == RelationshipKind::Contains)
        .map(|r| match &r.target {
            RelationshipTarget::Package(p) => p.as_ref(),
            RelationshipTarget::Ref(id) => panic!("CONTAINS peer was a bare ref: {}", id),
        })
        .collect()
}

#[tokio::test]
async fn multiarch_reference_assembles_variant_graph() {
    let registry = Arc::new(StubRegistry {
        variants: vec![("aaa111", "amd64", "linux"), ("bbb222", "arm64", "linux")],
    });

    let builder = SbomBuilder::new(Options::default())
        .unwrap()
        .with_registry_client(registry);
    let root = builder
        .image_ref_to_package("ghcr.io/acme/tool:v1")
        .await
        .unwrap();

    // Root: one CONTAINS per variant, rendered in full
    let contains: Vec<_> = root
        .relationships
        .iter()
        .filter(|r| r.kind == RelationshipKind::Contains)
        .collect();
    assert_eq!(contains.len(), 2);
    assert!(contains.iter().all(|r| r.full_render));

    // Children: exactly one VARIANT_OF pointing back at the root, by id
    for child in contains_children(&root) {
        let variant_of: Vec<_> = child
            .relationships
            .iter()
            .filter(|r| r.kind == RelationshipKind::VariantOf)
            .collect();
        assert_eq!(variant_of.len(), 1);
        match &variant_of[0].target {
            RelationshipTarget::Ref(id) => assert_eq!(id, &root.id),
            RelationshipTarget::Package(_) => panic!("back-edge must not own its peer"),
        }

        // Platform-qualified name and purl
        assert!(child.name.contains("(amd64/linux)") || child.name.contains("(arm64/linux)"));
        let purl = &child
            .external_refs
            .iter()
            .find(|r| r.ref_type == "purl")
            .expect("variant purl")
            .locator;
        if child.name.contains("amd64") {
            assert!(purl.contains("arch=amd64"));
        } else {
            assert!(purl.contains("arch=arm64"));
        }
        assert!(purl.contains("os=linux"));

        // Each variant describes its single layer
        assert_eq!(child.packages.len(), 1);
    }

    // The root package itself carries a purl for the given reference
    assert!(root
        .external_refs
        .iter()
        .any(|r| r.ref_type == "purl" && r.locator.starts_with("pkg:oci/tool@")));
    assert_eq!(root.name, "sha256:1dec5");
}

#[tokio::test]
async fn single_image_reference_builds_one_package() {
    let registry = Arc::new(StubRegistry { variants: vec![] });

    let builder = SbomBuilder::new(Options::default())
        .unwrap()
        .with_registry_client(registry);
    let pkg = builder
        .image_ref_to_package("ghcr.io/acme/tool:v1")
        .await
        .unwrap();

    // No variant relationships, one layer package, a purl on the package
    assert!(pkg.relationships.is_empty());
    assert_eq!(pkg.packages.len(), 1);
    assert!(pkg.name.contains("ghcr.io/acme/tool"));
    let purl = &pkg
        .external_refs
        .iter()
        .find(|r| r.ref_type == "purl")
        .expect("image purl")
        .locator;
    assert!(purl.contains("arch=amd64"));
    assert!(purl.contains("os=linux"));
}

#[tokio::test]
async fn variant_ids_are_stable_across_builders() {
    let make = || {
        Arc::new(StubRegistry {
            variants: vec![("aaa111", "amd64", "linux"), ("bbb222", "arm64", "linux")],
        })
    };

    let one = SbomBuilder::new(Options::default())
        .unwrap()
        .with_registry_client(make())
        .image_ref_to_package("ghcr.io/acme/tool:v1")
        .await
        .unwrap();
    let two = SbomBuilder::new(Options::default())
        .unwrap()
        .with_registry_client(make())
        .image_ref_to_package("ghcr.io/acme/tool:v1")
        .await
        .unwrap();

    assert_eq!(one.id, two.id);
    // Children arrive in completion order, so compare as sets
    let ids = |p: &Package| -> Vec<String> {
        let mut v: Vec<String> = contains_children(p).iter().map(|c| c.id.clone()).collect();
        v.sort();
        v
    };
    assert_eq!(ids(&one), ids(&two));
}

#[tokio::test]
async fn archives_are_cleaned_with_the_workdir() {
    let registry = Arc::new(StubRegistry { variants: vec![] });

    let builder = SbomBuilder::new(Options::default())
        .unwrap()
        .with_registry_client(registry);
    let pkg = builder
        .image_ref_to_package("ghcr.io/acme/tool:v1")
        .await
        .unwrap();

    // Every temp directory of the assembly is gone: the layer package's
    // source path pointed into the image extraction dir
    let layer_source: Option<PathBuf> = pkg.packages[0].source_file.clone();
    let source = layer_source.expect("layer package records its source file");
    assert!(!source.exists());
}
