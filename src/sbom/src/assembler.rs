//! Package assembly.
//!
//! Turns user references (directories, tarballs, image references) into the
//! SPDX package graph. The builder owns the document-scoped identifier
//! registry and the injected collaborators, so one builder produces one
//! self-consistent document.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ocibom_core::error::{BomError, Result};

use crate::gomod::{go_dependencies, GoModFileResolver, GoModuleResolver};
use crate::ids::IdRegistry;
use crate::license::{LicenseReader, ReaderOptions, TagReader};
use crate::oci::pull::pull_images_to_archive;
use crate::oci::purl::purl_from_image;
use crate::oci::reference::ImageReference;
use crate::oci::registry::DistributionClient;
use crate::oci::resolver::{ImageReferenceInfo, RegistryClient};
use crate::options::{Options, TarballOptions};
use crate::osinfo::{ContainerScanner, OsDatabaseScanner};
use crate::package::{
    ExternalRef, Package, Relationship, RelationshipKind, RelationshipTarget,
};
use crate::scan::directory::scan_directory;
use crate::tarball::{extract_tarball_to_temp, read_archive_manifest, ARCHIVE_MANIFEST_FILENAME};

/// Per-layer analysis plug-in point.
///
/// The assembler works when this is a no-op; richer analyzers can attach
/// files or sub-packages to the layer package.
pub trait LayerAnalyzer: Send + Sync {
    fn analyze_layer(&self, layer_path: &Path, pkg: &mut Package) -> Result<()>;
}

/// Analyzer that leaves layer packages untouched.
#[derive(Debug, Default)]
pub struct NoopLayerAnalyzer;

impl LayerAnalyzer for NoopLayerAnalyzer {
    fn analyze_layer(&self, _layer_path: &Path, _pkg: &mut Package) -> Result<()> {
        Ok(())
    }
}

/// Assembles SPDX packages from directories, tarballs and image references.
pub struct SbomBuilder {
    opts: Options,
    ids: Arc<IdRegistry>,
    registry: Arc<dyn RegistryClient>,
    license_reader: Arc<dyn LicenseReader>,
    container_scanner: Arc<dyn ContainerScanner>,
    layer_analyzer: Arc<dyn LayerAnalyzer>,
    go_resolver: Arc<dyn GoModuleResolver>,
}

impl SbomBuilder {
    /// Create a builder with the default collaborators.
    pub fn new(opts: Options) -> Result<Self> {
        let license_reader = Arc::new(TagReader::new(ReaderOptions {
            cache_dir: opts.license_cache_dir.clone(),
            license_dir: opts.license_data.clone(),
        })?);

        Ok(Self {
            opts,
            ids: Arc::new(IdRegistry::new()),
            registry: Arc::new(DistributionClient::new()),
            license_reader,
            container_scanner: Arc::new(OsDatabaseScanner::new()),
            layer_analyzer: Arc::new(NoopLayerAnalyzer),
            go_resolver: Arc::new(GoModFileResolver::new()),
        })
    }

    /// Replace the registry client (stubs in tests, credentials in prod).
    pub fn with_registry_client(mut self, client: Arc<dyn RegistryClient>) -> Self {
        self.registry = client;
        self
    }

    /// Replace the license reader.
    pub fn with_license_reader(mut self, reader: Arc<dyn LicenseReader>) -> Self {
        self.license_reader = reader;
        self
    }

    /// Replace the OS package scanner.
    pub fn with_container_scanner(mut self, scanner: Arc<dyn ContainerScanner>) -> Self {
        self.container_scanner = scanner;
        self
    }

    /// Replace the layer analyzer plug-in.
    pub fn with_layer_analyzer(mut self, analyzer: Arc<dyn LayerAnalyzer>) -> Self {
        self.layer_analyzer = analyzer;
        self
    }

    /// Replace the Go module resolver.
    pub fn with_go_resolver(mut self, resolver: Arc<dyn GoModuleResolver>) -> Self {
        self.go_resolver = resolver;
        self
    }

    /// Scan a directory into a package.
    pub async fn package_from_directory(&self, dir_path: &Path) -> Result<Package> {
        scan_directory(
            &self.opts,
            Arc::clone(&self.ids),
            Arc::clone(&self.license_reader),
            dir_path,
        )
        .await
    }

    /// Build a package from the contents of a tarball.
    ///
    /// With `add_files` set the archive is extracted and scanned like a
    /// directory; otherwise the package only describes the archive itself.
    /// Either way the original tar file is hashed as the package's source.
    pub async fn package_from_tarball(
        &self,
        tar_opts: &TarballOptions,
        tar_file: &Path,
    ) -> Result<Package> {
        tracing::info!(tarball = %tar_file.display(), "generating package from tarball");

        let mut pkg = if tar_opts.add_files {
            let extracted = extract_tarball_to_temp(tar_file).map_err(|e| {
                BomError::Extract(format!("extracting tarball to temporary directory: {}", e))
            })?;
            self.package_from_directory(extracted.path())
                .await
                .map_err(|e| {
                    BomError::Scan(format!("generating package from tar contents: {}", e))
                })?
        } else {
            Package::new()
        };

        // Strip the extraction prefix from emitted paths
        pkg.options.work_dir = tar_opts.extract_dir.clone();
        pkg.read_source_file(tar_file)
            .map_err(|e| BomError::Scan(format!("reading source file {}: {}", tar_file.display(), e)))?;
        Ok(pkg)
    }

    /// Build the package tree for an OCI image reference.
    ///
    /// Single images produce one package; multi-arch indexes produce a root
    /// package with one `CONTAINS`/`VARIANT_OF` pair per platform variant.
    pub async fn image_ref_to_package(&self, reference: &str) -> Result<Package> {
        // Scoped workdir for all downloaded archives, removed on every exit
        let workdir = tempfile::Builder::new()
            .prefix("doc-build-")
            .tempdir()
            .map_err(|e| BomError::Extract(format!("creating temporary workdir: {}", e)))?;

        let references =
            pull_images_to_archive(Arc::clone(&self.registry), reference, workdir.path())
                .await
                .map_err(|e| {
                    BomError::Other(format!("while downloading images to archive: {}", e))
                })?;

        // Single image: one package, no relationship pairs
        if references.images.is_empty() {
            tracing::info!(reference, "generating single image package");
            let mut pkg = match &references.archive {
                Some(archive) => self.package_from_image_tarball(archive).await.map_err(|e| {
                    BomError::Other(format!("building package from single image: {}", e))
                })?,
                None => Package::new(),
            };
            attach_purl(&mut pkg, &references);
            return Ok(pkg);
        }

        tracing::info!(
            digest = %references.digest,
            variants = references.images.len(),
            "generating SBOM for multiarch image"
        );

        let index_reference = ImageReference::parse(&references.digest)?;
        let index_digest = index_reference.digest().ok_or_else(|| {
            BomError::Reference(format!(
                "index reference '{}' is not digest-shaped",
                references.digest
            ))
        })?;

        let mut pkg = Package::new();
        pkg.name = index_digest.to_string();
        pkg.id = self.ids.mint("Package", &[pkg.name.as_str()]);
        pkg.download_location = references.digest.clone();

        for image in &references.images {
            let archive = image.archive.as_ref().ok_or_else(|| {
                BomError::Other(format!(
                    "image variant {} has no downloaded archive",
                    image.digest
                ))
            })?;

            let mut subpkg = self
                .package_from_image_tarball(archive)
                .await
                .map_err(|e| BomError::Other(format!("adding image variant package: {}", e)))?;

            subpkg.name = if !image.arch.is_empty() || !image.os.is_empty() {
                let mut name = format!("{} ({}", reference, image.arch);
                if !image.arch.is_empty() {
                    name.push('/');
                }
                name.push_str(&image.os);
                name.push(')');
                name
            } else {
                image
                    .reference
                    .clone()
                    .unwrap_or_else(|| image.digest.clone())
            };

            attach_purl(&mut subpkg, image);

            subpkg.add_relationship(Relationship {
                kind: RelationshipKind::VariantOf,
                target: RelationshipTarget::Ref(pkg.id.clone()),
                full_render: false,
                comment: Some("Image index".to_string()),
            })?;
            pkg.add_relationship(Relationship {
                kind: RelationshipKind::Contains,
                target: RelationshipTarget::Package(Box::new(subpkg)),
                full_render: true,
                comment: Some("Container image variant".to_string()),
            })?;
        }

        // The topmost package carries the purl of the reference as given
        attach_purl(
            &mut pkg,
            &ImageReferenceInfo {
                reference: Some(reference.to_string()),
                digest: references.digest.clone(),
                media_type: references.media_type.clone(),
                ..ImageReferenceInfo::default()
            },
        );

        Ok(pkg)
    }

    /// Build a package describing a Docker image archive and its layers.
    pub async fn package_from_image_tarball(&self, tar_path: &Path) -> Result<Package> {
        if tar_path.as_os_str().is_empty() {
            return Err(BomError::Other("tar path empty".to_string()));
        }
        tracing::info!(tarball = %tar_path.display(), "generating package from image tarball");

        let mut tar_opts = TarballOptions::default();
        // Individual analyzers decide what to add when layer analysis is on
        if self.opts.add_tar_files && !self.opts.analyze_layers {
            tar_opts.add_files = true;
        }

        let extracted = extract_tarball_to_temp(tar_path)
            .map_err(|e| BomError::Extract(format!("extracting tarball to temp dir: {}", e)))?;
        tar_opts.extract_dir = extracted.path().to_path_buf();

        let manifest =
            read_archive_manifest(&extracted.path().join(ARCHIVE_MANIFEST_FILENAME))
                .map_err(|e| {
                    BomError::Manifest(format!("while reading docker archive manifest: {}", e))
                })?;

        if manifest.repo_tags.is_empty() {
            return Err(BomError::Manifest("no RepoTags found in manifest".to_string()));
        }
        let repo_tag = manifest.repo_tags[0].clone();
        if repo_tag.is_empty() {
            return Err(BomError::Manifest(
                "unable to add tar archive, manifest does not have a RepoTags entry".to_string(),
            ));
        }

        tracing::info!(image = %repo_tag, layers = manifest.layer_files.len(), "describing image");

        let mut image_pkg = Package::new();
        image_pkg.options.work_dir = extracted.path().to_path_buf();
        image_pkg.name = repo_tag.clone();
        image_pkg.id = self.ids.mint("Package", &[repo_tag.as_str()]);

        let layer_paths: Vec<PathBuf> = manifest
            .layer_files
            .iter()
            .map(|layer| extracted.path().join(layer))
            .collect();

        // OS package data comes from exactly one layer
        let os_packages = if self.opts.scan_images {
            self.container_scanner
                .read_os_packages(&layer_paths)
                .map_err(|e| BomError::Scan(format!("getting os data from container: {}", e)))?
        } else {
            None
        };
        if let Some((layer_index, entries)) = &os_packages {
            tracing::info!(
                packages = entries.len(),
                layer = *layer_index,
                "scan of container image returned OS packages"
            );
        }

        for (i, layer_file) in manifest.layer_files.iter().enumerate() {
            let layer_path = extracted.path().join(layer_file);
            let mut layer_pkg = self
                .package_from_tarball(&tar_opts, &layer_path)
                .await
                .map_err(|e| BomError::Other(format!("building package from layer: {}", e)))?;

            // Re-mint under the image name so the same layer file in two
            // images of one run stays unique
            layer_pkg.id = self
                .ids
                .mint("Package", &[repo_tag.as_str(), layer_file.as_str()]);

            if self.opts.analyze_layers {
                self.layer_analyzer
                    .analyze_layer(&layer_path, &mut layer_pkg)
                    .map_err(|e| {
                        BomError::Scan(format!("scanning layer {}: {}", layer_pkg.id, e))
                    })?;
            } else {
                tracing::debug!("not performing deep image analysis");
            }

            // Attach OS packages to the layer the scanner identified
            if let Some((layer_index, entries)) = &os_packages {
                if i == *layer_index {
                    for entry in entries {
                        let mut os_pkg = Package::new();
                        os_pkg.name = entry.package.clone();
                        os_pkg.version = entry.version.clone();
                        os_pkg.home_page = entry.home_page.clone();
                        if !entry.maintainer_name.is_empty() {
                            let mut person = entry.maintainer_name.clone();
                            if !entry.maintainer_email.is_empty() {
                                person.push_str(&format!(" ({})", entry.maintainer_email));
                            }
                            os_pkg.supplier.person = Some(person);
                        }
                        if !entry.package_url().is_empty() {
                            os_pkg
                                .external_refs
                                .push(ExternalRef::purl(entry.package_url()));
                        }
                        os_pkg.id = self.ids.mint("Package", &[layer_pkg.id.as_str()]);
                        layer_pkg.add_package(os_pkg).map_err(|e| {
                            BomError::Other(format!(
                                "adding OS package to container layer: {}",
                                e
                            ))
                        })?;
                    }
                }
            }

            image_pkg.add_package(layer_pkg).map_err(|e| {
                BomError::Other(format!("adding layer to image package: {}", e))
            })?;
        }

        Ok(image_pkg)
    }

    /// Convert the dependencies of a Go module into SPDX packages.
    pub fn go_package_dependencies(&self, path: &Path) -> Result<Vec<Package>> {
        go_dependencies(
            self.go_resolver.as_ref(),
            Arc::clone(&self.license_reader),
            &self.opts,
            &self.ids,
            path,
        )
    }
}

fn attach_purl(pkg: &mut Package, info: &ImageReferenceInfo) {
    let purl = purl_from_image(info);
    if !purl.is_empty() {
        pkg.external_refs.push(ExternalRef::purl(purl));
    }
}
