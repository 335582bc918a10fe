//! Default registry client backed by `oci-distribution`.
//!
//! Pulls manifests and blobs from container registries (Docker Hub, GHCR,
//! etc.) and writes pulled images as Docker-archive tarballs. This is the
//! production implementation of [`RegistryClient`]; the pipeline itself only
//! depends on the trait.

use std::fs::File;
use std::path::Path;

use async_trait::async_trait;
use oci_distribution::client::{ClientConfig, ClientProtocol, ImageData};
use oci_distribution::manifest::OciManifest;
use oci_distribution::secrets::RegistryAuth as OciRegistryAuth;
use oci_distribution::{Client, Reference};
use ocibom_core::error::{BomError, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::reference::{ContentDigest, ImageReference};
use super::resolver::{IndexEntry, RegistryClient, RemoteDescriptor, RemoteManifest};
use crate::tarball::{ArchiveManifest, ARCHIVE_MANIFEST_FILENAME};

/// Layer media types accepted when pulling an image.
const ACCEPTED_LAYER_MEDIA_TYPES: &[&str] = &[
    "application/vnd.oci.image.layer.v1.tar",
    "application/vnd.oci.image.layer.v1.tar+gzip",
    "application/vnd.docker.image.rootfs.diff.tar",
    "application/vnd.docker.image.rootfs.diff.tar.gzip",
];

/// Authentication credentials for a container registry.
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    username: Option<String>,
    password: Option<String>,
}

impl RegistryAuth {
    /// Create anonymous authentication (no credentials).
    pub fn anonymous() -> Self {
        Self {
            username: None,
            password: None,
        }
    }

    /// Create basic authentication with username and password.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    /// Create authentication from the ambient environment.
    ///
    /// Reads `REGISTRY_USERNAME` and `REGISTRY_PASSWORD`; falls back to
    /// anonymous when unset.
    pub fn from_env() -> Self {
        let username = std::env::var("REGISTRY_USERNAME").ok();
        let password = std::env::var("REGISTRY_PASSWORD").ok();

        if username.is_some() && password.is_some() {
            Self { username, password }
        } else {
            Self::anonymous()
        }
    }

    fn to_oci_auth(&self) -> OciRegistryAuth {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => OciRegistryAuth::Basic(u.clone(), p.clone()),
            _ => OciRegistryAuth::Anonymous,
        }
    }
}

// Fields of an image config blob the resolver cares about.
#[derive(Debug, Default, Deserialize)]
struct ImageConfigPlatform {
    #[serde(default)]
    architecture: String,
    #[serde(default)]
    os: String,
}

/// Registry client backed by the `oci-distribution` crate.
pub struct DistributionClient {
    client: Client,
    auth: RegistryAuth,
}

impl DistributionClient {
    /// Create a client with ambient-environment authentication.
    pub fn new() -> Self {
        Self::with_auth(RegistryAuth::from_env())
    }

    /// Create a client with the given authentication.
    pub fn with_auth(auth: RegistryAuth) -> Self {
        let config = ClientConfig {
            protocol: ClientProtocol::Https,
            ..Default::default()
        };
        Self {
            client: Client::new(config),
            auth,
        }
    }

    fn registry_error(&self, reference: &ImageReference, message: String) -> BomError {
        BomError::Registry {
            registry: reference.registry.clone(),
            message,
        }
    }

    fn to_oci_reference(&self, reference: &ImageReference) -> Result<Reference> {
        let ref_str = reference.full_reference();
        ref_str
            .parse::<Reference>()
            .map_err(|e| BomError::Reference(format!("invalid OCI reference '{}': {}", ref_str, e)))
    }
}

impl Default for DistributionClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryClient for DistributionClient {
    async fn describe(&self, reference: &ImageReference) -> Result<RemoteDescriptor> {
        let oci_ref = self.to_oci_reference(reference)?;
        let auth = self.auth.to_oci_auth();

        let (manifest, digest) = self
            .client
            .pull_manifest(&oci_ref, &auth)
            .await
            .map_err(|e| self.registry_error(reference, format!("fetching remote descriptor: {}", e)))?;
        let digest = ContentDigest::parse(&digest)?;

        match manifest {
            OciManifest::Image(image_manifest) => {
                // The platform block lives in the config blob
                let mut config_data: Vec<u8> = Vec::new();
                self.client
                    .pull_blob(&oci_ref, &image_manifest.config, &mut config_data)
                    .await
                    .map_err(|e| {
                        self.registry_error(reference, format!("fetching image config: {}", e))
                    })?;
                let platform: ImageConfigPlatform =
                    serde_json::from_slice(&config_data).unwrap_or_default();

                Ok(RemoteDescriptor {
                    digest,
                    media_type: image_manifest
                        .media_type
                        .clone()
                        .unwrap_or_else(|| "application/vnd.oci.image.manifest.v1+json".to_string()),
                    manifest: RemoteManifest::Image {
                        architecture: platform.architecture,
                        os: platform.os,
                    },
                })
            }
            OciManifest::ImageIndex(index) => {
                let mut entries = Vec::new();
                for entry in &index.manifests {
                    let (architecture, os) = entry
                        .platform
                        .as_ref()
                        .map(|p| (p.architecture.clone(), p.os.clone()))
                        .unwrap_or_default();
                    entries.push(IndexEntry {
                        digest: ContentDigest::parse(&entry.digest)?,
                        media_type: entry.media_type.clone(),
                        architecture,
                        os,
                    });
                }

                Ok(RemoteDescriptor {
                    digest,
                    media_type: index
                        .media_type
                        .clone()
                        .unwrap_or_else(|| "application/vnd.oci.image.index.v1+json".to_string()),
                    manifest: RemoteManifest::Index { entries },
                })
            }
        }
    }

    async fn pull_to_archive(
        &self,
        reference: &ImageReference,
        repo_tag: &str,
        dest: &Path,
    ) -> Result<()> {
        let oci_ref = self.to_oci_reference(reference)?;
        let auth = self.auth.to_oci_auth();

        tracing::info!(
            reference = %reference,
            dest = %dest.display(),
            "pulling image from registry"
        );

        let image = self
            .client
            .pull(&oci_ref, &auth, ACCEPTED_LAYER_MEDIA_TYPES.to_vec())
            .await
            .map_err(|e| self.registry_error(reference, format!("pulling image: {}", e)))?;

        write_docker_archive(&image, repo_tag, dest).map_err(|e| {
            self.registry_error(reference, format!("writing image to disk: {}", e))
        })
    }
}

// Write pulled image data as a Docker archive: config blob, layer blobs and a
// manifest.json naming them.
fn write_docker_archive(image: &ImageData, repo_tag: &str, dest: &Path) -> Result<()> {
    let file = File::create(dest)?;
    let mut builder = tar::Builder::new(file);

    let config_name = format!("{}.json", hex::encode(Sha256::digest(&image.config.data)));
    append_bytes(&mut builder, &config_name, &image.config.data)?;

    let mut layer_files = Vec::new();
    for layer in &image.layers {
        let layer_name = format!("{}.tar", hex::encode(Sha256::digest(&layer.data)));
        append_bytes(&mut builder, &layer_name, &layer.data)?;
        layer_files.push(layer_name);
    }

    let manifest = vec![ArchiveManifest {
        config: config_name,
        repo_tags: vec![repo_tag.to_string()],
        layer_files,
    }];
    let manifest_json = serde_json::to_vec(&manifest)?;
    append_bytes(&mut builder, ARCHIVE_MANIFEST_FILENAME, &manifest_json)?;

    builder.finish()?;
    Ok(())
}

fn append_bytes(builder: &mut tar::Builder<File>, name: &str, data: &[u8]) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, name, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_auth_anonymous() {
        let auth = RegistryAuth::anonymous();
        assert!(matches!(auth.to_oci_auth(), OciRegistryAuth::Anonymous));
    }

    #[test]
    fn test_registry_auth_basic() {
        let auth = RegistryAuth::basic("user", "pass");
        assert!(matches!(auth.to_oci_auth(), OciRegistryAuth::Basic(_, _)));
    }

    #[test]
    fn test_to_oci_reference() {
        let client = DistributionClient::with_auth(RegistryAuth::anonymous());
        let reference = ImageReference::parse("ghcr.io/acme/tool:v1").unwrap();
        let oci_ref = client.to_oci_reference(&reference).unwrap();
        assert_eq!(oci_ref.to_string(), "ghcr.io/acme/tool:v1");
    }

    #[test]
    fn test_write_docker_archive_layout() {
        use oci_distribution::client::{Config, ImageLayer};

        let tmp = tempfile::TempDir::new().unwrap();
        let dest = tmp.path().join("image.tar");

        let image = ImageData {
            layers: vec![ImageLayer {
                data: b"layer-bytes".to_vec(),
                media_type: "application/vnd.oci.image.layer.v1.tar".to_string(),
                annotations: None,
            }],
            digest: Some("sha256:feedface".to_string()),
            config: Config {
                data: br#"{"architecture":"amd64","os":"linux"}"#.to_vec(),
                media_type: "application/vnd.oci.image.config.v1+json".to_string(),
                annotations: None,
            },
            manifest: None,
        };

        write_docker_archive(&image, "ghcr.io/acme/tool:feedface", &dest).unwrap();

        let extracted = crate::tarball::extract_tarball_to_temp(&dest).unwrap();
        let manifest = crate::tarball::read_archive_manifest(
            &extracted.path().join(ARCHIVE_MANIFEST_FILENAME),
        )
        .unwrap();
        assert_eq!(manifest.repo_tags, vec!["ghcr.io/acme/tool:feedface"]);
        assert_eq!(manifest.layer_files.len(), 1);
        assert!(extracted.path().join(&manifest.layer_files[0]).exists());
        assert!(extracted.path().join(&manifest.config).exists());
    }
}
