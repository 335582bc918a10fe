//! Go module dependencies.
//!
//! Converts the dependencies of a Go module into SPDX packages. Resolution is
//! a collaborator behind [`GoModuleResolver`]; the built-in resolver reads the
//! `require` stanzas of a `go.mod`. A dependency that cannot be converted is
//! dropped with a warning, the rest of the module is still reported.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ocibom_core::error::{BomError, Result};
use packageurl::PackageUrl;

use crate::ids::IdRegistry;
use crate::license::LicenseReader;
use crate::options::Options;
use crate::package::Package;

/// One dependency of a Go module.
#[derive(Debug, Clone, Default)]
pub struct GoDependency {
    /// Module import path, e.g. `github.com/acme/widget`.
    pub import_path: String,

    /// Module version, e.g. `v1.4.2`.
    pub version: String,

    /// Transitive (not required directly by the module).
    pub indirect: bool,

    /// Local checkout of the module, when one is available for scanning.
    pub local_dir: Option<PathBuf>,
}

/// Enumerates the dependencies of a Go module.
pub trait GoModuleResolver: Send + Sync {
    /// List dependencies of the module at `path`. When `only_direct` is set,
    /// transitive dependencies are excluded.
    fn dependencies(&self, path: &Path, only_direct: bool) -> Result<Vec<GoDependency>>;
}

/// Built-in resolver reading the `require` stanzas of a `go.mod` file.
#[derive(Debug, Default)]
pub struct GoModFileResolver;

impl GoModFileResolver {
    pub fn new() -> Self {
        Self
    }
}

impl GoModuleResolver for GoModFileResolver {
    fn dependencies(&self, path: &Path, only_direct: bool) -> Result<Vec<GoDependency>> {
        let gomod = path.join("go.mod");
        let content = fs::read_to_string(&gomod)
            .map_err(|e| BomError::GoModule(format!("reading {}: {}", gomod.display(), e)))?;

        let mut deps = Vec::new();
        let mut in_require_block = false;

        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.starts_with("require (") {
                in_require_block = true;
                continue;
            }
            if in_require_block && trimmed == ")" {
                in_require_block = false;
                continue;
            }

            let spec = if in_require_block {
                trimmed
            } else if let Some(rest) = trimmed.strip_prefix("require ") {
                rest.trim()
            } else {
                continue;
            };

            if spec.is_empty() || spec.starts_with("//") {
                continue;
            }

            let indirect = spec.contains("// indirect");
            let mut parts = spec.split_whitespace();
            let (import_path, version) = match (parts.next(), parts.next()) {
                (Some(p), Some(v)) => (p.to_string(), v.to_string()),
                _ => continue,
            };

            if only_direct && indirect {
                continue;
            }

            deps.push(GoDependency {
                import_path,
                version,
                indirect,
                local_dir: None,
            });
        }

        Ok(deps)
    }
}

/// Convert the dependencies of a Go module into SPDX packages.
///
/// A license scan failure is fatal; a per-dependency conversion failure is
/// logged and the dependency dropped.
pub fn go_dependencies(
    resolver: &dyn GoModuleResolver,
    reader: Arc<dyn LicenseReader>,
    opts: &Options,
    ids: &IdRegistry,
    path: &Path,
) -> Result<Vec<Package>> {
    let deps = resolver
        .dependencies(path, opts.only_direct_deps)
        .map_err(|e| BomError::GoModule(format!("opening module path: {}", e)))?;

    let mut packages = Vec::new();
    for dep in deps {
        let license = if opts.scan_licenses {
            scan_dependency_license(reader.as_ref(), &dep)?
        } else {
            None
        };

        match dependency_to_package(ids, &dep, license) {
            Ok(pkg) => packages.push(pkg),
            Err(e) => {
                tracing::warn!(
                    dependency = %dep.import_path,
                    error = %e,
                    "dropping go dependency that could not be converted"
                );
            }
        }
    }

    Ok(packages)
}

// License scanning only applies to dependencies with a local checkout.
fn scan_dependency_license(
    reader: &dyn LicenseReader,
    dep: &GoDependency,
) -> Result<Option<String>> {
    let dir = match &dep.local_dir {
        Some(dir) => dir,
        None => return Ok(None),
    };
    let found = reader
        .read_top_license(dir)
        .map_err(|e| BomError::GoModule(format!("scanning module licenses: {}", e)))?;
    Ok(found.map(|m| m.license.license_id))
}

fn dependency_to_package(
    ids: &IdRegistry,
    dep: &GoDependency,
    license: Option<String>,
) -> Result<Package> {
    if dep.import_path.is_empty() {
        return Err(BomError::GoModule(
            "dependency has no import path".to_string(),
        ));
    }

    let mut pkg = Package::new();
    pkg.name = dep.import_path.clone();
    pkg.version = dep.version.clone();
    pkg.download_location = format!("https://{}", dep.import_path);
    pkg.id = ids.mint("Package", &[dep.import_path.as_str(), dep.version.as_str()]);
    if let Some(license) = license {
        pkg.license_concluded = license;
    }

    if let Some(purl) = golang_purl(dep) {
        pkg.external_refs
            .push(crate::package::ExternalRef::purl(purl));
    }

    Ok(pkg)
}

fn golang_purl(dep: &GoDependency) -> Option<String> {
    let (namespace, name) = match dep.import_path.rsplit_once('/') {
        Some((ns, n)) => (Some(ns.to_string()), n.to_string()),
        None => (None, dep.import_path.clone()),
    };

    let mut purl = PackageUrl::new("golang", name).ok()?;
    if let Some(ns) = namespace {
        purl.with_namespace(ns);
    }
    if !dep.version.is_empty() {
        purl.with_version(dep.version.clone());
    }
    Some(purl.to_string())
}
