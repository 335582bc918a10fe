//! Directory scanning.
//!
//! Walks a tree collecting regular files (symlinks are never followed),
//! filters them through the ignore engine, and hashes and license-classifies
//! the survivors with a bounded pool of concurrent workers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ocibom_core::error::{BomError, Result};
use ocibom_core::pool::WorkerPool;
use tokio::sync::Mutex;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::ids::IdRegistry;
use crate::license::LicenseReader;
use crate::options::Options;
use crate::package::{FileData, Package};
use crate::scan::ignore::{apply_ignore_patterns, ignore_patterns};

/// Concurrent per-file workers during a scan.
pub const SCAN_WORKERS: usize = 5;

/// Traverse a directory and return every regular file, relative to the root.
///
/// Directories are skipped and symbolic links are neither followed nor
/// reported.
pub fn directory_tree(dir_path: &Path) -> Result<Vec<PathBuf>> {
    let mut file_list = Vec::new();

    for entry in WalkDir::new(dir_path).follow_links(false) {
        let entry =
            entry.map_err(|e| BomError::Scan(format!("building directory tree: {}", e)))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir_path)
            .map_err(|e| BomError::Scan(format!("relativizing {}: {}", entry.path().display(), e)))?;
        file_list.push(relative.to_path_buf());
    }

    Ok(file_list)
}

/// Scan a directory into a package with one file entry per regular file.
///
/// The package's concluded license comes from the top-of-tree classification;
/// files without their own license inherit it. Any per-file failure aborts
/// the scan (first error wins, all workers are awaited).
pub async fn scan_directory(
    opts: &Options,
    ids: Arc<IdRegistry>,
    reader: Arc<dyn LicenseReader>,
    dir_path: &Path,
) -> Result<Package> {
    let dir_path = std::fs::canonicalize(dir_path)
        .map_err(|e| BomError::Scan(format!("getting absolute directory path: {}", e)))?;

    let file_list = directory_tree(&dir_path)?;

    let matcher = ignore_patterns(&dir_path, &opts.ignore_patterns, opts.no_gitignore)?;
    let file_list = apply_ignore_patterns(file_list, &matcher);
    if file_list.is_empty() {
        return Err(BomError::Scan(format!(
            "directory {} has no files to scan",
            dir_path.display()
        )));
    }
    tracing::info!(
        files = file_list.len(),
        directory = %dir_path.display(),
        "scanning files into package"
    );

    let license_tag = match reader
        .read_top_license(&dir_path)
        .map_err(|e| BomError::License(format!("scanning directory for licenses: {}", e)))?
    {
        Some(m) => m.license.license_id,
        None => {
            tracing::warn!(
                directory = %dir_path.display(),
                "license classifier could not find a license for directory"
            );
            String::new()
        }
    };

    let mut pkg = Package::new();
    pkg.files_analyzed = true;
    pkg.name = dir_path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    pkg.id = ids.mint("Package", &[&pkg.name]);
    pkg.license_concluded = license_tag.clone();
    pkg.options.work_dir = dir_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let scanned: Arc<Mutex<Vec<FileData>>> = Arc::new(Mutex::new(Vec::new()));
    let mut pool = WorkerPool::new(SCAN_WORKERS);

    for relative in file_list {
        let ids = Arc::clone(&ids);
        let reader = Arc::clone(&reader);
        let scanned = Arc::clone(&scanned);
        let dir_path = dir_path.clone();
        let pkg_name = pkg.name.clone();
        let license_tag = license_tag.clone();

        pool.submit(async move {
            let absolute = dir_path.join(&relative);

            let mut file = FileData::new();
            file.options.work_dir = dir_path.clone();
            file.options.prefix = pkg_name.clone();
            file.path = relative.clone();

            match reader
                .license_from_file(&absolute)
                .map_err(|e| BomError::License(format!("scanning file for license: {}", e)))?
            {
                Some(license) => file.license_info_in_file = license.license_id,
                None => file.license_concluded = license_tag,
            }

            file.read_source_file(&absolute)
                .map_err(|e| BomError::Scan(format!("checksumming file: {}", e)))?;

            let seed = relative.to_string_lossy();
            file.id = ids.mint("File", &[pkg_name.as_str(), seed.as_ref()]);

            scanned.lock().await.push(file);
            Ok(())
        })
        .await?;
    }

    pool.wait().await?;

    let mut files = scanned.lock().await;
    pkg.files = std::mem::take(&mut *files);
    Ok(pkg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::license::{ReaderOptions, TagReader};
    use std::fs;
    use tempfile::TempDir;

    fn reader() -> Arc<dyn LicenseReader> {
        Arc::new(TagReader::new(ReaderOptions::default()).unwrap())
    }

    #[test]
    fn test_directory_tree_skips_symlinks_and_dirs() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "a").unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub/b.txt"), "b").unwrap();
        #[cfg(unix)]
        std::os::unix::fs::symlink(tmp.path().join("a.txt"), tmp.path().join("link.txt"))
            .unwrap();

        let mut tree = directory_tree(tmp.path()).unwrap();
        tree.sort();
        assert_eq!(tree, vec![PathBuf::from("a.txt"), PathBuf::from("sub/b.txt")]);
    }

    #[tokio::test]
    async fn test_scan_directory_builds_package() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "alpha").unwrap();
        fs::write(tmp.path().join("b.txt"), "beta").unwrap();

        let opts = Options::default();
        let pkg = scan_directory(&opts, Arc::new(IdRegistry::new()), reader(), tmp.path())
            .await
            .unwrap();

        assert!(pkg.files_analyzed);
        assert_eq!(pkg.files.len(), 2);
        assert!(pkg.verification_code().is_some());
        for file in &pkg.files {
            assert!(file.checksums.sha1.is_some());
            assert!(file.checksums.sha256.is_some());
            assert!(!file.path.is_absolute());
            // Stored paths resolve under the scanned root
            assert!(tmp.path().join(&file.path).exists());
        }
    }

    #[tokio::test]
    async fn test_scan_directory_applies_gitignore_and_git_default() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "a").unwrap();
        fs::write(tmp.path().join("b.log"), "b").unwrap();
        fs::create_dir(tmp.path().join(".git")).unwrap();
        fs::write(tmp.path().join(".git/HEAD"), "ref").unwrap();
        fs::write(tmp.path().join(".gitignore"), "*.log\n").unwrap();

        let opts = Options::default();
        let pkg = scan_directory(&opts, Arc::new(IdRegistry::new()), reader(), tmp.path())
            .await
            .unwrap();

        let mut names: Vec<String> = pkg
            .files
            .iter()
            .map(|f| f.path.to_string_lossy().into_owned())
            .collect();
        names.sort();
        // The .gitignore itself survives; *.log and .git/ do not
        assert_eq!(names, vec![".gitignore".to_string(), "a.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_scan_directory_empty_after_filtering_fails() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("x.log"), "x").unwrap();

        let opts = Options {
            ignore_patterns: vec!["*".to_string()],
            no_gitignore: true,
            ..Options::default()
        };
        let err = scan_directory(&opts, Arc::new(IdRegistry::new()), reader(), tmp.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no files to scan"));
    }

    #[tokio::test]
    async fn test_scan_directory_ids_are_deterministic() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "alpha").unwrap();

        let opts = Options::default();
        let one = scan_directory(&opts, Arc::new(IdRegistry::new()), reader(), tmp.path())
            .await
            .unwrap();
        let two = scan_directory(&opts, Arc::new(IdRegistry::new()), reader(), tmp.path())
            .await
            .unwrap();

        assert_eq!(one.id, two.id);
        assert_eq!(one.files[0].id, two.files[0].id);
    }

    #[tokio::test]
    async fn test_scan_directory_file_license_tag() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("tagged.rs"),
            "// SPDX-License-Identifier: MIT\nfn main() {}\n",
        )
        .unwrap();
        fs::write(tmp.path().join("plain.txt"), "nothing").unwrap();

        let opts = Options::default();
        let pkg = scan_directory(&opts, Arc::new(IdRegistry::new()), reader(), tmp.path())
            .await
            .unwrap();

        let tagged = pkg
            .files
            .iter()
            .find(|f| f.path.ends_with("tagged.rs"))
            .unwrap();
        assert_eq!(tagged.license_info_in_file, "MIT");
    }
}
