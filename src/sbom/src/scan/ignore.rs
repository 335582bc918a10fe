//! Ignore pattern compilation and matching.
//!
//! Full `.gitignore` semantics: `!` negation, trailing-slash directory-only
//! patterns, leading-slash anchoring, and `**` globs. Caller-supplied extra
//! patterns are compiled first; when `.gitignore` loading is enabled the
//! `.git/` directory is always excluded, matching git's own behavior.

use std::path::{Path, PathBuf};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ocibom_core::error::{BomError, Result};

/// Name of the ignore file read at the scan root.
const GITIGNORE_FILE: &str = ".gitignore";

/// Compile the ignore matcher for a scan of `dir_path`.
///
/// Later patterns take precedence, so `.gitignore` lines can negate extras.
/// Blank lines and `#` comments are dropped.
pub fn ignore_patterns(
    dir_path: &Path,
    extra_patterns: &[String],
    skip_gitignore: bool,
) -> Result<Gitignore> {
    let mut builder = GitignoreBuilder::new(dir_path);

    for pattern in extra_patterns {
        builder
            .add_line(None, pattern)
            .map_err(|e| BomError::Scan(format!("parsing ignore pattern '{}': {}", pattern, e)))?;
    }

    if skip_gitignore {
        tracing::debug!("not using patterns in .gitignore");
        return finish(builder);
    }

    let gitignore_path = dir_path.join(GITIGNORE_FILE);
    if gitignore_path.exists() {
        // Match git's behavior: never descend into the repository metadata
        builder
            .add_line(None, ".git/")
            .map_err(|e| BomError::Scan(format!("adding .git pattern: {}", e)))?;

        let content = std::fs::read_to_string(&gitignore_path)
            .map_err(|e| BomError::Scan(format!("opening gitignore file: {}", e)))?;
        let mut loaded = 0usize;
        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            builder.add_line(None, line).map_err(|e| {
                BomError::Scan(format!("parsing .gitignore pattern '{}': {}", line, e))
            })?;
            loaded += 1;
        }
        tracing::debug!(
            patterns = loaded,
            extras = extra_patterns.len(),
            "loaded ignore patterns from scan root"
        );
    }

    finish(builder)
}

fn finish(builder: GitignoreBuilder) -> Result<Gitignore> {
    builder
        .build()
        .map_err(|e| BomError::Scan(format!("compiling ignore patterns: {}", e)))
}

/// Drop matched paths from a file list. Paths are relative to the scan root.
pub fn apply_ignore_patterns(file_list: Vec<PathBuf>, matcher: &Gitignore) -> Vec<PathBuf> {
    tracing::info!(
        patterns = matcher.num_ignores() + matcher.num_whitelists(),
        files = file_list.len(),
        "applying ignore patterns"
    );

    file_list
        .into_iter()
        .filter(|path| {
            if matcher.matched_path_or_any_parents(path, false).is_ignore() {
                tracing::debug!(file = %path.display(), "file ignored");
                false
            } else {
                true
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn paths(items: &[&str]) -> Vec<PathBuf> {
        items.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_extra_patterns_filter_files() {
        let tmp = TempDir::new().unwrap();
        let matcher =
            ignore_patterns(tmp.path(), &["*.log".to_string()], true).unwrap();

        let kept = apply_ignore_patterns(paths(&["a.txt", "b.log", "dir/c.log"]), &matcher);
        assert_eq!(kept, paths(&["a.txt"]));
    }

    #[test]
    fn test_gitignore_and_git_dir_default() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".gitignore"), "*.log\n").unwrap();

        let matcher = ignore_patterns(tmp.path(), &[], false).unwrap();
        let kept =
            apply_ignore_patterns(paths(&["a.txt", "b.log", ".git/HEAD"]), &matcher);
        assert_eq!(kept, paths(&["a.txt"]));
    }

    #[test]
    fn test_no_gitignore_flag_skips_root_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".gitignore"), "*.log\n").unwrap();

        let matcher = ignore_patterns(tmp.path(), &[], true).unwrap();
        let kept = apply_ignore_patterns(paths(&["a.txt", "b.log"]), &matcher);
        assert_eq!(kept, paths(&["a.txt", "b.log"]));
    }

    #[test]
    fn test_comments_and_blanks_are_dropped() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(".gitignore"),
            "# comment\n\n   \n*.tmp\n",
        )
        .unwrap();

        let matcher = ignore_patterns(tmp.path(), &[], false).unwrap();
        let kept = apply_ignore_patterns(paths(&["x.tmp", "y.txt"]), &matcher);
        assert_eq!(kept, paths(&["y.txt"]));
    }

    #[test]
    fn test_negation_pattern() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".gitignore"), "*.log\n!keep.log\n").unwrap();

        let matcher = ignore_patterns(tmp.path(), &[], false).unwrap();
        let kept =
            apply_ignore_patterns(paths(&["a.log", "keep.log", "b.txt"]), &matcher);
        assert_eq!(kept, paths(&["keep.log", "b.txt"]));
    }

    #[test]
    fn test_directory_only_pattern() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".gitignore"), "build/\n").unwrap();

        let matcher = ignore_patterns(tmp.path(), &[], false).unwrap();
        let kept = apply_ignore_patterns(
            paths(&["build/out.o", "src/build.rs"]),
            &matcher,
        );
        assert_eq!(kept, paths(&["src/build.rs"]));
    }

    #[test]
    fn test_double_star_glob() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".gitignore"), "**/target/**\n").unwrap();

        let matcher = ignore_patterns(tmp.path(), &[], false).unwrap();
        let kept = apply_ignore_patterns(
            paths(&["crates/a/target/debug/lib.rlib", "crates/a/src/lib.rs"]),
            &matcher,
        );
        assert_eq!(kept, paths(&["crates/a/src/lib.rs"]));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let matcher =
            ignore_patterns(tmp.path(), &["*.log".to_string()], true).unwrap();

        let once = apply_ignore_patterns(paths(&["a.txt", "b.log"]), &matcher);
        let twice = apply_ignore_patterns(once.clone(), &matcher);
        assert_eq!(once, twice);
    }
}
