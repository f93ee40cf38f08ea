//! Python source file collection
//!
//! Walks the given paths with `walkdir`, skipping hidden entries, virtual
//! environments and build output, and applies include/exclude globs.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use glob::Pattern;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Errors that can occur while collecting files
#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("path does not exist: {0}")]
    PathNotFound(String),

    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Directories never descended into
const SKIPPED_DIRS: &[&str] = &[
    "__pycache__",
    "node_modules",
    "venv",
    "env",
    "build",
    "dist",
    "site-packages",
];

const PYTHON_EXTENSIONS: &[&str] = &["py", "pyi"];

/// Reject patterns the glob matcher would misread
///
/// Only plain globs (`*`, `?`, a single `**`) are accepted; regex and
/// brace/class syntax is refused up front instead of silently matching
/// nothing.
pub fn validate_pattern(pattern: &str) -> Result<Pattern, CollectorError> {
    let invalid = |reason: &str| CollectorError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    if pattern.trim().is_empty() {
        return Err(invalid("pattern is empty"));
    }
    if pattern.contains('\\') {
        return Err(invalid("backslashes are not supported, use '/'"));
    }
    if pattern.matches("**").count() > 1 {
        return Err(invalid("at most one '**' is allowed"));
    }
    if pattern.contains(".*") || pattern.contains('^') || pattern.contains('$') {
        return Err(invalid("looks like a regular expression"));
    }
    if pattern.contains('[') || pattern.contains(']') {
        return Err(invalid("character classes are not supported"));
    }
    if pattern.contains('{') || pattern.contains('}') {
        return Err(invalid("brace expansion is not supported"));
    }

    Pattern::new(pattern).map_err(|e| invalid(&e.to_string()))
}

fn is_python_file(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| PYTHON_EXTENSIONS.contains(&ext))
}

fn is_skipped(entry: &DirEntry) -> bool {
    let Some(name) = entry.file_name().to_str() else {
        return false;
    };
    if name.starts_with('.') {
        return true;
    }
    entry.file_type().is_dir() && (SKIPPED_DIRS.contains(&name) || name.ends_with(".egg-info"))
}

/// Drop entries the walk could not read, logging each one
fn readable_entries<I>(entries: I) -> impl Iterator<Item = DirEntry>
where
    I: Iterator<Item = walkdir::Result<DirEntry>>,
{
    entries.filter_map(|entry| match entry {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!(error = %e, "skipping unreadable entry");
            None
        }
    })
}

struct FileFilter {
    include: Vec<Pattern>,
    exclude: Vec<Pattern>,
}

impl FileFilter {
    fn new(include: &[String], exclude: &[String]) -> Result<Self, CollectorError> {
        Ok(Self {
            include: include
                .iter()
                .map(|p| validate_pattern(p))
                .collect::<Result<_, _>>()?,
            exclude: exclude
                .iter()
                .map(|p| validate_pattern(p))
                .collect::<Result<_, _>>()?,
        })
    }

    /// A pattern may match the file name, the path below the walked root,
    /// or the full path
    fn matches(patterns: &[Pattern], path: &Path, root: &Path) -> bool {
        let name = path.file_name().map(|n| n.to_string_lossy());
        let relative = path.strip_prefix(root).ok();
        patterns.iter().any(|p| {
            name.as_deref().is_some_and(|n| p.matches(n))
                || relative.is_some_and(|r| p.matches_path(r))
                || p.matches_path(path)
        })
    }

    fn accepts(&self, path: &Path, root: &Path) -> bool {
        if Self::matches(&self.exclude, path, root) {
            return false;
        }
        self.include.is_empty() || Self::matches(&self.include, path, root)
    }
}

/// Collect Python files under `paths`
///
/// Results are in walk order (sorted by file name within each directory)
/// and contain no duplicates. Entries the walk cannot read are skipped.
pub fn collect_python_files(
    paths: &[PathBuf],
    recursive: bool,
    include: &[String],
    exclude: &[String],
) -> Result<Vec<PathBuf>, CollectorError> {
    let filter = FileFilter::new(include, exclude)?;
    let mut files: Vec<PathBuf> = Vec::new();
    let mut seen: HashSet<PathBuf> = HashSet::new();

    for path in paths {
        if !path.exists() {
            return Err(CollectorError::PathNotFound(path.display().to_string()));
        }

        if path.is_file() {
            let root = path.parent().unwrap_or(path);
            if is_python_file(path) && filter.accepts(path, root) && seen.insert(path.clone()) {
                files.push(path.clone());
            }
            continue;
        }

        let mut walker = WalkDir::new(path).sort_by_file_name();
        if !recursive {
            walker = walker.max_depth(1);
        }

        let entries = walker
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_skipped(e));
        for entry in readable_entries(entries) {
            let file = entry.path();
            if !entry.file_type().is_file() || !is_python_file(file) {
                continue;
            }
            if !filter.accepts(file, path) {
                debug!(file = %file.display(), "excluded by pattern");
                continue;
            }
            if seen.insert(file.to_path_buf()) {
                files.push(file.to_path_buf());
            }
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn names(files: &[PathBuf], root: &Path) -> Vec<String> {
        files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "app/__init__.py");
        touch(dir.path(), "app/models.py");
        touch(dir.path(), "app/types.pyi");
        touch(dir.path(), "app/README.md");
        touch(dir.path(), "app/__pycache__/models.cpython-312.py");
        touch(dir.path(), "venv/lib/site.py");
        touch(dir.path(), ".hidden/secret.py");
        touch(dir.path(), "tests/test_models.py");
        touch(dir.path(), "main.py");
        dir
    }

    #[test]
    fn test_collects_recursively_and_skips_noise() {
        let dir = project();
        let files = collect_python_files(&[dir.path().to_path_buf()], true, &[], &[]).unwrap();
        assert_eq!(
            names(&files, dir.path()),
            vec![
                "app/__init__.py",
                "app/models.py",
                "app/types.pyi",
                "main.py",
                "tests/test_models.py",
            ]
        );
    }

    #[test]
    fn test_non_recursive() {
        let dir = project();
        let files = collect_python_files(&[dir.path().to_path_buf()], false, &[], &[]).unwrap();
        assert_eq!(names(&files, dir.path()), vec!["main.py"]);
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let dir = project();
        let files = collect_python_files(
            &[dir.path().to_path_buf()],
            true,
            &["*.py".to_string()],
            &["test_*".to_string(), "**/__init__.py".to_string()],
        )
        .unwrap();
        assert_eq!(names(&files, dir.path()), vec!["app/models.py", "main.py"]);
    }

    #[test]
    fn test_exclude_relative_directory() {
        let dir = project();
        let files = collect_python_files(
            &[dir.path().to_path_buf()],
            true,
            &[],
            &["tests/**".to_string()],
        )
        .unwrap();
        assert!(!names(&files, dir.path()).iter().any(|f| f.starts_with("tests/")));
        assert_eq!(files.len(), 4);
    }

    #[test]
    fn test_file_argument() {
        let dir = project();
        let main = dir.path().join("main.py");
        let readme = dir.path().join("app/README.md");
        let files =
            collect_python_files(&[main.clone(), readme, main.clone()], true, &[], &[]).unwrap();
        assert_eq!(files, vec![main]);
    }

    #[test]
    fn test_overlapping_paths_are_deduplicated() {
        let dir = project();
        let app = dir.path().join("app");
        let models = app.join("models.py");
        let files = collect_python_files(
            &[models.clone(), dir.path().to_path_buf(), app],
            true,
            &[],
            &[],
        )
        .unwrap();

        assert_eq!(files.len(), 5);
        assert_eq!(files[0], models);
        assert_eq!(files.iter().filter(|f| **f == models).count(), 1);
    }

    #[test]
    fn test_unreadable_entries_are_skipped() {
        let dir = project();
        let missing = dir.path().join("gone");
        let broken = WalkDir::new(&missing).into_iter();
        let good = WalkDir::new(dir.path().join("app")).max_depth(1).into_iter();

        let paths: Vec<PathBuf> = readable_entries(broken.chain(good))
            .map(|e| e.into_path())
            .collect();
        assert!(!paths.is_empty());
        assert!(paths.iter().all(|p| p.starts_with(dir.path().join("app"))));
        assert!(!paths.contains(&missing));
    }

    #[test]
    fn test_missing_path() {
        let err = collect_python_files(&[PathBuf::from("/definitely/not/here")], true, &[], &[])
            .unwrap_err();
        assert!(matches!(err, CollectorError::PathNotFound(_)));
    }

    #[test]
    fn test_invalid_patterns() {
        for pattern in ["", "a\\b", "**/x/**", "^app", "app$", "[ab].py", "{a,b}.py", "app.*x"] {
            assert!(
                validate_pattern(pattern).is_err(),
                "pattern {:?} should be rejected",
                pattern
            );
        }
        for pattern in ["*.py", "tests/**", "**/test_*.py", "app/?.py"] {
            assert!(validate_pattern(pattern).is_ok(), "pattern {:?}", pattern);
        }
    }
}
