use crate::metadata::MetadataProvider;
use crate::renamer::{RenameOutcome, Renamer, PACKAGE_SUFFIX};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid file specified: {}", .0.display())]
    InvalidFile(PathBuf),
    #[error("invalid directory specified: {}", .0.display())]
    InvalidDirectory(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    File(PathBuf),
    Directory { path: PathBuf, recursive: bool },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub renamed: usize,
    pub would_rename: usize,
    pub skipped: usize,
    pub conflicts: usize,
    pub errors: usize,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: RenameOutcome) {
        self.processed += 1;
        match outcome {
            RenameOutcome::Renamed => self.renamed += 1,
            RenameOutcome::WouldRename => self.would_rename += 1,
            RenameOutcome::SkippedSameName => self.skipped += 1,
            RenameOutcome::Conflict => self.conflicts += 1,
            RenameOutcome::Error => self.errors += 1,
        }
    }

    pub fn failures(&self) -> usize {
        self.conflicts + self.errors
    }
}

/// Checks the command line target before anything is processed.
pub fn resolve_target(path: &Path, directory: bool, recursive: bool) -> Result<Target, ConfigError> {
    if directory {
        if !path.is_dir() {
            return Err(ConfigError::InvalidDirectory(path.to_path_buf()));
        }
        Ok(Target::Directory {
            path: path.to_path_buf(),
            recursive,
        })
    } else {
        if !path.is_file() {
            return Err(ConfigError::InvalidFile(path.to_path_buf()));
        }
        Ok(Target::File(path.to_path_buf()))
    }
}

/// Calls `on_file` for `root` itself when it is a file, otherwise for every
/// package file below it.
pub fn walk<F>(root: &Path, recursive: bool, mut on_file: F) -> Result<()>
where
    F: FnMut(&Path) -> Result<()>,
{
    if root.is_file() {
        return on_file(root);
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    for entry in WalkDir::new(root).max_depth(max_depth).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(err)
                    .with_context(|| format!("failed to read directory: {}", root.display()));
            }
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        let path = entry.path();
        if path.is_dir() || !is_package(path) {
            continue;
        }
        on_file(path)?;
    }

    Ok(())
}

/// Runs the renamer over every file the target selects.
pub fn run_batch<P, W>(target: &Target, renamer: &Renamer<'_, P>, out: &mut W) -> Result<BatchSummary>
where
    P: MetadataProvider + ?Sized,
    W: Write + ?Sized,
{
    let (root, recursive) = match target {
        Target::File(path) => (path.as_path(), false),
        Target::Directory { path, recursive } => (path.as_path(), *recursive),
    };

    let mut summary = BatchSummary::default();
    walk(root, recursive, |path| {
        let decision = renamer
            .process(path, out)
            .context("failed to write report")?;
        summary.record(decision.outcome);
        Ok(())
    })?;

    tracing::debug!(?summary, "batch finished");
    Ok(summary)
}

fn is_package(path: &Path) -> bool {
    path.file_name()
        .map(|name| {
            name.to_string_lossy()
                .to_ascii_lowercase()
                .ends_with(PACKAGE_SUFFIX)
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MetadataError, MetadataMap};
    use crate::renamer::{FormatMode, RenameOptions};
    use std::fs;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, b"pkg").expect("write file");
    }

    fn visited(root: &Path, recursive: bool) -> Vec<String> {
        let mut seen = Vec::new();
        walk(root, recursive, |path| {
            let rel = path.strip_prefix(root).unwrap_or(path);
            seen.push(rel.to_string_lossy().replace('\\', "/"));
            Ok(())
        })
        .expect("walk");
        seen.sort();
        seen
    }

    fn tree() -> tempfile::TempDir {
        let temp = tempdir().expect("tempdir");
        touch(&temp.path().join("top.pkg"));
        touch(&temp.path().join("UPPER.PKG"));
        touch(&temp.path().join("notes.txt"));
        touch(&temp.path().join("sub/inner.pkg"));
        touch(&temp.path().join("sub/deeper/deep.Pkg"));
        touch(&temp.path().join("bundle.pkg/nested.txt"));
        touch(&temp.path().join("sub/archive.PKG/nested.txt"));
        temp
    }

    #[test]
    fn non_recursive_visits_top_level_packages_only() {
        let temp = tree();
        assert_eq!(visited(temp.path(), false), vec!["UPPER.PKG", "top.pkg"]);
    }

    #[test]
    fn recursive_visits_every_depth() {
        let temp = tree();
        assert_eq!(
            visited(temp.path(), true),
            vec!["UPPER.PKG", "sub/deeper/deep.Pkg", "sub/inner.pkg", "top.pkg"]
        );
    }

    #[test]
    fn directories_named_like_packages_are_not_visited() {
        let temp = tree();
        for recursive in [false, true] {
            let seen = visited(temp.path(), recursive);
            assert!(!seen.iter().any(|p| p == "bundle.pkg"));
            assert!(!seen.iter().any(|p| p == "sub/archive.PKG"));
        }
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subdirectory_is_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tree();
        let locked = temp.path().join("sub/deeper");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).expect("lock dir");
        if fs::read_dir(&locked).is_ok() {
            // Permission bits are not enforced (running as root).
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("unlock dir");
            return;
        }

        let seen = visited(temp.path(), true);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).expect("unlock dir");
        assert_eq!(seen, vec!["UPPER.PKG", "sub/inner.pkg", "top.pkg"]);
    }

    #[test]
    fn single_file_is_visited_once_whatever_its_name() {
        let temp = tempdir().expect("tempdir");
        let file = temp.path().join("game.bin");
        touch(&file);

        let mut count = 0;
        walk(&file, true, |path| {
            assert_eq!(path, file.as_path());
            count += 1;
            Ok(())
        })
        .expect("walk");
        assert_eq!(count, 1);
    }

    #[test]
    fn missing_root_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let missing = temp.path().join("nope");
        assert!(walk(&missing, false, |_| Ok(())).is_err());
        assert!(walk(&missing, true, |_| Ok(())).is_err());
    }

    #[test]
    fn resolve_target_checks_kind_of_path() {
        let temp = tempdir().expect("tempdir");
        let file = temp.path().join("a.pkg");
        touch(&file);

        assert_eq!(
            resolve_target(&file, false, false),
            Ok(Target::File(file.clone()))
        );
        assert_eq!(
            resolve_target(&file, true, false),
            Err(ConfigError::InvalidDirectory(file.clone()))
        );
        assert_eq!(
            resolve_target(temp.path(), false, false),
            Err(ConfigError::InvalidFile(temp.path().to_path_buf()))
        );
        assert_eq!(
            resolve_target(temp.path(), true, true),
            Ok(Target::Directory {
                path: temp.path().to_path_buf(),
                recursive: true
            })
        );
    }

    #[test]
    fn one_broken_file_does_not_stop_the_batch() {
        let temp = tempdir().expect("tempdir");
        for name in ["a.pkg", "b.pkg", "c.pkg"] {
            touch(&temp.path().join(name));
        }

        let provider = |path: &Path| -> Result<MetadataMap, MetadataError> {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            if stem == "b" {
                return Err(MetadataError::InvalidPackage("bad magic".to_string()));
            }
            Ok([
                ("CONTENT_ID", format!("UP0001-CUSA0000{stem}")),
                ("APP_VER", "01.00".to_string()),
                ("VERSION", "01.00".to_string()),
            ]
            .into_iter()
            .collect())
        };
        let options = RenameOptions {
            mode: FormatMode::Default,
            ..RenameOptions::default()
        };
        let renamer = Renamer::new(&provider, &options);
        let target = resolve_target(temp.path(), true, false).expect("target");

        let mut out = Vec::new();
        let summary = run_batch(&target, &renamer, &mut out).expect("batch");

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.renamed, 2);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.failures(), 1);
        assert!(temp.path().join("UP0001-CUSA0000a-A0100-V0100.pkg").exists());
        assert!(temp.path().join("b.pkg").exists());
        assert!(temp.path().join("UP0001-CUSA0000c-A0100-V0100.pkg").exists());

        let report = String::from_utf8(out).expect("utf8");
        assert_eq!(report.lines().count(), 3);
        assert!(report.lines().nth(1).expect("second line").starts_with("ERROR: "));
    }

    #[test]
    fn summary_counts_each_outcome() {
        let mut summary = BatchSummary::default();
        summary.record(RenameOutcome::Renamed);
        summary.record(RenameOutcome::WouldRename);
        summary.record(RenameOutcome::SkippedSameName);
        summary.record(RenameOutcome::Conflict);
        assert_eq!(summary.processed, 4);
        assert_eq!(summary.failures(), 1);
    }
}
