//! Staging area management for the native source tree.
//!
//! The source root is a git checkout. Staging resets it to `HEAD`, removes
//! every untracked and ignored file (`git clean -fdx` followed by
//! `git reset --hard HEAD`), then copies the overlay directory on top.
//! Restoring performs the same reset without the overlay.

use std::path::{Path, PathBuf};

use git2::{Repository, ResetType, Status, StatusOptions};

use crate::core::error::{GenerateError, GenerateResult};
use crate::util::fs::{copy_tree, remove_path};

/// Outcome of a successful [`SourceStager::stage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    /// Overlay files copied into the source root
    pub overlaid_files: usize,
    /// Untracked paths removed by the initial reset
    pub removed_paths: usize,
}

/// Stages and restores a git-tracked source root.
#[derive(Debug, Clone)]
pub struct SourceStager {
    root: PathBuf,
    overlay: PathBuf,
}

impl SourceStager {
    pub fn new(root: impl Into<PathBuf>, overlay: impl Into<PathBuf>) -> Self {
        SourceStager {
            root: root.into(),
            overlay: overlay.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn overlay(&self) -> &Path {
        &self.overlay
    }

    /// Reset the source root and apply the overlay.
    ///
    /// A failed overlay copy leaves the tree partially patched; the caller
    /// must [`restore`](Self::restore) it.
    pub fn stage(&self) -> GenerateResult<StageReport> {
        let removed_paths = self.restore_counting()?;

        if !self.overlay.is_dir() {
            return Err(GenerateError::staging(
                &self.root,
                format!("overlay directory {} does not exist", self.overlay.display()),
            ));
        }

        let report = copy_tree(&self.overlay, &self.root)
            .map_err(|partial| GenerateError::staging(&self.root, partial))?;

        tracing::info!(
            "Applied {} overlay file(s) from {}",
            report.files.len(),
            self.overlay.display()
        );

        Ok(StageReport {
            overlaid_files: report.files.len(),
            removed_paths,
        })
    }

    /// Reset the source root to its committed state.
    ///
    /// Idempotent: restoring a pristine tree changes nothing.
    pub fn restore(&self) -> GenerateResult<()> {
        self.restore_counting().map(|_| ())
    }

    fn restore_counting(&self) -> GenerateResult<usize> {
        let repo = Repository::open(&self.root).map_err(|e| {
            GenerateError::staging(&self.root, format!("not a git repository: {}", e.message()))
        })?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| GenerateError::staging(&self.root, "repository has no working tree"))?
            .to_path_buf();

        let removed = clean_untracked(&repo, &workdir)
            .map_err(|e| GenerateError::staging(&self.root, format!("{:#}", e)))?;

        let head = repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|e| GenerateError::staging(&self.root, format!("cannot read HEAD: {}", e.message())))?;
        repo.reset(head.as_object(), ResetType::Hard, None)
            .map_err(|e| GenerateError::staging(&self.root, format!("reset failed: {}", e.message())))?;

        if removed > 0 {
            tracing::debug!("Removed {} untracked path(s) from {}", removed, workdir.display());
        }
        Ok(removed)
    }
}

/// Remove every untracked and ignored path, whole directories at a time.
fn clean_untracked(repo: &Repository, workdir: &Path) -> anyhow::Result<usize> {
    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .include_ignored(true)
        .recurse_untracked_dirs(false)
        .recurse_ignored_dirs(false)
        .exclude_submodules(true);

    let statuses = repo.statuses(Some(&mut opts))?;
    let doomed: Vec<PathBuf> = statuses
        .iter()
        .filter(|entry| entry.status().intersects(Status::WT_NEW | Status::IGNORED))
        .filter_map(|entry| entry.path().map(|p| workdir.join(p)))
        .collect();

    for path in &doomed {
        remove_path(path)?;
    }
    Ok(doomed.len())
}
