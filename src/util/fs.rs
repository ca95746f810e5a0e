//! Filesystem utilities.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

/// Files written by [`copy_tree`] before it stopped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CopyReport {
    /// Destination-relative paths of copied files, in walk order.
    pub files: Vec<PathBuf>,
    /// Destination-relative paths of directories created or updated.
    pub dirs: Vec<PathBuf>,
}

/// A tree copy that failed partway.
///
/// `copied` lists what already landed in the destination. The copy is not
/// resumable; callers must reset the destination instead.
#[derive(Debug)]
pub struct PartialCopy {
    pub copied: CopyReport,
    pub failed_at: PathBuf,
    pub error: io::Error,
}

impl fmt::Display for PartialCopy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "copy stopped at {} after {} file(s): {}",
            self.failed_at.display(),
            self.copied.files.len(),
            self.error
        )
    }
}

impl std::error::Error for PartialCopy {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Recursively copy `src` on top of `dst`.
///
/// Existing files with the same relative path are replaced, new ones are
/// created, and file and directory modes are carried over. Symlinks are
/// recreated, not followed.
pub fn copy_tree(src: &Path, dst: &Path) -> std::result::Result<CopyReport, PartialCopy> {
    let mut report = CopyReport::default();
    // Directory modes are applied last so read-only directories can still be filled.
    let mut dir_modes = Vec::new();

    let walker = WalkDir::new(src)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for entry in walker {
        let fail = |report: &CopyReport, path: PathBuf, error: io::Error| PartialCopy {
            copied: report.clone(),
            failed_at: path,
            error,
        };

        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| src.to_path_buf());
                let error = e
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::other("filesystem loop in overlay"));
                return Err(fail(&report, path, error));
            }
        };

        let rel = match entry.path().strip_prefix(src) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => continue,
        };
        let target = dst.join(&rel);
        let file_type = entry.file_type();

        let result = if file_type.is_dir() {
            copy_dir_entry(entry.path(), &target).map(|perms| {
                dir_modes.push((target.clone(), perms));
                report.dirs.push(rel.clone());
            })
        } else if file_type.is_symlink() {
            copy_symlink(entry.path(), &target).map(|()| report.files.push(rel.clone()))
        } else {
            copy_file(entry.path(), &target).map(|()| report.files.push(rel.clone()))
        };

        if let Err(error) = result {
            return Err(fail(&report, entry.path().to_path_buf(), error));
        }
    }

    for (dir, perms) in dir_modes.into_iter().rev() {
        if let Err(error) = fs::set_permissions(&dir, perms) {
            return Err(PartialCopy {
                copied: report,
                failed_at: dir,
                error,
            });
        }
    }

    Ok(report)
}

fn copy_dir_entry(src: &Path, dst: &Path) -> io::Result<fs::Permissions> {
    if dst.exists() && !dst.is_dir() {
        fs::remove_file(dst)?;
    }
    fs::create_dir_all(dst)?;
    Ok(fs::metadata(src)?.permissions())
}

fn copy_file(src: &Path, dst: &Path) -> io::Result<()> {
    remove_existing(dst)?;
    // fs::copy carries the permission bits over.
    fs::copy(src, dst)?;
    Ok(())
}

fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    remove_existing(dst)?;
    let link = fs::read_link(src)?;
    symlink(&link, dst)
}

fn remove_existing(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Remove a file or directory tree, if it exists.
pub fn remove_path(path: &Path) -> Result<()> {
    remove_existing(path).with_context(|| format!("failed to remove {}", path.display()))
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Write `contents` to `path` so readers see either the old file or the
/// complete new one.
///
/// The bytes go to a temporary file in the destination directory, which is
/// then renamed over `path`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    ensure_dir(&parent)?;

    let mut tmp = NamedTempFile::new_in(&parent)
        .with_context(|| format!("failed to create temporary file in {}", parent.display()))?;
    tmp.write_all(contents)
        .with_context(|| format!("failed to write temporary file for {}", path.display()))?;
    tmp.as_file()
        .sync_all()
        .with_context(|| format!("failed to flush temporary file for {}", path.display()))?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to move file into place: {}", path.display()))?;
    Ok(())
}

/// Create a symlink (platform-aware).
#[cfg(unix)]
pub fn symlink(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
pub fn symlink(src: &Path, dst: &Path) -> io::Result<()> {
    if src.is_dir() {
        std::os::windows::fs::symlink_dir(src, dst)
    } else {
        std::os::windows::fs::symlink_file(src, dst)
    }
}
