//! Publishing of the normalized output.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::{GenerateError, GenerateResult};
use crate::core::target::TargetSpec;
use crate::util::config::OutputConfig;
use crate::util::fs::write_atomic;
use crate::util::hash::sha256_bytes;

/// Where a publish landed and what it contained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub destination: PathBuf,
    /// Hex SHA-256 of the published bytes
    pub sha256: String,
    /// The destination already held these exact bytes
    pub unchanged: bool,
}

/// Copies normalized output into the package directory.
#[derive(Debug, Clone)]
pub struct ArtifactPublisher {
    /// Absolute package directory
    dir: PathBuf,
    stem: String,
    extension: String,
}

impl ArtifactPublisher {
    pub fn new(dir: impl Into<PathBuf>, output: &OutputConfig) -> Self {
        ArtifactPublisher {
            dir: dir.into(),
            stem: output.stem.clone(),
            extension: output.extension.clone(),
        }
    }

    /// File name for `target`: `<stem>_<os>_<arch>.<extension>`.
    pub fn file_name(&self, target: &TargetSpec) -> String {
        let base = format!("{}_{}_{}", self.stem, target.os(), target.arch());
        if self.extension.is_empty() {
            base
        } else {
            format!("{}.{}", base, self.extension)
        }
    }

    pub fn destination(&self, target: &TargetSpec) -> PathBuf {
        self.dir.join(self.file_name(target))
    }

    /// Copy `source` to the destination for `target`.
    ///
    /// The destination is replaced atomically: readers see the previous
    /// file or the complete new one, never a partial write.
    pub fn publish(&self, source: &Path, target: &TargetSpec) -> GenerateResult<PublishReport> {
        let destination = self.destination(target);
        let fail = |message: String| GenerateError::Publish {
            destination: destination.clone(),
            message,
        };

        let contents = fs::read(source)
            .map_err(|e| fail(format!("cannot read {}: {}", source.display(), e)))?;
        let sha256 = sha256_bytes(&contents);

        let unchanged = fs::read(&destination).is_ok_and(|existing| existing == contents);
        if unchanged {
            tracing::info!("{} is up to date ({})", destination.display(), sha256);
        } else {
            write_atomic(&destination, &contents).map_err(|e| fail(format!("{:#}", e)))?;
            tracing::info!("Published {} ({})", destination.display(), sha256);
        }

        Ok(PublishReport {
            destination,
            sha256,
            unchanged,
        })
    }
}
