//! Cross toolchain configuration.
//!
//! Tool names are resolved once per run, in priority order:
//! 1. Explicit overrides (CLI flags and their environment variables)
//! 2. The global toolchain file (`~/.ccbind/toolchain.toml`)
//! 3. Defaults for the platform the generator runs on
//!
//! The result is an immutable [`ToolchainProfile`] shared by reference with
//! every stage.

use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::error::{GenerateError, GenerateResult};
use crate::core::target::HostTriple;
use crate::util::config::ToolchainSettings;

/// The platform the generator itself runs on.
///
/// This decides which `make` and `sed` flavours drive the native build,
/// independently of the cross-compilation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostPlatform {
    Linux,
    Darwin,
    FreeBsd,
    OpenBsd,
    Windows,
}

impl HostPlatform {
    /// Detect the running platform.
    pub fn detect() -> GenerateResult<Self> {
        Self::from_os(std::env::consts::OS)
    }

    /// Map an OS name (Rust's or the generator's spelling) to a platform.
    pub fn from_os(os: &str) -> GenerateResult<Self> {
        match os {
            "linux" => Ok(HostPlatform::Linux),
            "macos" | "darwin" => Ok(HostPlatform::Darwin),
            "freebsd" => Ok(HostPlatform::FreeBsd),
            "openbsd" => Ok(HostPlatform::OpenBsd),
            "windows" => Ok(HostPlatform::Windows),
            other => Err(GenerateError::UnsupportedHost {
                host: other.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HostPlatform::Linux => "linux",
            HostPlatform::Darwin => "darwin",
            HostPlatform::FreeBsd => "freebsd",
            HostPlatform::OpenBsd => "openbsd",
            HostPlatform::Windows => "windows",
        }
    }

    /// GNU make under the name this platform installs it as.
    pub fn make_binary(&self) -> &'static str {
        match self {
            HostPlatform::FreeBsd | HostPlatform::OpenBsd => "gmake",
            _ => "make",
        }
    }

    /// GNU sed under the name this platform installs it as.
    pub fn sed_binary(&self) -> &'static str {
        match self {
            HostPlatform::Darwin | HostPlatform::FreeBsd | HostPlatform::OpenBsd => "gsed",
            _ => "sed",
        }
    }
}

impl fmt::Display for HostPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Explicit tool overrides, highest priority.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolchainOverrides {
    pub cc: Option<PathBuf>,
    pub ar: Option<PathBuf>,
    pub ranlib: Option<PathBuf>,
    pub strip: Option<PathBuf>,
    pub make: Option<PathBuf>,
    pub sed: Option<PathBuf>,
    pub jobs: Option<usize>,
}

impl ToolchainOverrides {
    /// Fill unset fields from the global toolchain file.
    pub fn or_settings(mut self, settings: &ToolchainSettings) -> Self {
        fn pick(slot: &mut Option<PathBuf>, fallback: &Option<PathBuf>) {
            if slot.as_ref().map_or(true, |p| p.as_os_str().is_empty()) {
                *slot = fallback.clone();
            }
        }

        pick(&mut self.cc, &settings.cc);
        pick(&mut self.ar, &settings.ar);
        pick(&mut self.ranlib, &settings.ranlib);
        pick(&mut self.strip, &settings.strip);
        pick(&mut self.make, &settings.make);
        pick(&mut self.sed, &settings.sed);
        if self.jobs.is_none() {
            self.jobs = settings.jobs;
        }
        self
    }
}

/// Fully resolved toolchain for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolchainProfile {
    pub host_triple: HostTriple,
    pub cc: PathBuf,
    pub ar: PathBuf,
    pub ranlib: PathBuf,
    pub strip: PathBuf,
    pub make: PathBuf,
    pub sed: PathBuf,
    /// Concurrent compilation units for `make -j`
    pub parallelism: usize,
}

impl ToolchainProfile {
    /// Resolve a profile for `host_triple` on `platform`.
    pub fn resolve(
        host_triple: HostTriple,
        platform: HostPlatform,
        overrides: &ToolchainOverrides,
    ) -> Self {
        fn choose(over: &Option<PathBuf>, default: &str) -> PathBuf {
            over.as_ref()
                .filter(|p| !p.as_os_str().is_empty())
                .cloned()
                .unwrap_or_else(|| PathBuf::from(default))
        }

        ToolchainProfile {
            host_triple,
            cc: choose(&overrides.cc, "gcc"),
            ar: choose(&overrides.ar, "ar"),
            ranlib: choose(&overrides.ranlib, "ranlib"),
            strip: choose(&overrides.strip, "strip"),
            make: choose(&overrides.make, platform.make_binary()),
            sed: choose(&overrides.sed, platform.sed_binary()),
            parallelism: overrides
                .jobs
                .filter(|j| *j > 0)
                .unwrap_or_else(default_parallelism),
        }
    }

    /// Tool name/path pairs, in the order they are reported.
    pub fn tools(&self) -> [(&'static str, &Path); 6] {
        [
            ("compiler", self.cc.as_path()),
            ("archiver", self.ar.as_path()),
            ("ranlib", self.ranlib.as_path()),
            ("strip", self.strip.as_path()),
            ("make", self.make.as_path()),
            ("sed", self.sed.as_path()),
        ]
    }
}

/// Number of available execution units.
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
