//! Build target resolution.
//!
//! A [`TargetSpec`] names the platform the bindings are generated for, using
//! the `os`/`arch` vocabulary of the host language (`linux/amd64`,
//! `darwin/arm64`, ...). Resolution against [`SUPPORTED_TARGETS`] yields the
//! GNU host triple handed to `configure --host`.

use std::fmt;

use serde::Serialize;

use crate::core::error::{GenerateError, GenerateResult};

/// One row of the supported target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetEntry {
    pub os: &'static str,
    pub arch: &'static str,
    pub triple: &'static str,
    /// C `long double` is wider than 64 bits on this target.
    pub wide_long_double: bool,
}

/// Every target the generator knows how to cross-compile for.
pub const SUPPORTED_TARGETS: &[TargetEntry] = &[
    TargetEntry {
        os: "linux",
        arch: "386",
        triple: "i386-linux-gnu",
        wide_long_double: true,
    },
    TargetEntry {
        os: "linux",
        arch: "amd64",
        triple: "x86_64-linux-gnu",
        wide_long_double: true,
    },
    TargetEntry {
        os: "linux",
        arch: "arm",
        triple: "arm-linux-gnueabihf",
        wide_long_double: false,
    },
    TargetEntry {
        os: "linux",
        arch: "arm64",
        triple: "aarch64-linux-gnu",
        wide_long_double: true,
    },
    TargetEntry {
        os: "windows",
        arch: "amd64",
        triple: "x86_64-w64-mingw32",
        wide_long_double: true,
    },
    TargetEntry {
        os: "windows",
        arch: "arm64",
        triple: "aarch64-w64-mingw32",
        wide_long_double: false,
    },
    TargetEntry {
        os: "darwin",
        arch: "amd64",
        triple: "x86_64-apple-darwin",
        wide_long_double: true,
    },
    TargetEntry {
        os: "darwin",
        arch: "arm64",
        triple: "aarch64-apple-darwin",
        wide_long_double: false,
    },
];

/// The platform/architecture pair bindings are generated for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TargetSpec {
    os: String,
    arch: String,
}

impl TargetSpec {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        TargetSpec {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The target matching the machine the generator runs on.
    pub fn host() -> Self {
        TargetSpec::new(
            host_os_name(std::env::consts::OS),
            host_arch_name(std::env::consts::ARCH),
        )
    }

    /// Build from optional overrides, falling back to the host for each half.
    pub fn from_overrides(os: Option<&str>, arch: Option<&str>) -> Self {
        let host = TargetSpec::host();
        TargetSpec {
            os: os.filter(|s| !s.is_empty()).map(str::to_string).unwrap_or(host.os),
            arch: arch
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .unwrap_or(host.arch),
        }
    }

    /// Parse `os/arch`.
    pub fn parse(s: &str) -> Option<Self> {
        let (os, arch) = s.split_once('/')?;
        if os.is_empty() || arch.is_empty() || arch.contains('/') {
            return None;
        }
        Some(TargetSpec::new(os, arch))
    }

    pub fn os(&self) -> &str {
        &self.os
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    fn entry(&self) -> Option<&'static TargetEntry> {
        SUPPORTED_TARGETS
            .iter()
            .find(|e| e.os == self.os && e.arch == self.arch)
    }

    /// Map to the cross-compilation host triple.
    ///
    /// Fails closed: a pair missing from [`SUPPORTED_TARGETS`] is an error,
    /// never a guessed triple.
    pub fn resolve(&self) -> GenerateResult<HostTriple> {
        self.entry()
            .map(|e| HostTriple(e.triple))
            .ok_or_else(|| GenerateError::UnsupportedTarget {
                target: self.to_string(),
            })
    }

    /// Whether the translator must be told to narrow `long double`.
    pub fn needs_long_double_64(&self) -> bool {
        self.entry().is_some_and(|e| e.wide_long_double)
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// GNU host triple, e.g. `x86_64-linux-gnu`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostTriple(&'static str);

impl HostTriple {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl fmt::Display for HostTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Serialize for HostTriple {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

/// Rust's OS name to the generator's vocabulary.
pub fn host_os_name(os: &str) -> &str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

/// Rust's architecture name to the generator's vocabulary.
pub fn host_arch_name(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_supported_target_resolves() {
        for entry in SUPPORTED_TARGETS {
            let spec = TargetSpec::new(entry.os, entry.arch);
            let triple = spec.resolve().unwrap();
            assert!(!triple.as_str().is_empty());
            assert_eq!(triple.as_str(), entry.triple);
        }
    }

    #[test]
    fn test_unsupported_targets_fail_closed() {
        for (os, arch) in [
            ("linux", "riscv64"),
            ("plan9", "amd64"),
            ("darwin", "386"),
            ("", ""),
            ("LINUX", "AMD64"),
        ] {
            let err = TargetSpec::new(os, arch).resolve().unwrap_err();
            assert!(matches!(err, GenerateError::UnsupportedTarget { .. }));
        }
    }

    #[test]
    fn test_table_has_no_duplicates() {
        for (i, a) in SUPPORTED_TARGETS.iter().enumerate() {
            for b in &SUPPORTED_TARGETS[i + 1..] {
                assert!(!(a.os == b.os && a.arch == b.arch), "{}/{}", a.os, a.arch);
            }
        }
    }

    #[test]
    fn test_parse() {
        let spec = TargetSpec::parse("windows/arm64").unwrap();
        assert_eq!(spec.os(), "windows");
        assert_eq!(spec.arch(), "arm64");
        assert_eq!(spec.to_string(), "windows/arm64");

        assert!(TargetSpec::parse("linux").is_none());
        assert!(TargetSpec::parse("/amd64").is_none());
        assert!(TargetSpec::parse("linux/amd64/v2").is_none());
    }

    #[test]
    fn test_overrides_fall_back_to_host() {
        let host = TargetSpec::host();

        let spec = TargetSpec::from_overrides(Some("windows"), None);
        assert_eq!(spec.os(), "windows");
        assert_eq!(spec.arch(), host.arch());

        let spec = TargetSpec::from_overrides(Some(""), Some("arm"));
        assert_eq!(spec.os(), host.os());
        assert_eq!(spec.arch(), "arm");
    }

    #[test]
    fn test_host_name_mapping() {
        assert_eq!(host_os_name("macos"), "darwin");
        assert_eq!(host_os_name("linux"), "linux");
        assert_eq!(host_arch_name("x86_64"), "amd64");
        assert_eq!(host_arch_name("aarch64"), "arm64");
        assert_eq!(host_arch_name("x86"), "386");
        assert_eq!(host_arch_name("arm"), "arm");
    }

    #[test]
    fn test_long_double_flag() {
        assert!(TargetSpec::new("linux", "amd64").needs_long_double_64());
        assert!(!TargetSpec::new("darwin", "arm64").needs_long_double_64());
        assert!(!TargetSpec::new("plan9", "amd64").needs_long_double_64());
    }
}
