//! Pipeline error taxonomy.
//!
//! Every failure the generator can hit maps onto one of these variants.
//! All of them are fatal: the driver restores the staging area and exits.

use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

/// Result alias for pipeline components.
pub type GenerateResult<T> = std::result::Result<T, GenerateError>;

/// The stage a [`GenerateError`] originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolve,
    Toolchain,
    Stage,
    NativeBuild,
    Translate,
    Normalize,
    Publish,
    Config,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Resolve => "resolve",
            Stage::Toolchain => "toolchain",
            Stage::Stage => "stage",
            Stage::NativeBuild => "native-build",
            Stage::Translate => "translate",
            Stage::Normalize => "normalize",
            Stage::Publish => "publish",
            Stage::Config => "config",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by a pipeline stage.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum GenerateError {
    #[error("unsupported target `{target}`")]
    #[diagnostic(
        code(ccbind::stage::resolve),
        help("Run `ccbind targets` to list the supported platform/architecture pairs")
    )]
    UnsupportedTarget { target: String },

    #[error("unsupported host platform `{host}`")]
    #[diagnostic(
        code(ccbind::stage::toolchain),
        help("Run the generator on linux, darwin, freebsd, openbsd or windows")
    )]
    UnsupportedHost { host: String },

    #[error("staging failed for {}: {message}", root.display())]
    #[diagnostic(
        code(ccbind::stage::stage),
        help("Check that the source root is a git checkout; `ccbind restore` resets it by hand")
    )]
    Staging { root: PathBuf, message: String },

    #[error("native build failed: {step}")]
    #[diagnostic(
        code(ccbind::stage::native_build),
        help("Run `ccbind doctor` to check the cross toolchain")
    )]
    NativeBuild { step: String, diagnostics: String },

    #[error("translation failed: {step}")]
    #[diagnostic(code(ccbind::stage::translate))]
    Translation { step: String, diagnostics: String },

    #[error("normalization failed for {}: {message}", path.display())]
    #[diagnostic(code(ccbind::stage::normalize))]
    Normalization { path: PathBuf, message: String },

    #[error("failed to publish {}: {message}", destination.display())]
    #[diagnostic(code(ccbind::stage::publish))]
    Publish {
        destination: PathBuf,
        message: String,
    },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(ccbind::config))]
    Config { message: String },
}

impl GenerateError {
    pub fn staging(root: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        GenerateError::Staging {
            root: root.into(),
            message: message.to_string(),
        }
    }

    pub fn config(message: impl fmt::Display) -> Self {
        GenerateError::Config {
            message: message.to_string(),
        }
    }

    /// The stage this error belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            GenerateError::UnsupportedTarget { .. } => Stage::Resolve,
            GenerateError::UnsupportedHost { .. } => Stage::Toolchain,
            GenerateError::Staging { .. } => Stage::Stage,
            GenerateError::NativeBuild { .. } => Stage::NativeBuild,
            GenerateError::Translation { .. } => Stage::Translate,
            GenerateError::Normalization { .. } => Stage::Normalize,
            GenerateError::Publish { .. } => Stage::Publish,
            GenerateError::Config { .. } => Stage::Config,
        }
    }

    /// Verbatim output of the external tool that failed, if any.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            GenerateError::NativeBuild { diagnostics, .. }
            | GenerateError::Translation { diagnostics, .. } => {
                Some(diagnostics.as_str()).filter(|d| !d.is_empty())
            }
            _ => None,
        }
    }

    /// Whether the error was raised before the staging area could be touched.
    pub fn is_pre_mutation(&self) -> bool {
        matches!(
            self,
            GenerateError::UnsupportedTarget { .. }
                | GenerateError::UnsupportedHost { .. }
                | GenerateError::Config { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_mapping() {
        let err = GenerateError::UnsupportedTarget {
            target: "plan9/mips".into(),
        };
        assert_eq!(err.stage(), Stage::Resolve);
        assert!(err.is_pre_mutation());
        assert_eq!(err.to_string(), "unsupported target `plan9/mips`");

        let err = GenerateError::NativeBuild {
            step: "configure".into(),
            diagnostics: "checking for gcc... no\n".into(),
        };
        assert_eq!(err.stage(), Stage::NativeBuild);
        assert!(!err.is_pre_mutation());
        assert_eq!(err.diagnostics(), Some("checking for gcc... no\n"));
    }

    #[test]
    fn test_empty_diagnostics_are_hidden() {
        let err = GenerateError::Translation {
            step: "translate archive".into(),
            diagnostics: String::new(),
        };
        assert!(err.diagnostics().is_none());
    }

    #[test]
    fn test_miette_code() {
        let err = GenerateError::Publish {
            destination: PathBuf::from("out/ccgo_linux_amd64.go"),
            message: "disk full".into(),
        };
        let code = MietteDiagnostic::code(&err).map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("ccbind::stage::publish"));
    }
}
