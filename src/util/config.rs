//! Configuration file support for ccbind.
//!
//! Two files are read:
//! - Project: `ccbind.toml` in the invocation directory (or `--config`),
//!   describing the library, the translator and the output naming.
//! - Global: `~/.ccbind/toolchain.toml`, holding toolchain binary overrides only.
//!
//! Every field has a default, so an empty or missing project file describes
//! the FreeType generator this tool grew out of.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Project configuration file name.
pub const CONFIG_FILE_NAME: &str = "ccbind.toml";

/// ccbind project configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub library: LibraryConfig,
    pub native: NativeConfig,
    pub translator: TranslatorConfig,
    pub normalize: NormalizeConfig,
    pub output: OutputConfig,
}

/// Where the native library lives and what it builds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Git checkout of the native sources (the staging area)
    pub source_root: PathBuf,
    /// Directory copied verbatim on top of `source_root` before building
    pub overlay_dir: PathBuf,
    /// Header directory passed to the translator with `-I`
    pub include_dir: PathBuf,
    /// Static archive produced by the build, relative to `source_root`
    pub archive: PathBuf,
    /// Make target that builds `archive`
    pub make_target: String,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        LibraryConfig {
            source_root: PathBuf::from("freetype"),
            overlay_dir: PathBuf::from("internal"),
            include_dir: PathBuf::from("freetype/include"),
            archive: PathBuf::from("objs/.libs/libfreetype.a"),
            make_target: "library".to_string(),
        }
    }
}

/// A command run inside the staged tree before `configure`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrepareCommand {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl PrepareCommand {
    pub fn new(program: &str, args: &[&str]) -> Self {
        PrepareCommand {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// An in-place `sed` substitution applied to a staged file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePatch {
    /// File relative to the source root
    pub file: PathBuf,
    /// sed script, e.g. `s/FT_SSE2 1/FT_SSE2 0/g`
    pub expression: String,
}

/// Native build settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeConfig {
    pub prepare: Vec<PrepareCommand>,
    /// Exported as `CFLAGS` to configure
    pub cflags: Vec<String>,
    pub configure_flags: Vec<String>,
    #[serde(rename = "patch")]
    pub patches: Vec<SourcePatch>,
}

impl Default for NativeConfig {
    fn default() -> Self {
        NativeConfig {
            prepare: vec![PrepareCommand::new("sh", &["./autogen.sh"])],
            cflags: vec!["-DFT_CONFIG_OPTION_NO_ASSEMBLER".to_string()],
            configure_flags: [
                "--disable-shared",
                "--with-brotli=no",
                "--with-bzip2=no",
                "--with-harfbuzz=no",
                "--with-png=no",
                "--with-zlib=yes",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            patches: vec![SourcePatch {
                file: PathBuf::from("src/smooth/ftgrays.c"),
                expression: "s/FT_SSE2 1/FT_SSE2 0/g".to_string(),
            }],
        }
    }
}

/// Identifier prefixes the translator assigns per symbol kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PrefixConfig {
    pub enumerator: String,
    pub external: String,
    pub field: String,
    #[serde(rename = "macro")]
    pub macro_: String,
    pub static_internal: String,
    pub static_none: String,
    pub tagged_enum: String,
    pub tagged_struct: String,
    pub tagged_union: String,
    pub typename: String,
    pub undefined: String,
}

impl Default for PrefixConfig {
    fn default() -> Self {
        PrefixConfig {
            enumerator: "_".to_string(),
            external: "x_".to_string(),
            field: "F".to_string(),
            macro_: "m_".to_string(),
            static_internal: "_".to_string(),
            static_none: "_".to_string(),
            tagged_enum: "_".to_string(),
            tagged_struct: "T".to_string(),
            tagged_union: "T".to_string(),
            typename: "T".to_string(),
            undefined: "_".to_string(),
        }
    }
}

/// Translation engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    /// Translator executable
    pub program: PathBuf,
    /// Host-language package the output declares
    pub package_name: String,
    /// Translated file written inside the source root
    pub result: PathBuf,
    pub prefixes: PrefixConfig,
    pub ignore_unsupported_alignment: bool,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        TranslatorConfig {
            program: PathBuf::from("ccgo"),
            package_name: "libfreetype".to_string(),
            result: PathBuf::from("ccgo.go"),
            prefixes: PrefixConfig::default(),
            ignore_unsupported_alignment: true,
        }
    }
}

/// Prefix rewrite rules for the translated output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub tagged_prefix: String,
    pub tagged_replacement: String,
    pub external_prefix: String,
    pub external_replacement: String,
    /// Start of the generator comment removed together with its next line
    pub provenance_marker: String,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        NormalizeConfig {
            tagged_prefix: "T__".to_string(),
            tagged_replacement: "t__".to_string(),
            external_prefix: "x_".to_string(),
            external_replacement: "X".to_string(),
            provenance_marker: "// Code generate".to_string(),
        }
    }
}

/// Naming of the published per-target file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Package directory receiving the generated files
    pub dir: PathBuf,
    pub stem: String,
    pub extension: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            dir: PathBuf::from("libfreetype"),
            stem: "ccgo".to_string(),
            extension: "go".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        Self::parse(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load `explicit` if given (it must exist), else `default_path` if it
    /// exists, else the built-in defaults.
    pub fn discover(explicit: Option<&Path>, default_path: &Path) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None if default_path.exists() => Self::load(default_path),
            None => Ok(Self::default()),
        }
    }
}

/// Toolchain overrides stored in the global `toolchain.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    pub toolchain: ToolchainSettings,
}

/// Binary names for the cross toolchain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    pub cc: Option<PathBuf>,
    pub ar: Option<PathBuf>,
    pub ranlib: Option<PathBuf>,
    pub strip: Option<PathBuf>,
    pub make: Option<PathBuf>,
    pub sed: Option<PathBuf>,
    pub translator: Option<PathBuf>,
    pub jobs: Option<usize>,
}

impl ToolchainConfig {
    /// Load toolchain configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read toolchain config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse toolchain config: {}", path.display()))
    }

    /// Load toolchain configuration with fallback to defaults if the file
    /// is missing or unreadable.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!(
                    "Failed to load toolchain config from {}: {:#}",
                    path.display(),
                    e
                );
                Self::default()
            })
        } else {
            Self::default()
        }
    }
}

/// Get the global ccbind config directory (~/.ccbind).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".ccbind"))
}

/// Get the global toolchain config path (~/.ccbind/toolchain.toml).
pub fn global_toolchain_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("toolchain.toml"))
}
