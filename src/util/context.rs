//! Global context for ccbind operations.
//!
//! Provides centralized access to the invocation directory and the
//! configuration files layered under the CLI flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::util::config::{
    global_toolchain_config_path, Config, ToolchainConfig, ToolchainSettings, CONFIG_FILE_NAME,
};

/// Process-wide paths and configuration sources.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Directory ccbind was invoked from; relative config paths resolve here
    cwd: PathBuf,

    /// `--config` override for the project file
    config_path: Option<PathBuf>,

    /// Global toolchain file, `None` when no home directory is known
    toolchain_config_path: Option<PathBuf>,
}

impl GlobalContext {
    /// Create a context for the current directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        GlobalContext {
            cwd: cwd.into(),
            config_path: None,
            toolchain_config_path: global_toolchain_config_path(),
        }
    }

    /// Use an explicit project config file.
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path.map(|p| self.resolve_path(&p));
        self
    }

    /// Use a different global toolchain file.
    pub fn with_toolchain_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.toolchain_config_path = path;
        self
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// The project config file in effect.
    pub fn config_path(&self) -> PathBuf {
        self.config_path
            .clone()
            .unwrap_or_else(|| self.cwd.join(CONFIG_FILE_NAME))
    }

    /// Load the project config. An explicit `--config` file must exist; the
    /// default one is optional.
    pub fn load_config(&self) -> Result<Config> {
        Config::discover(self.config_path.as_deref(), &self.cwd.join(CONFIG_FILE_NAME))
    }

    /// Toolchain settings from the global file, or empty ones.
    pub fn toolchain_settings(&self) -> ToolchainSettings {
        self.toolchain_config_path
            .as_deref()
            .map(ToolchainConfig::load_or_default)
            .unwrap_or_default()
            .toolchain
    }

    /// Resolve `path` against the invocation directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }
}
