//! Native library build driver.
//!
//! Runs the library's own build system inside the staged tree: preparation
//! commands, in-place source patches, `configure` pointed at the cross
//! toolchain, then make (through the translation engine) to produce the
//! static archive.

use std::path::{Path, PathBuf};

use crate::builder::toolchain::ToolchainProfile;
use crate::builder::translator::BindingTranslator;
use crate::core::error::{GenerateError, GenerateResult};
use crate::util::config::{LibraryConfig, NativeConfig};
use crate::util::process::{CommandRunner, CommandSpec};

/// Native builder for one staged source root.
pub struct NativeBuilder<'a> {
    root: &'a Path,
    library: &'a LibraryConfig,
    native: &'a NativeConfig,
    profile: &'a ToolchainProfile,
    runner: &'a dyn CommandRunner,
}

impl<'a> NativeBuilder<'a> {
    /// `root` must be the absolute path of the staged tree.
    pub fn new(
        root: &'a Path,
        library: &'a LibraryConfig,
        native: &'a NativeConfig,
        profile: &'a ToolchainProfile,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        NativeBuilder {
            root,
            library,
            native,
            profile,
            runner,
        }
    }

    /// Absolute path of the archive the build produces.
    pub fn archive_path(&self) -> PathBuf {
        self.root.join(&self.library.archive)
    }

    pub fn prepare_commands(&self) -> Vec<CommandSpec> {
        self.native
            .prepare
            .iter()
            .map(|cmd| {
                CommandSpec::new(&cmd.program)
                    .args(cmd.args.iter().cloned())
                    .cwd(self.root)
            })
            .collect()
    }

    /// `sed -i <expression> <file>` for each configured patch.
    pub fn patch_commands(&self) -> Vec<CommandSpec> {
        self.native
            .patches
            .iter()
            .map(|patch| {
                CommandSpec::new(&self.profile.sed)
                    .arg("-i")
                    .arg(patch.expression.clone())
                    .arg(patch.file.display().to_string())
                    .cwd(self.root)
            })
            .collect()
    }

    pub fn configure_command(&self) -> CommandSpec {
        let path = |p: &Path| p.display().to_string();

        CommandSpec::new("sh")
            .arg("./configure")
            .args(self.native.configure_flags.iter().cloned())
            .arg(format!("--host={}", self.profile.host_triple))
            .env("CFLAGS", self.native.cflags.join(" "))
            .env("CC", path(&self.profile.cc))
            .env("AR", path(&self.profile.ar))
            .env("RANLIB", path(&self.profile.ranlib))
            .env("STRIP", path(&self.profile.strip))
            .cwd(self.root)
    }

    /// Prepare, patch and configure the staged tree.
    pub fn configure(&self) -> GenerateResult<()> {
        for spec in self.prepare_commands() {
            self.run_step("prepare", &spec)?;
        }
        for spec in self.patch_commands() {
            self.run_step("patch source", &spec)?;
        }

        tracing::info!("Configuring for {}", self.profile.host_triple);
        self.run_step("configure", &self.configure_command())
    }

    /// Build the static archive with make running under the engine.
    ///
    /// An engine that cannot be started is a translation error. A non-zero
    /// exit from make, or a clean exit without the archive, is a native
    /// build error.
    pub fn build_archive(&self, translator: &BindingTranslator<'_>) -> GenerateResult<PathBuf> {
        let output = translator.exec_build(self.profile, &self.library.make_target, self.root)?;
        if !output.success() {
            return Err(GenerateError::NativeBuild {
                step: format!(
                    "make {} ({}) under {}",
                    self.library.make_target,
                    output.status_text(),
                    translator.options().program.display()
                ),
                diagnostics: output.combined(),
            });
        }

        let archive = self.archive_path();
        if !archive.is_file() {
            return Err(GenerateError::NativeBuild {
                step: format!(
                    "`make {}` did not produce {}",
                    self.library.make_target,
                    self.library.archive.display()
                ),
                diagnostics: String::new(),
            });
        }

        tracing::info!("Built {}", archive.display());
        Ok(archive)
    }

    fn run_step(&self, step: &str, spec: &CommandSpec) -> GenerateResult<()> {
        tracing::debug!("{}: {}", step, spec);
        let output = self
            .runner
            .run(spec)
            .map_err(|e| GenerateError::NativeBuild {
                step: format!("{}: `{}`", step, spec),
                diagnostics: format!("{:#}\n", e),
            })?;

        if !output.success() {
            return Err(GenerateError::NativeBuild {
                step: format!("{} ({}): `{}`", step, output.status_text(), spec),
                diagnostics: output.combined(),
            });
        }
        Ok(())
    }
}
