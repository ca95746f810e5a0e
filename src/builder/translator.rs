//! Translation engine driver and compiler proxy.
//!
//! The engine is an external program. ccbind drives it twice per run:
//!
//! - **build**: `<engine> --target os/arch <options> -exec make -j N <target>`.
//!   The engine runs make with `CC` pointing back at this executable and
//!   [`EXEC_SENTINEL`] set, so each compiler call make issues re-enters
//!   ccbind in compiler-proxy mode and is forwarded to the engine.
//! - **translate**: `<engine> --target os/arch <options> -o <result> <archive>`.
//!
//! Which of the two process roles is active is decided once at startup by
//! [`Invocation::from_env`].

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::builder::toolchain::ToolchainProfile;
use crate::core::error::{GenerateError, GenerateResult};
use crate::core::target::TargetSpec;
use crate::util::config::{PrefixConfig, TranslatorConfig};
use crate::util::process::{CommandRunner, CommandSpec, ProcessBuilder, ProcessOutput};

/// Set (to any non-empty value) when this process is a compiler proxy.
pub const EXEC_SENTINEL: &str = "CCBIND_EXEC";
/// Engine the compiler proxy forwards to.
pub const TRANSLATOR_ENV: &str = "CCBIND_TRANSLATOR";
/// `os/arch` the compiler proxy translates for.
pub const TARGET_ENV: &str = "CCBIND_TARGET";
/// Narrows C `long double` to 64 bits.
pub const LONG_DOUBLE_64_FLAG: &str = "-mlong-double-64";

/// Fixed engine options shared by both driver-mode invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatorOptions {
    pub program: PathBuf,
    pub target: TargetSpec,
    /// Translated file name, relative to the working directory
    pub result: PathBuf,
    pub args: Vec<String>,
}

impl TranslatorOptions {
    pub fn new(config: &TranslatorConfig, include_dir: &Path, target: &TargetSpec) -> Self {
        let mut args = Vec::new();
        if target.needs_long_double_64() {
            args.push(LONG_DOUBLE_64_FLAG.to_string());
        }
        args.push("--package-name".to_string());
        args.push(config.package_name.clone());
        args.extend(prefix_args(&config.prefixes));
        if config.ignore_unsupported_alignment {
            args.push("-ignore-unsupported-alignment".to_string());
        }
        args.push("-I".to_string());
        args.push(include_dir.display().to_string());

        TranslatorOptions {
            program: config.program.clone(),
            target: target.clone(),
            result: config.result.clone(),
            args,
        }
    }

    /// `<engine> --target os/arch <options>`
    fn base_command(&self) -> CommandSpec {
        CommandSpec::new(&self.program)
            .arg("--target")
            .arg(self.target.to_string())
            .args(self.args.iter().cloned())
    }
}

fn prefix_args(prefixes: &PrefixConfig) -> Vec<String> {
    [
        ("enumerator", &prefixes.enumerator),
        ("external", &prefixes.external),
        ("field", &prefixes.field),
        ("macro", &prefixes.macro_),
        ("static-internal", &prefixes.static_internal),
        ("static-none", &prefixes.static_none),
        ("tagged-enum", &prefixes.tagged_enum),
        ("tagged-struct", &prefixes.tagged_struct),
        ("tagged-union", &prefixes.tagged_union),
        ("typename", &prefixes.typename),
        ("undefined", &prefixes.undefined),
    ]
    .iter()
    .map(|(kind, prefix)| format!("--prefix-{}={}", kind, prefix))
    .collect()
}

/// Driver-mode front end for the translation engine.
pub struct BindingTranslator<'a> {
    options: &'a TranslatorOptions,
    runner: &'a dyn CommandRunner,
    /// Executable make should call as its C compiler
    proxy_exe: PathBuf,
}

impl<'a> BindingTranslator<'a> {
    pub fn new(
        options: &'a TranslatorOptions,
        runner: &'a dyn CommandRunner,
        proxy_exe: impl Into<PathBuf>,
    ) -> Self {
        BindingTranslator {
            options,
            runner,
            proxy_exe: proxy_exe.into(),
        }
    }

    pub fn options(&self) -> &TranslatorOptions {
        self.options
    }

    /// The engine invocation that runs the native build under the proxy.
    pub fn build_command(
        &self,
        profile: &ToolchainProfile,
        make_target: &str,
        cwd: &Path,
    ) -> CommandSpec {
        self.options
            .base_command()
            .arg("-exec")
            .arg(profile.make.display().to_string())
            .arg("-j")
            .arg(profile.parallelism.to_string())
            .arg(make_target)
            .env(EXEC_SENTINEL, "1")
            .env(TRANSLATOR_ENV, self.options.program.display().to_string())
            .env(TARGET_ENV, self.options.target.to_string())
            .env("CC", self.proxy_exe.display().to_string())
            .cwd(cwd)
    }

    /// Run make through the engine, routing every compile back here.
    ///
    /// Only a failure to start the engine is an error here; make's own exit
    /// status is returned for the caller to judge.
    pub fn exec_build(
        &self,
        profile: &ToolchainProfile,
        make_target: &str,
        cwd: &Path,
    ) -> GenerateResult<ProcessOutput> {
        let spec = self.build_command(profile, make_target, cwd);
        tracing::info!("Building `{}` through {}", make_target, self.options.program.display());
        self.runner
            .run(&spec)
            .map_err(|e| GenerateError::Translation {
                step: format!("build archive: `{}`", spec),
                diagnostics: format!("{:#}\n", e),
            })
    }

    /// The engine invocation that translates `archive`.
    pub fn translate_command(&self, archive: &Path, cwd: &Path) -> CommandSpec {
        self.options
            .base_command()
            .arg("-o")
            .arg(self.options.result.display().to_string())
            .arg(archive.display().to_string())
            .cwd(cwd)
    }

    /// Translate `archive` and return the path of the translated source.
    ///
    /// `archive` must be absolute; the engine resolves relative inputs
    /// against its own working directory.
    pub fn translate(&self, archive: &Path, cwd: &Path) -> GenerateResult<PathBuf> {
        if !archive.is_absolute() {
            return Err(GenerateError::Translation {
                step: format!("archive path {} is not absolute", archive.display()),
                diagnostics: String::new(),
            });
        }

        let spec = self.translate_command(archive, cwd);
        tracing::info!("Translating {}", archive.display());
        let output = self.run("translate archive", &spec)?;

        let result = cwd.join(&self.options.result);
        if !result.is_file() {
            return Err(GenerateError::Translation {
                step: format!("engine produced no {}", self.options.result.display()),
                diagnostics: output.combined(),
            });
        }
        Ok(result)
    }

    fn run(&self, step: &str, spec: &CommandSpec) -> GenerateResult<ProcessOutput> {
        let output = self
            .runner
            .run(spec)
            .map_err(|e| GenerateError::Translation {
                step: format!("{}: `{}`", step, spec),
                diagnostics: format!("{:#}\n", e),
            })?;

        if !output.success() {
            return Err(GenerateError::Translation {
                step: format!("{} ({}): `{}`", step, output.status_text(), spec),
                diagnostics: output.combined(),
            });
        }
        Ok(output)
    }
}

/// What this process was started to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    RunPipeline,
    ActAsCompilerProxy(ProxyRequest),
}

/// A compiler call to forward to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRequest {
    pub translator: Option<PathBuf>,
    pub target: Option<String>,
    /// Arguments make passed to `cc`
    pub args: Vec<OsString>,
}

impl Invocation {
    /// Decide from the process environment and arguments.
    pub fn from_env() -> Self {
        Self::from_parts(|key| env::var_os(key), env::args_os().skip(1))
    }

    pub fn from_parts<F, I>(lookup: F, args: I) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
        I: IntoIterator<Item = OsString>,
    {
        let set = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if set(EXEC_SENTINEL).is_none() {
            return Invocation::RunPipeline;
        }

        Invocation::ActAsCompilerProxy(ProxyRequest {
            translator: set(TRANSLATOR_ENV).map(PathBuf::from),
            target: set(TARGET_ENV).map(|t| t.to_string_lossy().into_owned()),
            args: args.into_iter().collect(),
        })
    }
}

/// Forward a compiler call to the engine and return the exit code for this
/// process.
///
/// The engine inherits stdio and reports through its own exit status.
/// Failures to start it are printed to stderr and become exit code 1.
pub fn run_compiler_proxy(request: &ProxyRequest) -> i32 {
    let Some(translator) = &request.translator else {
        eprintln!("ccbind: {} is set but {} is not", EXEC_SENTINEL, TRANSLATOR_ENV);
        return 1;
    };

    let mut cmd = ProcessBuilder::new(translator);
    if let Some(target) = &request.target {
        cmd = cmd.arg("--target").arg(target);
    }
    cmd = cmd.args(&request.args);

    match cmd.status() {
        Ok(status) => status.code().unwrap_or(1),
        Err(e) => {
            eprintln!("ccbind: {:#}", e);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::toolchain::{HostPlatform, ToolchainOverrides};
    use crate::test_support::{CommandPattern, MockRunner};
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    fn options(os: &str, arch: &str) -> TranslatorOptions {
        TranslatorOptions::new(
            &TranslatorConfig::default(),
            Path::new("freetype/include"),
            &TargetSpec::new(os, arch),
        )
    }

    fn profile() -> ToolchainProfile {
        let overrides = ToolchainOverrides {
            jobs: Some(4),
            ..Default::default()
        };
        let target = TargetSpec::new("linux", "amd64");
        ToolchainProfile::resolve(target.resolve().unwrap(), HostPlatform::Linux, &overrides)
    }

    #[test]
    fn test_options_follow_prefix_scheme() {
        let opts = options("linux", "amd64");
        assert_eq!(opts.args[0], LONG_DOUBLE_64_FLAG);
        assert_eq!(opts.args[1..3], ["--package-name", "libfreetype"]);
        assert!(opts.args.contains(&"--prefix-external=x_".to_string()));
        assert!(opts.args.contains(&"--prefix-tagged-struct=T".to_string()));
        assert!(opts.args.contains(&"--prefix-macro=m_".to_string()));
        assert!(opts.args.contains(&"-ignore-unsupported-alignment".to_string()));
        assert!(opts.args.ends_with(&["-I".to_string(), "freetype/include".to_string()]));
    }

    #[test]
    fn test_long_double_flag_only_where_needed() {
        assert!(options("darwin", "amd64").args.contains(&LONG_DOUBLE_64_FLAG.to_string()));
        assert!(!options("darwin", "arm64").args.contains(&LONG_DOUBLE_64_FLAG.to_string()));
        assert!(!options("linux", "arm").args.contains(&LONG_DOUBLE_64_FLAG.to_string()));
    }

    #[test]
    fn test_build_command_routes_cc_through_proxy() {
        let opts = options("linux", "amd64");
        let runner = MockRunner::new();
        let translator = BindingTranslator::new(&opts, &runner, "/usr/local/bin/ccbind");

        let spec = translator.build_command(&profile(), "library", Path::new("/src/freetype"));
        let line = spec.display_command();

        assert!(line.starts_with("ccgo --target linux/amd64 -mlong-double-64 "));
        assert!(line.ends_with(" -exec make -j 4 library"));
        assert_eq!(spec.env.get(EXEC_SENTINEL).map(String::as_str), Some("1"));
        assert_eq!(spec.env.get(TRANSLATOR_ENV).map(String::as_str), Some("ccgo"));
        assert_eq!(spec.env.get(TARGET_ENV).map(String::as_str), Some("linux/amd64"));
        assert_eq!(
            spec.env.get("CC").map(String::as_str),
            Some("/usr/local/bin/ccbind")
        );
        assert_eq!(spec.cwd.as_deref(), Some(Path::new("/src/freetype")));
    }

    #[test]
    fn test_exec_build_returns_make_status() {
        let opts = options("linux", "amd64");
        let runner = MockRunner::new();
        runner.expect(
            CommandPattern::Contains("-exec make".into()),
            ProcessOutput::failed(2, "ftgrays.c:42: unsupported alignment\n"),
        );
        let translator = BindingTranslator::new(&opts, &runner, "ccbind");

        let output = translator
            .exec_build(&profile(), "library", Path::new("/src/freetype"))
            .unwrap();
        assert_eq!(output.code, Some(2));
    }

    #[test]
    fn test_unstartable_engine_is_a_translation_error() {
        let opts = options("linux", "amd64");
        let runner = MockRunner::new();
        let translator = BindingTranslator::new(&opts, &runner, "ccbind");

        let err = translator
            .exec_build(&profile(), "library", Path::new("/src/freetype"))
            .unwrap_err();
        assert!(matches!(err, GenerateError::Translation { .. }));
        assert!(err.diagnostics().unwrap().contains("unexpected command"));
    }

    #[test]
    fn test_translate_returns_result_path() {
        let tmp = TempDir::new().unwrap();
        let opts = options("linux", "arm64");
        let runner = MockRunner::new();
        runner.on(CommandPattern::Contains(" -o ccgo.go ".into()), |spec| {
            let cwd = spec.cwd.clone().unwrap();
            fs::write(cwd.join("ccgo.go"), "package libfreetype\n").unwrap();
            ProcessOutput::ok("")
        });
        let translator = BindingTranslator::new(&opts, &runner, "ccbind");

        let archive = tmp.path().join("objs/.libs/libfreetype.a");
        let result = translator.translate(&archive, tmp.path()).unwrap();

        assert_eq!(result, tmp.path().join("ccgo.go"));
        let line = runner.command_lines().pop().unwrap();
        assert!(line.ends_with(&format!("-o ccgo.go {}", archive.display())));
    }

    #[test]
    fn test_translate_without_output_fails() {
        let tmp = TempDir::new().unwrap();
        let opts = options("linux", "arm64");
        let runner = MockRunner::new();
        runner.expect(CommandPattern::Any, ProcessOutput::ok("nothing to do\n"));
        let translator = BindingTranslator::new(&opts, &runner, "ccbind");

        let err = translator
            .translate(&tmp.path().join("libfreetype.a"), tmp.path())
            .unwrap_err();
        assert!(matches!(err, GenerateError::Translation { .. }));
        assert_eq!(err.diagnostics(), Some("nothing to do\n"));
    }

    #[test]
    fn test_translate_rejects_relative_archive() {
        let opts = options("linux", "arm64");
        let runner = MockRunner::new();
        let translator = BindingTranslator::new(&opts, &runner, "ccbind");

        let err = translator
            .translate(Path::new("objs/.libs/libfreetype.a"), Path::new("/src"))
            .unwrap_err();
        assert!(matches!(err, GenerateError::Translation { .. }));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_invocation_dispatch() {
        let args = || vec![OsString::from("-c"), OsString::from("ftgrays.c")];

        let env: HashMap<&str, &str> = HashMap::new();
        let inv = Invocation::from_parts(|k| env.get(k).map(OsString::from), args());
        assert_eq!(inv, Invocation::RunPipeline);

        let env: HashMap<&str, &str> = [(EXEC_SENTINEL, "")].into_iter().collect();
        let inv = Invocation::from_parts(|k| env.get(k).map(OsString::from), args());
        assert_eq!(inv, Invocation::RunPipeline);

        let env: HashMap<&str, &str> = [
            (EXEC_SENTINEL, "1"),
            (TRANSLATOR_ENV, "/opt/ccgo"),
            (TARGET_ENV, "windows/amd64"),
        ]
        .into_iter()
        .collect();
        let inv = Invocation::from_parts(|k| env.get(k).map(OsString::from), args());
        assert_eq!(
            inv,
            Invocation::ActAsCompilerProxy(ProxyRequest {
                translator: Some(PathBuf::from("/opt/ccgo")),
                target: Some("windows/amd64".into()),
                args: args(),
            })
        );
    }

    #[test]
    fn test_proxy_without_translator_exits_nonzero() {
        let request = ProxyRequest {
            translator: None,
            target: None,
            args: vec![],
        };
        assert_eq!(run_compiler_proxy(&request), 1);
    }

    #[test]
    fn test_proxy_with_missing_engine_exits_nonzero() {
        let request = ProxyRequest {
            translator: Some(PathBuf::from("/nonexistent/ccgo-4242")),
            target: Some("linux/amd64".into()),
            args: vec![OsString::from("-c"), OsString::from("a.c")],
        };
        assert_eq!(run_compiler_proxy(&request), 1);
    }

    #[test]
    #[cfg(unix)]
    fn test_proxy_forwards_arguments_and_exit_code() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("args.log");
        let engine = tmp.path().join("engine.sh");
        fs::write(
            &engine,
            format!("#!/bin/sh\necho \"$@\" > '{}'\nexit 7\n", log.display()),
        )
        .unwrap();
        fs::set_permissions(&engine, fs::Permissions::from_mode(0o755)).unwrap();

        let request = ProxyRequest {
            translator: Some(engine),
            target: Some("linux/arm".into()),
            args: vec![OsString::from("-c"), OsString::from("ftgrays.c")],
        };

        assert_eq!(run_compiler_proxy(&request), 7);
        assert_eq!(
            fs::read_to_string(&log).unwrap(),
            "--target linux/arm -c ftgrays.c\n"
        );
    }

    #[test]
    #[cfg(unix)]
    fn test_proxy_passes_arguments_byte_for_byte() {
        use std::os::unix::ffi::OsStringExt;
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let log = tmp.path().join("args.log");
        let engine = tmp.path().join("engine.sh");
        fs::write(
            &engine,
            format!("#!/bin/sh\nprintf '%s\\n' \"$@\" > '{}'\n", log.display()),
        )
        .unwrap();
        fs::set_permissions(&engine, fs::Permissions::from_mode(0o755)).unwrap();

        let request = ProxyRequest {
            translator: Some(engine),
            target: None,
            args: vec![
                OsString::from_vec(b"-DNAME=caf\xe9".to_vec()),
                OsString::from("-c"),
            ],
        };

        assert_eq!(run_compiler_proxy(&request), 0);
        assert_eq!(fs::read(&log).unwrap(), b"-DNAME=caf\xe9\n-c\n".to_vec());
    }
}
