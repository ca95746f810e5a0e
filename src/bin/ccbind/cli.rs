//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell as CompletionShell;

use ccbind::builder::ToolchainOverrides;
use ccbind::core::TargetSpec;
use ccbind::ops::GenerateOptions;
use ccbind::util::shell::ColorChoice;

/// ccbind - cross-compile a C library and translate it into per-target bindings
#[derive(Parser)]
#[command(name = "ccbind")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output format for messages
    #[arg(long, global = true, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,

    /// Coloring: auto, always, never
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Project config file (defaults to ./ccbind.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Arguments for `generate` when no command is given
    #[command(flatten)]
    pub generate: GenerateArgs,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full pipeline for one target (the default)
    Generate(GenerateArgs),

    /// List supported targets
    Targets,

    /// Reset the staging area after an interrupted run
    Restore,

    /// Check that the toolchain and translator can be found
    Doctor(GenerateArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Clone, Default)]
pub struct GenerateArgs {
    /// Target as `os/arch`; takes precedence over --target-os/--target-arch
    #[arg(long, value_name = "OS/ARCH", value_parser = parse_target)]
    pub target: Option<TargetSpec>,

    /// Target operating system (defaults to the host's)
    #[arg(long, env = "TARGET_OS", value_name = "OS")]
    pub target_os: Option<String>,

    /// Target architecture (defaults to the host's)
    #[arg(long, env = "TARGET_ARCH", value_name = "ARCH")]
    pub target_arch: Option<String>,

    /// C compiler
    #[arg(long, env = "CCGO_CC", value_name = "PATH")]
    pub cc: Option<PathBuf>,

    /// Archiver
    #[arg(long, env = "CCGO_AR", value_name = "PATH")]
    pub ar: Option<PathBuf>,

    /// Archive indexer
    #[arg(long, env = "CCGO_RANLIB", value_name = "PATH")]
    pub ranlib: Option<PathBuf>,

    /// Symbol stripper
    #[arg(long, env = "CCGO_STRIP", value_name = "PATH")]
    pub strip: Option<PathBuf>,

    /// GNU make binary
    #[arg(long, env = "CCBIND_MAKE", value_name = "PATH")]
    pub make: Option<PathBuf>,

    /// GNU sed binary
    #[arg(long, env = "CCBIND_SED", value_name = "PATH")]
    pub sed: Option<PathBuf>,

    /// Number of parallel make jobs
    #[arg(short, long, env = "CCBIND_JOBS")]
    pub jobs: Option<usize>,

    /// Translation engine
    #[arg(long, env = "CCBIND_TRANSLATOR", value_name = "PATH")]
    pub translator: Option<PathBuf>,
}

impl GenerateArgs {
    /// Fill every option left unset here from `fallback`.
    ///
    /// Generate options may be given before the subcommand name
    /// (`ccbind --target linux/arm generate`); the subcommand's own win.
    pub fn or(self, fallback: GenerateArgs) -> GenerateArgs {
        GenerateArgs {
            target: self.target.or(fallback.target),
            target_os: self.target_os.or(fallback.target_os),
            target_arch: self.target_arch.or(fallback.target_arch),
            cc: self.cc.or(fallback.cc),
            ar: self.ar.or(fallback.ar),
            ranlib: self.ranlib.or(fallback.ranlib),
            strip: self.strip.or(fallback.strip),
            make: self.make.or(fallback.make),
            sed: self.sed.or(fallback.sed),
            jobs: self.jobs.or(fallback.jobs),
            translator: self.translator.or(fallback.translator),
        }
    }

    pub fn to_options(&self) -> GenerateOptions {
        let (target_os, target_arch) = match &self.target {
            Some(target) => (Some(target.os().to_string()), Some(target.arch().to_string())),
            None => (self.target_os.clone(), self.target_arch.clone()),
        };
        GenerateOptions {
            target_os,
            target_arch,
            toolchain: ToolchainOverrides {
                cc: self.cc.clone(),
                ar: self.ar.clone(),
                ranlib: self.ranlib.clone(),
                strip: self.strip.clone(),
                make: self.make.clone(),
                sed: self.sed.clone(),
                jobs: self.jobs,
            },
            translator: self.translator.clone(),
            ..Default::default()
        }
    }
}

fn parse_target(s: &str) -> Result<TargetSpec, String> {
    TargetSpec::parse(s).ok_or_else(|| format!("expected `os/arch`, got `{}`", s))
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: CompletionShell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_is_the_default() {
        let cli = Cli::try_parse_from(["ccbind", "--target-os", "linux", "--target-arch", "arm"])
            .unwrap();
        assert!(cli.command.is_none());
        let options = cli.generate.to_options();
        assert_eq!(options.target_os.as_deref(), Some("linux"));
        assert_eq!(options.target_arch.as_deref(), Some("arm"));
    }

    #[test]
    fn test_tool_overrides() {
        let cli = Cli::try_parse_from([
            "ccbind", "generate", "--cc", "clang", "--jobs", "3", "--make", "gmake",
        ])
        .unwrap();
        let Some(Commands::Generate(args)) = cli.command else {
            panic!("expected generate");
        };
        let options = args.to_options();
        assert_eq!(options.toolchain.cc, Some(PathBuf::from("clang")));
        assert_eq!(options.toolchain.make, Some(PathBuf::from("gmake")));
        assert_eq!(options.toolchain.jobs, Some(3));
    }

    #[test]
    fn test_target_shorthand() {
        let cli = Cli::try_parse_from(["ccbind", "doctor", "--target", "windows/arm64"]).unwrap();
        let Some(Commands::Doctor(args)) = cli.command else {
            panic!("expected doctor");
        };
        let options = args.to_options();
        assert_eq!(options.target_os.as_deref(), Some("windows"));
        assert_eq!(options.target_arch.as_deref(), Some("arm64"));

        assert!(Cli::try_parse_from(["ccbind", "--target", "windows"]).is_err());
    }

    #[test]
    fn test_global_flags_before_subcommand() {
        let cli = Cli::try_parse_from(["ccbind", "--verbose", "--config", "x.toml", "restore"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("x.toml")));
        assert!(matches!(cli.command, Some(Commands::Restore)));

        let cli = Cli::try_parse_from([
            "ccbind",
            "--message-format",
            "json",
            "generate",
            "--target",
            "linux/riscv64",
        ])
        .unwrap();
        assert!(cli.message_format == MessageFormat::Json);
        assert!(matches!(cli.command, Some(Commands::Generate(_))));

        let cli = Cli::try_parse_from(["ccbind", "generate", "--quiet"]).unwrap();
        assert!(cli.quiet);
    }

    #[test]
    fn test_leading_generate_options_fill_the_subcommand() {
        let cli = Cli::try_parse_from([
            "ccbind", "--target", "linux/arm", "--cc", "clang", "doctor", "--cc", "gcc",
        ])
        .unwrap();
        let Some(Commands::Doctor(args)) = cli.command else {
            panic!("expected doctor");
        };
        let options = args.or(cli.generate).to_options();
        assert_eq!(options.target_os.as_deref(), Some("linux"));
        assert_eq!(options.target_arch.as_deref(), Some("arm"));
        assert_eq!(options.toolchain.cc, Some(PathBuf::from("gcc")));
    }
}
