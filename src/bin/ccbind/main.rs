//! ccbind CLI - binding generator for native C libraries

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use ccbind::builder::translator::{run_compiler_proxy, Invocation};
use ccbind::util::Shell;
use ccbind::GenerateError;
use cli::{Cli, Commands, MessageFormat};
use miette::Diagnostic;

fn main() {
    // make re-enters this executable as its C compiler; nothing else runs then
    if let Invocation::ActAsCompilerProxy(request) = Invocation::from_env() {
        std::process::exit(run_compiler_proxy(&request));
    }

    let cli = Cli::parse();
    let shell = Shell::from_flags(
        cli.quiet,
        cli.verbose,
        cli.color,
        cli.message_format == MessageFormat::Json,
    );

    if let Err(e) = run(cli, &shell) {
        report(&e, &shell);
        std::process::exit(1);
    }
}

fn run(cli: Cli, shell: &Shell) -> Result<()> {
    // Set up logging
    let filter = if cli.verbose {
        EnvFilter::new("ccbind=debug")
    } else if cli.quiet || cli.message_format == MessageFormat::Json {
        EnvFilter::new("ccbind=warn")
    } else {
        EnvFilter::new("ccbind=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let config = cli.config;
    match cli.command {
        None => commands::generate::execute(cli.generate, config, shell),
        Some(Commands::Generate(args)) => {
            commands::generate::execute(args.or(cli.generate), config, shell)
        }
        Some(Commands::Targets) => commands::targets::execute(config),
        Some(Commands::Restore) => commands::restore::execute(config, shell),
        Some(Commands::Doctor(args)) => {
            commands::doctor::execute(args.or(cli.generate), config, cli.verbose)
        }
        Some(Commands::Completions(args)) => commands::completions::execute(args),
    }
}

/// Print the failed stage's own output verbatim, then the summary.
fn report(err: &anyhow::Error, shell: &Shell) {
    match err.downcast_ref::<GenerateError>() {
        Some(e) => {
            if let Some(diagnostics) = e.diagnostics() {
                shell.diagnostics(diagnostics);
            }
            shell.error(e);
            if let Some(help) = e.help() {
                shell.note(format!("help: {}", help));
            }
        }
        None => shell.error(format!("{:#}", err)),
    }
}
