//! `ccbind generate` command

use std::path::PathBuf;

use anyhow::Result;

use crate::cli::GenerateArgs;
use ccbind::ops::generate;
use ccbind::util::process::SystemRunner;
use ccbind::util::{GlobalContext, Shell};

pub fn execute(args: GenerateArgs, config: Option<PathBuf>, shell: &Shell) -> Result<()> {
    let ctx = GlobalContext::new()?.with_config_path(config);
    let project = ctx.load_config()?;

    generate(&ctx, project, &args.to_options(), &SystemRunner, shell)?;

    Ok(())
}
