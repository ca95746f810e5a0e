//! `ccbind restore` command

use std::path::PathBuf;

use anyhow::Result;

use ccbind::ops::restore;
use ccbind::util::shell::Status;
use ccbind::util::{GlobalContext, Shell};

pub fn execute(config: Option<PathBuf>, shell: &Shell) -> Result<()> {
    let ctx = GlobalContext::new()?.with_config_path(config);
    let project = ctx.load_config()?;

    shell.status(Status::Restoring, project.library.source_root.display());
    let root = restore(&ctx, &project)?;
    shell.status(Status::Restored, root.display());

    Ok(())
}
