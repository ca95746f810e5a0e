//! Manual recovery of the staging area.

use std::path::PathBuf;

use crate::core::error::GenerateResult;
use crate::sources::SourceStager;
use crate::util::config::Config;
use crate::util::context::GlobalContext;

/// Reset the configured source root to its committed state.
///
/// Needed only after a run was killed before it could clean up; returns the
/// restored directory.
pub fn restore(ctx: &GlobalContext, config: &Config) -> GenerateResult<PathBuf> {
    let root = ctx.resolve_path(&config.library.source_root);
    let overlay = ctx.resolve_path(&config.library.overlay_dir);
    SourceStager::new(&root, overlay).restore()?;
    Ok(root)
}
