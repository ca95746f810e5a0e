//! `ccbind targets` command

use std::path::PathBuf;

use anyhow::Result;

use ccbind::core::target::{TargetSpec, SUPPORTED_TARGETS};
use ccbind::ops::ArtifactPublisher;
use ccbind::util::GlobalContext;

pub fn execute(config: Option<PathBuf>) -> Result<()> {
    let ctx = GlobalContext::new()?.with_config_path(config);
    let project = ctx.load_config()?;
    let publisher = ArtifactPublisher::new(&project.output.dir, &project.output);
    let host = TargetSpec::host();

    for entry in SUPPORTED_TARGETS {
        let target = TargetSpec::new(entry.os, entry.arch);
        let marker = if target == host { " (host)" } else { "" };
        println!(
            "{:<16} {:<22} {}{}",
            target.to_string(),
            entry.triple,
            publisher.destination(&target).display(),
            marker
        );
    }

    Ok(())
}
