//! `ccbind doctor` command

use std::path::PathBuf;

use anyhow::Result;

use crate::cli::GenerateArgs;
use ccbind::ops::{doctor, format_report, GenerationPlan};
use ccbind::util::GlobalContext;

pub fn execute(args: GenerateArgs, config: Option<PathBuf>, verbose: bool) -> Result<()> {
    let ctx = GlobalContext::new()?.with_config_path(config);
    let project = ctx.load_config()?;
    let plan = GenerationPlan::resolve(&ctx, project, &args.to_options())?;

    let report = doctor(&plan);

    // Print the formatted report
    print!("{}", format_report(&report, verbose));

    // Exit with error code if required checks failed
    if !report.all_required_passed() {
        std::process::exit(1);
    }

    Ok(())
}
