//! Environment and toolchain health checks.
//!
//! The `doctor` command verifies, without running anything, that every
//! program a generation run would invoke can be found and that the
//! configured directories exist.
//!
//! ## Usage
//!
//! ```bash
//! ccbind doctor --target-os windows --target-arch amd64
//! ccbind doctor --verbose
//! ```

use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use git2::Repository;

use crate::ops::generate::GenerationPlan;
use crate::util::process::find_executable;

/// Result of a single health check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    /// Human-readable status message
    pub message: String,
    /// Resolved location, if applicable
    pub path: Option<PathBuf>,
    /// Whether a failure blocks generation
    pub required: bool,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        CheckResult {
            name: name.into(),
            passed: true,
            message: message.into(),
            path: None,
            required: true,
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        CheckResult {
            name: name.into(),
            passed: false,
            message: message.into(),
            path: None,
            required: true,
        }
    }

    /// Mark this check as optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_path(mut self, path: PathBuf) -> Self {
        self.path = Some(path);
        self
    }
}

/// Summary of all health checks.
#[derive(Debug, Clone, Default)]
pub struct DoctorReport {
    /// `os/arch (triple)` the checks were run for
    pub target: String,
    pub checks: Vec<CheckResult>,
    pub total_duration: Duration,
}

impl DoctorReport {
    pub fn add(&mut self, check: CheckResult) {
        self.checks.push(check);
    }

    /// Check if all required checks passed.
    pub fn all_required_passed(&self) -> bool {
        self.checks.iter().filter(|c| c.required).all(|c| c.passed)
    }

    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.checks.iter().filter(|c| !c.passed).count()
    }

    pub fn required_failed_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.required && !c.passed)
            .count()
    }
}

/// Check everything `plan` depends on.
pub fn doctor(plan: &GenerationPlan) -> DoctorReport {
    let start = Instant::now();
    let mut report = DoctorReport {
        target: format!("{} ({})", plan.target, plan.host_triple()),
        ..Default::default()
    };

    for (role, tool) in plan.profile.tools() {
        report.add(check_tool(role, tool));
    }
    report.add(check_tool("translator", &plan.translator.program));
    report.add(check_tool("shell", Path::new("sh")));
    report.add(check_source_root(&plan.source_root));
    report.add(check_dir("overlay", &plan.overlay_dir));
    report.add(check_dir("output", &plan.output_dir).optional());

    report.total_duration = start.elapsed();
    report
}

fn check_tool(role: &str, tool: &Path) -> CheckResult {
    match find_executable(tool) {
        Some(path) => CheckResult::pass(role, format!("{} found", tool.display())).with_path(path),
        None => CheckResult::fail(role, format!("{} not found in PATH", tool.display())),
    }
}

fn check_source_root(root: &Path) -> CheckResult {
    match Repository::open(root) {
        Ok(repo) if repo.workdir().is_some() => {
            CheckResult::pass("source root", "git checkout").with_path(root.to_path_buf())
        }
        Ok(_) => CheckResult::fail("source root", "bare repository has no working tree"),
        Err(e) => CheckResult::fail(
            "source root",
            format!("{} is not a git checkout: {}", root.display(), e.message()),
        ),
    }
}

fn check_dir(name: &str, dir: &Path) -> CheckResult {
    if dir.is_dir() {
        CheckResult::pass(name, "directory exists").with_path(dir.to_path_buf())
    } else {
        CheckResult::fail(name, format!("{} does not exist", dir.display()))
    }
}

/// Format the doctor report for display.
pub fn format_report(report: &DoctorReport, verbose: bool) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "ccbind doctor: {}\n", report.target);
    let _ = writeln!(output, "Checks:");
    for check in &report.checks {
        let status = if check.passed { "[OK]" } else { "[!!]" };
        let required = if check.required { "" } else { " (optional)" };
        let _ = writeln!(output, "  {} {}{}", status, check.name, required);

        if verbose || !check.passed {
            let _ = writeln!(output, "      {}", check.message);
        }
        if verbose {
            if let Some(path) = &check.path {
                let _ = writeln!(output, "      Path: {}", path.display());
            }
        }
    }

    let _ = writeln!(
        output,
        "\nSummary: {} passed, {} failed",
        report.passed_count(),
        report.failed_count()
    );
    if report.required_failed_count() > 0 {
        let _ = writeln!(
            output,
            "{} required check(s) failed; generation will not succeed.",
            report.required_failed_count()
        );
    }

    output
}
