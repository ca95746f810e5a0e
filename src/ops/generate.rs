//! Implementation of `ccbind generate`.
//!
//! The pipeline moves through a fixed sequence of states:
//!
//! ```text
//! Init -> Resolved -> Staged -> Built -> Translated -> Normalized -> Published -> CleanedUp
//! ```
//!
//! Any failure moves straight to `Aborted`. Once the staging area has been
//! touched, both `Published` and `Aborted` are followed by a restore of the
//! source tree (`CleanedUp`). Failures during resolution happen before the
//! tree is touched and skip the restore.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;

use crate::builder::native::NativeBuilder;
use crate::builder::normalize::{NormalizeReport, SymbolNormalizer};
use crate::builder::toolchain::{HostPlatform, ToolchainOverrides, ToolchainProfile};
use crate::builder::translator::{BindingTranslator, TranslatorOptions};
use crate::core::error::{GenerateError, GenerateResult};
use crate::core::target::{HostTriple, TargetSpec};
use crate::ops::events::PipelineEvent;
use crate::ops::publish::{ArtifactPublisher, PublishReport};
use crate::sources::staging::SourceStager;
use crate::util::config::Config;
use crate::util::context::GlobalContext;
use crate::util::process::CommandRunner;
use crate::util::shell::{format_duration, Shell, Status};

/// Pipeline states, in transition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineState {
    Init,
    Resolved,
    Staged,
    Built,
    Translated,
    Normalized,
    Published,
    CleanedUp,
    Aborted,
}

impl PipelineState {
    /// The state a successful transition leads to.
    pub fn next(self) -> Option<PipelineState> {
        use PipelineState::*;
        match self {
            Init => Some(Resolved),
            Resolved => Some(Staged),
            Staged => Some(Built),
            Built => Some(Translated),
            Translated => Some(Normalized),
            Normalized => Some(Published),
            Published | Aborted => Some(CleanedUp),
            CleanedUp => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Init => "init",
            PipelineState::Resolved => "resolved",
            PipelineState::Staged => "staged",
            PipelineState::Built => "built",
            PipelineState::Translated => "translated",
            PipelineState::Normalized => "normalized",
            PipelineState::Published => "published",
            PipelineState::CleanedUp => "cleaned-up",
            PipelineState::Aborted => "aborted",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for the generate operation.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Target OS, the host's when unset
    pub target_os: Option<String>,
    /// Target architecture, the host's when unset
    pub target_arch: Option<String>,
    pub toolchain: ToolchainOverrides,
    /// Translation engine override
    pub translator: Option<PathBuf>,
    /// Platform the generator runs on, detected when unset
    pub host: Option<HostPlatform>,
    /// Executable make calls as its compiler, this one when unset
    pub proxy_exe: Option<PathBuf>,
}

/// Everything a run needs, resolved once before the tree is touched.
#[derive(Debug, Clone)]
pub struct GenerationPlan {
    pub target: TargetSpec,
    pub profile: ToolchainProfile,
    pub config: Config,
    /// Absolute staging area
    pub source_root: PathBuf,
    /// Absolute overlay directory
    pub overlay_dir: PathBuf,
    /// Absolute package directory
    pub output_dir: PathBuf,
    pub translator: TranslatorOptions,
    pub normalizer: SymbolNormalizer,
    pub proxy_exe: PathBuf,
}

impl GenerationPlan {
    /// Resolve target, toolchain and paths.
    ///
    /// Has no side effects; every error here is raised before mutation.
    pub fn resolve(
        ctx: &GlobalContext,
        mut config: Config,
        options: &GenerateOptions,
    ) -> GenerateResult<Self> {
        let target =
            TargetSpec::from_overrides(options.target_os.as_deref(), options.target_arch.as_deref());
        let host_triple = target.resolve()?;

        let platform = match options.host {
            Some(platform) => platform,
            None => HostPlatform::detect()?,
        };
        let settings = ctx.toolchain_settings();
        let overrides = options.toolchain.clone().or_settings(&settings);
        let profile = ToolchainProfile::resolve(host_triple, platform, &overrides);

        if let Some(program) = options
            .translator
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .or(settings.translator)
        {
            config.translator.program = program;
        }

        let normalizer = SymbolNormalizer::new(&config.normalize)?;
        let include_dir = ctx.resolve_path(&config.library.include_dir);
        let translator = TranslatorOptions::new(&config.translator, &include_dir, &target);

        let proxy_exe = match &options.proxy_exe {
            Some(exe) => exe.clone(),
            None => std::env::current_exe().map_err(|e| {
                GenerateError::config(format!("cannot locate the ccbind executable: {}", e))
            })?,
        };

        Ok(GenerationPlan {
            source_root: ctx.resolve_path(&config.library.source_root),
            overlay_dir: ctx.resolve_path(&config.library.overlay_dir),
            output_dir: ctx.resolve_path(&config.output.dir),
            target,
            profile,
            config,
            translator,
            normalizer,
            proxy_exe,
        })
    }

    pub fn host_triple(&self) -> HostTriple {
        self.profile.host_triple
    }

    /// Where the published file for this plan lands.
    pub fn destination(&self) -> PathBuf {
        self.publisher().destination(&self.target)
    }

    fn publisher(&self) -> ArtifactPublisher {
        ArtifactPublisher::new(&self.output_dir, &self.config.output)
    }

    fn stager(&self) -> SourceStager {
        SourceStager::new(&self.source_root, &self.overlay_dir)
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct GenerateReport {
    pub target: TargetSpec,
    pub published: PublishReport,
    pub normalized: NormalizeReport,
    /// Every state the pipeline passed through
    pub states: Vec<PipelineState>,
}

/// Restores the staging area when dropped, unless restored explicitly.
///
/// Covers panics and early returns between staging and cleanup.
pub struct StagingGuard<'s> {
    stager: &'s SourceStager,
    armed: bool,
}

impl<'s> StagingGuard<'s> {
    pub fn new(stager: &'s SourceStager) -> Self {
        StagingGuard {
            stager,
            armed: true,
        }
    }

    /// Restore now and report the outcome.
    pub fn restore(mut self) -> GenerateResult<()> {
        self.armed = false;
        self.stager.restore()
    }
}

impl Drop for StagingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.stager.restore() {
                tracing::warn!("failed to restore {}: {}", self.stager.root().display(), e);
            }
        }
    }
}

/// Drives one generation run.
pub struct Pipeline<'a> {
    plan: &'a GenerationPlan,
    runner: &'a dyn CommandRunner,
    shell: &'a Shell,
    state: PipelineState,
    history: Vec<PipelineState>,
}

impl<'a> Pipeline<'a> {
    pub fn new(plan: &'a GenerationPlan, runner: &'a dyn CommandRunner, shell: &'a Shell) -> Self {
        Pipeline {
            plan,
            runner,
            shell,
            state: PipelineState::Init,
            history: vec![PipelineState::Init],
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Run every stage, then restore the staging area.
    pub fn run(&mut self) -> GenerateResult<GenerateReport> {
        let start = Instant::now();
        self.announce();
        self.advance(PipelineState::Resolved);

        let stager = self.plan.stager();
        let guard = StagingGuard::new(&stager);
        let result = self.run_stages(&stager);

        if result.is_err() {
            self.transition(PipelineState::Aborted);
        }
        let last = self.state;

        self.shell.status(Status::Restoring, stager.root().display());
        let restored = guard.restore();
        if restored.is_ok() {
            self.advance(PipelineState::CleanedUp);
        }

        let outcome = match (result, restored) {
            (Ok(mut report), Ok(())) => {
                report.states = self.history.clone();
                Ok(report)
            }
            (Ok(_), Err(e)) | (Err(e), Ok(())) => Err(e),
            (Err(e), Err(restore_err)) => {
                tracing::warn!("staging area was not restored: {}", restore_err);
                self.shell.warn(format!(
                    "{} may be left modified; run `ccbind restore`",
                    stager.root().display()
                ));
                Err(e)
            }
        };

        self.finish(last, &outcome, start);
        outcome
    }

    fn run_stages(&mut self, stager: &SourceStager) -> GenerateResult<GenerateReport> {
        let plan = self.plan;
        let config = &plan.config;

        self.shell.status(Status::Staging, stager.root().display());
        let staged = stager.stage()?;
        tracing::debug!(
            "staged {} overlay file(s), removed {} leftover path(s)",
            staged.overlaid_files,
            staged.removed_paths
        );
        self.advance(PipelineState::Staged);

        let builder = NativeBuilder::new(
            &plan.source_root,
            &config.library,
            &config.native,
            &plan.profile,
            self.runner,
        );
        let translator = BindingTranslator::new(&plan.translator, self.runner, &plan.proxy_exe);

        {
            let _spinner = self
                .shell
                .spinner(Status::Configuring, format!("for {}", plan.host_triple()));
            builder.configure()?;
        }
        let archive = {
            let _spinner = self
                .shell
                .spinner(Status::Building, &config.library.make_target);
            builder.build_archive(&translator)?
        };
        self.advance(PipelineState::Built);

        let translated = {
            let _spinner = self
                .shell
                .spinner(Status::Translating, archive.display());
            translator.translate(&archive, &plan.source_root)?
        };
        self.advance(PipelineState::Translated);

        self.shell.status(Status::Normalizing, translated.display());
        let normalized = plan.normalizer.normalize_file(&translated)?;
        self.advance(PipelineState::Normalized);

        self.shell.status(Status::Publishing, plan.destination().display());
        let published = plan.publisher().publish(&translated, &plan.target)?;
        self.advance(PipelineState::Published);

        Ok(GenerateReport {
            target: plan.target.clone(),
            published,
            normalized,
            states: Vec::new(),
        })
    }

    fn announce(&self) {
        let plan = self.plan;
        self.shell.status(
            Status::Target,
            format!("{} ({})", plan.target, plan.host_triple()),
        );
        for (role, tool) in plan.profile.tools() {
            tracing::info!("using {}: {}", role, tool.display());
        }
        tracing::info!("using translator: {}", plan.translator.program.display());

        let mut tools: BTreeMap<String, String> = plan
            .profile
            .tools()
            .iter()
            .map(|(role, tool)| (role.to_string(), tool.display().to_string()))
            .collect();
        tools.insert(
            "translator".to_string(),
            plan.translator.program.display().to_string(),
        );
        self.emit(&PipelineEvent::GenerationStarted {
            target: plan.target.to_string(),
            host_triple: plan.host_triple().to_string(),
            tools,
        });
    }

    /// Take the next transition in the success path.
    fn advance(&mut self, next: PipelineState) {
        debug_assert_eq!(self.state.next(), Some(next), "out-of-order transition");
        self.transition(next);
    }

    fn transition(&mut self, next: PipelineState) {
        tracing::debug!("pipeline: {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
        self.emit(&PipelineEvent::state(next));
    }

    fn emit(&self, event: &PipelineEvent) {
        if self.shell.is_json() {
            self.shell.json_event(&event.to_value());
        }
    }

    fn finish(
        &self,
        last: PipelineState,
        outcome: &GenerateResult<GenerateReport>,
        start: Instant,
    ) {
        let elapsed = start.elapsed();
        let event = match outcome {
            Ok(report) => {
                let status = if report.published.unchanged {
                    Status::Fresh
                } else {
                    Status::Published
                };
                self.shell.status(
                    status,
                    format!(
                        "{} (sha256 {})",
                        report.published.destination.display(),
                        report.published.sha256
                    ),
                );
                self.shell.status(
                    Status::Finished,
                    format!("{} in {}", self.plan.target, format_duration(elapsed)),
                );
                PipelineEvent::GenerationFinished {
                    success: true,
                    state: last,
                    restored: true,
                    duration_ms: elapsed.as_millis() as u64,
                    output: Some(report.published.destination.clone()),
                    sha256: Some(report.published.sha256.clone()),
                    unchanged: Some(report.published.unchanged),
                    stage: None,
                    message: None,
                    diagnostics: None,
                }
            }
            Err(e) => PipelineEvent::GenerationFinished {
                success: false,
                state: last,
                restored: self.state == PipelineState::CleanedUp,
                duration_ms: elapsed.as_millis() as u64,
                output: None,
                sha256: None,
                unchanged: None,
                stage: Some(e.stage().to_string()),
                message: Some(e.to_string()),
                diagnostics: e.diagnostics().map(str::to_string),
            },
        };
        self.emit(&event);
    }
}

/// Resolve, run and restore.
pub fn generate(
    ctx: &GlobalContext,
    config: Config,
    options: &GenerateOptions,
    runner: &dyn CommandRunner,
    shell: &Shell,
) -> GenerateResult<GenerateReport> {
    let plan = GenerationPlan::resolve(ctx, config, options)?;
    Pipeline::new(&plan, runner, shell).run()
}
