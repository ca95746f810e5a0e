//! Test utilities for ccbind unit tests.
//!
//! Provides a scripted [`CommandRunner`] so pipeline stages can be exercised
//! without a cross toolchain, plus helpers for throwaway git repositories.
//!
//! # Example
//!
//! ```rust,ignore
//! use ccbind::test_support::{MockRunner, CommandPattern};
//!
//! let runner = MockRunner::new();
//! runner.expect(CommandPattern::StartsWith("sh ./configure".into()), ProcessOutput::ok(""));
//! runner.on(CommandPattern::Contains(" -o ".into()), |spec| {
//!     std::fs::write(spec.cwd.as_ref().unwrap().join("ccgo.go"), "package x\n").unwrap();
//!     ProcessOutput::ok("")
//! });
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use git2::{IndexAddOption, Repository, Signature};
use walkdir::WalkDir;

use crate::util::process::{CommandRunner, CommandSpec, ProcessOutput};

impl ProcessOutput {
    /// A successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        ProcessOutput {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed output with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        ProcessOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Pattern for matching commands in [`MockRunner`].
#[derive(Debug, Clone)]
pub enum CommandPattern {
    /// Exact match on full command string.
    Exact(String),
    /// Match if command starts with prefix.
    StartsWith(String),
    /// Match if command contains substring.
    Contains(String),
    /// Match any command.
    Any,
}

impl CommandPattern {
    /// Check if this pattern matches the given command.
    pub fn matches(&self, cmd: &str) -> bool {
        match self {
            CommandPattern::Exact(s) => cmd == s,
            CommandPattern::StartsWith(s) => cmd.starts_with(s),
            CommandPattern::Contains(s) => cmd.contains(s),
            CommandPattern::Any => true,
        }
    }
}

type Responder = Box<dyn Fn(&CommandSpec) -> ProcessOutput>;

struct Expectation {
    pattern: CommandPattern,
    respond: Responder,
}

/// Scripted command runner.
///
/// Commands are matched against expectations in registration order; the
/// first match produces the output (and may run a side effect, such as
/// writing the file a real tool would have produced). Every call is
/// recorded. Unmatched commands fail with an error, as if the program did
/// not exist.
#[derive(Default)]
pub struct MockRunner {
    expectations: RefCell<Vec<Expectation>>,
    calls: RefCell<Vec<CommandSpec>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer matching commands with a fixed output.
    pub fn expect(&self, pattern: CommandPattern, output: ProcessOutput) -> &Self {
        self.on(pattern, move |_| output.clone())
    }

    /// Answer matching commands by running `respond`.
    pub fn on(
        &self,
        pattern: CommandPattern,
        respond: impl Fn(&CommandSpec) -> ProcessOutput + 'static,
    ) -> &Self {
        self.expectations.borrow_mut().push(Expectation {
            pattern,
            respond: Box::new(respond),
        });
        self
    }

    /// All commands run so far.
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }

    /// Command lines run so far.
    pub fn command_lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.display_command()).collect()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, spec: &CommandSpec) -> Result<ProcessOutput> {
        self.calls.borrow_mut().push(spec.clone());
        let line = spec.display_command();

        let expectations = self.expectations.borrow();
        match expectations.iter().find(|e| e.pattern.matches(&line)) {
            Some(expectation) => Ok((expectation.respond)(spec)),
            None => bail!("failed to spawn `{}`: unexpected command", line),
        }
    }
}

/// Create a git repository at `root` holding `files`, with one commit.
pub fn init_repo(root: &Path, files: &[(&str, &str)]) -> Repository {
    fs::create_dir_all(root).unwrap();
    let repo = Repository::init(root).unwrap();
    for (path, contents) in files {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
    commit_all(root, "initial import");
    repo
}

/// Stage everything under `root` and commit it.
pub fn commit_all(root: &Path, message: &str) {
    let repo = Repository::open(root).unwrap();
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = Signature::now("ccbind tests", "tests@ccbind.invalid").unwrap();

    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<_> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap();
}

/// Contents of every file under `root`, excluding `.git`.
pub fn tree_snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git")
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_runner_matches_in_order() {
        let runner = MockRunner::new();
        runner
            .expect(
                CommandPattern::Exact("make -j 2 library".into()),
                ProcessOutput::failed(2, "boom"),
            )
            .expect(CommandPattern::Any, ProcessOutput::ok("fine"));

        let out = runner
            .run(&CommandSpec::new("make").args(["-j", "2", "library"]))
            .unwrap();
        assert_eq!(out.code, Some(2));

        let out = runner.run(&CommandSpec::new("true")).unwrap();
        assert!(out.success());
        assert_eq!(runner.command_lines(), vec!["make -j 2 library", "true"]);
    }

    #[test]
    fn test_unmatched_command_errors() {
        let runner = MockRunner::new();
        assert!(runner.run(&CommandSpec::new("gcc")).is_err());
        assert_eq!(runner.calls().len(), 1);
    }
}
