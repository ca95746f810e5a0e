//! Post-processing of translated output.
//!
//! Three rewrite passes run in a fixed order:
//! 1. tagged-type identifiers (`T__Foo`) get the lowercase prefix (`t__Foo`)
//! 2. external identifiers lose their prefix (`x_bar` becomes `Xbar`)
//! 3. generator comment lines are deleted together with the line after them
//!
//! Matches are anchored at identifier starts, so `MyT__Foo` or `ax_bar` are
//! left alone. Pass 2's prefix must not contain pass 1's pattern.

use std::borrow::Cow;
use std::path::Path;

use regex::Regex;

use crate::core::error::{GenerateError, GenerateResult};
use crate::util::config::NormalizeConfig;
use crate::util::fs::{read_to_string, write_atomic};

/// Identifier tail after a prefix: at least two word characters, the first
/// not an underscore.
const IDENT_TAIL: &str = "([a-zA-Z0-9][a-zA-Z0-9_]+)";

/// One prefix substitution.
#[derive(Debug, Clone)]
struct PrefixRule {
    pattern: Regex,
    replacement: String,
}

impl PrefixRule {
    fn new(prefix: &str, replacement: &str) -> GenerateResult<Self> {
        if prefix.is_empty() {
            return Err(GenerateError::config("normalize prefix must not be empty"));
        }

        let boundary = if prefix.starts_with(|c: char| c.is_alphanumeric() || c == '_') {
            r"\b"
        } else {
            ""
        };
        let pattern = Regex::new(&format!("{}{}{}", boundary, regex::escape(prefix), IDENT_TAIL))
            .map_err(|e| GenerateError::config(format!("bad normalize prefix `{}`: {}", prefix, e)))?;

        Ok(PrefixRule {
            pattern,
            replacement: format!("{}${{1}}", replacement.replace('$', "$$")),
        })
    }

    fn apply<'t>(&self, text: &'t str) -> (Cow<'t, str>, usize) {
        let count = self.pattern.find_iter(text).count();
        if count == 0 {
            return (Cow::Borrowed(text), 0);
        }
        (self.pattern.replace_all(text, self.replacement.as_str()), count)
    }
}

/// Counts of what a [`SymbolNormalizer`] run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub tagged_renamed: usize,
    pub externals_exported: usize,
    pub lines_stripped: usize,
}

impl NormalizeReport {
    pub fn is_noop(&self) -> bool {
        *self == NormalizeReport::default()
    }
}

/// Rewrites translated source text.
#[derive(Debug, Clone)]
pub struct SymbolNormalizer {
    tagged: PrefixRule,
    external: PrefixRule,
    provenance_marker: String,
}

impl SymbolNormalizer {
    pub fn new(config: &NormalizeConfig) -> GenerateResult<Self> {
        if config.provenance_marker.trim().is_empty() {
            return Err(GenerateError::config("provenance marker must not be empty"));
        }

        Ok(SymbolNormalizer {
            tagged: PrefixRule::new(&config.tagged_prefix, &config.tagged_replacement)?,
            external: PrefixRule::new(&config.external_prefix, &config.external_replacement)?,
            provenance_marker: config.provenance_marker.clone(),
        })
    }

    /// Pass 1.
    pub fn rename_tagged_types<'t>(&self, text: &'t str) -> Cow<'t, str> {
        self.tagged.apply(text).0
    }

    /// Pass 2.
    pub fn export_externals<'t>(&self, text: &'t str) -> Cow<'t, str> {
        self.external.apply(text).0
    }

    /// Pass 3.
    pub fn strip_provenance<'t>(&self, text: &'t str) -> Cow<'t, str> {
        self.strip_counting(text).0
    }

    /// Run all three passes in order.
    pub fn normalize(&self, text: &str) -> String {
        self.normalize_counting(text).0
    }

    /// Normalize `path` in place.
    ///
    /// The rewritten text replaces the file atomically; on error the file is
    /// either untouched or fully rewritten.
    pub fn normalize_file(&self, path: &Path) -> GenerateResult<NormalizeReport> {
        let fail = |e: anyhow::Error| GenerateError::Normalization {
            path: path.to_path_buf(),
            message: format!("{:#}", e),
        };

        let text = read_to_string(path).map_err(fail)?;
        let (normalized, report) = self.normalize_counting(&text);

        if !report.is_noop() {
            write_atomic(path, normalized.as_bytes()).map_err(fail)?;
        }

        tracing::debug!(
            "Normalized {}: {} tagged, {} external, {} line(s) stripped",
            path.display(),
            report.tagged_renamed,
            report.externals_exported,
            report.lines_stripped
        );
        Ok(report)
    }

    fn normalize_counting(&self, text: &str) -> (String, NormalizeReport) {
        let (pass1, tagged_renamed) = self.tagged.apply(text);
        let (pass2, externals_exported) = self.external.apply(&pass1);
        let (pass3, lines_stripped) = self.strip_counting(&pass2);

        let report = NormalizeReport {
            tagged_renamed,
            externals_exported,
            lines_stripped,
        };
        (pass3.into_owned(), report)
    }

    fn is_marker_line(&self, line: &str) -> bool {
        line.trim_start_matches(|c: char| c.is_ascii_whitespace())
            .starts_with(&self.provenance_marker)
    }

    fn strip_counting<'t>(&self, text: &'t str) -> (Cow<'t, str>, usize) {
        if !text.lines().any(|l| self.is_marker_line(l)) {
            return (Cow::Borrowed(text), 0);
        }

        let mut out = String::with_capacity(text.len());
        let mut stripped = 0;
        let mut lines = text.split_inclusive('\n');
        while let Some(line) = lines.next() {
            if self.is_marker_line(line) {
                stripped += 1;
                if lines.next().is_some() {
                    stripped += 1;
                }
                continue;
            }
            out.push_str(line);
        }
        (Cow::Owned(out), stripped)
    }
}
