//! Pipeline event types for JSON output.
//!
//! These events are emitted when using `--message-format json`, one JSON
//! object per line on stdout.
//!
//! # Event Types
//!
//! - `generation-started`: target and toolchain were resolved
//! - `state-changed`: the pipeline entered a new state
//! - `generation-finished`: the run ended, successfully or not
//!
//! New fields may be added; existing fields are not removed or renamed.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::ops::generate::PipelineState;

/// An event emitted while the pipeline runs.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "reason")]
pub enum PipelineEvent {
    #[serde(rename = "generation-started")]
    GenerationStarted {
        /// `os/arch`
        target: String,
        host_triple: String,
        /// Tool role to binary
        tools: BTreeMap<String, String>,
    },

    #[serde(rename = "state-changed")]
    StateChanged { state: PipelineState },

    #[serde(rename = "generation-finished")]
    GenerationFinished {
        success: bool,
        /// Last state before cleanup (`published` or `aborted`)
        state: PipelineState,
        /// Whether the staging area was restored
        restored: bool,
        duration_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<PathBuf>,
        #[serde(skip_serializing_if = "Option::is_none")]
        sha256: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        unchanged: Option<bool>,
        /// Stage that failed
        #[serde(skip_serializing_if = "Option::is_none")]
        stage: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        /// Verbatim output of the failing tool
        #[serde(skip_serializing_if = "Option::is_none")]
        diagnostics: Option<String>,
    },
}

impl PipelineEvent {
    pub fn state(state: PipelineState) -> Self {
        PipelineEvent::StateChanged { state }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
