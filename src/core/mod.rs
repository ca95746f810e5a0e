//! Core data structures for ccbind.
//!
//! - Build targets and their host triples
//! - The pipeline error taxonomy

pub mod error;
pub mod target;

pub use error::{GenerateError, GenerateResult, Stage};
pub use target::{HostTriple, TargetSpec, SUPPORTED_TARGETS};
