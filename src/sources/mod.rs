//! Native source tree management.
//!
//! The staging area is the git checkout the native library is built in.

pub mod staging;

pub use staging::{SourceStager, StageReport};
