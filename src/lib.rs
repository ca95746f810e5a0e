//! ccbind - generates host-language bindings for a native C library
//!
//! This crate cross-compiles a native library from a git checkout, drives a
//! source-to-source translation engine over the resulting archive, rewrites
//! the translated symbols and publishes one file per target platform.

pub mod builder;
pub mod core;
pub mod ops;
pub mod sources;
pub mod util;

/// Test utilities and mocks for ccbind unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides a scripted command runner and helpers for
/// throwaway git repositories.
#[cfg(test)]
pub mod test_support;

pub use self::core::{error::GenerateError, target::TargetSpec};
pub use ops::generate::{generate, GenerateOptions, GenerateReport};
pub use util::context::GlobalContext;
