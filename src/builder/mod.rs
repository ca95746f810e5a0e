//! Native build and translation drivers.
//!
//! This module resolves the cross toolchain, runs the native library's build
//! system, drives the translation engine and post-processes its output.

pub mod native;
pub mod normalize;
pub mod toolchain;
pub mod translator;

pub use native::NativeBuilder;
pub use normalize::{NormalizeReport, SymbolNormalizer};
pub use toolchain::{HostPlatform, ToolchainOverrides, ToolchainProfile};
pub use translator::{BindingTranslator, Invocation, ProxyRequest, TranslatorOptions};
