//! Command implementations

pub mod completions;
pub mod doctor;
pub mod generate;
pub mod restore;
pub mod targets;
