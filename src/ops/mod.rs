//! High-level operations.
//!
//! This module contains the implementation of ccbind commands.

pub mod doctor;
pub mod events;
pub mod generate;
pub mod publish;
pub mod restore;

pub use doctor::{doctor, format_report, DoctorReport};
pub use events::PipelineEvent;
pub use generate::{
    generate, GenerateOptions, GenerateReport, GenerationPlan, Pipeline, PipelineState,
    StagingGuard,
};
pub use publish::{ArtifactPublisher, PublishReport};
pub use restore::restore;
