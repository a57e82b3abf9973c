//! Pipeline building and execution.
//!
//! This module provides:
//! - Steps with one-deep fallbacks
//! - The mutable pipeline builder
//! - The frozen pipeline and its sequential run loop

mod builder;
mod executor;
#[cfg(test)]
mod integration_tests;
mod step;

pub use builder::PipelineBuilder;
pub use executor::{Pipeline, PipelineDescription};
pub use step::{Step, StepEnvironment, StepIdentity, StepKind};
