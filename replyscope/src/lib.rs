//! replyscope library interface
//!
//! Collects every reply a user posted, saves them as a table and renders a
//! word cloud of what they talk about. Exposed as a library for the CLI and
//! for integration testing.

pub mod cloud;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{PipelineError, PipelineResult};
pub use crate::models::{RunReport, RunRequest};
pub use crate::services::PipelineOrchestrator;
