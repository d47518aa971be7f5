//! Data models for the reply pipeline

pub mod record;
pub mod run;

pub use record::{Cursor, Record, ReplyEnvelope, ReplyPage};
pub use run::{image_path_for, PipelineRun, RunReport, RunRequest, StateTransition};
