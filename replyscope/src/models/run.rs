//! Pipeline run state machine
//!
//! IDLE → FETCHING → PERSISTING → NORMALIZING → RENDERING → DONE,
//! with FAILED reachable from any active state.

use chrono::{DateTime, Utc};
use replyscope_common::events::RunState;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Suffix shared by the tabular file and the image
pub const ARTIFACT_SUFFIX: &str = "records";
/// Tabular file extension
pub const TABLE_EXTENSION: &str = "csv";
/// Image file extension
pub const IMAGE_EXTENSION: &str = "png";

/// Request to start one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    /// Remote user identifier (`uid`)
    pub identifier: String,
    /// Directory receiving the tabular file and the image
    pub output_dir: PathBuf,
}

impl RunRequest {
    pub fn new(identifier: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            identifier: identifier.into(),
            output_dir: output_dir.into(),
        }
    }

    /// `<dir>/<identifier>_records.csv`
    pub fn table_path(&self) -> PathBuf {
        self.output_dir.join(format!(
            "{}_{}.{}",
            self.identifier, ARTIFACT_SUFFIX, TABLE_EXTENSION
        ))
    }

    /// Same base name as the tabular file, image extension
    pub fn image_path(&self) -> PathBuf {
        image_path_for(&self.table_path())
    }
}

/// Image path derived from the tabular file path
pub fn image_path_for(table_path: &Path) -> PathBuf {
    table_path.with_extension(IMAGE_EXTENSION)
}

/// Recorded state change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub run_id: Uuid,
    pub old_state: RunState,
    pub new_state: RunState,
    pub transitioned_at: DateTime<Utc>,
}

/// In-memory state of one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub state: RunState,
    pub request: RunRequest,
    /// Records collected by the fetch stage
    pub record_count: usize,
    /// Error text when the run failed
    pub failure: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new(request: RunRequest) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: RunState::Idle,
            request,
            record_count: 0,
            failure: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Move to `new_state`
    ///
    /// Returns `None` (state unchanged) when the state machine does not
    /// allow the transition.
    pub fn transition_to(&mut self, new_state: RunState) -> Option<StateTransition> {
        if !self.state.can_transition_to(new_state) {
            tracing::warn!(
                run_id = %self.run_id,
                from = %self.state,
                to = %new_state,
                "Rejected invalid run state transition"
            );
            return None;
        }

        let transition = StateTransition {
            run_id: self.run_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if new_state.is_terminal() {
            self.ended_at = Some(transition.transitioned_at);
        }

        Some(transition)
    }

    /// Move to FAILED and remember why
    pub fn fail(&mut self, reason: impl Into<String>) -> Option<StateTransition> {
        let transition = self.transition_to(RunState::Failed)?;
        self.failure = Some(reason.into());
        Some(transition)
    }

    pub fn elapsed_seconds(&self) -> f64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub record_count: usize,
    pub table_path: PathBuf,
    pub image_path: PathBuf,
    /// Distinct terms drawn on the image
    pub term_count: usize,
    pub elapsed_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_paths_share_base_name() {
        let request = RunRequest::new("12345", "/tmp/out");
        assert_eq!(request.table_path(), PathBuf::from("/tmp/out/12345_records.csv"));
        assert_eq!(request.image_path(), PathBuf::from("/tmp/out/12345_records.png"));
    }

    #[test]
    fn test_happy_path_sets_end_time() {
        let mut run = PipelineRun::new(RunRequest::new("1", "/tmp"));
        assert_eq!(run.state, RunState::Idle);

        for next in [
            RunState::Fetching,
            RunState::Persisting,
            RunState::Normalizing,
            RunState::Rendering,
        ] {
            let transition = run.transition_to(next).unwrap();
            assert_eq!(transition.new_state, next);
            assert!(run.ended_at.is_none());
        }

        run.transition_to(RunState::Done).unwrap();
        assert!(run.ended_at.is_some());
        assert!(run.elapsed_seconds() >= 0.0);
    }

    #[test]
    fn test_invalid_transition_is_rejected() {
        let mut run = PipelineRun::new(RunRequest::new("1", "/tmp"));
        assert!(run.transition_to(RunState::Rendering).is_none());
        assert_eq!(run.state, RunState::Idle);
    }

    #[test]
    fn test_fail_records_reason() {
        let mut run = PipelineRun::new(RunRequest::new("1", "/tmp"));
        run.transition_to(RunState::Fetching);

        let transition = run.fail("HTTP 502").unwrap();
        assert_eq!(transition.old_state, RunState::Fetching);
        assert_eq!(run.state, RunState::Failed);
        assert_eq!(run.failure.as_deref(), Some("HTTP 502"));

        // Terminal: cannot fail twice
        assert!(run.fail("again").is_none());
        assert_eq!(run.failure.as_deref(), Some("HTTP 502"));
    }
}
