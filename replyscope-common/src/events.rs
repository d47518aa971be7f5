//! Pipeline events and the observer surface
//!
//! The pipeline never touches presentation state. It reports through a
//! [`PipelineObserver`]; the [`EventBus`] implementation hands every report
//! over a broadcast channel to whichever task owns the display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Pipeline run state
///
/// `Idle → Fetching → Persisting → Normalizing → Rendering → Done`, with
/// `Failed` reachable from every non-idle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    /// Run created, nothing started
    Idle,
    /// Draining the paginated reply endpoint
    Fetching,
    /// Writing the tabular file
    Persisting,
    /// Reading the tabular file back and cleaning messages
    Normalizing,
    /// Building and writing the word cloud
    Rendering,
    /// Run finished successfully
    Done,
    /// Run aborted by a stage failure
    Failed,
}

impl RunState {
    /// Terminal states end a run
    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }

    /// Whether the state machine allows `self → next`
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Idle, Fetching)
            | (Fetching, Persisting)
            | (Persisting, Normalizing)
            | (Normalizing, Rendering)
            | (Rendering, Done) => true,
            (Idle, Failed) => false,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunState::Idle => "IDLE",
            RunState::Fetching => "FETCHING",
            RunState::Persisting => "PERSISTING",
            RunState::Normalizing => "NORMALIZING",
            RunState::Rendering => "RENDERING",
            RunState::Done => "DONE",
            RunState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Event emitted by a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// Line for the run log
    Log {
        run_id: Uuid,
        message: String,
        timestamp: DateTime<Utc>,
    },
    /// Transient status indicator (replaces the previous one)
    Progress {
        run_id: Uuid,
        message: String,
        timestamp: DateTime<Utc>,
    },
    /// State machine transition
    StateChanged {
        run_id: Uuid,
        old_state: RunState,
        new_state: RunState,
        timestamp: DateTime<Utc>,
    },
}

impl PipelineEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            PipelineEvent::Log { run_id, .. }
            | PipelineEvent::Progress { run_id, .. }
            | PipelineEvent::StateChanged { run_id, .. } => *run_id,
        }
    }
}

/// Receiver of run status reports
///
/// Calls are fire-and-forget and arrive in pipeline stage order.
/// Implementations must be cheap and must not block.
pub trait PipelineObserver: Send + Sync {
    /// Append a line to the run log
    fn log(&self, run_id: Uuid, message: &str);

    /// Replace the transient progress indicator
    fn progress(&self, run_id: Uuid, message: &str);

    /// State machine transition
    fn state_changed(&self, _run_id: Uuid, _old: RunState, _new: RunState) {}
}

/// Broadcast-based event bus for run status
///
/// Cloning is cheap; all clones share one channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` undelivered events per receiver
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: PipelineEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl PipelineObserver for EventBus {
    fn log(&self, run_id: Uuid, message: &str) {
        self.emit_lossy(PipelineEvent::Log {
            run_id,
            message: message.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn progress(&self, run_id: Uuid, message: &str) {
        self.emit_lossy(PipelineEvent::Progress {
            run_id,
            message: message.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn state_changed(&self, run_id: Uuid, old: RunState, new: RunState) {
        self.emit_lossy(PipelineEvent::StateChanged {
            run_id,
            old_state: old,
            new_state: new,
            timestamp: Utc::now(),
        });
    }
}
