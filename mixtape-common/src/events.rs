//! Progress event types and broadcast bus
//!
//! Each pipeline stage reports through the shared [`EventBus`]; subscribers
//! (the CLI progress display, tests) receive every event emitted after they
//! subscribe. Emission never blocks and never fails the emitting stage.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Pipeline progress events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// A track analysis task started processing
    AnalysisStarted {
        task_id: Uuid,
        filepath: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track analysis task finished successfully
    AnalysisCompleted {
        task_id: Uuid,
        filepath: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A track analysis task failed
    AnalysisFailed {
        task_id: Uuid,
        filepath: String,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The planner advanced to a new stage
    PlanStageChanged {
        stage: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Render progress for a set
    ///
    /// 0.0-0.5 while loading tracks, 0.5-1.0 while mixing, 1.0 on success,
    /// -1.0 on failure.
    RenderProgress {
        set_id: Uuid,
        fraction: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A set finished rendering and was written to disk
    SetRendered {
        set_id: Uuid,
        output_path: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PipelineEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            PipelineEvent::AnalysisStarted { .. } => "AnalysisStarted",
            PipelineEvent::AnalysisCompleted { .. } => "AnalysisCompleted",
            PipelineEvent::AnalysisFailed { .. } => "AnalysisFailed",
            PipelineEvent::PlanStageChanged { .. } => "PlanStageChanged",
            PipelineEvent::RenderProgress { .. } => "RenderProgress",
            PipelineEvent::SetRendered { .. } => "SetRendered",
        }
    }
}

/// Broadcast bus for pipeline events.
///
/// Cheap to clone; all clones share the same channel. Events emitted with no
/// subscribers are dropped silently.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// Emit an event to all current subscribers.
    pub fn emit(&self, event: PipelineEvent) {
        // A send error only means there are no subscribers right now.
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
