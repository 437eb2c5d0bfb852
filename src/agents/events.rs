// Agent event system
//
// Components report what they do as structured events through an injected
// sink instead of writing to a process-wide logger.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::types::{TaskOutcome, TaskResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    AttemptFailed {
        attempt: u32,
        max_attempts: u32,
        /// HTTP status, when the backend answered
        status: Option<u16>,
        error: String,
    },
    CallFailed {
        attempts: u32,
        error: String,
    },
    PlanDetermined {
        declared_count: u64,
        agent_count: usize,
    },
    PlanCountMismatch {
        declared_count: u64,
        agent_count: usize,
    },
    PlanFallback {
        reason: String,
        raw_response: String,
    },
    WorkerSpawned {
        worker_id: Uuid,
        name: String,
        role: String,
    },
    DelegationStarted {
        task: String,
        worker_count: usize,
    },
    TaskCompleted {
        result: TaskResult,
    },
    DelegationFinished {
        succeeded: usize,
        failed: usize,
    },
}

/// Receiver of agent events.
///
/// Emission must not block: sinks are called from inside worker tasks.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &AgentEvent);
}

/// Writes every event as a structured `tracing` record
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &AgentEvent) {
        match event {
            AgentEvent::AttemptFailed {
                attempt,
                max_attempts,
                status,
                error,
            } => {
                tracing::warn!(attempt, max_attempts, status = ?status, error = %error, "Model call attempt failed");
            }
            AgentEvent::CallFailed { attempts, error } => {
                tracing::error!(attempts, error = %error, "Model call gave up, returning empty output");
            }
            AgentEvent::PlanDetermined {
                declared_count,
                agent_count,
            } => {
                tracing::info!(declared_count, agent_count, "Execution plan determined");
            }
            AgentEvent::PlanCountMismatch {
                declared_count,
                agent_count,
            } => {
                tracing::warn!(
                    declared_count,
                    agent_count,
                    "Plan agentCount disagrees with agents list, using the list"
                );
            }
            AgentEvent::PlanFallback {
                reason,
                raw_response,
            } => {
                tracing::error!(reason = %reason, raw_response = %raw_response, "Invalid plan response, using default plan");
            }
            AgentEvent::WorkerSpawned {
                worker_id,
                name,
                role,
            } => {
                tracing::info!(worker_id = %worker_id, worker = %name, role = %role, "Spawned worker");
            }
            AgentEvent::DelegationStarted { task, worker_count } => {
                tracing::info!(worker_count, task = %task, "Delegating task to workers");
            }
            AgentEvent::TaskCompleted { result } => match &result.outcome {
                TaskOutcome::Success => {
                    tracing::info!(
                        worker = %result.worker_identity,
                        elapsed_ms = result.elapsed_ms,
                        output = %result.output,
                        "Worker finished"
                    );
                }
                TaskOutcome::Failure { reason } => {
                    tracing::error!(
                        worker = %result.worker_identity,
                        elapsed_ms = result.elapsed_ms,
                        reason = %reason,
                        "Worker failed"
                    );
                }
            },
            AgentEvent::DelegationFinished { succeeded, failed } => {
                tracing::info!(succeeded, failed, "Delegation round complete");
            }
        }
    }
}

/// Forwards events to an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<AgentEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AgentEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: &AgentEvent) {
        // A dropped receiver only means nobody is listening any more
        let _ = self.tx.send(event.clone());
    }
}

/// Keeps every event in memory, in emission order
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<AgentEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AgentEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &AgentEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
