use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// One planned sub-agent. Absent and `null` fields both read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSpec {
    #[serde(deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub role: String,
    #[serde(deserialize_with = "null_as_empty")]
    pub context: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl AgentSpec {
    pub fn new(
        name: impl Into<String>,
        role: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            role: role.into(),
            context: context.into(),
        }
    }
}

/// Decomposition of a task into sub-agents, as proposed by the model.
///
/// `agents` is authoritative; `agent_count` is what the model declared and
/// may disagree with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPlan {
    pub agent_count: u64,
    pub agents: Vec<AgentSpec>,
}

impl ExecutionPlan {
    /// Number of workers this plan spawns
    pub fn worker_count(&self) -> usize {
        self.agents.len()
    }

    pub fn count_mismatch(&self) -> bool {
        usize::try_from(self.agent_count).map_or(true, |count| count != self.agents.len())
    }
}

/// How a worker's task ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Success,
    Failure { reason: String },
}

/// Output of one worker in one delegation round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub worker_id: Uuid,
    pub worker_identity: String,
    pub role: String,
    /// Position of the worker in the plan
    pub spawn_index: usize,
    pub output: String,
    pub outcome: TaskOutcome,
    pub elapsed_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl TaskResult {
    pub fn is_success(&self) -> bool {
        self.outcome == TaskOutcome::Success
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            TaskOutcome::Success => None,
            TaskOutcome::Failure { reason } => Some(reason),
        }
    }
}
