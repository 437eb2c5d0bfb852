// Agent system modules
//
// A coordinator asks the model for an execution plan, spawns one worker per
// planned agent and runs them all concurrently on the same task.

pub mod coordinator;
pub mod errors;
pub mod events;
pub mod plan;
pub mod prompts;
pub mod types;
pub mod worker;

// Re-export main types
pub use coordinator::Coordinator;
pub use errors::{AgentError, AgentResult, PlanError};
pub use events::{AgentEvent, ChannelSink, EventSink, MemorySink, TracingSink};
pub use prompts::PromptBuilder;
pub use types::{AgentSpec, ExecutionPlan, TaskOutcome, TaskResult};
pub use worker::Worker;
