use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use super::errors::{AgentError, AgentResult};
use super::plan::default_agent_name;
use super::prompts::{library, PromptBuilder, WORKER_ROLE};
use super::types::AgentSpec;
use crate::llm::ModelClient;

/// Worker that turns a task description into a single model-generated output
#[derive(Clone)]
pub struct Worker {
    pub id: Uuid,
    pub name: String,
    pub role: String,
    pub context: String,
    /// Position of this worker's entry in the plan
    pub spawn_index: usize,
    client: Arc<ModelClient>,
    prompts: Arc<PromptBuilder>,
}

impl Worker {
    /// Create a Worker from the plan entry at `index`
    pub fn from_spec(
        index: usize,
        spec: &AgentSpec,
        client: Arc<ModelClient>,
        prompts: Arc<PromptBuilder>,
    ) -> Self {
        let name = match spec.name.trim() {
            "" => default_agent_name(index),
            name => name.to_string(),
        };

        Self {
            id: Uuid::new_v4(),
            name,
            role: spec.role.clone(),
            context: spec.context.clone(),
            spawn_index: index,
            client,
            prompts,
        }
    }

    pub fn identity(&self) -> &str {
        &self.name
    }

    /// Role tag used in this worker's prompts
    pub fn prompt_role(&self) -> &str {
        match self.role.trim() {
            "" => WORKER_ROLE,
            role => role,
        }
    }

    /// Full prompt this worker sends for `task_description`
    pub fn prompt_for(&self, task_description: &str) -> String {
        let task = if self.context.trim().is_empty() {
            task_description.to_string()
        } else {
            library::worker_focus().render(&HashMap::from([
                ("task", task_description),
                ("context", self.context.as_str()),
            ]))
        };

        self.prompts.build(&self.name, &task, Some(self.prompt_role()))
    }

    /// Perform the task and return the generated text.
    ///
    /// An exhausted backend and a blank generation are both errors here, so
    /// the coordinator can record them as failed results.
    pub async fn perform_task(&self, task_description: &str) -> AgentResult<String> {
        let prompt = self.prompt_for(task_description);
        tracing::debug!(worker = %self.name, role = %self.prompt_role(), "Performing task");

        let output = self
            .client
            .try_call_with(&prompt, &self.client.options())
            .await
            .map_err(AgentError::from)?;

        if output.trim().is_empty() {
            return Err(AgentError::EmptyOutput);
        }

        Ok(output)
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("role", &self.role)
            .field("spawn_index", &self.spawn_index)
            .finish()
    }
}
