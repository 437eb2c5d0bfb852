// Prompt construction for LLM interactions
//
// Every prompt is a preamble, an optional role block and an
// "<identity> must <task>" line. Task texts that need structure come from
// the versioned template library below.

use std::collections::HashMap;

/// Role tag for the plan-determination prompt
pub const COORDINATOR_ROLE: &str = "coordinator";
/// Role tag for workers whose plan entry carries no role
pub const WORKER_ROLE: &str = "worker";

/// Assemble a prompt from its parts. Pure and deterministic.
pub fn build_prompt(
    preamble: &str,
    agent_identity: &str,
    task_description: &str,
    role: Option<&str>,
) -> String {
    let mut prompt = String::new();

    if !preamble.trim().is_empty() {
        prompt.push_str(preamble);
        prompt.push_str("\n\n");
    }

    match role {
        Some(COORDINATOR_ROLE) => prompt.push_str(
            "[Role: Coordinator - reply with a single well-formed JSON object, \
             for example {\"agentCount\": 2, \"agents\": [...]}]\n",
        ),
        Some(WORKER_ROLE) => {
            prompt.push_str("[Role: Worker - provide a modular and clear response]\n")
        }
        Some(other) if !other.trim().is_empty() => {
            prompt.push_str(&format!("[Role: {}]\n", other));
        }
        _ => {}
    }

    prompt.push_str(&format!("{} must {}", agent_identity, task_description));
    prompt
}

/// Prompt builder bound to one contextual preamble
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptBuilder {
    preamble: String,
}

impl PromptBuilder {
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            preamble: preamble.into(),
        }
    }

    pub fn build(&self, agent_identity: &str, task_description: &str, role: Option<&str>) -> String {
        build_prompt(&self.preamble, agent_identity, task_description, role)
    }
}

/// Prompt template structure
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub name: String,
    pub version: String,
    pub template: String,
}

impl PromptTemplate {
    /// Render the template, replacing `{{name}}` placeholders with variables.
    ///
    /// Placeholders without a matching variable are left as written.
    /// Substituted values are not scanned again.
    pub fn render(&self, variables: &HashMap<&str, &str>) -> String {
        let mut rendered = String::with_capacity(self.template.len());
        let mut rest = self.template.as_str();

        while let Some(open) = rest.find("{{") {
            rendered.push_str(&rest[..open]);
            let after_open = &rest[open + 2..];

            match after_open.find("}}") {
                Some(close) => {
                    let key = after_open[..close].trim();
                    match variables.get(key) {
                        Some(value) => rendered.push_str(value),
                        None => rendered.push_str(&rest[open..open + 2 + close + 2]),
                    }
                    rest = &after_open[close + 2..];
                }
                None => {
                    rendered.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }

        rendered.push_str(rest);
        rendered
    }
}

pub mod library {
    use super::PromptTemplate;

    /// Instruction asking the model how many agents a task needs and which roles they play
    pub fn plan_decomposition() -> PromptTemplate {
        PromptTemplate {
            name: "plan_decomposition".to_string(),
            version: "1.0.0".to_string(),
            template: "decide how many agents are needed to accomplish the following task: \
                       '{{task}}'. Reply only with a JSON object of the form \
                       {\"agentCount\": <integer>, \"agents\": [{\"name\": \"<unique name>\", \
                       \"role\": \"<role>\", \"context\": \"<what this agent focuses on>\"}]} \
                       containing exactly one entry per agent."
                .to_string(),
        }
    }

    /// Task line for a worker whose plan entry carries a focus
    pub fn worker_focus() -> PromptTemplate {
        PromptTemplate {
            name: "worker_focus".to_string(),
            version: "1.0.0".to_string(),
            template: "{{task}}\n\nFocus: {{context}}".to_string(),
        }
    }
}
