//! Turning a free-form model response into an [`ExecutionPlan`].
//!
//! Models wrap JSON in prose, so the object is cut out between the first `{`
//! and the last `}` before parsing. This is a heuristic: two separate objects
//! in one response produce an unparseable slice and the plan falls back.

use std::collections::HashSet;

use serde_json::Value;

use super::errors::PlanError;
use super::types::{AgentSpec, ExecutionPlan};

pub const DEFAULT_AGENT_ROLE: &str = "generalist";
pub const DEFAULT_AGENT_CONTEXT: &str = "no specifics provided";

/// Name given to the worker at `index` when the plan leaves it unnamed
pub fn default_agent_name(index: usize) -> String {
    format!("ChildAgent{}", index + 1)
}

/// Final worker names for `agents`, in plan order.
///
/// Explicit names are kept. A blank entry at `index` takes the first
/// `ChildAgent<n>` with `n >= index + 1` that no other entry uses.
pub fn assign_agent_names(agents: &[AgentSpec]) -> Vec<String> {
    let mut taken: HashSet<String> = agents
        .iter()
        .map(|spec| spec.name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();

    agents
        .iter()
        .enumerate()
        .map(|(index, spec)| match spec.name.trim() {
            "" => {
                let mut candidate = index;
                while taken.contains(&default_agent_name(candidate)) {
                    candidate += 1;
                }
                let name = default_agent_name(candidate);
                taken.insert(name.clone());
                name
            }
            name => name.to_string(),
        })
        .collect()
}

/// Slice from the first `{` to the last `}`, if they appear in that order
pub fn extract_braced(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

impl ExecutionPlan {
    /// Single generalist agent used whenever the model's plan is unusable
    pub fn fallback() -> Self {
        Self {
            agent_count: 1,
            agents: vec![AgentSpec::new(
                default_agent_name(0),
                DEFAULT_AGENT_ROLE,
                DEFAULT_AGENT_CONTEXT,
            )],
        }
    }

    /// Parse a raw model response.
    ///
    /// Requires an object with an integer `agentCount` and an `agents` array
    /// of objects. The plan is returned as declared; a count that disagrees
    /// with the list is not corrected here.
    pub fn parse(raw: &str) -> Result<Self, PlanError> {
        let candidate = extract_braced(raw).ok_or(PlanError::NoStructuredData)?;
        let value: Value = serde_json::from_str(candidate)?;
        let object = value.as_object().ok_or(PlanError::NotAnObject)?;

        let agent_count = object
            .get("agentCount")
            .ok_or(PlanError::MissingField("agentCount"))?
            .as_u64()
            .ok_or(PlanError::WrongType {
                field: "agentCount",
                expected: "a non-negative integer",
            })?;

        let entries = object
            .get("agents")
            .ok_or(PlanError::MissingField("agents"))?
            .as_array()
            .ok_or(PlanError::WrongType {
                field: "agents",
                expected: "an array",
            })?;

        let agents = entries
            .iter()
            .map(|entry| {
                if !entry.is_object() {
                    return Err(PlanError::WrongType {
                        field: "agents",
                        expected: "an array of objects",
                    });
                }
                serde_json::from_value::<AgentSpec>(entry.clone()).map_err(PlanError::from)
            })
            .collect::<Result<Vec<_>, PlanError>>()?;

        Ok(Self {
            agent_count,
            agents,
        })
    }
}
