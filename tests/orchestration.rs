//! Integration tests for the coordinator
//!
//! These tests drive full plan → spawn → delegate rounds against a scripted
//! backend that answers the planning prompt and each worker's prompt
//! independently, including slow, failing, hanging and panicking workers.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_swarm::agents::{
    AgentEvent, Coordinator, ExecutionPlan, MemorySink, PromptBuilder, TaskOutcome, TaskResult,
};
use agent_swarm::llm::{CompletionBackend, CompletionRequest, LlmError, ModelClient};
use async_trait::async_trait;
use tokio::time::Instant;

const PLAN_MARKER: &str = "must decide how many agents";

/// What a scripted worker does when its prompt arrives
#[derive(Clone)]
enum Behaviour {
    Reply(&'static str),
    Delayed(Duration, &'static str),
    Fail(u16),
    Hang,
    Panic,
}

/// Backend answering the plan prompt with a fixed text and each worker
/// according to the behaviour registered under its name
struct ScriptedBackend {
    plan_reply: String,
    workers: HashMap<&'static str, Behaviour>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn new(plan_reply: &str, workers: &[(&'static str, Behaviour)]) -> Arc<Self> {
        Arc::new(Self {
            plan_reply: plan_reply.to_string(),
            workers: workers.iter().cloned().collect(),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(request.prompt.clone());

        if request.prompt.contains(PLAN_MARKER) {
            return Ok(self.plan_reply.clone());
        }

        let behaviour = self
            .workers
            .iter()
            .find(|(name, _)| request.prompt.contains(&format!("{} must ", name)))
            .map(|(_, behaviour)| behaviour.clone())
            .unwrap_or(Behaviour::Reply("default output"));

        match behaviour {
            Behaviour::Reply(text) => Ok(text.to_string()),
            Behaviour::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text.to_string())
            }
            Behaviour::Fail(status) => Err(LlmError::Status {
                status,
                body: "scripted failure".to_string(),
            }),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                Ok("never".to_string())
            }
            Behaviour::Panic => panic!("scripted worker crash"),
        }
    }
}

/// Coordinator over `backend` with two attempts per call and a 30s call timeout
fn coordinator(backend: Arc<ScriptedBackend>, sink: Arc<MemorySink>) -> Coordinator {
    let client = ModelClient::new(backend, sink.clone())
        .with_max_attempts(2)
        .with_retry_delay(Duration::from_millis(10))
        .with_timeout(Duration::from_secs(30));

    Coordinator::new(
        Arc::new(client),
        Arc::new(PromptBuilder::new("You are part of a team of agents.")),
        sink,
    )
}

fn plan_json(names: &[&str]) -> String {
    let agents: Vec<String> = names
        .iter()
        .map(|name| format!(r#"{{"name":"{}","role":"role-{}","context":"ctx"}}"#, name, name))
        .collect();
    format!(
        r#"{{"agentCount": {}, "agents": [{}]}}"#,
        names.len(),
        agents.join(",")
    )
}

fn by_name(results: &[TaskResult]) -> HashMap<&str, &TaskResult> {
    results
        .iter()
        .map(|result| (result.worker_identity.as_str(), result))
        .collect()
}

#[tokio::test]
async fn test_two_agent_plan_end_to_end() {
    let plan = r#"{"agentCount": 2, "agents": [{"name":"A1","role":"architect","context":"design"},{"name":"A2","role":"coder","context":"implement"}]}"#;
    let backend = ScriptedBackend::new(
        plan,
        &[
            ("A1", Behaviour::Reply("architecture notes")),
            ("A2", Behaviour::Reply("implementation")),
        ],
    );
    let sink = Arc::new(MemorySink::new());
    let mut coordinator = coordinator(backend.clone(), sink.clone());

    let plan = coordinator.determine_plan("write a modular script").await;
    coordinator.spawn_workers(&plan);

    let names: Vec<&str> = coordinator.workers().iter().map(|w| w.identity()).collect();
    assert_eq!(names, vec!["A1", "A2"]);

    let results = coordinator.delegate("write a modular script").await;

    assert_eq!(results.len(), 2);
    let results = by_name(&results);
    assert_eq!(results["A1"].output, "architecture notes");
    assert_eq!(results["A1"].role, "architect");
    assert_eq!(results["A2"].output, "implementation");
    assert!(results.values().all(|r| r.outcome == TaskOutcome::Success));

    let prompts = backend.prompts();
    assert!(prompts
        .iter()
        .any(|p| p.contains("[Role: architect]") && p.contains("Focus: design")));
}

#[tokio::test]
async fn test_prose_plan_falls_back_to_single_generalist() {
    let backend = ScriptedBackend::new(
        "I would suggest two or three agents for this job.",
        &[("ChildAgent1", Behaviour::Reply("did everything"))],
    );
    let sink = Arc::new(MemorySink::new());
    let mut coordinator = coordinator(backend, sink.clone());

    let plan = coordinator.determine_plan("write a modular script").await;
    coordinator.spawn_workers(&plan);

    assert_eq!(coordinator.workers().len(), 1);
    assert_eq!(coordinator.workers()[0].identity(), "ChildAgent1");
    assert_eq!(coordinator.workers()[0].role, "generalist");

    let results = coordinator.delegate("write a modular script").await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].output, "did everything");

    assert!(sink
        .events()
        .iter()
        .any(|e| matches!(e, AgentEvent::PlanFallback { .. })));
}

#[tokio::test]
async fn test_malformed_plans_all_yield_default_plan() {
    let malformed = [
        "no braces here",
        "} backwards {",
        r#"["architect", "coder"]"#,
        r#"{"agents": [{"name": "A"}]}"#,
        r#"{"agentCount": 1}"#,
        r#"{"agentCount": "one", "agents": []}"#,
        r#"{"agentCount": 1, "agents": "A"}"#,
        r#"{"agentCount": 1, "agents": []} {"agentCount": 2, "agents": []}"#,
        "",
    ];

    for raw in malformed {
        let coordinator = coordinator(ScriptedBackend::new(raw, &[]), Arc::new(MemorySink::new()));
        let plan = coordinator.determine_plan("task").await;
        assert_eq!(plan, ExecutionPlan::fallback(), "response: {raw:?}");
    }
}

#[tokio::test]
async fn test_spawn_matches_valid_plan() {
    let names = ["Planner", "Builder", "Checker", "Writer"];
    let backend = ScriptedBackend::new(&plan_json(&names), &[]);
    let mut coordinator = coordinator(backend, Arc::new(MemorySink::new()));

    let plan = coordinator.determine_plan("task").await;
    coordinator.spawn_workers(&plan);

    let spawned: Vec<&str> = coordinator.workers().iter().map(|w| w.identity()).collect();
    assert_eq!(spawned, names);
    let indexes: Vec<usize> = coordinator.workers().iter().map(|w| w.spawn_index).collect();
    assert_eq!(indexes, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn test_count_mismatch_trusts_agents_list() {
    let backend = ScriptedBackend::new(
        r#"{"agentCount": 3, "agents": [{"name": "Only", "role": "solo"}, {"role": "unnamed"}]}"#,
        &[],
    );
    let sink = Arc::new(MemorySink::new());
    let mut coordinator = coordinator(backend, sink.clone());

    let plan = coordinator.determine_plan("task").await;
    coordinator.spawn_workers(&plan);

    assert_eq!(plan.agent_count, 3);
    let names: Vec<&str> = coordinator.workers().iter().map(|w| w.identity()).collect();
    assert_eq!(names, vec!["Only", "ChildAgent2"]);
    assert!(sink.events().contains(&AgentEvent::PlanCountMismatch {
        declared_count: 3,
        agent_count: 2
    }));
}

#[tokio::test(start_paused = true)]
async fn test_failures_are_isolated_per_worker() {
    let names = ["Good", "Crashy", "Flaky", "Sleepy", "Blank"];
    let backend = ScriptedBackend::new(
        &plan_json(&names),
        &[
            ("Good", Behaviour::Reply("fine")),
            ("Crashy", Behaviour::Panic),
            ("Flaky", Behaviour::Fail(503)),
            ("Sleepy", Behaviour::Hang),
            ("Blank", Behaviour::Reply("   ")),
        ],
    );
    let mut coordinator = coordinator(backend, Arc::new(MemorySink::new()));

    let results = coordinator.run("task").await;

    assert_eq!(results.len(), names.len());
    let unique: HashSet<&str> = results.iter().map(|r| r.worker_identity.as_str()).collect();
    assert_eq!(unique.len(), names.len());

    let results = by_name(&results);
    assert!(results["Good"].is_success());
    assert_eq!(results["Good"].output, "fine");

    let crashy = results["Crashy"].failure_reason().unwrap();
    assert!(crashy.contains("panicked"), "{crashy}");
    assert!(crashy.contains("scripted worker crash"), "{crashy}");

    assert!(results["Flaky"].failure_reason().unwrap().contains("503"));
    assert!(results["Sleepy"].failure_reason().unwrap().contains("timed out"));
    assert_eq!(
        results["Blank"].failure_reason(),
        Some("Model returned no output")
    );
}

/// Backend whose every call fails with a 503
struct DownBackend;

#[async_trait]
impl CompletionBackend for DownBackend {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, LlmError> {
        Err(LlmError::Status {
            status: 503,
            body: "maintenance".to_string(),
        })
    }
}

#[tokio::test(start_paused = true)]
async fn test_total_outage_completes_round_with_failures() {
    let sink = Arc::new(MemorySink::new());
    let client = ModelClient::new(Arc::new(DownBackend), sink.clone())
        .with_max_attempts(3)
        .with_retry_delay(Duration::from_millis(10));
    let mut coordinator = Coordinator::new(
        Arc::new(client),
        Arc::new(PromptBuilder::new("")),
        sink.clone(),
    );

    let results = coordinator.run("task").await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].worker_identity, "ChildAgent1");
    assert!(!results[0].is_success());

    let events = sink.events();
    assert!(events
        .iter()
        .any(|e| matches!(e, AgentEvent::PlanFallback { .. })));
    // Three failed attempts for the plan call, three for the single worker
    let attempts = events
        .iter()
        .filter(|e| matches!(e, AgentEvent::AttemptFailed { .. }))
        .count();
    assert_eq!(attempts, 6);
    assert!(events.contains(&AgentEvent::DelegationFinished {
        succeeded: 0,
        failed: 1
    }));
}

#[tokio::test(start_paused = true)]
async fn test_results_arrive_in_completion_order() {
    let backend = ScriptedBackend::new(
        &plan_json(&["Tortoise", "Hare", "Snail"]),
        &[
            ("Tortoise", Behaviour::Delayed(Duration::from_millis(300), "t")),
            ("Hare", Behaviour::Delayed(Duration::from_millis(100), "h")),
            ("Snail", Behaviour::Delayed(Duration::from_millis(500), "s")),
        ],
    );
    let sink = Arc::new(MemorySink::new());
    let mut coordinator = coordinator(backend, sink.clone());

    let plan = coordinator.determine_plan("race").await;
    coordinator.spawn_workers(&plan);

    let started = Instant::now();
    let results = coordinator.delegate("race").await;

    // Concurrent: the round takes as long as the slowest worker
    assert_eq!(started.elapsed(), Duration::from_millis(500));

    let order: Vec<&str> = results.iter().map(|r| r.worker_identity.as_str()).collect();
    assert_eq!(order, vec!["Hare", "Tortoise", "Snail"]);

    let logged: Vec<String> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            AgentEvent::TaskCompleted { result } => Some(result.worker_identity),
            _ => None,
        })
        .collect();
    assert_eq!(logged, vec!["Hare", "Tortoise", "Snail"]);

    let spawn_order: Vec<usize> = results.iter().map(|r| r.spawn_index).collect();
    assert_eq!(spawn_order, vec![1, 0, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_round_deadline_fails_unfinished_workers() {
    let backend = ScriptedBackend::new(
        &plan_json(&["Quick", "Stuck"]),
        &[
            ("Quick", Behaviour::Delayed(Duration::from_secs(1), "done")),
            ("Stuck", Behaviour::Hang),
        ],
    );
    let sink = Arc::new(MemorySink::new());
    let mut coordinator =
        coordinator(backend, sink.clone()).with_round_timeout(Some(Duration::from_secs(5)));

    let started = Instant::now();
    let results = coordinator.run("task").await;

    assert_eq!(started.elapsed(), Duration::from_secs(5));
    assert_eq!(results.len(), 2);
    let results = by_name(&results);
    assert!(results["Quick"].is_success());
    assert_eq!(
        results["Stuck"].failure_reason(),
        Some("round deadline exceeded")
    );
}

#[tokio::test(start_paused = true)]
async fn test_worker_finishing_at_the_deadline_keeps_its_result() {
    let backend = ScriptedBackend::new(
        &plan_json(&["OnTime", "Stuck"]),
        &[
            ("OnTime", Behaviour::Delayed(Duration::from_secs(5), "just made it")),
            ("Stuck", Behaviour::Hang),
        ],
    );
    let mut coordinator = coordinator(backend, Arc::new(MemorySink::new()))
        .with_round_timeout(Some(Duration::from_secs(5)));

    let results = coordinator.run("task").await;

    assert_eq!(results.len(), 2);
    let results = by_name(&results);
    assert!(results["OnTime"].is_success());
    assert_eq!(results["OnTime"].output, "just made it");
    assert_eq!(
        results["Stuck"].failure_reason(),
        Some("round deadline exceeded")
    );
}

#[tokio::test]
async fn test_second_round_needs_new_workers() {
    let backend = ScriptedBackend::new(&plan_json(&["Once"]), &[]);
    let mut coordinator = coordinator(backend, Arc::new(MemorySink::new()));

    let first = coordinator.run("task").await;
    let second = coordinator.delegate("task").await;

    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
}
