use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use uuid::Uuid;

use super::events::{AgentEvent, EventSink};
use super::plan::assign_agent_names;
use super::prompts::{library, PromptBuilder, COORDINATOR_ROLE};
use super::types::{AgentSpec, ExecutionPlan, TaskOutcome, TaskResult};
use super::worker::Worker;
use crate::config::{Config, DEFAULT_PLAN_MAX_TOKENS};
use crate::llm::{CompletionBackend, ModelClient};

pub const DEFAULT_COORDINATOR_NAME: &str = "MotherAgent";

/// Longest slice of a rejected plan response carried in the fallback event
const RAW_RESPONSE_PREVIEW_CHARS: usize = 500;

/// Coordinator responsible for plan determination, worker spawning
/// and concurrent delegation.
///
/// Workers spawned by one call to [`Coordinator::spawn_workers`] live for
/// exactly one delegation round.
pub struct Coordinator {
    pub id: Uuid,
    pub name: String,
    client: Arc<ModelClient>,
    prompts: Arc<PromptBuilder>,
    events: Arc<dyn EventSink>,
    plan_max_tokens: u32,
    round_timeout: Option<Duration>,
    workers: Vec<Worker>,
}

impl Coordinator {
    pub fn new(
        client: Arc<ModelClient>,
        prompts: Arc<PromptBuilder>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: DEFAULT_COORDINATOR_NAME.to_string(),
            client,
            prompts,
            events,
            plan_max_tokens: DEFAULT_PLAN_MAX_TOKENS,
            round_timeout: None,
            workers: Vec::new(),
        }
    }

    /// Wire a coordinator, its model client and prompt builder from settings
    pub fn from_config(
        config: &Config,
        backend: Arc<dyn CompletionBackend>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let client = Arc::new(ModelClient::from_config(backend, config, Arc::clone(&events)));
        let prompts = Arc::new(PromptBuilder::new(config.preamble.clone()));

        Self::new(client, prompts, events)
            .with_plan_max_tokens(config.plan_max_tokens)
            .with_round_timeout(config.round_timeout())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_plan_max_tokens(mut self, plan_max_tokens: u32) -> Self {
        self.plan_max_tokens = plan_max_tokens;
        self
    }

    pub fn with_round_timeout(mut self, round_timeout: Option<Duration>) -> Self {
        self.round_timeout = round_timeout;
        self
    }

    /// Workers waiting for the next delegation round
    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    /// Prompt asking the model to decompose `task_description`
    pub fn plan_prompt(&self, task_description: &str) -> String {
        let instruction = library::plan_decomposition()
            .render(&HashMap::from([("task", task_description)]));
        self.prompts
            .build(&self.name, &instruction, Some(COORDINATOR_ROLE))
    }

    /// Ask the model for an execution plan.
    ///
    /// Never fails: an unreachable backend or an unusable response yields
    /// [`ExecutionPlan::fallback`].
    pub async fn determine_plan(&self, task_description: &str) -> ExecutionPlan {
        let prompt = self.plan_prompt(task_description);
        let options = self.client.options().with_max_tokens(self.plan_max_tokens);
        let raw = self.client.call_with(&prompt, &options).await;

        match ExecutionPlan::parse(&raw) {
            Ok(plan) => {
                if plan.count_mismatch() {
                    self.events.emit(&AgentEvent::PlanCountMismatch {
                        declared_count: plan.agent_count,
                        agent_count: plan.worker_count(),
                    });
                }
                self.events.emit(&AgentEvent::PlanDetermined {
                    declared_count: plan.agent_count,
                    agent_count: plan.worker_count(),
                });
                plan
            }
            Err(e) => {
                self.events.emit(&AgentEvent::PlanFallback {
                    reason: e.to_string(),
                    raw_response: raw.chars().take(RAW_RESPONSE_PREVIEW_CHARS).collect(),
                });
                ExecutionPlan::fallback()
            }
        }
    }

    /// Create one worker per plan entry, replacing any previous set.
    ///
    /// Unnamed entries get a generated name that no other entry uses.
    pub fn spawn_workers(&mut self, plan: &ExecutionPlan) {
        let names = assign_agent_names(&plan.agents);
        self.workers = plan
            .agents
            .iter()
            .zip(names)
            .enumerate()
            .map(|(index, (spec, name))| {
                let spec = AgentSpec { name, ..spec.clone() };
                Worker::from_spec(
                    index,
                    &spec,
                    Arc::clone(&self.client),
                    Arc::clone(&self.prompts),
                )
            })
            .collect();

        for worker in &self.workers {
            self.events.emit(&AgentEvent::WorkerSpawned {
                worker_id: worker.id,
                name: worker.name.clone(),
                role: worker.role.clone(),
            });
        }
    }

    /// Run every spawned worker concurrently on `task_description`.
    ///
    /// Returns exactly one result per worker, in completion order. The worker
    /// set is consumed by the round.
    pub async fn delegate(&mut self, task_description: &str) -> Vec<TaskResult> {
        let workers = std::mem::take(&mut self.workers);

        self.events.emit(&AgentEvent::DelegationStarted {
            task: task_description.to_string(),
            worker_count: workers.len(),
        });

        let mut join_set = JoinSet::new();
        for (position, worker) in workers.iter().cloned().enumerate() {
            let task = task_description.to_string();
            join_set.spawn(async move {
                let started = Instant::now();
                let outcome = AssertUnwindSafe(worker.perform_task(&task))
                    .catch_unwind()
                    .await;
                let outcome = match outcome {
                    Ok(Ok(output)) => Ok(output),
                    Ok(Err(e)) => Err(e.to_string()),
                    Err(panic) => Err(format!("worker panicked: {}", panic_message(&*panic))),
                };
                (position, outcome, started.elapsed())
            });
        }

        let deadline = self.round_timeout.map(|timeout| Instant::now() + timeout);
        let mut deadline_hit = false;
        let mut reported = vec![false; workers.len()];
        let mut results = Vec::with_capacity(workers.len());

        loop {
            let next = match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, join_set.join_next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            deadline_hit = true;
                            // Workers woken at the deadline instant still count
                            tokio::task::yield_now().await;
                            while let Some(joined) = join_set.try_join_next() {
                                self.collect(joined, &workers, &mut reported, &mut results);
                            }
                            join_set.abort_all();
                            break;
                        }
                    }
                }
                None => join_set.join_next().await,
            };

            let Some(joined) = next else { break };
            self.collect(joined, &workers, &mut reported, &mut results);
        }

        let reason = if deadline_hit {
            "round deadline exceeded"
        } else {
            "worker task was cancelled"
        };
        for (position, worker) in workers.iter().enumerate() {
            if !reported[position] {
                results.push(self.record(worker, Err(reason.to_string()), Duration::ZERO));
            }
        }

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        self.events.emit(&AgentEvent::DelegationFinished {
            succeeded,
            failed: results.len() - succeeded,
        });

        results
    }

    /// Plan, spawn and delegate in one go
    pub async fn run(&mut self, task_description: &str) -> Vec<TaskResult> {
        let plan = self.determine_plan(task_description).await;
        self.spawn_workers(&plan);
        self.delegate(task_description).await
    }

    fn collect(
        &self,
        joined: Result<(usize, Result<String, String>, Duration), JoinError>,
        workers: &[Worker],
        reported: &mut [bool],
        results: &mut Vec<TaskResult>,
    ) {
        match joined {
            Ok((position, outcome, elapsed)) => {
                reported[position] = true;
                results.push(self.record(&workers[position], outcome, elapsed));
            }
            Err(e) => {
                tracing::error!(coordinator = %self.name, error = %e, "Worker task ended abnormally");
            }
        }
    }

    fn record(
        &self,
        worker: &Worker,
        outcome: Result<String, String>,
        elapsed: Duration,
    ) -> TaskResult {
        let (output, outcome) = match outcome {
            Ok(output) => (output, TaskOutcome::Success),
            Err(reason) => (String::new(), TaskOutcome::Failure { reason }),
        };

        let result = TaskResult {
            worker_id: worker.id,
            worker_identity: worker.name.clone(),
            role: worker.role.clone(),
            spawn_index: worker.spawn_index,
            output,
            outcome,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            completed_at: Utc::now(),
        };

        self.events.emit(&AgentEvent::TaskCompleted {
            result: result.clone(),
        });
        result
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
