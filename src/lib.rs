//! Agent Swarm Library
//!
//! A coordinator agent asks a language model how to split a task across
//! sub-agents, spawns one worker per planned agent and runs them concurrently,
//! collecting one result per worker.

pub mod agents;
pub mod config;
pub mod llm;
