//! Language-model access.
//!
//! [`CompletionBackend`] is the single-attempt transport seam; [`ModelClient`]
//! layers the timeout and retry policy on top of it and degrades to an empty
//! string once attempts are exhausted.

mod client;
mod error;
mod http;

pub use client::{CallOptions, CompletionBackend, CompletionRequest, ModelClient};
pub use error::LlmError;
pub use http::{HttpBackend, DEFAULT_BASE_URL, DEFAULT_MODEL};
