//! Boundary to the external reasoning model.
//!
//! The rest of the engine talks to the reasoner through one trait and a set
//! of typed payload shapes. Every payload crossing this boundary is parsed
//! strictly; a malformed reply is an error, never a guessed-at value.

pub mod http;
pub mod parse;
pub mod prompts;

pub use http::{HttpReasoner, ReasonerProvider};
pub use parse::parse_payload;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::UpstreamError;

#[async_trait]
pub trait Reasoner: Send + Sync {
    /// One prompt in, raw completion text out.
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Wrap a reasoner call in a hard timeout so one slow upstream call cannot
/// eat the whole query budget.
pub async fn complete_with_timeout(
    reasoner: &dyn Reasoner,
    prompt: &str,
    timeout: Duration,
) -> Result<String, UpstreamError> {
    match tokio::time::timeout(timeout, reasoner.complete(prompt)).await {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(UpstreamError::Reasoner(e.to_string())),
        Err(_) => Err(UpstreamError::Timeout("reasoner call")),
    }
}

/// Tool choice plus extracted parameters, as returned by entity completion.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolSelection {
    pub tool: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub requires_multiple_tools: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IntentDetection {
    pub intent: String,
    #[serde(default)]
    pub entities: BTreeMap<String, Value>,
    #[serde(default)]
    pub confidence: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanPayload {
    pub plan: Vec<PlanStepPayload>,
    #[serde(default)]
    pub expected_output: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanStepPayload {
    pub tool: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    #[serde(default)]
    pub purpose: String,
}

/// Concrete parameter values resolved from a previous step's output.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolvedParams {
    pub resolved_parameters: BTreeMap<String, Value>,
    #[serde(default)]
    pub resolution_notes: String,
}
