//! Wire types shared across the engine: requests, response envelopes and
//! session history views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::Entities;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub text: String,
    pub session_id: String,
}

/// Which cascade state produced the answer. Part of the envelope so callers
/// can tell a rule hit from a terminal fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingSource {
    Conversational,
    RulesOnly,
    EntityAssist,
    ReasonerIntent,
    Orchestration,
    StoreQuery,
    TerminalFallback,
    Guidance,
}

impl ProcessingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingSource::Conversational => "conversational",
            ProcessingSource::RulesOnly => "rules_only",
            ProcessingSource::EntityAssist => "entity_assist",
            ProcessingSource::ReasonerIntent => "reasoner_intent",
            ProcessingSource::Orchestration => "orchestration",
            ProcessingSource::StoreQuery => "store_query",
            ProcessingSource::TerminalFallback => "terminal_fallback",
            ProcessingSource::Guidance => "guidance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VizKind {
    TrajectoryMap,
    Profile,
    Timeseries,
    Comparison,
    RegionalMap,
    Summary,
    Table,
}

/// Rendering hint attached to an envelope. `spec` carries kind-specific
/// options (axis inversion, marker fields) as loose JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Visualization {
    pub kind: VizKind,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub spec: Value,
}

/// The single response shape every cascade state resolves to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization: Option<Visualization>,
    pub data: Value,
    pub suggestions: Vec<String>,
    pub processing_source: ProcessingSource,
    pub intent: String,
    pub confidence: f32,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

/// One completed query turn as stored in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exchange {
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub intent: String,
    pub entities: Entities,
    pub result: Value,
    pub envelope: ResponseEnvelope,
}

/// Read-only view of a session returned over the API surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHistory {
    pub session_id: String,
    pub history: Vec<Exchange>,
    pub context: Entities,
}
