//! Error types for the FloatChat query engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Top-level error type for engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("budget exceeded: {0}")]
    Budget(#[from] BudgetError),
}

/// Fail-closed request validation errors. An invalid tool or parameter
/// request is never executed, not even partially.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("tool {tool} does not declare parameter '{param}'")]
    UndeclaredParameter { tool: String, param: String },

    #[error("invalid value '{value}' for {param} (allowed: {allowed})")]
    InvalidEnumValue {
        param: String,
        value: String,
        allowed: String,
    },

    #[error("intent {intent} requires entity '{entity}'")]
    MissingEntity { intent: String, entity: String },

    #[error("invalid store query: {0}")]
    InvalidStoreQuery(String),
}

/// Failures of external collaborators (reasoning service, data store).
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("reasoner call failed: {0}")]
    Reasoner(String),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("data store error: {0}")]
    Store(String),

    #[error("malformed reasoner payload: {0}")]
    MalformedPayload(String),
}

/// Step-count or wall-clock budget violations.
#[derive(Error, Debug)]
pub enum BudgetError {
    #[error("plan exceeds the {limit}-step budget")]
    PlanSteps { limit: usize },

    #[error("query exceeded its {secs}s deadline")]
    QueryDeadline { secs: u64 },
}

impl EngineError {
    /// True when the error indicates a query that executed but matched no rows.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}
