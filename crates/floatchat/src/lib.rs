pub mod config;
pub mod engine;
pub mod entities;
pub mod error;
pub mod intent;
pub mod plan;
pub mod reasoner;
pub mod regions;
pub mod session;
pub mod tools;
pub mod types;

// Re-export primary types for convenience
pub use config::EngineConfig;
pub use engine::{QueryEngine, ResponseFormatter};
pub use entities::{Entities, EntityKind, Parameter};
pub use error::{BudgetError, EngineError, UpstreamError, ValidationError};
pub use intent::{Intent, IntentResolver};
pub use reasoner::{HttpReasoner, Reasoner, ReasonerProvider};
pub use regions::{Region, RegionRegistry};
pub use tools::{DataStore, StoreQuery, ToolCall, ToolRegistry};
pub use types::{ProcessingSource, QueryRequest, ResponseEnvelope, SessionHistory};
