use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub cascade: CascadeConfig,
    pub session: SessionConfig,
    pub reasoner: ReasonerConfig,
}

/// Confidence scores and budgets for each cascade state. Confidence reflects
/// which state answered, not model certainty, so these are fixed per state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeConfig {
    pub rules_confidence: f32,
    pub entity_assist_confidence: f32,
    /// Reasoner intent detection is accepted only strictly above this.
    pub intent_confidence_threshold: f32,
    pub plan_confidence: f32,
    pub store_query_confidence: f32,
    pub terminal_confidence: f32,
    pub max_plan_steps: usize,
    pub query_budget_secs: u64,
    pub max_store_rows: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Exchanges retained per session; older turns are dropped.
    pub history_window: usize,
    pub idle_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasonerConfig {
    pub call_timeout_secs: u64,
}

impl EngineConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        for (name, v) in [
            ("cascade.rules_confidence", self.cascade.rules_confidence),
            (
                "cascade.entity_assist_confidence",
                self.cascade.entity_assist_confidence,
            ),
            (
                "cascade.intent_confidence_threshold",
                self.cascade.intent_confidence_threshold,
            ),
            ("cascade.plan_confidence", self.cascade.plan_confidence),
            (
                "cascade.store_query_confidence",
                self.cascade.store_query_confidence,
            ),
            (
                "cascade.terminal_confidence",
                self.cascade.terminal_confidence,
            ),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(format!("{} must be in [0.0, 1.0]", name));
            }
        }
        if self.cascade.max_plan_steps == 0 {
            return Err("cascade.max_plan_steps must be > 0".into());
        }
        if self.cascade.query_budget_secs == 0 {
            return Err("cascade.query_budget_secs must be > 0".into());
        }
        if self.cascade.max_store_rows == 0 {
            return Err("cascade.max_store_rows must be > 0".into());
        }
        if self.session.history_window == 0 {
            return Err("session.history_window must be > 0".into());
        }
        if self.reasoner.call_timeout_secs >= self.cascade.query_budget_secs {
            return Err("reasoner.call_timeout_secs must be < cascade.query_budget_secs".into());
        }
        Ok(())
    }

    /// Load config from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cascade: CascadeConfig {
                rules_confidence: 0.9,
                entity_assist_confidence: 0.8,
                intent_confidence_threshold: 0.7,
                plan_confidence: 0.7,
                store_query_confidence: 0.6,
                terminal_confidence: 0.1,
                max_plan_steps: 6,
                query_budget_secs: 30,
                max_store_rows: 100,
            },
            session: SessionConfig {
                history_window: 10,
                idle_ttl_secs: 3600,
            },
            reasoner: ReasonerConfig {
                call_timeout_secs: 20,
            },
        }
    }
}
