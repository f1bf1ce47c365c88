//! Tool execution. Single calls pass straight to the store; bulk calls fan
//! out one sub-call per float id and inline per-id failures so one bad id
//! never sinks the rest.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::{EngineError, Result, ValidationError};
use crate::tools::store::DataStore;
use crate::tools::{Cardinality, ToolCall, ToolRegistry};

#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub tool: String,
    pub data: Value,
    pub corrections: Vec<String>,
}

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    store: Arc<dyn DataStore>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, store: Arc<dyn DataStore>) -> Self {
        Self { registry, store }
    }

    /// Validate then execute one call. Bulk tools are expanded into per-id
    /// single calls, each validated on its own.
    pub async fn run(&self, call: &ToolCall) -> Result<ToolOutcome> {
        let validated = self.registry.validate(call)?;
        let spec = self
            .registry
            .get(&validated.call.tool)
            .ok_or_else(|| ValidationError::UnknownTool(validated.call.tool.clone()))?;

        debug!(tool = spec.name, "executing tool call");

        let data = match spec.cardinality {
            Cardinality::Single => self.store.fetch(&validated.call).await?,
            Cardinality::Bulk => self.fan_out(&validated.call).await?,
        };

        Ok(ToolOutcome {
            tool: validated.call.tool,
            data,
            corrections: validated.corrections,
        })
    }

    async fn fan_out(&self, call: &ToolCall) -> Result<Value> {
        let ids: Vec<i64> = call
            .params
            .get("float_ids")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default();
        if ids.is_empty() {
            return Err(ValidationError::InvalidStoreQuery(
                "bulk call carries no float ids".to_string(),
            )
            .into());
        }

        let mut results = Map::new();
        let mut succeeded = 0usize;
        for id in &ids {
            let sub = self.per_id_call(call, *id)?;
            match self.run_single(&sub).await {
                Ok(value) => {
                    succeeded += 1;
                    results.insert(id.to_string(), value);
                }
                Err(e) => {
                    warn!(tool = %sub.tool, float_id = id, error = %e, "bulk sub-call failed");
                    results.insert(
                        id.to_string(),
                        serde_json::json!({ "error": e.to_string() }),
                    );
                }
            }
        }

        Ok(serde_json::json!({
            "results": Value::Object(results),
            "requested": ids.len(),
            "succeeded": succeeded,
        }))
    }

    async fn run_single(&self, call: &ToolCall) -> Result<Value> {
        let validated = self.registry.validate(call)?;
        self.store.fetch(&validated.call).await
    }

    // Which single tool a bulk tool expands into, with parameters passed
    // through where the single tool declares them.
    fn per_id_call(&self, bulk: &ToolCall, id: i64) -> Result<ToolCall> {
        let single = match bulk.tool.as_str() {
            "get_multiple_trajectories" => "get_trajectory",
            "compare_floats" => "get_depth_profile",
            other => {
                return Err(EngineError::Validation(ValidationError::UnknownTool(
                    other.to_string(),
                )))
            }
        };
        let mut call = ToolCall::new(single).with("float_id", Value::from(id));
        if single == "get_depth_profile" {
            if let Some(parameter) = bulk.params.get("parameter") {
                call.params
                    .insert("parameter".to_string(), parameter.clone());
            }
        }
        Ok(call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Records every call it receives; fails ids listed in `fail_ids`.
    struct MockStore {
        calls: Mutex<Vec<ToolCall>>,
        fail_ids: Vec<i64>,
    }

    impl MockStore {
        fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_ids: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl DataStore for MockStore {
        async fn fetch(&self, call: &ToolCall) -> Result<Value> {
            self.calls.lock().push(call.clone());
            if let Some(id) = call.params.get("float_id").and_then(Value::as_i64) {
                if self.fail_ids.contains(&id) {
                    return Err(EngineError::NotFound(format!("float {} not found", id)));
                }
            }
            Ok(serde_json::json!({ "tool": call.tool }))
        }

        async fn query(&self, _q: &crate::tools::StoreQuery) -> Result<Vec<Value>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_single_call_hits_store_once() {
        let store = Arc::new(MockStore::new());
        let exec = ToolExecutor::new(Arc::new(ToolRegistry::new()), store.clone());
        let call = ToolCall::new("get_trajectory").with("float_id", Value::from(2902296));
        let outcome = exec.run(&call).await.unwrap();
        assert_eq!(outcome.tool, "get_trajectory");
        assert_eq!(store.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_call_never_reaches_store() {
        let store = Arc::new(MockStore::new());
        let exec = ToolExecutor::new(Arc::new(ToolRegistry::new()), store.clone());
        let call = ToolCall::new("get_trajectory").with("sql", Value::String("x".to_string()));
        assert!(exec.run(&call).await.is_err());
        assert!(store.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_fans_out_per_id() {
        let store = Arc::new(MockStore::new());
        let exec = ToolExecutor::new(Arc::new(ToolRegistry::new()), store.clone());
        let call = ToolCall::new("compare_floats")
            .with("float_ids", Value::from(vec![2902296i64, 2901456]))
            .with("parameter", Value::String("temperature".to_string()));
        let outcome = exec.run(&call).await.unwrap();

        let calls = store.calls.lock();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.tool == "get_depth_profile"));
        assert!(calls
            .iter()
            .all(|c| c.params["parameter"] == Value::String("temperature".to_string())));

        assert_eq!(outcome.data["requested"], Value::from(2));
        assert_eq!(outcome.data["succeeded"], Value::from(2));
    }

    #[tokio::test]
    async fn test_bulk_inlines_per_id_failures() {
        let store = Arc::new(MockStore {
            calls: Mutex::new(Vec::new()),
            fail_ids: vec![999999],
        });
        let exec = ToolExecutor::new(Arc::new(ToolRegistry::new()), store.clone());
        let call = ToolCall::new("get_multiple_trajectories")
            .with("float_ids", Value::from(vec![2902296i64, 999999]));
        let outcome = exec.run(&call).await.unwrap();

        assert_eq!(outcome.data["requested"], Value::from(2));
        assert_eq!(outcome.data["succeeded"], Value::from(1));
        assert!(outcome.data["results"]["999999"]["error"].is_string());
        assert!(outcome.data["results"]["2902296"]["error"].is_null());
    }
}
