//! Sequential plan execution with step isolation.
//!
//! A failed step records its error and execution moves on; later steps that
//! depended on it will fail on their own terms. Dependencies only ever look
//! one step back.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::plan::{Plan, StepParam};
use crate::reasoner::{
    complete_with_timeout, parse_payload, prompts, Reasoner, ResolvedParams,
};
use crate::tools::{ToolCall, ToolExecutor};

#[derive(Debug, Clone)]
pub enum StepOutcome {
    Success(Value),
    Failed(String),
}

impl StepOutcome {
    pub fn as_value(&self) -> Value {
        match self {
            StepOutcome::Success(v) => v.clone(),
            StepOutcome::Failed(e) => serde_json::json!({ "error": e }),
        }
    }
}

#[derive(Debug)]
pub struct PlanResult {
    /// Outcome per step key, in step order.
    pub outcomes: BTreeMap<String, StepOutcome>,
    pub truncated: bool,
    pub expected_output: String,
}

impl PlanResult {
    pub fn any_succeeded(&self) -> bool {
        self.outcomes
            .values()
            .any(|o| matches!(o, StepOutcome::Success(_)))
    }

    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .outcomes
            .iter()
            .map(|(key, outcome)| (key.clone(), outcome.as_value()))
            .collect();
        serde_json::json!({
            "steps": Value::Object(map),
            "truncated": self.truncated,
        })
    }
}

pub struct PlanExecutor<'a> {
    tools: &'a ToolExecutor,
    reasoner: &'a dyn Reasoner,
    reasoner_timeout: Duration,
    max_steps: usize,
}

impl<'a> PlanExecutor<'a> {
    pub fn new(
        tools: &'a ToolExecutor,
        reasoner: &'a dyn Reasoner,
        reasoner_timeout: Duration,
        max_steps: usize,
    ) -> Self {
        Self {
            tools,
            reasoner,
            reasoner_timeout,
            max_steps,
        }
    }

    pub async fn execute(&self, mut plan: Plan) -> PlanResult {
        let truncated = plan.truncate(self.max_steps);
        if truncated {
            let over = crate::error::BudgetError::PlanSteps {
                limit: self.max_steps,
            };
            warn!(error = %over, "plan truncated");
        }

        let mut outcomes: BTreeMap<String, StepOutcome> = BTreeMap::new();
        let mut previous: Option<StepOutcome> = None;

        for (index, step) in plan.steps.iter().enumerate() {
            debug!(step = %step.key, tool = %step.tool, "executing plan step");
            let outcome = self.run_step(index, step, previous.as_ref()).await;
            outcomes.insert(step.key.clone(), outcome.clone());
            previous = Some(outcome);
        }

        PlanResult {
            outcomes,
            truncated,
            expected_output: plan.expected_output,
        }
    }

    async fn run_step(
        &self,
        index: usize,
        step: &crate::plan::ExecutionStep,
        previous: Option<&StepOutcome>,
    ) -> StepOutcome {
        let params = if step.has_dependencies() {
            if index == 0 {
                return StepOutcome::Failed(
                    "first step cannot depend on a previous result".to_string(),
                );
            }
            let previous_value = match previous {
                Some(StepOutcome::Success(v)) => v.clone(),
                Some(StepOutcome::Failed(e)) => {
                    return StepOutcome::Failed(format!(
                        "dependency step failed: {}",
                        e
                    ));
                }
                None => {
                    return StepOutcome::Failed("no previous step output available".to_string())
                }
            };
            match self.resolve_params(step, &previous_value).await {
                Ok(params) => params,
                Err(e) => return StepOutcome::Failed(e),
            }
        } else {
            literal_params(&step.params)
        };

        let call = ToolCall {
            tool: step.tool.clone(),
            params,
        };
        match self.tools.run(&call).await {
            Ok(outcome) => StepOutcome::Success(outcome.data),
            Err(e) => StepOutcome::Failed(e.to_string()),
        }
    }

    // Hand the step's declared parameters and the previous output to the
    // reasoner; it returns every parameter as a concrete value.
    async fn resolve_params(
        &self,
        step: &crate::plan::ExecutionStep,
        previous: &Value,
    ) -> Result<Map<String, Value>, String> {
        let declared: Map<String, Value> = step
            .params
            .iter()
            .map(|(name, param)| {
                let value = match param {
                    StepParam::Literal(v) => v.clone(),
                    StepParam::Extract(what) => Value::String(format!("EXTRACT: {}", what)),
                };
                (name.clone(), value)
            })
            .collect();

        let prompt = prompts::param_resolution_prompt(
            &step.tool,
            &Value::Object(declared),
            previous,
        );
        let raw = complete_with_timeout(self.reasoner, &prompt, self.reasoner_timeout)
            .await
            .map_err(|e| format!("parameter resolution failed: {}", e))?;
        let resolved: ResolvedParams =
            parse_payload(&raw).map_err(|e| format!("parameter resolution failed: {}", e))?;

        Ok(resolved.resolved_parameters.into_iter().collect())
    }
}

fn literal_params(params: &BTreeMap<String, StepParam>) -> Map<String, Value> {
    params
        .iter()
        .filter_map(|(name, param)| match param {
            StepParam::Literal(v) => Some((name.clone(), v.clone())),
            StepParam::Extract(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoner::{PlanPayload, PlanStepPayload};
    use crate::tools::{DataStore, StoreQuery, ToolRegistry};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct MockStore {
        calls: Mutex<Vec<ToolCall>>,
    }

    #[async_trait]
    impl DataStore for MockStore {
        async fn fetch(&self, call: &ToolCall) -> crate::error::Result<Value> {
            self.calls.lock().push(call.clone());
            if call.tool == "get_floats_in_region" {
                Ok(serde_json::json!({ "floats": [{ "float_id": 2902296 }] }))
            } else {
                Ok(serde_json::json!({ "tool": call.tool }))
            }
        }

        async fn query(&self, _q: &StoreQuery) -> crate::error::Result<Vec<Value>> {
            Ok(vec![])
        }
    }

    /// Always resolves EXTRACT parameters to a fixed float id.
    struct ScriptedReasoner;

    #[async_trait]
    impl Reasoner for ScriptedReasoner {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok(r#"{"resolved_parameters": {"float_id": 2902296, "parameter": "temperature"}}"#
                .to_string())
        }
    }

    fn two_step_plan() -> Plan {
        Plan::from_payload(PlanPayload {
            plan: vec![
                PlanStepPayload {
                    tool: "get_floats_in_region".to_string(),
                    parameters: [("region".to_string(), Value::String("equator".to_string()))]
                        .into_iter()
                        .collect(),
                    purpose: String::new(),
                },
                PlanStepPayload {
                    tool: "get_depth_profile".to_string(),
                    parameters: [
                        (
                            "float_id".to_string(),
                            Value::String("EXTRACT: first float id".to_string()),
                        ),
                        (
                            "parameter".to_string(),
                            Value::String("temperature".to_string()),
                        ),
                    ]
                    .into_iter()
                    .collect(),
                    purpose: String::new(),
                },
            ],
            expected_output: String::new(),
        })
    }

    fn executor(store: Arc<MockStore>) -> ToolExecutor {
        ToolExecutor::new(Arc::new(ToolRegistry::new()), store)
    }

    #[tokio::test]
    async fn test_dependent_step_resolves_against_previous_output() {
        let store = Arc::new(MockStore {
            calls: Mutex::new(Vec::new()),
        });
        let tools = executor(store.clone());
        let reasoner = ScriptedReasoner;
        let exec = PlanExecutor::new(&tools, &reasoner, Duration::from_secs(5), 6);

        let result = exec.execute(two_step_plan()).await;
        assert!(result.any_succeeded());
        assert!(!result.truncated);

        let calls = store.calls.lock();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].tool, "get_depth_profile");
        assert_eq!(calls[1].params["float_id"], Value::from(2902296));
    }

    #[tokio::test]
    async fn test_extract_at_first_step_fails_that_step() {
        let store = Arc::new(MockStore {
            calls: Mutex::new(Vec::new()),
        });
        let tools = executor(store.clone());
        let reasoner = ScriptedReasoner;
        let exec = PlanExecutor::new(&tools, &reasoner, Duration::from_secs(5), 6);

        let plan = Plan::from_payload(PlanPayload {
            plan: vec![PlanStepPayload {
                tool: "get_trajectory".to_string(),
                parameters: [(
                    "float_id".to_string(),
                    Value::String("EXTRACT: anything".to_string()),
                )]
                .into_iter()
                .collect(),
                purpose: String::new(),
            }],
            expected_output: String::new(),
        });
        let result = exec.execute(plan).await;
        assert!(!result.any_succeeded());
        assert!(store.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_failed_step_does_not_abort_the_rest() {
        let store = Arc::new(MockStore {
            calls: Mutex::new(Vec::new()),
        });
        let tools = executor(store.clone());
        let reasoner = ScriptedReasoner;
        let exec = PlanExecutor::new(&tools, &reasoner, Duration::from_secs(5), 6);

        let plan = Plan::from_payload(PlanPayload {
            plan: vec![
                PlanStepPayload {
                    tool: "no_such_tool".to_string(),
                    parameters: BTreeMap::new(),
                    purpose: String::new(),
                },
                PlanStepPayload {
                    tool: "count_floats".to_string(),
                    parameters: BTreeMap::new(),
                    purpose: String::new(),
                },
            ],
            expected_output: String::new(),
        });
        let result = exec.execute(plan).await;
        assert!(result.any_succeeded());
        assert!(matches!(
            result.outcomes["step_1_no_such_tool"],
            StepOutcome::Failed(_)
        ));
        assert!(matches!(
            result.outcomes["step_2_count_floats"],
            StepOutcome::Success(_)
        ));
    }

    #[tokio::test]
    async fn test_plan_truncated_to_budget() {
        let store = Arc::new(MockStore {
            calls: Mutex::new(Vec::new()),
        });
        let tools = executor(store.clone());
        let reasoner = ScriptedReasoner;
        let exec = PlanExecutor::new(&tools, &reasoner, Duration::from_secs(5), 1);

        let result = exec.execute(two_step_plan()).await;
        assert!(result.truncated);
        assert_eq!(result.outcomes.len(), 1);
        assert_eq!(store.calls.lock().len(), 1);
    }
}
