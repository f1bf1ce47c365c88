//! Multi-step execution plans with symbolic data dependencies.
//!
//! A step parameter is either a literal value or an `Extract` marker naming
//! what to pull out of the preceding step's output. Markers are resolved at
//! execution time, never guessed at plan time.

pub mod executor;

pub use executor::{PlanExecutor, PlanResult, StepOutcome};

use std::collections::BTreeMap;

use serde_json::Value;

use crate::reasoner::PlanPayload;

const EXTRACT_PREFIX: &str = "EXTRACT:";

#[derive(Debug, Clone)]
pub enum StepParam {
    Literal(Value),
    /// Description of what to take from the previous step's output.
    Extract(String),
}

impl StepParam {
    pub fn is_extract(&self) -> bool {
        matches!(self, StepParam::Extract(_))
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionStep {
    pub tool: String,
    /// Stable key this step's outcome is stored under.
    pub key: String,
    pub params: BTreeMap<String, StepParam>,
    pub purpose: String,
}

impl ExecutionStep {
    pub fn has_dependencies(&self) -> bool {
        self.params.values().any(StepParam::is_extract)
    }
}

#[derive(Debug, Clone)]
pub struct Plan {
    pub steps: Vec<ExecutionStep>,
    pub expected_output: String,
}

impl Plan {
    /// Build a plan from a parsed reasoner payload. String values starting
    /// with the extract prefix become symbolic dependencies.
    pub fn from_payload(payload: PlanPayload) -> Self {
        let steps = payload
            .plan
            .into_iter()
            .enumerate()
            .map(|(i, step)| {
                let params = step
                    .parameters
                    .into_iter()
                    .map(|(name, value)| {
                        let param = match &value {
                            Value::String(s) if s.trim_start().starts_with(EXTRACT_PREFIX) => {
                                let what = s
                                    .trim_start()
                                    .trim_start_matches(EXTRACT_PREFIX)
                                    .trim()
                                    .to_string();
                                StepParam::Extract(what)
                            }
                            _ => StepParam::Literal(value.clone()),
                        };
                        (name, param)
                    })
                    .collect();
                ExecutionStep {
                    key: format!("step_{}_{}", i + 1, step.tool),
                    tool: step.tool,
                    params,
                    purpose: step.purpose,
                }
            })
            .collect();
        Plan {
            steps,
            expected_output: payload.expected_output,
        }
    }

    /// Cap the plan at `max` steps; returns whether anything was dropped.
    pub fn truncate(&mut self, max: usize) -> bool {
        if self.steps.len() > max {
            self.steps.truncate(max);
            true
        } else {
            false
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoner::PlanStepPayload;

    fn payload() -> PlanPayload {
        PlanPayload {
            plan: vec![
                PlanStepPayload {
                    tool: "get_floats_in_region".to_string(),
                    parameters: [("region".to_string(), Value::String("equator".to_string()))]
                        .into_iter()
                        .collect(),
                    purpose: "find floats".to_string(),
                },
                PlanStepPayload {
                    tool: "get_depth_profile".to_string(),
                    parameters: [
                        (
                            "float_id".to_string(),
                            Value::String("EXTRACT: first float id in the result".to_string()),
                        ),
                        (
                            "parameter".to_string(),
                            Value::String("temperature".to_string()),
                        ),
                    ]
                    .into_iter()
                    .collect(),
                    purpose: "profile it".to_string(),
                },
            ],
            expected_output: "a profile".to_string(),
        }
    }

    #[test]
    fn test_extract_markers_become_dependencies() {
        let plan = Plan::from_payload(payload());
        assert_eq!(plan.steps.len(), 2);
        assert!(!plan.steps[0].has_dependencies());
        assert!(plan.steps[1].has_dependencies());
        match &plan.steps[1].params["float_id"] {
            StepParam::Extract(what) => assert_eq!(what, "first float id in the result"),
            other => panic!("expected extract, got {:?}", other),
        }
    }

    #[test]
    fn test_step_keys_are_stable() {
        let plan = Plan::from_payload(payload());
        assert_eq!(plan.steps[0].key, "step_1_get_floats_in_region");
        assert_eq!(plan.steps[1].key, "step_2_get_depth_profile");
    }

    #[test]
    fn test_truncate_reports_dropped_steps() {
        let mut plan = Plan::from_payload(payload());
        assert!(plan.truncate(1));
        assert_eq!(plan.steps.len(), 1);
        assert!(!plan.truncate(1));
    }
}
