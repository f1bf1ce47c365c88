//! Prompt builders. Every prompt that expects structured output states the
//! exact JSON shape; parsing on the way back is strict.

use serde_json::Value;

use crate::entities::{Entities, EntityKind};
use crate::types::Exchange;

const JSON_ONLY: &str = "Respond with a single JSON object and nothing else. \
No markdown fences, no commentary.";

fn context_block(context: &Entities, history: &[Exchange]) -> String {
    let mut block = String::new();
    if !context.is_empty() {
        block.push_str("Known context from earlier in the conversation:\n");
        block.push_str(&serde_json::to_string(context).unwrap_or_default());
        block.push('\n');
    }
    if !history.is_empty() {
        block.push_str("Recent queries:\n");
        for exchange in history {
            block.push_str(&format!("- {} (intent: {})\n", exchange.query, exchange.intent));
        }
    }
    block
}

/// Ask the reasoner to pick one tool and fill its parameters, using context
/// to complete entities the current query leaves implicit.
pub fn entity_completion_prompt(
    query: &str,
    context: &Entities,
    history: &[Exchange],
    missing: &[EntityKind],
    catalog: &Value,
) -> String {
    let missing_names: Vec<&str> = missing.iter().map(|k| k.as_str()).collect();
    format!(
        "You are interpreting a query about ARGO ocean floats.\n\
        Available tools:\n{}\n\n{}\n\
        Query: {}\n\n\
        The query is missing these values: {:?}. Fill them from the context \
        above if it carries them.\n\
        {}\n\
        Shape: {{\"tool\": \"<tool name or null>\", \"parameters\": {{}}, \
        \"confidence\": 0.0, \"reasoning\": \"\"}}",
        catalog,
        context_block(context, history),
        query,
        missing_names,
        JSON_ONLY
    )
}

/// Free classification when rules produced nothing usable.
pub fn intent_detection_prompt(query: &str, context: &Entities, history: &[Exchange]) -> String {
    format!(
        "Classify this query about ARGO ocean float data.\n\
        Intents: greeting, farewell, capabilities, list_floats, count_floats, \
        float_profile, depth_profile, trajectory, multiple_trajectories, \
        timeseries, floats_in_region, region_data, location_search, \
        compare_floats, unknown.\n\
        Entity keys: float_id, float_ids, parameter (temperature, salinity, \
        pressure, depth_m), region, latitude, longitude, cycle_number.\n\n\
        {}\
        Query: {}\n\n\
        Use confidence 0.0 with intent \"unknown\" if the query is not about \
        float data at all.\n\
        {}\n\
        Shape: {{\"intent\": \"\", \"entities\": {{}}, \"confidence\": 0.0}}",
        context_block(context, history),
        query,
        JSON_ONLY
    )
}

/// Ask for a short multi-step plan over the tool catalog.
pub fn plan_prompt(query: &str, context: &Entities, catalog: &Value, max_steps: usize) -> String {
    format!(
        "Break this ARGO float data query into tool calls, at most {} steps.\n\
        Available tools:\n{}\n\n{}\
        Query: {}\n\n\
        A later step may use the output of the step directly before it: set \
        the parameter value to the string \"EXTRACT: <what to take>\". The \
        first step must use only literal values.\n\
        {}\n\
        Shape: {{\"plan\": [{{\"tool\": \"\", \"parameters\": {{}}, \
        \"purpose\": \"\"}}], \"expected_output\": \"\"}}",
        max_steps,
        catalog,
        context_block(context, &[]),
        query,
        JSON_ONLY
    )
}

/// Resolve one step's EXTRACT placeholders against the previous step's
/// actual output.
pub fn param_resolution_prompt(
    tool: &str,
    parameters: &Value,
    previous_result: &Value,
) -> String {
    format!(
        "A plan step calls tool '{}' with these parameters:\n{}\n\n\
        Values marked \"EXTRACT: ...\" must be replaced with concrete values \
        taken from the previous step's output:\n{}\n\n\
        {}\n\
        Shape: {{\"resolved_parameters\": {{}}, \"resolution_notes\": \"\"}}",
        tool,
        parameters,
        truncate_json(previous_result, 4000),
        JSON_ONLY
    )
}

/// Ask for a constrained structured query against the store schema.
pub fn store_query_prompt(query: &str, context: &Entities, schema: &Value) -> String {
    format!(
        "Express this ARGO float data query as a structured store query.\n\
        Schema (only these tables, columns and operators exist):\n{}\n\n{}\
        Query: {}\n\n\
        {}\n\
        Shape: {{\"table\": \"\", \"columns\": [], \"filters\": \
        [{{\"column\": \"\", \"op\": \"eq\", \"value\": null}}], \"limit\": 100}}",
        schema,
        context_block(context, &[]),
        query,
        JSON_ONLY
    )
}

/// Summarize tool results into a short answer for the user. Plain text out.
pub fn synthesis_prompt(query: &str, results: &Value) -> String {
    format!(
        "Answer the user's question about ARGO ocean float data using only \
        the data below. Two or three sentences, plain text, no markdown.\n\n\
        Question: {}\n\nData:\n{}",
        query,
        truncate_json(results, 6000)
    )
}

/// Last resort: answer from general knowledge, clearly hedged.
pub fn terminal_prompt(query: &str) -> String {
    format!(
        "You are an assistant for an ARGO ocean float data explorer. The \
        query below could not be matched to any data operation. Reply in two \
        or three sentences of plain text. If it is about oceanography, answer \
        from general knowledge and say the live data could not be queried. \
        Otherwise explain what kinds of float questions you can answer.\n\n\
        Query: {}",
        query
    )
}

// Keep prompts bounded when step outputs are large row sets.
fn truncate_json(value: &Value, max_chars: usize) -> String {
    let text = value.to_string();
    if text.chars().count() <= max_chars {
        return text;
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{}... (truncated)", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_carry_the_query() {
        let entities = Entities::default();
        let p = intent_detection_prompt("salinity near the equator", &entities, &[]);
        assert!(p.contains("salinity near the equator"));
        assert!(p.contains("compare_floats"));
    }

    #[test]
    fn test_truncate_bounds_large_payloads() {
        let big = Value::String("y".repeat(10_000));
        let text = truncate_json(&big, 100);
        assert!(text.chars().count() < 130);
        assert!(text.ends_with("(truncated)"));
    }
}
