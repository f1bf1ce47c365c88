//! Turns raw tool output into the response envelope: a short narrative, a
//! visualization hint and follow-up suggestions.
//!
//! The narrative comes from the reasoner when it is reachable; the
//! deterministic fallback text keeps formatting from ever failing a query
//! that already has its data.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::intent::Intent;
use crate::reasoner::{complete_with_timeout, prompts, Reasoner};
use crate::types::{ProcessingSource, ResponseEnvelope, Visualization, VizKind};

pub struct ResponseFormatter {
    reasoner: Arc<dyn Reasoner>,
    timeout: Duration,
}

impl ResponseFormatter {
    pub fn new(reasoner: Arc<dyn Reasoner>, timeout: Duration) -> Self {
        Self { reasoner, timeout }
    }

    pub async fn format(
        &self,
        query: &str,
        intent: Intent,
        data: Value,
        source: ProcessingSource,
        confidence: f32,
        session_id: &str,
    ) -> ResponseEnvelope {
        let text = match complete_with_timeout(
            self.reasoner.as_ref(),
            &prompts::synthesis_prompt(query, &data),
            self.timeout,
        )
        .await
        {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) | Err(_) => {
                debug!(intent = intent.as_str(), "synthesis unavailable, using fallback text");
                fallback_text(intent, &data)
            }
        };

        ResponseEnvelope {
            text,
            visualization: describe_visualization(intent, &data),
            data,
            suggestions: suggestions_for(intent),
            processing_source: source,
            intent: intent.as_str().to_string(),
            confidence,
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Deterministic envelope with no reasoner involvement, for guidance and
    /// error paths.
    pub fn minimal_envelope(
        text: &str,
        intent: Intent,
        source: ProcessingSource,
        confidence: f32,
        suggestions: Vec<String>,
        session_id: &str,
    ) -> ResponseEnvelope {
        ResponseEnvelope {
            text: text.to_string(),
            visualization: None,
            data: Value::Null,
            suggestions,
            processing_source: source,
            intent: intent.as_str().to_string(),
            confidence,
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Pick a rendering hint from the shape of the data. Intent settles the
/// ambiguous cases; data shape settles the rest.
pub fn describe_visualization(intent: Intent, data: &Value) -> Option<Visualization> {
    if data.is_null() {
        return None;
    }
    let kind = match intent {
        Intent::Trajectory => VizKind::TrajectoryMap,
        Intent::MultipleTrajectories => VizKind::TrajectoryMap,
        Intent::DepthProfile => VizKind::Profile,
        Intent::Timeseries => VizKind::Timeseries,
        Intent::CompareFloats => VizKind::Comparison,
        Intent::FloatsInRegion | Intent::RegionData | Intent::LocationSearch => {
            VizKind::RegionalMap
        }
        Intent::ListFloats => VizKind::Table,
        Intent::FloatProfile | Intent::CountFloats => VizKind::Summary,
        _ => return infer_from_shape(data),
    };

    let spec = match kind {
        // Depth grows downward on profile plots.
        VizKind::Profile => serde_json::json!({ "invert_y": true }),
        VizKind::TrajectoryMap => serde_json::json!({ "order": "time" }),
        _ => Value::Null,
    };
    Some(Visualization { kind, spec })
}

// Shape heuristics for results that arrive without a mapped intent, e.g.
// from structured store queries.
fn infer_from_shape(data: &Value) -> Option<Visualization> {
    let rows = match data {
        Value::Array(rows) => rows.as_slice(),
        _ => return None,
    };
    let first = rows.first()?.as_object()?;

    let kind = if first.contains_key("latitude") && first.contains_key("longitude") {
        VizKind::TrajectoryMap
    } else if first.contains_key("pressure") || first.contains_key("depth_m") {
        VizKind::Profile
    } else if first.contains_key("profile_date") {
        VizKind::Timeseries
    } else {
        VizKind::Table
    };
    let spec = if kind == VizKind::Profile {
        serde_json::json!({ "invert_y": true })
    } else {
        Value::Null
    };
    Some(Visualization { kind, spec })
}

fn fallback_text(intent: Intent, data: &Value) -> String {
    let rows = match data {
        Value::Array(rows) => rows.len(),
        Value::Object(map) => map
            .get("results")
            .and_then(Value::as_object)
            .map(|r| r.len())
            .unwrap_or(1),
        _ => 0,
    };
    match intent {
        Intent::CountFloats => "Here is the current float count.".to_string(),
        Intent::Trajectory | Intent::MultipleTrajectories => {
            "Here are the requested float trajectories.".to_string()
        }
        Intent::CompareFloats => "Here is the side-by-side comparison.".to_string(),
        _ => format!("Retrieved {} result(s) for your query.", rows),
    }
}

fn suggestions_for(intent: Intent) -> Vec<String> {
    let suggestions: &[&str] = match intent {
        Intent::DepthProfile => &[
            "Show the salinity profile for the same float",
            "Where has this float been?",
        ],
        Intent::Trajectory | Intent::MultipleTrajectories => &[
            "Show its temperature profile",
            "Compare it with another float",
        ],
        Intent::FloatsInRegion | Intent::RegionData => &[
            "Show a temperature profile for one of these floats",
            "How many floats are there in total?",
        ],
        Intent::CompareFloats => &["Show their trajectories", "Compare salinity instead"],
        Intent::ListFloats | Intent::CountFloats => &[
            "Which floats are in the Indian Ocean?",
            "Show the trajectory of a float",
        ],
        _ => &["Show me all floats", "Which floats are near the equator?"],
    };
    suggestions.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_visualization_inverts_depth_axis() {
        let viz = describe_visualization(
            Intent::DepthProfile,
            &serde_json::json!({ "values": [1, 2] }),
        )
        .unwrap();
        assert_eq!(viz.kind, VizKind::Profile);
        assert_eq!(viz.spec["invert_y"], Value::Bool(true));
    }

    #[test]
    fn test_null_data_has_no_visualization() {
        assert!(describe_visualization(Intent::Trajectory, &Value::Null).is_none());
    }

    #[test]
    fn test_shape_inference_for_store_rows() {
        let rows = serde_json::json!([
            { "latitude": 1.0, "longitude": 2.0, "float_id": 2902296 }
        ]);
        let viz = describe_visualization(Intent::Unknown, &rows).unwrap();
        assert_eq!(viz.kind, VizKind::TrajectoryMap);
    }

    #[test]
    fn test_fallback_text_counts_rows() {
        let text = fallback_text(Intent::Unknown, &serde_json::json!([1, 2, 3]));
        assert!(text.contains('3'));
    }
}
