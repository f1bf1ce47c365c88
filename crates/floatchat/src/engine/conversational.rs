//! Fixed responses for greetings, farewells and capability questions. No
//! store or reasoner involvement.

use chrono::Utc;
use serde_json::Value;

use crate::intent::Intent;
use crate::types::{ProcessingSource, ResponseEnvelope};

pub fn respond(intent: Intent, session_id: &str) -> Option<ResponseEnvelope> {
    let (text, suggestions) = match intent {
        Intent::Greeting => (
            "Hello! I can help you explore ARGO ocean float data. Ask me about \
             float profiles, trajectories, or measurements in a region.",
            vec![
                "Show me all active floats",
                "Temperature profile of float 2902296",
                "Which floats are in the Arabian Sea?",
            ],
        ),
        Intent::Farewell => (
            "Goodbye! Come back any time you want to look at float data.",
            vec![],
        ),
        Intent::Capabilities => (
            "I can list and count ARGO floats, plot temperature, salinity, \
             pressure and depth profiles, show float trajectories and \
             timeseries, find floats in a named region or near a coordinate, \
             and compare measurements across floats.",
            vec![
                "How many floats are there?",
                "Compare salinity of floats 2902296 and 2901456",
                "Floats near latitude 10 longitude 65",
            ],
        ),
        _ => return None,
    };

    Some(ResponseEnvelope {
        text: text.to_string(),
        visualization: None,
        data: Value::Null,
        suggestions: suggestions.into_iter().map(String::from).collect(),
        processing_source: ProcessingSource::Conversational,
        intent: intent.as_str().to_string(),
        confidence: 1.0,
        session_id: session_id.to_string(),
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversational_intents_answered_at_full_confidence() {
        let envelope = respond(Intent::Greeting, "s1").unwrap();
        assert_eq!(envelope.confidence, 1.0);
        assert_eq!(envelope.processing_source, ProcessingSource::Conversational);
        assert!(envelope.data.is_null());
    }

    #[test]
    fn test_data_intents_are_not_shortcut() {
        assert!(respond(Intent::Trajectory, "s1").is_none());
        assert!(respond(Intent::Unknown, "s1").is_none());
    }
}
