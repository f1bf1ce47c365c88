//! Strict parsing of reasoner output.
//!
//! Models wrap JSON in markdown fences or add prose around it; both are
//! tolerated. What is not tolerated is a payload that fails schema
//! deserialization once isolated. That is a hard error and the caller falls
//! to the next cascade state.

use serde::de::DeserializeOwned;

use crate::error::UpstreamError;

/// Isolate and strictly deserialize a JSON object from raw completion text.
pub fn parse_payload<T: DeserializeOwned>(raw: &str) -> Result<T, UpstreamError> {
    let isolated = isolate_json(raw).ok_or_else(|| malformed(raw))?;
    serde_json::from_str(isolated).map_err(|_| malformed(raw))
}

fn malformed(raw: &str) -> UpstreamError {
    let preview: String = raw.chars().take(200).collect();
    UpstreamError::MalformedPayload(preview)
}

// Strip code fences, then take the outermost brace pair. Text before or
// after the object is discarded; text inside it is the parser's problem.
fn isolate_json(raw: &str) -> Option<&str> {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    let text = text.trim();

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoner::IntentDetection;

    #[test]
    fn test_parses_clean_json() {
        let detected: IntentDetection =
            parse_payload(r#"{"intent": "trajectory", "confidence": 0.85}"#).unwrap();
        assert_eq!(detected.intent, "trajectory");
        assert!((detected.confidence - 0.85).abs() < f32::EPSILON);
    }

    #[test]
    fn test_parses_fenced_json() {
        let raw = "```json\n{\"intent\": \"count_floats\", \"confidence\": 0.9}\n```";
        let detected: IntentDetection = parse_payload(raw).unwrap();
        assert_eq!(detected.intent, "count_floats");
    }

    #[test]
    fn test_parses_json_with_surrounding_prose() {
        let raw = "Here is my answer:\n{\"intent\": \"timeseries\"}\nHope that helps!";
        let detected: IntentDetection = parse_payload(raw).unwrap();
        assert_eq!(detected.intent, "timeseries");
        assert_eq!(detected.confidence, 0.0);
    }

    #[test]
    fn test_garbage_is_an_error_not_a_guess() {
        let result: Result<IntentDetection, _> = parse_payload("the intent is probably trajectory");
        assert!(matches!(result, Err(UpstreamError::MalformedPayload(_))));
    }

    #[test]
    fn test_missing_required_field_is_an_error() {
        let result: Result<IntentDetection, _> = parse_payload(r#"{"confidence": 0.9}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_preview_is_truncated() {
        let raw = "x".repeat(1000);
        match parse_payload::<IntentDetection>(&raw) {
            Err(UpstreamError::MalformedPayload(preview)) => {
                assert!(preview.chars().count() <= 200)
            }
            other => panic!("expected malformed payload, got {:?}", other.map(|_| ())),
        }
    }
}
