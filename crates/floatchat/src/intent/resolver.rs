//! Deterministic keyword rules plus regex entity extraction. No I/O, no
//! randomness; the same text always resolves the same way.

use std::sync::LazyLock;

use regex::Regex;

use crate::entities::{Entities, Parameter};
use crate::intent::Intent;
use crate::regions::Region;

static FLOAT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{5,8})\b").expect("float id regex"));
static LATITUDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"latitude\s*([-+]?\d*\.?\d+)").expect("latitude regex"));
static LONGITUDE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"longitude\s*([-+]?\d*\.?\d+)").expect("longitude regex"));
static CYCLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"cycle\s*(\d+)").expect("cycle regex"));

/// Ordered rule table; the first matching row wins. More specific phrasings
/// sit above the generic ones they would otherwise be shadowed by.
const RULES: &[(Intent, &[&str])] = &[
    (Intent::Greeting, &["hello", "hi", "hey", "good morning"]),
    (Intent::Farewell, &["bye", "goodbye", "see you", "farewell"]),
    (
        Intent::Capabilities,
        &["what can you do", "help", "capabilities", "features"],
    ),
    (
        Intent::CountFloats,
        &[
            "how many floats",
            "count floats",
            "number of floats",
            "total floats",
        ],
    ),
    (
        Intent::CompareFloats,
        &["compare", "comparison", "vs", "versus", "difference"],
    ),
    (
        Intent::MultipleTrajectories,
        &["trajectories", "locations of", "paths"],
    ),
    (
        Intent::Trajectory,
        &["path", "trajectory", "track", "route", "where did"],
    ),
    (
        Intent::Timeseries,
        &["timeseries", "time series", "over time", "temporal"],
    ),
    (
        Intent::FloatsInRegion,
        &["floats in", "which floats are in"],
    ),
    (Intent::RegionData, &["region", "area", "basin"]),
    (
        Intent::LocationSearch,
        &["near", "close to", "around", "latitude", "longitude"],
    ),
    (
        Intent::ListFloats,
        &[
            "show floats",
            "list floats",
            "all floats",
            "available floats",
            "which floats",
        ],
    ),
    (
        Intent::FloatProfile,
        &["metadata", "info", "details", "about float"],
    ),
    (
        Intent::DepthProfile,
        &["profile", "temperature", "salinity", "pressure", "depth"],
    ),
];

/// Single-word keywords match on word boundaries so "hi" does not fire
/// inside "this"; multiword phrases match as substrings.
fn keyword_matches(lowered: &str, keyword: &str) -> bool {
    if keyword.contains(' ') {
        return lowered.contains(keyword);
    }
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word == keyword)
}

#[derive(Debug, Default)]
pub struct IntentResolver;

impl IntentResolver {
    pub fn new() -> Self {
        Self
    }

    /// Classify the query and extract whatever entities its text carries.
    /// Entities are extracted even when the intent stays `Unknown`; later
    /// cascade states reuse them.
    pub fn resolve(&self, text: &str) -> (Intent, Entities) {
        let lowered = text.to_lowercase();

        let intent = RULES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| keyword_matches(&lowered, k)))
            .map(|(intent, _)| *intent)
            .unwrap_or(Intent::Unknown);

        let entities = self.extract_entities(&lowered, intent);
        (intent, entities)
    }

    fn extract_entities(&self, lowered: &str, intent: Intent) -> Entities {
        let mut entities = Entities::default();

        let ids: Vec<i64> = FLOAT_ID_RE
            .captures_iter(lowered)
            .filter_map(|c| c[1].parse().ok())
            .collect();
        if !ids.is_empty() {
            if intent == Intent::CompareFloats || intent == Intent::MultipleTrajectories {
                entities.float_ids = Some(ids);
            } else {
                entities.float_id = Some(ids[0]);
                if ids.len() > 1 {
                    entities.float_ids = Some(ids);
                }
            }
        }

        if let Some(c) = LATITUDE_RE.captures(lowered) {
            entities.latitude = c[1].parse().ok();
        }
        if let Some(c) = LONGITUDE_RE.captures(lowered) {
            entities.longitude = c[1].parse().ok();
        }
        if let Some(c) = CYCLE_RE.captures(lowered) {
            entities.cycle_number = c[1].parse().ok();
        }

        for family in [
            ("temperature", &["temperature", "temp"][..]),
            ("salinity", &["salinity", "salt"]),
            ("pressure", &["pressure"]),
            ("depth", &["depth"]),
        ] {
            if family.1.iter().any(|k| keyword_matches(lowered, k)) {
                entities.parameter = Parameter::parse(family.0);
                break;
            }
        }

        entities.region = Region::find_in_text(lowered);

        entities
    }
}
