//! Intent taxonomy and the deterministic rule-based resolver.

pub mod resolver;

pub use resolver::IntentResolver;

use serde::{Deserialize, Serialize};

/// Every query lands on exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greeting,
    Farewell,
    Capabilities,
    ListFloats,
    CountFloats,
    FloatProfile,
    DepthProfile,
    Trajectory,
    MultipleTrajectories,
    Timeseries,
    FloatsInRegion,
    RegionData,
    LocationSearch,
    CompareFloats,
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::Farewell => "farewell",
            Intent::Capabilities => "capabilities",
            Intent::ListFloats => "list_floats",
            Intent::CountFloats => "count_floats",
            Intent::FloatProfile => "float_profile",
            Intent::DepthProfile => "depth_profile",
            Intent::Trajectory => "trajectory",
            Intent::MultipleTrajectories => "multiple_trajectories",
            Intent::Timeseries => "timeseries",
            Intent::FloatsInRegion => "floats_in_region",
            Intent::RegionData => "region_data",
            Intent::LocationSearch => "location_search",
            Intent::CompareFloats => "compare_floats",
            Intent::Unknown => "unknown",
        }
    }

    /// Parse an intent name. Tool names are accepted too since reasoner
    /// output uses whichever it saw in the prompt.
    pub fn parse(value: &str) -> Option<Intent> {
        match value.trim().to_lowercase().as_str() {
            "greeting" => Some(Intent::Greeting),
            "farewell" => Some(Intent::Farewell),
            "capabilities" => Some(Intent::Capabilities),
            "list_floats" | "list_all_floats" => Some(Intent::ListFloats),
            "count_floats" => Some(Intent::CountFloats),
            "float_profile" | "get_float_profile" => Some(Intent::FloatProfile),
            "depth_profile" | "get_depth_profile" => Some(Intent::DepthProfile),
            "trajectory" | "get_trajectory" => Some(Intent::Trajectory),
            "multiple_trajectories" | "get_multiple_trajectories" => {
                Some(Intent::MultipleTrajectories)
            }
            "timeseries" | "get_timeseries" => Some(Intent::Timeseries),
            "floats_in_region" | "get_floats_in_region" => Some(Intent::FloatsInRegion),
            "region_data" | "get_region_data" => Some(Intent::RegionData),
            "location_search" | "search_floats_by_location" => Some(Intent::LocationSearch),
            "compare_floats" => Some(Intent::CompareFloats),
            "unknown" => Some(Intent::Unknown),
            _ => None,
        }
    }

    pub fn is_conversational(&self) -> bool {
        matches!(
            self,
            Intent::Greeting | Intent::Farewell | Intent::Capabilities
        )
    }

    /// The registered tool this intent maps to, if any. Conversational and
    /// unknown intents never touch the data store.
    pub fn tool_name(&self) -> Option<&'static str> {
        match self {
            Intent::ListFloats => Some("list_all_floats"),
            Intent::CountFloats => Some("count_floats"),
            Intent::FloatProfile => Some("get_float_profile"),
            Intent::DepthProfile => Some("get_depth_profile"),
            Intent::Trajectory => Some("get_trajectory"),
            Intent::MultipleTrajectories => Some("get_multiple_trajectories"),
            Intent::Timeseries => Some("get_timeseries"),
            Intent::FloatsInRegion => Some("get_floats_in_region"),
            Intent::RegionData => Some("get_region_data"),
            Intent::LocationSearch => Some("search_floats_by_location"),
            Intent::CompareFloats => Some("compare_floats"),
            Intent::Greeting | Intent::Farewell | Intent::Capabilities | Intent::Unknown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_tool_names() {
        assert_eq!(Intent::parse("get_trajectory"), Some(Intent::Trajectory));
        assert_eq!(Intent::parse("trajectory"), Some(Intent::Trajectory));
        assert_eq!(Intent::parse("make_coffee"), None);
    }

    #[test]
    fn test_conversational_intents_have_no_tool() {
        assert!(Intent::Greeting.tool_name().is_none());
        assert!(Intent::Unknown.tool_name().is_none());
        assert_eq!(Intent::CompareFloats.tool_name(), Some("compare_floats"));
    }
}
