//! Tool catalog and fail-closed call validation.
//!
//! Every data access goes through a registered tool. A call naming an
//! unknown tool or carrying a parameter the tool never declared is rejected
//! before any store access happens.

pub mod exec;
pub mod store;

pub use exec::{ToolExecutor, ToolOutcome};
pub use store::{DataStore, StoreQuery};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entities::{Entities, EntityKind, Parameter};
use crate::error::ValidationError;
use crate::intent::Intent;
use crate::regions::Region;

/// Whether a tool runs once or fans out over a list of float ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    Single,
    Bulk,
}

#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    /// Declared parameter names; anything else on a call is rejected.
    pub params: &'static [&'static str],
    /// Entities that must be present before this tool may run.
    pub required: &'static [EntityKind],
    pub cardinality: Cardinality,
    pub description: &'static str,
}

/// A concrete call: tool name plus JSON parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl ToolCall {
    pub fn new(tool: &str) -> Self {
        Self {
            tool: tool.to_string(),
            params: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }
}

/// A call that passed validation, plus any enum values that were normalized
/// on the way through (e.g. "Temp" corrected to "temperature").
#[derive(Debug, Clone)]
pub struct ValidatedCall {
    pub call: ToolCall,
    pub corrections: Vec<String>,
}

const CATALOG: &[ToolSpec] = &[
    ToolSpec {
        name: "list_all_floats",
        params: &["limit", "offset"],
        required: &[],
        cardinality: Cardinality::Single,
        description: "List every known float with its latest position",
    },
    ToolSpec {
        name: "count_floats",
        params: &["region"],
        required: &[],
        cardinality: Cardinality::Single,
        description: "Count the floats in the catalog, optionally within a region",
    },
    ToolSpec {
        name: "get_float_profile",
        params: &["float_id", "cycle_number"],
        required: &[EntityKind::FloatId],
        cardinality: Cardinality::Single,
        description: "Metadata for one float (deployment, institute, project)",
    },
    ToolSpec {
        name: "get_depth_profile",
        params: &["float_id", "parameter", "cycle_number"],
        required: &[EntityKind::FloatId, EntityKind::Parameter],
        cardinality: Cardinality::Single,
        description: "Measured values against depth for one float and parameter",
    },
    ToolSpec {
        name: "get_trajectory",
        params: &["float_id"],
        required: &[EntityKind::FloatId],
        cardinality: Cardinality::Single,
        description: "Surfacing positions of one float in time order",
    },
    ToolSpec {
        name: "get_multiple_trajectories",
        params: &["float_ids"],
        required: &[EntityKind::FloatIds],
        cardinality: Cardinality::Bulk,
        description: "Trajectories for several floats at once",
    },
    ToolSpec {
        name: "get_timeseries",
        params: &["float_id", "parameter"],
        required: &[EntityKind::FloatId, EntityKind::Parameter],
        cardinality: Cardinality::Single,
        description: "Surface values of one parameter over time for one float",
    },
    ToolSpec {
        name: "get_floats_in_region",
        params: &["region"],
        required: &[EntityKind::Region],
        cardinality: Cardinality::Single,
        description: "Floats currently inside a named region",
    },
    ToolSpec {
        name: "get_region_data",
        params: &["region", "parameter"],
        required: &[EntityKind::Region],
        cardinality: Cardinality::Single,
        description: "Aggregated measurements for a named region",
    },
    ToolSpec {
        name: "search_floats_by_location",
        params: &["latitude", "longitude", "radius_km"],
        required: &[EntityKind::Latitude, EntityKind::Longitude],
        cardinality: Cardinality::Single,
        description: "Floats near a coordinate",
    },
    ToolSpec {
        name: "compare_floats",
        params: &["float_ids", "parameter"],
        required: &[EntityKind::FloatIds, EntityKind::Parameter],
        cardinality: Cardinality::Bulk,
        description: "Side-by-side profiles of one parameter across floats",
    },
];

#[derive(Debug, Default)]
pub struct ToolRegistry;

impl ToolRegistry {
    pub fn new() -> Self {
        Self
    }

    pub fn get(&self, name: &str) -> Option<&'static ToolSpec> {
        CATALOG.iter().find(|spec| spec.name == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        CATALOG.iter().map(|spec| spec.name).collect()
    }

    pub fn required_entities(&self, intent: Intent) -> &'static [EntityKind] {
        intent
            .tool_name()
            .and_then(|name| self.get(name))
            .map(|spec| spec.required)
            .unwrap_or(&[])
    }

    /// True when `entities` satisfies everything `intent`'s tool requires.
    pub fn has_required(&self, intent: Intent, entities: &Entities) -> bool {
        self.required_entities(intent)
            .iter()
            .all(|kind| entities.has(*kind))
    }

    /// Which required entities are still missing.
    pub fn missing_entities(&self, intent: Intent, entities: &Entities) -> Vec<EntityKind> {
        self.required_entities(intent)
            .iter()
            .filter(|kind| !entities.has(**kind))
            .copied()
            .collect()
    }

    /// Validate a call against the catalog. Unknown tools and undeclared
    /// parameters are hard errors; misspelled enum values are normalized
    /// when unambiguous and rejected otherwise.
    pub fn validate(&self, call: &ToolCall) -> Result<ValidatedCall, ValidationError> {
        let spec = self
            .get(&call.tool)
            .ok_or_else(|| ValidationError::UnknownTool(call.tool.clone()))?;

        let mut validated = call.clone();
        let mut corrections = Vec::new();

        for kind in spec.required {
            if !call.params.contains_key(kind.as_str()) {
                return Err(ValidationError::MissingEntity {
                    intent: call.tool.clone(),
                    entity: kind.as_str().to_string(),
                });
            }
        }

        for (key, value) in &call.params {
            if !spec.params.contains(&key.as_str()) {
                return Err(ValidationError::UndeclaredParameter {
                    tool: call.tool.clone(),
                    param: key.clone(),
                });
            }
            match key.as_str() {
                "parameter" => {
                    let raw = value.as_str().unwrap_or_default();
                    let parsed = Parameter::parse(raw).ok_or_else(|| {
                        ValidationError::InvalidEnumValue {
                            param: "parameter".to_string(),
                            value: raw.to_string(),
                            allowed: Parameter::ALL
                                .iter()
                                .map(|p| p.as_str())
                                .collect::<Vec<_>>()
                                .join(", "),
                        }
                    })?;
                    if parsed.as_str() != raw {
                        corrections.push(format!(
                            "parameter '{}' normalized to '{}'",
                            raw,
                            parsed.as_str()
                        ));
                        validated
                            .params
                            .insert(key.clone(), Value::String(parsed.as_str().to_string()));
                    }
                }
                "region" => {
                    let raw = value.as_str().unwrap_or_default();
                    let parsed =
                        Region::parse(raw).ok_or_else(|| ValidationError::InvalidEnumValue {
                            param: "region".to_string(),
                            value: raw.to_string(),
                            allowed: Region::ALL
                                .iter()
                                .map(|r| r.key())
                                .collect::<Vec<_>>()
                                .join(", "),
                        })?;
                    if parsed.key() != raw {
                        corrections.push(format!(
                            "region '{}' normalized to '{}'",
                            raw,
                            parsed.key()
                        ));
                        validated
                            .params
                            .insert(key.clone(), Value::String(parsed.key().to_string()));
                    }
                }
                _ => {}
            }
        }

        Ok(ValidatedCall {
            call: validated,
            corrections,
        })
    }

    /// Build the canonical call for an intent from resolved entities, or
    /// `None` when the intent has no tool or required entities are missing.
    pub fn call_for(&self, intent: Intent, entities: &Entities) -> Option<ToolCall> {
        let name = intent.tool_name()?;
        let spec = self.get(name)?;
        if !self.has_required(intent, entities) {
            return None;
        }

        let mut call = ToolCall::new(name);
        for param in spec.params {
            let value = match *param {
                "float_id" => entities.float_id.map(Value::from),
                "float_ids" => entities
                    .float_ids
                    .as_ref()
                    .map(|ids| Value::from(ids.clone())),
                "parameter" => entities
                    .parameter
                    .map(|p| Value::String(p.as_str().to_string())),
                "region" => entities.region.map(|r| Value::String(r.key().to_string())),
                "latitude" => entities.latitude.map(Value::from),
                "longitude" => entities.longitude.map(Value::from),
                "cycle_number" => entities.cycle_number.map(Value::from),
                _ => None,
            };
            if let Some(value) = value {
                call.params.insert(param.to_string(), value);
            }
        }
        Some(call)
    }

    /// The catalog as JSON, for embedding into reasoner prompts.
    pub fn catalog_json(&self) -> Value {
        Value::Array(
            CATALOG
                .iter()
                .map(|spec| {
                    serde_json::json!({
                        "name": spec.name,
                        "parameters": spec.params,
                        "description": spec.description,
                    })
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_tool_rejected() {
        let registry = ToolRegistry::new();
        let call = ToolCall::new("drop_tables");
        assert!(matches!(
            registry.validate(&call),
            Err(ValidationError::UnknownTool(_))
        ));
    }

    #[test]
    fn test_undeclared_parameter_rejected() {
        let registry = ToolRegistry::new();
        let call = ToolCall::new("get_trajectory")
            .with("float_id", Value::from(2902296))
            .with("verbose", Value::Bool(true));
        assert!(matches!(
            registry.validate(&call),
            Err(ValidationError::UndeclaredParameter { .. })
        ));
    }

    #[test]
    fn test_parameter_synonym_normalized() {
        let registry = ToolRegistry::new();
        let call = ToolCall::new("get_depth_profile")
            .with("float_id", Value::from(2902296))
            .with("parameter", Value::String("Temp".to_string()));
        let validated = registry.validate(&call).unwrap();
        assert_eq!(
            validated.call.params["parameter"],
            Value::String("temperature".to_string())
        );
        assert_eq!(validated.corrections.len(), 1);
    }

    #[test]
    fn test_invalid_enum_value_rejected() {
        let registry = ToolRegistry::new();
        let call = ToolCall::new("get_region_data")
            .with("region", Value::String("atlantis".to_string()));
        assert!(matches!(
            registry.validate(&call),
            Err(ValidationError::InvalidEnumValue { .. })
        ));
    }

    #[test]
    fn test_missing_required_parameter_rejected() {
        let registry = ToolRegistry::new();
        let call = ToolCall::new("get_depth_profile").with("float_id", Value::from(2902296));
        assert!(matches!(
            registry.validate(&call),
            Err(ValidationError::MissingEntity { .. })
        ));
    }

    #[test]
    fn test_call_for_requires_all_entities() {
        let registry = ToolRegistry::new();
        let partial = Entities {
            float_id: Some(2902296),
            ..Default::default()
        };
        assert!(registry.call_for(Intent::DepthProfile, &partial).is_none());

        let full = Entities {
            float_id: Some(2902296),
            parameter: Some(Parameter::Temperature),
            ..Default::default()
        };
        let call = registry.call_for(Intent::DepthProfile, &full).unwrap();
        assert_eq!(call.tool, "get_depth_profile");
        assert_eq!(call.params["float_id"], Value::from(2902296));
    }

    #[test]
    fn test_zero_arg_tools_always_buildable() {
        let registry = ToolRegistry::new();
        let call = registry
            .call_for(Intent::CountFloats, &Entities::default())
            .unwrap();
        assert_eq!(call.tool, "count_floats");
        assert!(call.params.is_empty());
    }
}
