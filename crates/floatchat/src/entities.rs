//! Typed entity bag extracted from query text or carried in session context.
//!
//! Every entity kind is an explicit optional field; there is no string-keyed
//! map to silently grow or misspell against.

use serde::{Deserialize, Serialize};

use crate::regions::Region;

/// Measurable parameter of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Temperature,
    Salinity,
    Pressure,
    #[serde(rename = "depth_m")]
    Depth,
}

impl Parameter {
    pub const ALL: [Parameter; 4] = [
        Parameter::Temperature,
        Parameter::Salinity,
        Parameter::Pressure,
        Parameter::Depth,
    ];

    /// Column name the data store knows this parameter by.
    pub fn as_str(&self) -> &'static str {
        match self {
            Parameter::Temperature => "temperature",
            Parameter::Salinity => "salinity",
            Parameter::Pressure => "pressure",
            Parameter::Depth => "depth_m",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            Parameter::Temperature => "°C",
            Parameter::Salinity => "PSU",
            Parameter::Pressure => "dbar",
            Parameter::Depth => "m",
        }
    }

    /// Parse a parameter value, folding case/whitespace and accepting the
    /// common synonyms users and reasoner output produce.
    pub fn parse(value: &str) -> Option<Parameter> {
        match value.trim().to_lowercase().as_str() {
            "temperature" | "temp" | "heat" => Some(Parameter::Temperature),
            "salinity" | "salt" | "saltiness" => Some(Parameter::Salinity),
            "pressure" | "deep" => Some(Parameter::Pressure),
            "depth" | "depth_m" => Some(Parameter::Depth),
            _ => None,
        }
    }
}

/// One entity kind, used to declare per-tool requirement subsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    FloatId,
    FloatIds,
    Parameter,
    Region,
    Latitude,
    Longitude,
    CycleNumber,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::FloatId => "float_id",
            EntityKind::FloatIds => "float_ids",
            EntityKind::Parameter => "parameter",
            EntityKind::Region => "region",
            EntityKind::Latitude => "latitude",
            EntityKind::Longitude => "longitude",
            EntityKind::CycleNumber => "cycle_number",
        }
    }
}

/// Structured entities for one query turn. Missing kinds are `None`, never
/// absent keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub float_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub float_ids: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<Parameter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_number: Option<i64>,
}

impl Entities {
    pub fn is_empty(&self) -> bool {
        self.float_id.is_none()
            && self.float_ids.is_none()
            && self.parameter.is_none()
            && self.region.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
            && self.cycle_number.is_none()
    }

    pub fn has(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::FloatId => self.float_id.is_some(),
            EntityKind::FloatIds => {
                self.float_ids.as_ref().is_some_and(|ids| !ids.is_empty())
            }
            EntityKind::Parameter => self.parameter.is_some(),
            EntityKind::Region => self.region.is_some(),
            EntityKind::Latitude => self.latitude.is_some(),
            EntityKind::Longitude => self.longitude.is_some(),
            EntityKind::CycleNumber => self.cycle_number.is_some(),
        }
    }

    /// Merge `other` into self; present fields in `other` overwrite
    /// (last-write-wins per entity kind).
    pub fn merge_from(&mut self, other: &Entities) {
        if other.float_id.is_some() {
            self.float_id = other.float_id;
        }
        if other.float_ids.is_some() {
            self.float_ids = other.float_ids.clone();
        }
        if other.parameter.is_some() {
            self.parameter = other.parameter;
        }
        if other.region.is_some() {
            self.region = other.region;
        }
        if other.latitude.is_some() {
            self.latitude = other.latitude;
        }
        if other.longitude.is_some() {
            self.longitude = other.longitude;
        }
        if other.cycle_number.is_some() {
            self.cycle_number = other.cycle_number;
        }
    }

    /// Reference resolution: fill any kind missing from this turn with the
    /// last value stored in session context. Present fields are untouched.
    pub fn fill_missing_from(&mut self, context: &Entities) {
        if self.float_id.is_none() {
            self.float_id = context.float_id;
        }
        if self.float_ids.is_none() {
            self.float_ids = context.float_ids.clone();
        }
        if self.parameter.is_none() {
            self.parameter = context.parameter;
        }
        if self.region.is_none() {
            self.region = context.region;
        }
        if self.latitude.is_none() {
            self.latitude = context.latitude;
        }
        if self.longitude.is_none() {
            self.longitude = context.longitude;
        }
        if self.cycle_number.is_none() {
            self.cycle_number = context.cycle_number;
        }
    }
}
