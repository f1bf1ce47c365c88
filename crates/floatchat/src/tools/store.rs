//! Data store abstraction and the constrained structured query shape.
//!
//! The store never sees raw text. It executes either a validated tool call
//! or a `StoreQuery` checked against a fixed table/column schema with a
//! mandatory row limit.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, ValidationError};
use crate::tools::ToolCall;

#[async_trait]
pub trait DataStore: Send + Sync {
    /// Execute one validated single-cardinality tool call.
    async fn fetch(&self, call: &ToolCall) -> Result<Value, EngineError>;

    /// Execute a validated structured query, returning at most `limit` rows.
    async fn query(&self, q: &StoreQuery) -> Result<Vec<Value>, EngineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreTable {
    Measurements,
    Profiles,
    FloatMetadata,
}

impl StoreTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreTable::Measurements => "measurements",
            StoreTable::Profiles => "profiles",
            StoreTable::FloatMetadata => "float_metadata",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreFilter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

/// A structured query the reasoner may emit instead of raw query text.
/// Tables, columns and operators are closed sets; free-form expressions
/// cannot be represented.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreQuery {
    pub table: StoreTable,
    pub columns: Vec<String>,
    #[serde(default)]
    pub filters: Vec<StoreFilter>,
    #[serde(default)]
    pub limit: Option<u64>,
}

pub fn schema_columns(table: StoreTable) -> &'static [&'static str] {
    match table {
        StoreTable::Measurements => &[
            "float_id",
            "cycle_number",
            "n_level",
            "pressure",
            "depth_m",
            "temperature",
            "salinity",
        ],
        StoreTable::Profiles => &[
            "float_id",
            "cycle_number",
            "profile_date",
            "latitude",
            "longitude",
            "direction",
            "max_depth",
            "n_levels",
        ],
        StoreTable::FloatMetadata => &[
            "platform_number",
            "float_serial_number",
            "launch_date",
            "launch_latitude",
            "launch_longitude",
            "pi_name",
            "project_name",
            "operating_institute",
            "start_date",
            "end_of_life",
            "firmware_version",
            "deployment_platform",
            "float_owner",
        ],
    }
}

impl StoreQuery {
    /// Check every referenced column against the schema and clamp the row
    /// limit to `max_rows`. An absent limit becomes `max_rows`.
    pub fn validate(&mut self, max_rows: u64) -> Result<(), ValidationError> {
        let allowed = schema_columns(self.table);

        if self.columns.is_empty() {
            return Err(ValidationError::InvalidStoreQuery(
                "query selects no columns".to_string(),
            ));
        }
        for column in &self.columns {
            if !allowed.contains(&column.as_str()) {
                return Err(ValidationError::InvalidStoreQuery(format!(
                    "unknown column '{}' on table '{}'",
                    column,
                    self.table.as_str()
                )));
            }
        }
        for filter in &self.filters {
            if !allowed.contains(&filter.column.as_str()) {
                return Err(ValidationError::InvalidStoreQuery(format!(
                    "unknown filter column '{}' on table '{}'",
                    filter.column,
                    self.table.as_str()
                )));
            }
        }

        self.limit = Some(self.limit.map_or(max_rows, |l| l.min(max_rows)));
        Ok(())
    }
}

/// The store schema as JSON, for embedding into reasoner prompts.
pub fn schema_json() -> Value {
    serde_json::json!({
        "tables": {
            "measurements": schema_columns(StoreTable::Measurements),
            "profiles": schema_columns(StoreTable::Profiles),
            "float_metadata": schema_columns(StoreTable::FloatMetadata),
        },
        "operators": ["eq", "ne", "lt", "le", "gt", "ge"],
    })
}
