//! Shared typed models used across the component, engine, store, and service
//! layers.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::EmissionsError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Unit attached to every emissions figure the engine reports.
pub const EMISSIONS_UNIT: &str = "kg CO2e";

/// Free-form component parameters, persisted verbatim as component metadata.
pub type Parameters = serde_json::Map<String, Value>;

/// Per-component parameter overrides keyed by component name.
pub type Modifications = IndexMap<String, Parameters>;

/// Per-component breakdown keyed by component name, in insertion order.
pub type Breakdown = IndexMap<String, BreakdownEntry>;

/// Round half away from zero to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Type tags
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    Energy,
    Material,
    Water,
    /// Reserved: has a template but no formula.
    Transport,
}

impl ComponentType {
    pub const ALL: [ComponentType; 4] = [
        ComponentType::Energy,
        ComponentType::Material,
        ComponentType::Water,
        ComponentType::Transport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::Energy => "energy",
            ComponentType::Material => "material",
            ComponentType::Water => "water",
            ComponentType::Transport => "transport",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentType {
    type Err = EmissionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "energy" => Ok(ComponentType::Energy),
            "material" => Ok(ComponentType::Material),
            "water" => Ok(ComponentType::Water),
            "transport" => Ok(ComponentType::Transport),
            _ => Err(EmissionsError::UnknownComponentType(s.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorCategory {
    Material,
    Energy,
    Water,
    Transport,
}

impl FactorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactorCategory::Material => "material",
            FactorCategory::Energy => "energy",
            FactorCategory::Water => "water",
            FactorCategory::Transport => "transport",
        }
    }
}

impl fmt::Display for FactorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FactorCategory {
    type Err = EmissionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "material" => Ok(FactorCategory::Material),
            "energy" => Ok(FactorCategory::Energy),
            "water" => Ok(FactorCategory::Water),
            "transport" => Ok(FactorCategory::Transport),
            other => Err(EmissionsError::Validation(format!(
                "Unknown emission factor category: {other}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Persisted records
// ---------------------------------------------------------------------------

/// A row of the emission factor table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmissionFactorRecord {
    pub id: i64,
    pub name: String,
    pub category: FactorCategory,
    pub emission_factor: f64,
    pub unit: String,
    pub source: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Payload for creating an emission factor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewEmissionFactor {
    pub name: String,
    pub category: FactorCategory,
    pub emission_factor: f64,
    pub unit: String,
    #[serde(default)]
    pub source: Option<String>,
}

/// Partial update for an emission factor; `None` leaves a column untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EmissionFactorUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<FactorCategory>,
    #[serde(default)]
    pub emission_factor: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// A persisted component definition. `component_type` is kept as the raw
/// stored tag; the factory decides whether it is usable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub id: i64,
    pub name: String,
    pub component_type: String,
    pub metadata: Parameters,
    pub created_at: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildingRecord {
    pub id: i64,
    pub name: String,
    pub location: Option<String>,
    pub created_at: String,
}

/// A component reference plus the quantity it is attached with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildingComponentLink {
    pub component_id: i64,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
}

fn default_quantity() -> f64 {
    1.0
}

/// A joined component row with the quantity from the link table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildingComponent {
    pub component: ComponentRecord,
    pub quantity: f64,
}

/// A building together with its joined components, in link insertion order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildingWithComponents {
    #[serde(flatten)]
    pub building: BuildingRecord,
    pub components: Vec<BuildingComponent>,
}

// ---------------------------------------------------------------------------
// Calculation results
// ---------------------------------------------------------------------------

/// One component's share of a building total.
///
/// Successful entries carry `percentage`; failed entries carry `error` and
/// report zero emissions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BreakdownEntry {
    pub emissions: f64,
    pub quantity: f64,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BreakdownEntry {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BuildingEmissions {
    pub total_emissions: f64,
    pub breakdown: Breakdown,
    pub building_id: i64,
    pub component_count: usize,
    pub modifications_applied: Modifications,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentEmissions {
    pub component_id: i64,
    pub component_name: String,
    pub component_type: String,
    pub quantity: f64,
    pub emissions: f64,
    pub unit: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_type_parses_case_insensitively() {
        assert_eq!("Energy".parse::<ComponentType>().unwrap(), ComponentType::Energy);
        assert_eq!(" WATER ".parse::<ComponentType>().unwrap(), ComponentType::Water);
        let err = "plasma".parse::<ComponentType>().unwrap_err();
        assert!(matches!(err, EmissionsError::UnknownComponentType(ref t) if t == "plasma"));
    }

    #[test]
    fn round2_rounds_half_away_from_zero() {
        assert_eq!(round2(2.346), 2.35);
        assert_eq!(round2(-3.456), -3.46);
        assert_eq!(round2(0.125 * 4.0), 0.5);
        assert_eq!(round2(2880.0), 2880.0);
    }

    #[test]
    fn breakdown_entry_serializes_type_and_skips_absent_fields() {
        let entry = BreakdownEntry {
            emissions: 0.0,
            quantity: 2.0,
            component_type: ComponentType::Material,
            percentage: None,
            error: Some("boom".to_string()),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "material");
        assert_eq!(value["error"], "boom");
        assert!(value.get("percentage").is_none());
    }

    #[test]
    fn link_quantity_defaults_to_one() {
        let link: BuildingComponentLink =
            serde_json::from_str(r#"{"component_id": 7}"#).unwrap();
        assert_eq!(link.quantity, 1.0);
    }
}
