//! Typed building components and their emission formulas.
//!
//! The variant set is closed, so components are a plain enum dispatched by
//! `match`. Every variant resolves exactly one emission factor per
//! calculation and rounds the result once, at the end.

pub mod energy;
pub mod material;
pub mod params;
pub mod water;

use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;

pub use energy::{EfficiencyRating, EnergyComponent};
pub use material::MaterialComponent;
pub use water::WaterComponent;

use crate::errors::EmissionsResult;
use crate::models::{ComponentType, Parameters};
use crate::store::EmissionFactorStore;

#[derive(Clone, Debug, PartialEq)]
pub enum Component {
    Energy(EnergyComponent),
    Material(MaterialComponent),
    Water(WaterComponent),
}

impl Component {
    pub fn name(&self) -> &str {
        match self {
            Component::Energy(c) => &c.name,
            Component::Material(c) => &c.name,
            Component::Water(c) => &c.name,
        }
    }

    pub fn component_type(&self) -> ComponentType {
        match self {
            Component::Energy(_) => ComponentType::Energy,
            Component::Material(_) => ComponentType::Material,
            Component::Water(_) => ComponentType::Water,
        }
    }

    pub fn parameters(&self) -> &Parameters {
        match self {
            Component::Energy(c) => &c.parameters,
            Component::Material(c) => &c.parameters,
            Component::Water(c) => &c.parameters,
        }
    }

    fn parameters_mut(&mut self) -> &mut Parameters {
        match self {
            Component::Energy(c) => &mut c.parameters,
            Component::Material(c) => &mut c.parameters,
            Component::Water(c) => &mut c.parameters,
        }
    }

    pub fn get_parameter(&self, key: &str) -> Option<&Value> {
        self.parameters().get(key)
    }

    /// Shallow merge; keys in `overrides` win.
    pub fn update_parameters(&mut self, overrides: &Parameters) {
        let parameters = self.parameters_mut();
        for (key, value) in overrides {
            parameters.insert(key.clone(), value.clone());
        }
    }

    pub fn calculate_emissions(
        &self,
        quantity: f64,
        factors: &dyn EmissionFactorStore,
    ) -> EmissionsResult<f64> {
        match self {
            Component::Energy(c) => c.calculate_emissions(quantity, factors),
            Component::Material(c) => c.calculate_emissions(quantity, factors),
            Component::Water(c) => c.calculate_emissions(quantity, factors),
        }
    }
}

impl From<EnergyComponent> for Component {
    fn from(c: EnergyComponent) -> Self {
        Component::Energy(c)
    }
}

impl From<MaterialComponent> for Component {
    fn from(c: MaterialComponent) -> Self {
        Component::Material(c)
    }
}

impl From<WaterComponent> for Component {
    fn from(c: WaterComponent) -> Self {
        Component::Water(c)
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Component::Energy(_) => "Energy",
            Component::Material(_) => "Material",
            Component::Water(_) => "Water",
        };
        write!(f, "{kind}Component({})", self.name())
    }
}

impl Serialize for Component {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Component", 3)?;
        state.serialize_field("name", self.name())?;
        state.serialize_field("component_type", &self.component_type())?;
        state.serialize_field("parameters", self.parameters())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures::reference_factors;
    use serde_json::json;

    #[test]
    fn dispatches_by_variant() {
        let factors = reference_factors();
        let hvac: Component = EnergyComponent::new("hvac", "electricity", 0.5, 1000.0).into();
        let slab: Component = MaterialComponent::new("slab", "concrete")
            .with_volume(2400.0, 10.0)
            .into();
        assert_eq!(hvac.calculate_emissions(2.0, &factors).unwrap(), 2000.0);
        assert_eq!(slab.calculate_emissions(1.0, &factors).unwrap(), 2880.0);
        assert_eq!(hvac.component_type(), ComponentType::Energy);
        assert_eq!(slab.component_type(), ComponentType::Material);
    }

    #[test]
    fn update_parameters_overrides_and_adds() {
        let mut hvac: Component = EnergyComponent::new("hvac", "electricity", 0.5, 1000.0).into();
        let overrides = json!({"efficiency": 0.9, "embodied_emissions": 10})
            .as_object()
            .cloned()
            .unwrap();
        hvac.update_parameters(&overrides);
        assert_eq!(hvac.get_parameter("efficiency"), Some(&json!(0.9)));
        assert_eq!(hvac.get_parameter("energy_source"), Some(&json!("electricity")));
        assert_eq!(hvac.get_parameter("embodied_emissions"), Some(&json!(10)));
    }

    #[test]
    fn display_and_serialize() {
        let supply: Component = WaterComponent::new("supply", 10.0, 1.0, "standard").into();
        assert_eq!(supply.to_string(), "WaterComponent(supply)");
        let value = serde_json::to_value(&supply).unwrap();
        assert_eq!(value["name"], "supply");
        assert_eq!(value["component_type"], "water");
        assert_eq!(value["parameters"]["treatment_type"], "standard");
    }
}
