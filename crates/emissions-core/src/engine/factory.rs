//! Rehydrates typed components from persisted metadata.

use serde::Serialize;
use serde_json::{json, Value};

use crate::components::{params, Component, EnergyComponent, MaterialComponent, WaterComponent};
use crate::errors::{EmissionsError, EmissionsResult};
use crate::models::{ComponentType, Parameters};

/// Descriptive metadata table for one component type.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ComponentTemplate {
    pub component_type: ComponentType,
    pub description: &'static str,
    pub required_metadata: &'static [&'static str],
    pub optional_metadata: &'static [&'static str],
    pub example: Value,
}

/// Stateless; every call builds a fresh component.
#[derive(Clone, Copy, Debug, Default)]
pub struct ComponentFactory;

impl ComponentFactory {
    /// Build a component from a raw type tag (case-insensitive).
    ///
    /// Tags outside energy/material/water, including the reserved
    /// `transport`, fail with `UnknownComponentType`.
    pub fn create(
        component_type: &str,
        name: &str,
        metadata: Parameters,
    ) -> EmissionsResult<Component> {
        let parsed = component_type
            .parse::<ComponentType>()
            .map_err(|_| EmissionsError::UnknownComponentType(component_type.to_string()))?;
        Self::create_typed(parsed, name, metadata)
    }

    pub fn create_typed(
        component_type: ComponentType,
        name: &str,
        metadata: Parameters,
    ) -> EmissionsResult<Component> {
        let build: fn(&str, Parameters) -> Component = match component_type {
            ComponentType::Energy => {
                |n: &str, m: Parameters| EnergyComponent::from_parameters(n, m).into()
            }
            ComponentType::Material => {
                |n: &str, m: Parameters| MaterialComponent::from_parameters(n, m).into()
            }
            ComponentType::Water => {
                |n: &str, m: Parameters| WaterComponent::from_parameters(n, m).into()
            }
            ComponentType::Transport => {
                return Err(EmissionsError::UnknownComponentType(
                    component_type.to_string(),
                ))
            }
        };
        Self::validate_metadata(component_type, &metadata)?;
        Ok(build(name, metadata))
    }

    /// Check that every required key for `component_type` is present,
    /// reporting all missing keys together.
    pub fn validate_metadata(
        component_type: ComponentType,
        metadata: &Parameters,
    ) -> EmissionsResult<()> {
        let template = Self::template_for(component_type);
        let missing = params::missing_keys(metadata, template.required_metadata);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(EmissionsError::InvalidComponentSpec {
                component_type: component_type.to_string(),
                missing,
            })
        }
    }

    pub fn template(component_type: &str) -> EmissionsResult<ComponentTemplate> {
        Ok(Self::template_for(component_type.parse()?))
    }

    pub fn template_for(component_type: ComponentType) -> ComponentTemplate {
        match component_type {
            ComponentType::Energy => ComponentTemplate {
                component_type,
                description: "Energy consumption system",
                required_metadata: crate::components::energy::REQUIRED_PARAMETERS,
                optional_metadata: &["embodied_emissions", "lifespan_years", "maintenance_factor"],
                example: json!({
                    "energy_source": "electricity",
                    "efficiency": 0.85,
                    "annual_consumption_kwh": 50000
                }),
            },
            ComponentType::Material => ComponentTemplate {
                component_type,
                description: "Building material",
                required_metadata: crate::components::material::REQUIRED_PARAMETERS,
                optional_metadata: &[
                    "density_kg_m3",
                    "volume_m3",
                    "recycling_rate",
                    "transport_distance_km",
                ],
                example: json!({
                    "material_name": "concrete",
                    "density_kg_m3": 2400,
                    "volume_m3": 100
                }),
            },
            ComponentType::Water => ComponentTemplate {
                component_type,
                description: "Water consumption system",
                required_metadata: crate::components::water::REQUIRED_PARAMETERS,
                optional_metadata: &["pumping_energy_kwh", "recycling_rate"],
                example: json!({
                    "annual_consumption_liters": 100000,
                    "water_treatment_factor": 0.8,
                    "treatment_type": "standard"
                }),
            },
            ComponentType::Transport => ComponentTemplate {
                component_type,
                description: "Transportation system (reserved, not yet calculable)",
                required_metadata: &["vehicle_type", "fuel_type", "annual_distance_km"],
                optional_metadata: &["fuel_efficiency", "load_factor"],
                example: json!({
                    "vehicle_type": "delivery_truck",
                    "fuel_type": "diesel",
                    "annual_distance_km": 20000
                }),
            },
        }
    }
}
