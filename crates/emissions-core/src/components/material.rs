//! Embodied emissions of building materials (concrete, steel, glass, …).

use serde_json::Value;

use crate::components::params;
use crate::errors::EmissionsResult;
use crate::models::{round2, FactorCategory, Parameters};
use crate::store::{resolve_factor, EmissionFactorStore};

pub const REQUIRED_PARAMETERS: &[&str] = &["material_name"];

/// Truck transport, kg CO2e per kg-km.
pub const TRANSPORT_FACTOR: f64 = 0.0001;

#[derive(Clone, Debug, PartialEq)]
pub struct MaterialComponent {
    pub(crate) name: String,
    pub(crate) parameters: Parameters,
}

impl MaterialComponent {
    pub fn new(name: impl Into<String>, material_name: &str) -> Self {
        let mut parameters = Parameters::new();
        parameters.insert("material_name".into(), Value::from(material_name));
        Self::from_parameters(name, parameters)
    }

    pub fn from_parameters(name: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }

    pub fn with_volume(mut self, density_kg_m3: f64, volume_m3: f64) -> Self {
        self.parameters
            .insert("density_kg_m3".into(), Value::from(density_kg_m3));
        self.parameters
            .insert("volume_m3".into(), Value::from(volume_m3));
        self
    }

    /// Embodied emissions for this material.
    ///
    /// With both `density_kg_m3` and `volume_m3` set and nonzero, the base term
    /// is `volume * density * factor` and `quantity` does not scale it;
    /// otherwise `quantity` is taken as kilograms. `quantity` always scales the
    /// transport term. A `recycling_rate` above 100 is rejected.
    pub fn calculate_emissions(
        &self,
        quantity: f64,
        factors: &dyn EmissionFactorStore,
    ) -> EmissionsResult<f64> {
        let p = &self.parameters;
        params::require(p, &self.name, REQUIRED_PARAMETERS)?;
        let material = params::required_text(p, &self.name, "material_name")?;
        let density = params::optional_number(p, &self.name, "density_kg_m3")?;
        let volume = params::optional_number(p, &self.name, "volume_m3")?;
        let recycling_rate = params::optional_number(p, &self.name, "recycling_rate")?.unwrap_or(0.0);
        if recycling_rate > 100.0 {
            return Err(params::invalid(
                &self.name,
                "recycling_rate",
                "recycling_rate cannot exceed 100",
            ));
        }
        let transport = self.transport_emissions(quantity)?;

        let factor = resolve_factor(factors, material, FactorCategory::Material)?;

        let mut emissions = match (density, volume) {
            (Some(density), Some(volume)) if density != 0.0 && volume != 0.0 => {
                let mass_kg = volume * density;
                mass_kg * factor
            }
            _ => quantity * factor,
        };

        if recycling_rate > 0.0 {
            emissions *= 1.0 - recycling_rate / 100.0;
        }

        emissions += transport;
        Ok(round2(emissions))
    }

    /// `quantity * transport_distance_km * 0.0001`, or 0 when no positive
    /// distance is set.
    pub fn transport_emissions(&self, quantity: f64) -> EmissionsResult<f64> {
        let distance_km =
            params::optional_number(&self.parameters, &self.name, "transport_distance_km")?
                .unwrap_or(0.0);
        if distance_km <= 0.0 {
            return Ok(0.0);
        }
        Ok(quantity * distance_km * TRANSPORT_FACTOR)
    }

    pub fn material_density(&self) -> EmissionsResult<f64> {
        Ok(
            params::optional_number(&self.parameters, &self.name, "density_kg_m3")?
                .unwrap_or(0.0),
        )
    }

    pub fn volume_from_mass(&self, mass_kg: f64) -> EmissionsResult<f64> {
        let density = self.material_density()?;
        if density > 0.0 {
            Ok(mass_kg / density)
        } else {
            Ok(0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EmissionsError;
    use crate::store::fixtures::reference_factors;

    fn set(component: &mut MaterialComponent, key: &str, value: Value) {
        component.parameters.insert(key.to_string(), value);
    }

    #[test]
    fn concrete_scenario_ignores_quantity_in_base_term() {
        let slab = MaterialComponent::new("slab", "concrete").with_volume(2400.0, 10.0);
        let factors = reference_factors();
        assert_eq!(slab.calculate_emissions(1.0, &factors).unwrap(), 2880.0);
        assert_eq!(slab.calculate_emissions(7.0, &factors).unwrap(), 2880.0);
    }

    #[test]
    fn quantity_is_mass_without_volume() {
        let beams = MaterialComponent::new("beams", "steel");
        // 1000 kg * 1.85
        assert_eq!(
            beams.calculate_emissions(1000.0, &reference_factors()).unwrap(),
            1850.0
        );
    }

    #[test]
    fn zero_volume_falls_back_to_quantity() {
        let beams = MaterialComponent::new("beams", "steel").with_volume(7850.0, 0.0);
        assert_eq!(
            beams.calculate_emissions(10.0, &reference_factors()).unwrap(),
            18.5
        );
    }

    #[test]
    fn recycling_rate_reduces_pre_transport_term() {
        let factors = reference_factors();
        let mut beams = MaterialComponent::new("beams", "steel");
        set(&mut beams, "recycling_rate", Value::from(0));
        assert_eq!(beams.calculate_emissions(100.0, &factors).unwrap(), 185.0);

        set(&mut beams, "recycling_rate", Value::Null);
        assert_eq!(beams.calculate_emissions(100.0, &factors).unwrap(), 185.0);

        set(&mut beams, "recycling_rate", Value::from(50));
        assert_eq!(beams.calculate_emissions(100.0, &factors).unwrap(), 92.5);
    }

    #[test]
    fn recycling_rate_above_100_is_invalid() {
        let mut beams = MaterialComponent::new("beams", "steel");
        set(&mut beams, "recycling_rate", Value::from(100));
        assert_eq!(beams.calculate_emissions(100.0, &reference_factors()).unwrap(), 0.0);

        set(&mut beams, "recycling_rate", Value::from(150));
        let err = beams
            .calculate_emissions(100.0, &reference_factors())
            .unwrap_err();
        assert!(
            matches!(err, EmissionsError::InvalidParameter { ref key, .. } if key == "recycling_rate")
        );
    }

    #[test]
    fn density_without_volume_uses_quantity_as_mass() {
        let mut beams = MaterialComponent::new("beams", "steel");
        set(&mut beams, "density_kg_m3", Value::from(7850));
        // 10 kg * 1.85
        assert_eq!(
            beams.calculate_emissions(10.0, &reference_factors()).unwrap(),
            18.5
        );
    }

    #[test]
    fn transport_scales_with_quantity_even_with_volume() {
        let mut slab = MaterialComponent::new("slab", "concrete").with_volume(2400.0, 10.0);
        set(&mut slab, "transport_distance_km", Value::from(100));
        // 2880 + 2 * 100 * 0.0001
        assert_eq!(
            slab.calculate_emissions(2.0, &reference_factors()).unwrap(),
            2880.02
        );
    }

    #[test]
    fn non_positive_distance_adds_nothing() {
        let mut beams = MaterialComponent::new("beams", "steel");
        set(&mut beams, "transport_distance_km", Value::from(-50));
        assert_eq!(beams.transport_emissions(10.0).unwrap(), 0.0);
        set(&mut beams, "transport_distance_km", Value::from(0));
        assert_eq!(beams.transport_emissions(10.0).unwrap(), 0.0);
    }

    #[test]
    fn missing_material_name() {
        let blank = MaterialComponent::from_parameters("blank", Parameters::new());
        let err = blank
            .calculate_emissions(1.0, &reference_factors())
            .unwrap_err();
        assert!(matches!(err, EmissionsError::MissingParameter { ref keys, .. } if keys == &["material_name"]));
    }

    #[test]
    fn density_helpers() {
        let slab = MaterialComponent::new("slab", "concrete").with_volume(2400.0, 10.0);
        assert_eq!(slab.material_density().unwrap(), 2400.0);
        assert_eq!(slab.volume_from_mass(4800.0).unwrap(), 2.0);

        let beams = MaterialComponent::new("beams", "steel");
        assert_eq!(beams.material_density().unwrap(), 0.0);
        assert_eq!(beams.volume_from_mass(100.0).unwrap(), 0.0);
    }
}
