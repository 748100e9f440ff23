//! Emissions of water supply, treatment, and pumping.

use serde_json::Value;

use crate::components::params;
use crate::errors::EmissionsResult;
use crate::models::{round2, FactorCategory, Parameters};
use crate::store::{resolve_factor, EmissionFactorStore};

pub const REQUIRED_PARAMETERS: &[&str] = &[
    "annual_consumption_liters",
    "water_treatment_factor",
    "treatment_type",
];

/// Grid electricity used for pumping, kg CO2e per kWh.
pub const PUMPING_GRID_FACTOR: f64 = 0.5;

#[derive(Clone, Debug, PartialEq)]
pub struct WaterComponent {
    pub(crate) name: String,
    pub(crate) parameters: Parameters,
}

impl WaterComponent {
    pub fn new(
        name: impl Into<String>,
        annual_consumption_liters: f64,
        water_treatment_factor: f64,
        treatment_type: &str,
    ) -> Self {
        let mut parameters = Parameters::new();
        parameters.insert(
            "annual_consumption_liters".into(),
            Value::from(annual_consumption_liters),
        );
        parameters.insert(
            "water_treatment_factor".into(),
            Value::from(water_treatment_factor),
        );
        parameters.insert("treatment_type".into(), Value::from(treatment_type));
        Self::from_parameters(name, parameters)
    }

    pub fn from_parameters(name: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }

    /// `annual_liters * treatment_factor * factor * quantity
    ///  + pumping_kwh * 0.5 * quantity`, rounded to 2 decimals.
    pub fn calculate_emissions(
        &self,
        quantity: f64,
        factors: &dyn EmissionFactorStore,
    ) -> EmissionsResult<f64> {
        let p = &self.parameters;
        params::require(p, &self.name, REQUIRED_PARAMETERS)?;
        let annual_liters = params::required_number(p, &self.name, "annual_consumption_liters")?;
        let treatment_factor = params::required_number(p, &self.name, "water_treatment_factor")?;
        let treatment_type = params::required_text(p, &self.name, "treatment_type")?;
        let pumping = self.pumping_emissions()?;

        let factor = resolve_factor(factors, treatment_type, FactorCategory::Water)?;

        let effective_consumption = annual_liters * treatment_factor;
        let mut emissions = effective_consumption * factor * quantity;
        emissions += pumping * quantity;
        Ok(round2(emissions))
    }

    /// Pumping emissions per unit of quantity; non-positive energy adds nothing.
    pub fn pumping_emissions(&self) -> EmissionsResult<f64> {
        let pumping_kwh =
            params::optional_number(&self.parameters, &self.name, "pumping_energy_kwh")?
                .unwrap_or(0.0);
        if pumping_kwh <= 0.0 {
            return Ok(0.0);
        }
        Ok(pumping_kwh * PUMPING_GRID_FACTOR)
    }

    pub fn daily_consumption(&self) -> EmissionsResult<f64> {
        let annual =
            params::required_number(&self.parameters, &self.name, "annual_consumption_liters")?;
        Ok(annual / 365.0)
    }

    /// Liters saved per year at the given fractional improvement (e.g. 0.2).
    pub fn savings_potential(&self, efficiency_improvement: f64) -> EmissionsResult<f64> {
        let annual =
            params::required_number(&self.parameters, &self.name, "annual_consumption_liters")?;
        Ok(annual * efficiency_improvement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EmissionsError;
    use crate::store::fixtures::reference_factors;

    #[test]
    fn treatment_and_pumping() {
        let mut supply = WaterComponent::new("supply", 100_000.0, 0.8, "standard");
        supply
            .parameters
            .insert("pumping_energy_kwh".into(), Value::from(200));
        // 100000 * 0.8 * 0.0005 * 2 + 200 * 0.5 * 2 = 80 + 200
        let emissions = supply.calculate_emissions(2.0, &reference_factors()).unwrap();
        assert_eq!(emissions, 280.0);
    }

    #[test]
    fn no_pumping_by_default() {
        let supply = WaterComponent::new("supply", 50_000.0, 1.0, "advanced");
        assert_eq!(supply.pumping_emissions().unwrap(), 0.0);
        assert_eq!(
            supply.calculate_emissions(1.0, &reference_factors()).unwrap(),
            50.0
        );
    }

    #[test]
    fn missing_treatment_fields_listed_together() {
        let mut parameters = Parameters::new();
        parameters.insert("annual_consumption_liters".into(), Value::from(1000));
        let supply = WaterComponent::from_parameters("supply", parameters);
        let err = supply
            .calculate_emissions(1.0, &reference_factors())
            .unwrap_err();
        match err {
            EmissionsError::MissingParameter { keys, .. } => {
                assert_eq!(keys, vec!["water_treatment_factor", "treatment_type"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_treatment_is_factor_not_found() {
        let supply = WaterComponent::new("supply", 1000.0, 1.0, "desalination");
        let err = supply
            .calculate_emissions(1.0, &reference_factors())
            .unwrap_err();
        assert!(matches!(err, EmissionsError::FactorNotFound { .. }));
    }

    #[test]
    fn consumption_helpers() {
        let supply = WaterComponent::new("supply", 36_500.0, 1.0, "standard");
        assert_eq!(supply.daily_consumption().unwrap(), 100.0);
        assert_eq!(supply.savings_potential(0.2).unwrap(), 7300.0);
    }
}
