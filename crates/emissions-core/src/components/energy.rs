//! Operational emissions of energy systems (HVAC, lighting, generation).

use std::fmt;

use serde_json::Value;

use crate::components::params;
use crate::errors::EmissionsResult;
use crate::models::{round2, FactorCategory, Parameters};
use crate::store::{resolve_factor, EmissionFactorStore};

pub const REQUIRED_PARAMETERS: &[&str] = &["energy_source", "efficiency", "annual_consumption_kwh"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EfficiencyRating {
    High,
    Medium,
    Low,
}

impl EfficiencyRating {
    pub fn from_efficiency(efficiency: f64) -> Self {
        if efficiency >= 0.9 {
            EfficiencyRating::High
        } else if efficiency >= 0.7 {
            EfficiencyRating::Medium
        } else {
            EfficiencyRating::Low
        }
    }
}

impl fmt::Display for EfficiencyRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EfficiencyRating::High => "High Efficiency",
            EfficiencyRating::Medium => "Medium Efficiency",
            EfficiencyRating::Low => "Low Efficiency",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnergyComponent {
    pub(crate) name: String,
    pub(crate) parameters: Parameters,
}

impl EnergyComponent {
    pub fn new(
        name: impl Into<String>,
        energy_source: &str,
        efficiency: f64,
        annual_consumption_kwh: f64,
    ) -> Self {
        let mut parameters = Parameters::new();
        parameters.insert("energy_source".into(), Value::from(energy_source));
        parameters.insert("efficiency".into(), Value::from(efficiency));
        parameters.insert(
            "annual_consumption_kwh".into(),
            Value::from(annual_consumption_kwh),
        );
        Self::from_parameters(name, parameters)
    }

    pub fn from_parameters(name: impl Into<String>, parameters: Parameters) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }

    /// `(annual_kwh / efficiency) * factor * quantity + embodied * quantity`,
    /// rounded to 2 decimals.
    pub fn calculate_emissions(
        &self,
        quantity: f64,
        factors: &dyn EmissionFactorStore,
    ) -> EmissionsResult<f64> {
        let p = &self.parameters;
        params::require(p, &self.name, REQUIRED_PARAMETERS)?;
        let source = params::required_text(p, &self.name, "energy_source")?;
        let efficiency = params::required_number(p, &self.name, "efficiency")?;
        let annual_kwh = params::required_number(p, &self.name, "annual_consumption_kwh")?;
        let embodied = params::optional_number(p, &self.name, "embodied_emissions")?.unwrap_or(0.0);

        if efficiency == 0.0 {
            return Err(params::invalid(
                &self.name,
                "efficiency",
                "efficiency cannot be zero",
            ));
        }
        if efficiency < 0.0 {
            return Err(params::invalid(
                &self.name,
                "efficiency",
                "efficiency must be positive",
            ));
        }

        let factor = resolve_factor(factors, source, FactorCategory::Energy)?;

        let effective_consumption = annual_kwh / efficiency;
        let mut emissions = effective_consumption * factor * quantity;
        emissions += embodied * quantity;
        Ok(round2(emissions))
    }

    pub fn annual_energy_consumption(&self) -> EmissionsResult<f64> {
        params::required_number(&self.parameters, &self.name, "annual_consumption_kwh")
    }

    pub fn efficiency_rating(&self) -> EmissionsResult<EfficiencyRating> {
        let efficiency = params::required_number(&self.parameters, &self.name, "efficiency")?;
        Ok(EfficiencyRating::from_efficiency(efficiency))
    }
}
