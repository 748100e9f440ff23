//! Digital-twin building aggregate: components with quantities, request-scoped
//! modifications, and the total/breakdown calculation.

use serde::Serialize;
use tracing::warn;

use crate::components::Component;
use crate::models::{round2, Breakdown, BreakdownEntry, ComponentType, Modifications};
use crate::store::EmissionFactorStore;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BuildingSummary {
    pub name: String,
    pub location: Option<String>,
    pub component_count: usize,
    pub modifications: Modifications,
}

#[derive(Clone, Debug, Default)]
pub struct Building {
    name: String,
    location: Option<String>,
    components: Vec<(Component, f64)>,
    modifications: Modifications,
}

impl Building {
    pub fn new(name: impl Into<String>, location: Option<String>) -> Self {
        Self {
            name: name.into(),
            location,
            components: Vec::new(),
            modifications: Modifications::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn components(&self) -> &[(Component, f64)] {
        &self.components
    }

    pub fn modifications(&self) -> &Modifications {
        &self.modifications
    }

    pub fn add_component(&mut self, component: Component, quantity: f64) {
        self.components.push((component, quantity));
    }

    /// Remove the first component with this name. Returns whether one was
    /// removed.
    pub fn remove_component(&mut self, component_name: &str) -> bool {
        match self
            .components
            .iter()
            .position(|(c, _)| c.name() == component_name)
        {
            Some(index) => {
                self.components.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn components_by_type(&self, component_type: ComponentType) -> Vec<&(Component, f64)> {
        self.components
            .iter()
            .filter(|(c, _)| c.component_type() == component_type)
            .collect()
    }

    /// Merge each component's overrides (keyed by component name) into its
    /// parameters in place. No type checking happens here; a bad override
    /// surfaces when the component is calculated.
    pub fn apply_modifications(&mut self, modifications: &Modifications) {
        self.modifications = modifications.clone();
        for (component, _) in &mut self.components {
            if let Some(overrides) = modifications.get(component.name()) {
                if !overrides.is_empty() {
                    component.update_parameters(overrides);
                }
            }
        }
    }

    /// Total emissions (rounded to 2 decimals) and a per-component breakdown
    /// in insertion order.
    ///
    /// A failing component is recorded with zero emissions and an `error`
    /// message and does not abort the rest. Percentages use the unrounded
    /// total as denominator and are only assigned when that total is
    /// positive. A component whose name is already in the breakdown is not
    /// counted; it is recorded under `"name (2)"` with an error.
    pub fn calculate_total_emissions(&self, factors: &dyn EmissionFactorStore) -> (f64, Breakdown) {
        let mut total_emissions = 0.0;
        let mut breakdown = Breakdown::new();

        for (component, quantity) in &self.components {
            if breakdown.contains_key(component.name()) {
                warn!(
                    "Duplicate component name {} in building {}; not counted",
                    component.name(),
                    self.name
                );
                let key = duplicate_key(&breakdown, component.name());
                breakdown.insert(
                    key,
                    BreakdownEntry {
                        emissions: 0.0,
                        quantity: *quantity,
                        component_type: component.component_type(),
                        percentage: None,
                        error: Some(format!(
                            "Duplicate component name '{}' in building {}",
                            component.name(),
                            self.name
                        )),
                    },
                );
                continue;
            }

            let entry = match component.calculate_emissions(*quantity, factors) {
                Ok(emissions) => {
                    total_emissions += emissions;
                    BreakdownEntry {
                        emissions,
                        quantity: *quantity,
                        component_type: component.component_type(),
                        percentage: Some(0.0),
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(
                        "Error calculating emissions for {} in building {}: {}",
                        component.name(),
                        self.name,
                        e
                    );
                    BreakdownEntry {
                        emissions: 0.0,
                        quantity: *quantity,
                        component_type: component.component_type(),
                        percentage: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            breakdown.insert(component.name().to_string(), entry);
        }

        if total_emissions > 0.0 {
            for entry in breakdown.values_mut() {
                if !entry.is_error() && entry.emissions > 0.0 {
                    entry.percentage = Some(round2(entry.emissions / total_emissions * 100.0));
                }
            }
        }

        (round2(total_emissions), breakdown)
    }

    pub fn summary(&self) -> BuildingSummary {
        BuildingSummary {
            name: self.name.clone(),
            location: self.location.clone(),
            component_count: self.component_count(),
            modifications: self.modifications.clone(),
        }
    }
}

/// First free `"name (n)"` key, n >= 2.
fn duplicate_key(breakdown: &Breakdown, name: &str) -> String {
    (2..)
        .map(|n| format!("{name} ({n})"))
        .find(|key| !breakdown.contains_key(key))
        .unwrap_or_else(|| name.to_string())
}

impl std::fmt::Display for Building {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Building('{}', {} components)", self.name, self.component_count())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::components::{EnergyComponent, MaterialComponent, WaterComponent};
    use crate::models::Parameters;
    use crate::store::fixtures::reference_factors;

    fn overrides(value: serde_json::Value) -> Parameters {
        value.as_object().cloned().unwrap()
    }

    fn office() -> Building {
        let mut building = Building::new("Office", Some("Oslo".to_string()));
        // 2000
        building.add_component(
            EnergyComponent::new("hvac", "electricity", 0.5, 1000.0).into(),
            2.0,
        );
        // 2880
        building.add_component(
            MaterialComponent::new("slab", "concrete")
                .with_volume(2400.0, 10.0)
                .into(),
            1.0,
        );
        // 120
        building.add_component(
            WaterComponent::new("supply", 100_000.0, 0.8, "standard").into(),
            3.0,
        );
        building
    }

    #[test]
    fn total_and_breakdown_in_insertion_order() {
        let (total, breakdown) = office().calculate_total_emissions(&reference_factors());
        assert_eq!(total, 5000.0);
        let names: Vec<&str> = breakdown.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["hvac", "slab", "supply"]);

        assert_eq!(breakdown["hvac"].emissions, 2000.0);
        assert_eq!(breakdown["hvac"].percentage, Some(40.0));
        assert_eq!(breakdown["slab"].percentage, Some(57.6));
        assert_eq!(breakdown["supply"].percentage, Some(2.4));
        assert_eq!(breakdown["supply"].component_type, ComponentType::Water);
    }

    #[test]
    fn failed_component_is_recorded_and_skipped() {
        let mut building = office();
        building.add_component(MaterialComponent::new("cladding", "unobtainium").into(), 5.0);

        let (total, breakdown) = building.calculate_total_emissions(&reference_factors());
        assert_eq!(total, 5000.0);

        let failed = &breakdown["cladding"];
        assert_eq!(failed.emissions, 0.0);
        assert_eq!(failed.quantity, 5.0);
        assert_eq!(failed.percentage, None);
        assert!(failed.error.as_deref().unwrap().contains("unobtainium"));

        let pct_sum: f64 = breakdown.values().filter_map(|e| e.percentage).sum();
        assert!(pct_sum <= 100.0 + 1e-9);
    }

    #[test]
    fn zero_total_assigns_no_percentages() {
        let mut building = Building::new("Shed", None);
        building.add_component(MaterialComponent::new("beams", "steel").into(), 0.0);
        building.add_component(EnergyComponent::new("gen", "fusion", 0.9, 1.0).into(), 1.0);

        let (total, breakdown) = building.calculate_total_emissions(&reference_factors());
        assert_eq!(total, 0.0);
        assert!(breakdown
            .values()
            .all(|e| e.percentage.unwrap_or(0.0) == 0.0));
    }

    #[test]
    fn empty_building() {
        let (total, breakdown) = Building::new("Empty", None).calculate_total_emissions(&reference_factors());
        assert_eq!(total, 0.0);
        assert!(breakdown.is_empty());
    }

    #[test]
    fn calculation_is_idempotent() {
        let building = office();
        let factors = reference_factors();
        assert_eq!(
            building.calculate_total_emissions(&factors),
            building.calculate_total_emissions(&factors)
        );
    }

    #[test]
    fn modifications_override_matching_components_only() {
        let mut building = office();
        let mut mods = Modifications::new();
        mods.insert("hvac".to_string(), overrides(json!({"efficiency": 1.0})));
        mods.insert("nonexistent".to_string(), overrides(json!({"efficiency": 0.1})));
        building.apply_modifications(&mods);

        let (total, breakdown) = building.calculate_total_emissions(&reference_factors());
        // hvac: 1000 / 1.0 * 0.5 * 2 = 1000
        assert_eq!(breakdown["hvac"].emissions, 1000.0);
        assert_eq!(breakdown["slab"].emissions, 2880.0);
        assert_eq!(total, 4000.0);
        assert_eq!(building.modifications().len(), 2);
    }

    #[test]
    fn nulling_a_required_key_surfaces_as_missing_parameter() {
        let mut building = office();
        let mut mods = Modifications::new();
        mods.insert("supply".to_string(), overrides(json!({"treatment_type": null})));
        building.apply_modifications(&mods);

        let (total, breakdown) = building.calculate_total_emissions(&reference_factors());
        assert_eq!(total, 4880.0);
        assert!(breakdown["supply"]
            .error
            .as_deref()
            .unwrap()
            .contains("treatment_type"));
    }

    #[test]
    fn duplicate_names_keep_breakdown_and_total_in_step() {
        let mut building = Building::new("Dup", None);
        building.add_component(EnergyComponent::new("hvac", "electricity", 0.5, 1000.0).into(), 1.0);
        building.add_component(EnergyComponent::new("hvac", "electricity", 1.0, 1000.0).into(), 1.0);

        let (total, breakdown) = building.calculate_total_emissions(&reference_factors());
        assert_eq!(total, 1000.0);
        assert_eq!(breakdown.len(), 2);
        assert_eq!(breakdown["hvac"].emissions, 1000.0);
        assert_eq!(breakdown["hvac"].percentage, Some(100.0));

        let duplicate = &breakdown["hvac (2)"];
        assert_eq!(duplicate.emissions, 0.0);
        assert_eq!(duplicate.percentage, None);
        assert!(duplicate.error.as_deref().unwrap().contains("Duplicate component name 'hvac'"));
    }

    #[test]
    fn remove_and_filter_components() {
        let mut building = office();
        assert_eq!(building.components_by_type(ComponentType::Material).len(), 1);
        assert!(building.remove_component("slab"));
        assert!(!building.remove_component("slab"));
        assert_eq!(building.component_count(), 2);
        assert!(building.components_by_type(ComponentType::Material).is_empty());
        assert_eq!(building.to_string(), "Building('Office', 2 components)");

        let summary = building.summary();
        assert_eq!(summary.location.as_deref(), Some("Oslo"));
        assert_eq!(summary.component_count, 2);
    }
}
