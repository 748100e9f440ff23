//! What-if helpers: compare two totals, rank improvement scenarios, and
//! check whether a component is calculable.

use serde::{Deserialize, Serialize};

use crate::components::Component;
use crate::models::round2;
use crate::store::EmissionFactorStore;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioComparison {
    pub scenario1_emissions: f64,
    pub scenario2_emissions: f64,
    pub absolute_difference: f64,
    pub percentage_change: f64,
    /// True when the second scenario emits less.
    pub improvement: bool,
}

pub fn compare_scenarios(baseline: f64, candidate: f64) -> ScenarioComparison {
    let difference = candidate - baseline;
    let percentage_change = if baseline > 0.0 {
        difference / baseline * 100.0
    } else {
        0.0
    };
    ScenarioComparison {
        scenario1_emissions: baseline,
        scenario2_emissions: candidate,
        absolute_difference: round2(difference),
        percentage_change: round2(percentage_change),
        improvement: difference < 0.0,
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImprovementScenario {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub potential_emissions: Option<f64>,
    #[serde(default)]
    pub payback_period: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SavingsEstimate {
    pub scenario_name: String,
    pub current_emissions: f64,
    pub potential_emissions: f64,
    pub savings: f64,
    pub savings_percentage: f64,
    pub payback_period: String,
}

/// Savings for each scenario against `current_emissions`, largest first.
pub fn savings_potential(
    current_emissions: f64,
    scenarios: &[ImprovementScenario],
) -> Vec<SavingsEstimate> {
    let mut results: Vec<SavingsEstimate> = scenarios
        .iter()
        .map(|scenario| {
            let potential = scenario.potential_emissions.unwrap_or(current_emissions);
            let savings = current_emissions - potential;
            let savings_percentage = if current_emissions > 0.0 {
                savings / current_emissions * 100.0
            } else {
                0.0
            };
            SavingsEstimate {
                scenario_name: scenario
                    .name
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
                current_emissions,
                potential_emissions: potential,
                savings: round2(savings),
                savings_percentage: round2(savings_percentage),
                payback_period: scenario
                    .payback_period
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
            }
        })
        .collect();
    results.sort_by(|a, b| b.savings.total_cmp(&a.savings));
    results
}

/// Whether the component calculates cleanly at quantity 1 with a
/// non-negative result.
pub fn validate_component(component: &Component, factors: &dyn EmissionFactorStore) -> bool {
    matches!(component.calculate_emissions(1.0, factors), Ok(e) if e >= 0.0)
}
