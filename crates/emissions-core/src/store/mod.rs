//! Persistence seams consumed by the calculation engine, plus the SQLite
//! implementation behind them.

pub mod database;
pub mod schema;

use crate::errors::{EmissionsError, EmissionsResult};
use crate::models::{
    BuildingWithComponents, ComponentRecord, EmissionFactorRecord, FactorCategory,
};

/// Keyed table of `(name, category) -> factor`.
///
/// `lookup` returns every matching record; callers decide what 0 or many
/// matches mean (see [`resolve_factor`]).
pub trait EmissionFactorStore {
    fn lookup(
        &self,
        name: &str,
        category: FactorCategory,
    ) -> EmissionsResult<Vec<EmissionFactorRecord>>;
}

pub trait ComponentStore {
    fn get_by_id(&self, component_id: i64) -> EmissionsResult<Option<ComponentRecord>>;
}

pub trait BuildingStore {
    fn get_with_components(
        &self,
        building_id: i64,
    ) -> EmissionsResult<Option<BuildingWithComponents>>;
}

/// Resolve exactly one emission factor value for `(name, category)`.
///
/// Zero matches is `FactorNotFound`, more than one is `AmbiguousFactor`.
pub fn resolve_factor<S>(store: &S, name: &str, category: FactorCategory) -> EmissionsResult<f64>
where
    S: EmissionFactorStore + ?Sized,
{
    let matches = store.lookup(name, category)?;
    match matches.as_slice() {
        [record] => Ok(record.emission_factor),
        [] => Err(EmissionsError::FactorNotFound {
            name: name.to_string(),
            category: category.to_string(),
        }),
        many => Err(EmissionsError::AmbiguousFactor {
            name: name.to_string(),
            category: category.to_string(),
            count: many.len(),
        }),
    }
}

/// In-memory factor tables (fixtures, benchmarks, snapshots).
impl EmissionFactorStore for [EmissionFactorRecord] {
    fn lookup(
        &self,
        name: &str,
        category: FactorCategory,
    ) -> EmissionsResult<Vec<EmissionFactorRecord>> {
        Ok(self
            .iter()
            .filter(|record| record.name == name && record.category == category)
            .cloned()
            .collect())
    }
}

impl EmissionFactorStore for Vec<EmissionFactorRecord> {
    fn lookup(
        &self,
        name: &str,
        category: FactorCategory,
    ) -> EmissionsResult<Vec<EmissionFactorRecord>> {
        self.as_slice().lookup(name, category)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::models::{EmissionFactorRecord, FactorCategory};

    pub fn factor(name: &str, category: FactorCategory, value: f64) -> EmissionFactorRecord {
        EmissionFactorRecord {
            id: 0,
            name: name.to_string(),
            category,
            emission_factor: value,
            unit: "kg CO2e/unit".to_string(),
            source: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    /// Baseline factor table shared by component and engine tests.
    pub fn reference_factors() -> Vec<EmissionFactorRecord> {
        vec![
            factor("electricity", FactorCategory::Energy, 0.5),
            factor("natural_gas", FactorCategory::Energy, 0.2),
            factor("solar", FactorCategory::Energy, 0.05),
            factor("concrete", FactorCategory::Material, 0.12),
            factor("steel", FactorCategory::Material, 1.85),
            factor("wood", FactorCategory::Material, 0.45),
            factor("standard", FactorCategory::Water, 0.0005),
            factor("advanced", FactorCategory::Water, 0.001),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{factor, reference_factors};
    use super::*;

    #[test]
    fn resolve_single_match() {
        let factors = reference_factors();
        let value = resolve_factor(&factors, "steel", FactorCategory::Material).unwrap();
        assert_eq!(value, 1.85);
    }

    #[test]
    fn resolve_matches_on_category_too() {
        let factors = reference_factors();
        let err = resolve_factor(&factors, "steel", FactorCategory::Energy).unwrap_err();
        assert!(matches!(err, EmissionsError::FactorNotFound { .. }));
        assert_eq!(
            err.to_string(),
            "No emission factor found for 'steel' in category energy"
        );
    }

    #[test]
    fn resolve_refuses_to_pick_between_duplicates() {
        let mut factors = reference_factors();
        factors.push(factor("steel", FactorCategory::Material, 2.0));
        let err = resolve_factor(&factors, "steel", FactorCategory::Material).unwrap_err();
        assert!(matches!(err, EmissionsError::AmbiguousFactor { count: 2, .. }));
    }
}
