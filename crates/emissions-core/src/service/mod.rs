//! Orchestration over the store: loads persisted rows, rehydrates components
//! through the factory, and shapes results for the boundary layer.
//!
//! The calculation entry points are free functions over the store traits so
//! they can run against any backend; the `*Service` structs bind them to a
//! [`Database`](crate::store::database::Database) and add the CRUD surface.

pub mod building;
pub mod component;
pub mod emission_factor;

pub use building::{calculate_building_emissions, BuildingService, ModificationComparison};
pub use component::{calculate_component_emissions, BatchOutcome, BatchRequest, ComponentService};
pub use emission_factor::{BulkImportFailure, BulkImportReport, EmissionFactorService};

use crate::errors::{EmissionsError, EmissionsResult};

/// Quantities are non-negative multipliers.
pub(crate) fn check_quantity(quantity: f64) -> EmissionsResult<()> {
    if quantity.is_finite() && quantity >= 0.0 {
        Ok(())
    } else {
        Err(EmissionsError::Validation(format!(
            "Quantity must be a non-negative number, got {quantity}"
        )))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use serde_json::Value;
    use tempfile::TempDir;

    use crate::models::{NewEmissionFactor, Parameters};
    use crate::store::database::Database;
    use crate::store::fixtures::reference_factors;

    /// Fresh on-disk database holding the reference factor table.
    pub fn seeded_database() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("emissions.db")).unwrap();
        db.init_schema().unwrap();
        for record in reference_factors() {
            db.insert_emission_factor(&NewEmissionFactor {
                name: record.name,
                category: record.category,
                emission_factor: record.emission_factor,
                unit: record.unit,
                source: None,
            })
            .unwrap();
        }
        (dir, db)
    }

    pub fn metadata(value: Value) -> Parameters {
        value.as_object().cloned().unwrap()
    }
}
