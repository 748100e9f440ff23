//! Building CRUD and the building-level emissions calculation.

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::engine::scenario::{compare_scenarios, ScenarioComparison};
use crate::engine::{Building, ComponentFactory, FactorCache};
use crate::errors::{EmissionsError, EmissionsResult};
use crate::models::{
    BuildingComponent, BuildingComponentLink, BuildingEmissions, BuildingRecord,
    BuildingWithComponents, ComponentRecord, Modifications,
};
use crate::service::check_quantity;
use crate::store::database::Database;
use crate::store::{BuildingStore, EmissionFactorStore};

/// Load a building, rehydrate its components, apply `modifications`, and
/// aggregate.
///
/// A missing building or a component row the factory rejects fails the whole
/// request; per-component formula failures are recorded in the breakdown.
/// Factor lookups are memoised for the duration of this call only.
pub fn calculate_building_emissions(
    buildings: &dyn BuildingStore,
    factors: &(dyn EmissionFactorStore + Sync),
    building_id: i64,
    modifications: &Modifications,
) -> EmissionsResult<BuildingEmissions> {
    debug!("Calculating emissions for building {}", building_id);

    let record = buildings
        .get_with_components(building_id)?
        .ok_or_else(|| EmissionsError::not_found("Building", building_id))?;

    let mut building = Building::new(record.building.name, record.building.location);
    for row in record.components {
        let component = ComponentFactory::create(
            &row.component.component_type,
            &row.component.name,
            row.component.metadata,
        )?;
        building.add_component(component, row.quantity);
    }
    let component_count = building.component_count();

    if !modifications.is_empty() {
        building.apply_modifications(modifications);
    }

    let cache = FactorCache::new(factors);
    let (total_emissions, breakdown) = building.calculate_total_emissions(&cache);
    debug!(
        "Building {}: {} components, total {} ({} distinct factors)",
        building_id,
        component_count,
        total_emissions,
        cache.len()
    );

    Ok(BuildingEmissions {
        total_emissions,
        breakdown,
        building_id,
        component_count,
        modifications_applied: modifications.clone(),
    })
}

/// A baseline run and a modified run of the same building.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModificationComparison {
    pub baseline: BuildingEmissions,
    pub modified: BuildingEmissions,
    pub comparison: ScenarioComparison,
}

#[derive(Clone, Debug)]
pub struct BuildingService {
    db: Database,
}

impl BuildingService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    fn ensure_component(&self, component_id: i64) -> EmissionsResult<ComponentRecord> {
        self.db
            .get_component(component_id)?
            .ok_or_else(|| EmissionsError::not_found("Component", component_id))
    }

    fn ensure_building(&self, building_id: i64) -> EmissionsResult<BuildingRecord> {
        self.db
            .get_building(building_id)?
            .ok_or_else(|| EmissionsError::not_found("Building", building_id))
    }

    /// Create a building and attach `links`. Every referenced component must
    /// exist and component names must be unique within the building; nothing
    /// is written otherwise.
    pub fn create_building(
        &self,
        name: &str,
        location: Option<&str>,
        links: &[BuildingComponentLink],
    ) -> EmissionsResult<BuildingRecord> {
        if name.trim().is_empty() {
            return Err(EmissionsError::Validation(
                "Building name must not be empty".to_string(),
            ));
        }
        let mut names: IndexMap<String, i64> = IndexMap::new();
        for link in links {
            check_quantity(link.quantity)?;
            let component = self.ensure_component(link.component_id)?;
            match names.get(&component.name) {
                Some(&id) if id != link.component_id => {
                    return Err(duplicate_name(&component.name, name));
                }
                _ => {
                    names.insert(component.name, link.component_id);
                }
            }
        }
        let building = self.db.insert_building(name, location, links)?;
        debug!(
            "Created building {} '{}' with {} components",
            building.id,
            building.name,
            links.len()
        );
        Ok(building)
    }

    pub fn list_buildings(&self) -> EmissionsResult<Vec<BuildingRecord>> {
        self.db.list_buildings()
    }

    pub fn buildings_by_name(&self, name: &str) -> EmissionsResult<Vec<BuildingRecord>> {
        self.db.buildings_by_name(name)
    }

    pub fn get_building(&self, building_id: i64) -> EmissionsResult<BuildingRecord> {
        self.ensure_building(building_id)
    }

    pub fn get_with_components(&self, building_id: i64) -> EmissionsResult<BuildingWithComponents> {
        self.db
            .get_building_with_components(building_id)?
            .ok_or_else(|| EmissionsError::not_found("Building", building_id))
    }

    /// Attach a component, or overwrite its quantity if already attached.
    /// Fails with `Validation` when a different component with the same name
    /// is already attached.
    pub fn add_component_to_building(
        &self,
        building_id: i64,
        component_id: i64,
        quantity: f64,
    ) -> EmissionsResult<BuildingComponent> {
        check_quantity(quantity)?;
        let building = self.get_with_components(building_id)?;
        let component = self.ensure_component(component_id)?;
        if building
            .components
            .iter()
            .any(|row| row.component.id != component_id && row.component.name == component.name)
        {
            return Err(duplicate_name(&component.name, &building.building.name));
        }
        self.db
            .upsert_building_component(building_id, component_id, quantity)?;
        debug!(
            "Attached component {} to building {} (quantity {})",
            component_id, building_id, quantity
        );
        self.link(building_id, component_id)
    }

    pub fn update_component_quantity(
        &self,
        building_id: i64,
        component_id: i64,
        quantity: f64,
    ) -> EmissionsResult<BuildingComponent> {
        check_quantity(quantity)?;
        if !self
            .db
            .update_building_component_quantity(building_id, component_id, quantity)?
        {
            return Err(link_not_found(building_id, component_id));
        }
        self.link(building_id, component_id)
    }

    /// Detach a component. Returns false when it was not attached.
    pub fn remove_component_from_building(
        &self,
        building_id: i64,
        component_id: i64,
    ) -> EmissionsResult<bool> {
        self.ensure_building(building_id)?;
        self.db.remove_building_component(building_id, component_id)
    }

    fn link(&self, building_id: i64, component_id: i64) -> EmissionsResult<BuildingComponent> {
        self.db
            .get_building_component(building_id, component_id)?
            .ok_or_else(|| link_not_found(building_id, component_id))
    }

    pub fn calculate_building_emissions(
        &self,
        building_id: i64,
        modifications: &Modifications,
    ) -> EmissionsResult<BuildingEmissions> {
        calculate_building_emissions(&self.db, &self.db, building_id, modifications)
    }

    /// Run the building as stored and again with `modifications`, and compare
    /// the totals.
    pub fn compare_building_modifications(
        &self,
        building_id: i64,
        modifications: &Modifications,
    ) -> EmissionsResult<ModificationComparison> {
        let baseline = self.calculate_building_emissions(building_id, &Modifications::new())?;
        let modified = self.calculate_building_emissions(building_id, modifications)?;
        let comparison = compare_scenarios(baseline.total_emissions, modified.total_emissions);
        Ok(ModificationComparison {
            baseline,
            modified,
            comparison,
        })
    }
}

fn duplicate_name(component_name: &str, building_name: &str) -> EmissionsError {
    EmissionsError::Validation(format!(
        "Component name '{component_name}' is already used in building {building_name}"
    ))
}

fn link_not_found(building_id: i64, component_id: i64) -> EmissionsError {
    EmissionsError::not_found(
        "Building component",
        format!("{component_id} in building {building_id}"),
    )
}
