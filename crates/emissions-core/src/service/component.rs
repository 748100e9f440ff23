//! Component definitions: CRUD, search, templates, and single / batch
//! emissions calculation.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::{ComponentFactory, ComponentTemplate, FactorCache};
use crate::errors::{EmissionsError, EmissionsResult};
use crate::models::{ComponentEmissions, ComponentRecord, ComponentType, Parameters, EMISSIONS_UNIT};
use crate::service::check_quantity;
use crate::store::database::Database;
use crate::store::{ComponentStore, EmissionFactorStore};

/// Calculate one stored component at `quantity`.
///
/// Every failure is fatal here: a missing component is `NotFound`, and
/// factory, parameter, and factor errors are returned as-is.
pub fn calculate_component_emissions(
    components: &dyn ComponentStore,
    factors: &dyn EmissionFactorStore,
    component_id: i64,
    quantity: f64,
) -> EmissionsResult<ComponentEmissions> {
    check_quantity(quantity)?;
    let record = components
        .get_by_id(component_id)?
        .ok_or_else(|| EmissionsError::not_found("Component", component_id))?;

    let component =
        ComponentFactory::create(&record.component_type, &record.name, record.metadata)?;
    let emissions = component.calculate_emissions(quantity, factors)?;

    Ok(ComponentEmissions {
        component_id,
        component_name: record.name,
        component_type: record.component_type,
        quantity,
        emissions,
        unit: EMISSIONS_UNIT.to_string(),
    })
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub component_id: i64,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
}

fn default_quantity() -> f64 {
    1.0
}

/// Outcome of one batch item: exactly one of `result` / `error` is set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub component_id: i64,
    pub quantity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ComponentEmissions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ComponentService {
    db: Database,
    batch_workers: usize,
}

impl ComponentService {
    pub fn new(db: Database, batch_workers: usize) -> Self {
        Self {
            db,
            batch_workers: batch_workers.max(1),
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Persist a component definition after checking the type tag and that
    /// every required metadata key for it is present.
    pub fn create_component(
        &self,
        name: &str,
        component_type: &str,
        metadata: Parameters,
    ) -> EmissionsResult<ComponentRecord> {
        if name.trim().is_empty() {
            return Err(EmissionsError::Validation(
                "Component name must not be empty".to_string(),
            ));
        }
        let component_type: ComponentType = component_type.parse()?;
        ComponentFactory::validate_metadata(component_type, &metadata)?;

        let record = self.db.insert_component(name, component_type, &metadata)?;
        debug!(
            "Created {} component {} '{}'",
            component_type, record.id, record.name
        );
        Ok(record)
    }

    pub fn get_component(&self, component_id: i64) -> EmissionsResult<ComponentRecord> {
        self.db
            .get_component(component_id)?
            .ok_or_else(|| EmissionsError::not_found("Component", component_id))
    }

    pub fn list_components(&self) -> EmissionsResult<Vec<ComponentRecord>> {
        self.db.list_components()
    }

    pub fn components_by_type(&self, component_type: &str) -> EmissionsResult<Vec<ComponentRecord>> {
        self.db.components_by_type(component_type.parse()?)
    }

    /// Rename and/or patch metadata. The patch is shallow-merged over the
    /// stored metadata; keys it does not mention are kept.
    pub fn update_component(
        &self,
        component_id: i64,
        name: Option<&str>,
        metadata_patch: &Parameters,
    ) -> EmissionsResult<ComponentRecord> {
        let existing = self.get_component(component_id)?;
        let mut metadata = existing.metadata;
        for (key, value) in metadata_patch {
            metadata.insert(key.clone(), value.clone());
        }
        self.db
            .update_component(component_id, name, &metadata)?
            .ok_or_else(|| EmissionsError::not_found("Component", component_id))
    }

    pub fn delete_component(&self, component_id: i64) -> EmissionsResult<bool> {
        let deleted = self.db.delete_component(component_id)?;
        if deleted {
            debug!("Deleted component {}", component_id);
        }
        Ok(deleted)
    }

    /// Case-insensitive substring match on the name or the serialized
    /// metadata, optionally restricted to one type.
    pub fn search_components(
        &self,
        query: &str,
        component_type: Option<ComponentType>,
    ) -> EmissionsResult<Vec<ComponentRecord>> {
        let needle = query.to_lowercase();
        let mut matches = Vec::new();
        for record in self.db.list_components()? {
            if let Some(wanted) = component_type {
                if !record.component_type.eq_ignore_ascii_case(wanted.as_str()) {
                    continue;
                }
            }
            if record.name.to_lowercase().contains(&needle) {
                matches.push(record);
                continue;
            }
            let metadata = serde_json::to_string(&record.metadata)?.to_lowercase();
            if metadata.contains(&needle) {
                matches.push(record);
            }
        }
        Ok(matches)
    }

    pub fn get_component_template(&self, component_type: &str) -> EmissionsResult<ComponentTemplate> {
        ComponentFactory::template(component_type)
    }

    pub fn calculate_component_emissions(
        &self,
        component_id: i64,
        quantity: f64,
    ) -> EmissionsResult<ComponentEmissions> {
        debug!(
            "Calculating emissions for component {} (quantity {})",
            component_id, quantity
        );
        calculate_component_emissions(&self.db, &self.db, component_id, quantity)
    }

    /// Calculate many components in parallel. Output order matches
    /// `requests`; one failing item does not affect the others.
    pub fn calculate_batch(&self, requests: &[BatchRequest]) -> Vec<BatchOutcome> {
        if requests.is_empty() {
            return vec![];
        }

        let factors = FactorCache::new(&self.db);
        let run = |request: &BatchRequest| {
            match calculate_component_emissions(
                &self.db,
                &factors,
                request.component_id,
                request.quantity,
            ) {
                Ok(result) => BatchOutcome {
                    component_id: request.component_id,
                    quantity: request.quantity,
                    result: Some(result),
                    error: None,
                },
                Err(e) => BatchOutcome {
                    component_id: request.component_id,
                    quantity: request.quantity,
                    result: None,
                    error: Some(e.to_string()),
                },
            }
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.batch_workers)
            .build();

        let outcomes: Vec<BatchOutcome> = match pool {
            Ok(pool) => pool.install(|| requests.par_iter().map(&run).collect()),
            Err(e) => {
                warn!("Batch worker pool unavailable, running sequentially: {}", e);
                requests.iter().map(&run).collect()
            }
        };

        let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
        info!(
            "Batch calculation: {} requests, {} failed",
            outcomes.len(),
            failed
        );
        outcomes
    }
}
