//! Emission factor maintenance.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{EmissionsError, EmissionsResult};
use crate::models::{EmissionFactorRecord, EmissionFactorUpdate, FactorCategory, NewEmissionFactor};
use crate::store::database::Database;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BulkImportFailure {
    pub factor: NewEmissionFactor,
    pub error: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkImportReport {
    pub total_processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<BulkImportFailure>,
}

fn check_factor_value(value: f64) -> EmissionsResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(EmissionsError::Validation(format!(
            "Emission factor must be non-negative, got {value}"
        )))
    }
}

#[derive(Clone, Debug)]
pub struct EmissionFactorService {
    db: Database,
}

impl EmissionFactorService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn create_emission_factor(
        &self,
        factor: &NewEmissionFactor,
    ) -> EmissionsResult<EmissionFactorRecord> {
        check_factor_value(factor.emission_factor)?;
        if factor.name.trim().is_empty() {
            return Err(EmissionsError::Validation(
                "Emission factor name must not be empty".to_string(),
            ));
        }
        let record = self.db.insert_emission_factor(factor)?;
        debug!(
            "Created emission factor {} ({}/{})",
            record.id, record.category, record.name
        );
        Ok(record)
    }

    pub fn get_emission_factor(&self, factor_id: i64) -> EmissionsResult<EmissionFactorRecord> {
        self.db
            .get_emission_factor(factor_id)?
            .ok_or_else(|| EmissionsError::not_found("Emission factor", factor_id))
    }

    pub fn list_emission_factors(&self) -> EmissionsResult<Vec<EmissionFactorRecord>> {
        self.db.list_emission_factors()
    }

    pub fn emission_factors_by_category(
        &self,
        category: FactorCategory,
    ) -> EmissionsResult<Vec<EmissionFactorRecord>> {
        self.db.emission_factors_by_category(category)
    }

    pub fn emission_factors_by_name_and_category(
        &self,
        name: &str,
        category: FactorCategory,
    ) -> EmissionsResult<Vec<EmissionFactorRecord>> {
        self.db.emission_factors_by_name_and_category(name, category)
    }

    pub fn update_emission_factor(
        &self,
        factor_id: i64,
        update: &EmissionFactorUpdate,
    ) -> EmissionsResult<EmissionFactorRecord> {
        self.get_emission_factor(factor_id)?;
        if let Some(value) = update.emission_factor {
            check_factor_value(value)?;
        }
        self.db
            .update_emission_factor(factor_id, update)?
            .ok_or_else(|| EmissionsError::not_found("Emission factor", factor_id))
    }

    pub fn delete_emission_factor(&self, factor_id: i64) -> EmissionsResult<()> {
        if !self.db.delete_emission_factor(factor_id)? {
            return Err(EmissionsError::not_found("Emission factor", factor_id));
        }
        debug!("Deleted emission factor {}", factor_id);
        Ok(())
    }

    /// Create each factor independently; failures are collected, not raised.
    pub fn bulk_import(&self, factors: &[NewEmissionFactor]) -> BulkImportReport {
        let mut report = BulkImportReport {
            total_processed: factors.len(),
            ..Default::default()
        };
        for factor in factors {
            match self.create_emission_factor(factor) {
                Ok(_) => report.successful += 1,
                Err(e) => {
                    report.failed += 1;
                    report.errors.push(BulkImportFailure {
                        factor: factor.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        info!(
            "Bulk import: {} processed, {} successful, {} failed",
            report.total_processed, report.successful, report.failed
        );
        report
    }
}
