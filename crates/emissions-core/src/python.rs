//! PyO3 boundary. Payloads cross as plain dicts/lists, converted through the
//! Python `json` module on one side and serde on the other.

use std::path::PathBuf;

use pyo3::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::engine::ComponentFactory;
use crate::errors::EmissionsError;
use crate::models::{
    BuildingComponentLink, ComponentType, EmissionFactorUpdate, FactorCategory, Modifications,
    NewEmissionFactor, Parameters,
};
use crate::service::{BatchRequest, BuildingService, ComponentService, EmissionFactorService};
use crate::store::database::Database;

fn to_py<T: Serialize>(py: Python<'_>, value: &T) -> PyResult<PyObject> {
    let text = serde_json::to_string(value).map_err(EmissionsError::from)?;
    let json_module = py.import("json")?;
    Ok(json_module.call_method1("loads", (text,))?.unbind())
}

fn from_py<T: DeserializeOwned>(value: &Bound<'_, PyAny>) -> PyResult<T> {
    let json_module = value.py().import("json")?;
    let text: String = json_module.call_method1("dumps", (value,))?.extract()?;
    Ok(serde_json::from_str(&text).map_err(EmissionsError::from)?)
}

/// `None` and Python `None` both mean "not given".
fn from_py_opt<T: DeserializeOwned>(value: Option<&Bound<'_, PyAny>>) -> PyResult<Option<T>> {
    match value {
        Some(v) if !v.is_none() => Ok(Some(from_py(v)?)),
        _ => Ok(None),
    }
}

/// Template for a component type, as a dict.
#[pyfunction]
pub fn component_template(py: Python<'_>, component_type: &str) -> PyResult<PyObject> {
    let template = ComponentFactory::template(component_type)?;
    to_py(py, &template)
}

#[pyclass]
pub struct EmissionsEngine {
    buildings: BuildingService,
    components: ComponentService,
    factors: EmissionFactorService,
}

#[pymethods]
impl EmissionsEngine {
    /// Open (and migrate) the database. Without `db_path` the location comes
    /// from `EMISSIONS_DB_PATH`.
    #[new]
    #[pyo3(signature = (db_path=None, batch_workers=None))]
    fn new(db_path: Option<PathBuf>, batch_workers: Option<usize>) -> PyResult<Self> {
        let mut config = match db_path {
            Some(path) => EngineConfig::new(path),
            None => EngineConfig::from_env(),
        };
        if let Some(workers) = batch_workers {
            config = config.with_batch_workers(workers);
        }

        let db = Database::from_config(&config)?;
        db.init_schema()?;
        Ok(Self {
            buildings: BuildingService::new(db.clone()),
            components: ComponentService::new(db.clone(), config.batch_workers),
            factors: EmissionFactorService::new(db),
        })
    }

    #[getter]
    fn db_path(&self) -> String {
        self.buildings.db().db_path().to_string_lossy().into_owned()
    }

    // -----------------------------------------------------------------------
    // Calculations
    // -----------------------------------------------------------------------

    #[pyo3(signature = (building_id, modifications=None))]
    fn calculate_building_emissions(
        &self,
        py: Python<'_>,
        building_id: i64,
        modifications: Option<&Bound<'_, PyAny>>,
    ) -> PyResult<PyObject> {
        let mods: Modifications = from_py_opt(modifications)?.unwrap_or_default();
        let result =
            py.allow_threads(|| self.buildings.calculate_building_emissions(building_id, &mods))?;
        to_py(py, &result)
    }

    fn compare_building_modifications(
        &self,
        py: Python<'_>,
        building_id: i64,
        modifications: &Bound<'_, PyAny>,
    ) -> PyResult<PyObject> {
        let mods: Modifications = from_py(modifications)?;
        let result = py.allow_threads(|| {
            self.buildings
                .compare_building_modifications(building_id, &mods)
        })?;
        to_py(py, &result)
    }

    #[pyo3(signature = (component_id, quantity=1.0))]
    fn calculate_component_emissions(
        &self,
        py: Python<'_>,
        component_id: i64,
        quantity: f64,
    ) -> PyResult<PyObject> {
        let result = py.allow_threads(|| {
            self.components
                .calculate_component_emissions(component_id, quantity)
        })?;
        to_py(py, &result)
    }

    /// `requests` is a list of `{"component_id": int, "quantity": float}`.
    fn calculate_batch(&self, py: Python<'_>, requests: &Bound<'_, PyAny>) -> PyResult<PyObject> {
        let requests: Vec<BatchRequest> = from_py(requests)?;
        let outcomes = py.allow_threads(|| self.components.calculate_batch(&requests));
        to_py(py, &outcomes)
    }

    // -----------------------------------------------------------------------
    // Components
    // -----------------------------------------------------------------------

    fn create_component(
        &self,
        py: Python<'_>,
        name: &str,
        component_type: &str,
        metadata: &Bound<'_, PyAny>,
    ) -> PyResult<PyObject> {
        let metadata: Parameters = from_py(metadata)?;
        let record = self
            .components
            .create_component(name, component_type, metadata)?;
        to_py(py, &record)
    }

    fn get_component(&self, py: Python<'_>, component_id: i64) -> PyResult<PyObject> {
        to_py(py, &self.components.get_component(component_id)?)
    }

    #[pyo3(signature = (component_type=None))]
    fn list_components(&self, py: Python<'_>, component_type: Option<&str>) -> PyResult<PyObject> {
        let records = match component_type {
            Some(t) => self.components.components_by_type(t)?,
            None => self.components.list_components()?,
        };
        to_py(py, &records)
    }

    #[pyo3(signature = (query, component_type=None))]
    fn search_components(
        &self,
        py: Python<'_>,
        query: &str,
        component_type: Option<&str>,
    ) -> PyResult<PyObject> {
        let component_type = component_type
            .map(str::parse::<ComponentType>)
            .transpose()?;
        to_py(py, &self.components.search_components(query, component_type)?)
    }

    #[pyo3(signature = (component_id, name=None, metadata=None))]
    fn update_component(
        &self,
        py: Python<'_>,
        component_id: i64,
        name: Option<&str>,
        metadata: Option<&Bound<'_, PyAny>>,
    ) -> PyResult<PyObject> {
        let patch: Parameters = from_py_opt(metadata)?.unwrap_or_default();
        let record = self.components.update_component(component_id, name, &patch)?;
        to_py(py, &record)
    }

    fn delete_component(&self, component_id: i64) -> PyResult<bool> {
        Ok(self.components.delete_component(component_id)?)
    }

    fn get_component_template(&self, py: Python<'_>, component_type: &str) -> PyResult<PyObject> {
        to_py(py, &self.components.get_component_template(component_type)?)
    }

    // -----------------------------------------------------------------------
    // Buildings
    // -----------------------------------------------------------------------

    /// `components` is a list of `{"component_id": int, "quantity": float}`.
    #[pyo3(signature = (name, location=None, components=None))]
    fn create_building(
        &self,
        py: Python<'_>,
        name: &str,
        location: Option<&str>,
        components: Option<&Bound<'_, PyAny>>,
    ) -> PyResult<PyObject> {
        let links: Vec<BuildingComponentLink> = from_py_opt(components)?.unwrap_or_default();
        let building = self.buildings.create_building(name, location, &links)?;
        to_py(py, &building)
    }

    /// The building with its components and quantities.
    fn get_building(&self, py: Python<'_>, building_id: i64) -> PyResult<PyObject> {
        to_py(py, &self.buildings.get_with_components(building_id)?)
    }

    #[pyo3(signature = (name=None))]
    fn list_buildings(&self, py: Python<'_>, name: Option<&str>) -> PyResult<PyObject> {
        let buildings = match name {
            Some(n) => self.buildings.buildings_by_name(n)?,
            None => self.buildings.list_buildings()?,
        };
        to_py(py, &buildings)
    }

    #[pyo3(signature = (building_id, component_id, quantity=1.0))]
    fn add_component_to_building(
        &self,
        py: Python<'_>,
        building_id: i64,
        component_id: i64,
        quantity: f64,
    ) -> PyResult<PyObject> {
        let link = self
            .buildings
            .add_component_to_building(building_id, component_id, quantity)?;
        to_py(py, &link)
    }

    fn update_component_quantity(
        &self,
        py: Python<'_>,
        building_id: i64,
        component_id: i64,
        quantity: f64,
    ) -> PyResult<PyObject> {
        let link = self
            .buildings
            .update_component_quantity(building_id, component_id, quantity)?;
        to_py(py, &link)
    }

    fn remove_component_from_building(&self, building_id: i64, component_id: i64) -> PyResult<bool> {
        Ok(self
            .buildings
            .remove_component_from_building(building_id, component_id)?)
    }

    // -----------------------------------------------------------------------
    // Emission factors
    // -----------------------------------------------------------------------

    fn create_emission_factor(&self, py: Python<'_>, factor: &Bound<'_, PyAny>) -> PyResult<PyObject> {
        let factor: NewEmissionFactor = from_py(factor)?;
        to_py(py, &self.factors.create_emission_factor(&factor)?)
    }

    fn get_emission_factor(&self, py: Python<'_>, factor_id: i64) -> PyResult<PyObject> {
        to_py(py, &self.factors.get_emission_factor(factor_id)?)
    }

    #[pyo3(signature = (category=None, name=None))]
    fn list_emission_factors(
        &self,
        py: Python<'_>,
        category: Option<&str>,
        name: Option<&str>,
    ) -> PyResult<PyObject> {
        let category = category.map(str::parse::<FactorCategory>).transpose()?;
        let records = match (category, name) {
            (Some(c), Some(n)) => self.factors.emission_factors_by_name_and_category(n, c)?,
            (Some(c), None) => self.factors.emission_factors_by_category(c)?,
            (None, Some(n)) => self
                .factors
                .list_emission_factors()?
                .into_iter()
                .filter(|r| r.name == n)
                .collect(),
            (None, None) => self.factors.list_emission_factors()?,
        };
        to_py(py, &records)
    }

    fn update_emission_factor(
        &self,
        py: Python<'_>,
        factor_id: i64,
        updates: &Bound<'_, PyAny>,
    ) -> PyResult<PyObject> {
        let update: EmissionFactorUpdate = from_py(updates)?;
        to_py(py, &self.factors.update_emission_factor(factor_id, &update)?)
    }

    fn delete_emission_factor(&self, factor_id: i64) -> PyResult<()> {
        Ok(self.factors.delete_emission_factor(factor_id)?)
    }

    fn bulk_import_factors(&self, py: Python<'_>, factors: &Bound<'_, PyAny>) -> PyResult<PyObject> {
        let factors: Vec<NewEmissionFactor> = from_py(factors)?;
        let report = py.allow_threads(|| self.factors.bulk_import(&factors));
        to_py(py, &report)
    }
}
