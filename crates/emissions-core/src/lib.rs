//! Emissions core library: the digital-twin building emissions engine.
//!
//! Components (energy systems, materials, water systems) carry free-form
//! parameters and a formula; buildings aggregate them with quantities and
//! request-scoped modifications into a total with a per-component breakdown.
//! Emission factors, component definitions, and buildings persist in SQLite.
//!
//! With the `python` feature the crate also builds as the `_emissions_core`
//! extension module via PyO3.

pub mod components;
pub mod config;
pub mod engine;
pub mod errors;
pub mod models;
pub mod service;
pub mod store;

#[cfg(feature = "python")]
mod python;

#[cfg(feature = "python")]
use pyo3::prelude::*;

// ---------------------------------------------------------------------------
// Top-level Python module: _emissions_core
// ---------------------------------------------------------------------------

#[cfg(feature = "python")]
#[pymodule]
fn _emissions_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("EMISSIONS_UNIT", models::EMISSIONS_UNIT)?;
    m.add("DB_PATH_ENV", config::DB_PATH_ENV)?;
    m.add("BATCH_WORKERS_ENV", config::BATCH_WORKERS_ENV)?;

    m.add_class::<python::EmissionsEngine>()?;
    m.add_function(pyo3::wrap_pyfunction!(python::component_template, m)?)?;
    Ok(())
}
