//! Calculation engine: component factory, building aggregation, factor
//! memoisation, and scenario helpers.

pub mod building;
pub mod factor_cache;
pub mod factory;
pub mod scenario;

pub use building::{Building, BuildingSummary};
pub use factor_cache::FactorCache;
pub use factory::{ComponentFactory, ComponentTemplate};
