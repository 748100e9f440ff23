//! Request-scoped memo over an emission factor store.
//!
//! Only unambiguous hits are remembered; not-found and ambiguous lookups go
//! back to the store every time. The cache lives as long as one calculation
//! request and is never shared across requests.

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::errors::EmissionsResult;
use crate::models::{EmissionFactorRecord, FactorCategory};
use crate::store::EmissionFactorStore;

pub struct FactorCache<'a> {
    store: &'a (dyn EmissionFactorStore + Sync),
    resolved: Mutex<IndexMap<(String, FactorCategory), EmissionFactorRecord>>,
}

impl<'a> FactorCache<'a> {
    pub fn new(store: &'a (dyn EmissionFactorStore + Sync)) -> Self {
        Self {
            store,
            resolved: Mutex::new(IndexMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.resolved.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EmissionFactorStore for FactorCache<'_> {
    fn lookup(
        &self,
        name: &str,
        category: FactorCategory,
    ) -> EmissionsResult<Vec<EmissionFactorRecord>> {
        let key = (name.to_string(), category);
        if let Some(record) = self.resolved.lock().get(&key) {
            return Ok(vec![record.clone()]);
        }

        // Lock released while the store is queried.
        let records = self.store.lookup(name, category)?;
        if let [record] = records.as_slice() {
            self.resolved.lock().insert(key, record.clone());
        }
        Ok(records)
    }
}
