//! Error types for the emissions core library.

/// Top-level error enum for the emissions core library.
#[derive(Debug, thiserror::Error)]
pub enum EmissionsError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Missing required parameter(s) for {component}: {}", .keys.join(", "))]
    MissingParameter { component: String, keys: Vec<String> },

    #[error("Invalid parameter '{key}' for {component}: {reason}")]
    InvalidParameter {
        component: String,
        key: String,
        reason: String,
    },

    #[error("Missing required metadata for {component_type}: {}", .missing.join(", "))]
    InvalidComponentSpec {
        component_type: String,
        missing: Vec<String>,
    },

    #[error("Unknown component type: {0}")]
    UnknownComponentType(String),

    #[error("No emission factor found for '{name}' in category {category}")]
    FactorNotFound { name: String, category: String },

    #[error("Ambiguous emission factor for '{name}' in category {category}: {count} matches")]
    AmbiguousFactor {
        name: String,
        category: String,
        count: usize,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EmissionsError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        EmissionsError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// True for "missing resource" failures, as opposed to bad input or
    /// storage faults.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EmissionsError::NotFound { .. })
    }
}

#[cfg(feature = "python")]
impl From<EmissionsError> for pyo3::PyErr {
    fn from(err: EmissionsError) -> pyo3::PyErr {
        use pyo3::exceptions::{PyIOError, PyKeyError, PyRuntimeError, PyValueError};

        match &err {
            EmissionsError::NotFound { .. } => PyKeyError::new_err(err.to_string()),
            EmissionsError::Database(_) | EmissionsError::Sqlite(_) => {
                PyRuntimeError::new_err(err.to_string())
            }
            EmissionsError::Io(_) => PyIOError::new_err(err.to_string()),
            _ => PyValueError::new_err(err.to_string()),
        }
    }
}

pub type EmissionsResult<T> = Result<T, EmissionsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_parameter_lists_every_key() {
        let err = EmissionsError::MissingParameter {
            component: "hvac".to_string(),
            keys: vec!["efficiency".to_string(), "energy_source".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Missing required parameter(s) for hvac: efficiency, energy_source"
        );
    }

    #[test]
    fn not_found_names_the_id() {
        let err = EmissionsError::not_found("Building", 42);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Building 42 not found");
    }
}
