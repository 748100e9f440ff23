//! Typed access to free-form component parameters.
//!
//! A JSON `null` counts as absent everywhere, so a modification that nulls a
//! required key surfaces as `MissingParameter` rather than a silent zero.

use serde_json::Value;

use crate::errors::{EmissionsError, EmissionsResult};
use crate::models::Parameters;

fn present<'a>(params: &'a Parameters, key: &str) -> Option<&'a Value> {
    params.get(key).filter(|v| !v.is_null())
}

/// Every key from `required` that is absent (or null), in the given order.
pub fn missing_keys(params: &Parameters, required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|key| present(params, key).is_none())
        .map(|key| key.to_string())
        .collect()
}

/// Fail with `MissingParameter` naming all absent keys at once.
pub fn require(params: &Parameters, component: &str, required: &[&str]) -> EmissionsResult<()> {
    let missing = missing_keys(params, required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(EmissionsError::MissingParameter {
            component: component.to_string(),
            keys: missing,
        })
    }
}

pub fn optional_number(
    params: &Parameters,
    component: &str,
    key: &str,
) -> EmissionsResult<Option<f64>> {
    match present(params, key) {
        None => Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(Some).ok_or_else(|| {
            invalid(component, key, format!("{n} is not representable as a float"))
        }),
        Some(other) => Err(invalid(
            component,
            key,
            format!("expected a number, got {other}"),
        )),
    }
}

pub fn required_number(params: &Parameters, component: &str, key: &str) -> EmissionsResult<f64> {
    optional_number(params, component, key)?.ok_or_else(|| missing(component, key))
}

pub fn optional_text<'a>(
    params: &'a Parameters,
    component: &str,
    key: &str,
) -> EmissionsResult<Option<&'a str>> {
    match present(params, key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(invalid(
            component,
            key,
            format!("expected a string, got {other}"),
        )),
    }
}

pub fn required_text<'a>(
    params: &'a Parameters,
    component: &str,
    key: &str,
) -> EmissionsResult<&'a str> {
    optional_text(params, component, key)?.ok_or_else(|| missing(component, key))
}

fn missing(component: &str, key: &str) -> EmissionsError {
    EmissionsError::MissingParameter {
        component: component.to_string(),
        keys: vec![key.to_string()],
    }
}

pub fn invalid(component: &str, key: &str, reason: impl Into<String>) -> EmissionsError {
    EmissionsError::InvalidParameter {
        component: component.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}
