//! Process-wide parameter registry
//!
//! Keys start out untyped when written by the launch injector and become
//! typed once a component declares them with a default. After declaration
//! the type is fixed: every later write is coerced to it or rejected.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::param::{ParamType, ParamValue};

#[derive(Debug, Clone)]
struct Entry {
    value: ParamValue,
    declared: Option<ParamType>,
}

/// Thread-safe typed parameter store
#[derive(Debug, Default)]
pub struct ParameterRegistry {
    entries: RwLock<HashMap<String, Entry>>,
}

impl ParameterRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `key` with the type and default carried by `default`.
    ///
    /// A value already written for an undeclared key is coerced to the
    /// declared type. An empty string written for a non-string key keeps
    /// the default. Returns the effective value.
    pub fn declare(&self, key: &str, default: impl Into<ParamValue>) -> RegistryResult<ParamValue> {
        let default = default.into();
        let ty = default.param_type();
        let mut entries = self.entries.write();

        let Some(entry) = entries.get_mut(key) else {
            entries.insert(
                key.to_string(),
                Entry {
                    value: default.clone(),
                    declared: Some(ty),
                },
            );
            return Ok(default);
        };

        if let Some(declared) = entry.declared {
            if declared != ty {
                return Err(RegistryError::Redeclared {
                    key: key.to_string(),
                    declared,
                    requested: ty,
                });
            }
            return Ok(entry.value.clone());
        }

        let value = match &entry.value {
            ParamValue::String(s) if s.is_empty() && ty != ParamType::String => {
                warn!(key, declared = %ty, "Empty value for typed parameter, using default");
                default
            }
            current => current.clone().coerce(ty).ok_or_else(|| RegistryError::TypeMismatch {
                key: key.to_string(),
                expected: ty,
                found: current.param_type(),
                value: current.to_string(),
            })?,
        };

        debug!(key, declared = %ty, value = %value, "Declared parameter");
        entry.value = value.clone();
        entry.declared = Some(ty);
        Ok(value)
    }

    /// Write `value` under `key`.
    ///
    /// Declared keys coerce the value to their type; undeclared keys store
    /// it as given.
    pub fn set(&self, key: &str, value: impl Into<ParamValue>) -> RegistryResult<()> {
        let value = value.into();
        let mut entries = self.entries.write();

        match entries.get_mut(key) {
            Some(Entry {
                value: slot,
                declared: Some(ty),
            }) => {
                let ty = *ty;
                let found = value.param_type();
                let shown = value.to_string();
                *slot = value.coerce(ty).ok_or_else(|| RegistryError::TypeMismatch {
                    key: key.to_string(),
                    expected: ty,
                    found,
                    value: shown,
                })?;
            }
            Some(entry) => entry.value = value,
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value,
                        declared: None,
                    },
                );
            }
        }
        Ok(())
    }

    /// Current value of `key`
    pub fn get(&self, key: &str) -> Option<ParamValue> {
        self.entries.read().get(key).map(|e| e.value.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Declared type of `key`, `None` if absent or not yet declared
    pub fn declared_type(&self, key: &str) -> Option<ParamType> {
        self.entries.read().get(key).and_then(|e| e.declared)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(|v| v.as_i32())
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_f64())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(str::to_string))
    }

    /// Sorted copy of all entries
    pub fn snapshot(&self) -> BTreeMap<String, ParamValue> {
        self.entries
            .read()
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
