//! Read-only view of one managed object instance.

use serde_json::{Map, Value};
use std::fmt;

use super::client::CimError;

/// Record is an opaque instance returned by the management instrumentation layer.
///
/// Property names are matched case-insensitively, the same way the
/// instrumentation layer treats them.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    namespace: String,
    class: String,
    properties: Map<String, Value>,
}

impl Record {
    /// Creates an empty record of the given class.
    pub fn new(namespace: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            class: class.into(),
            properties: Map::new(),
        }
    }

    /// Creates a record from an already decoded property bag.
    pub fn from_properties(
        namespace: impl Into<String>,
        class: impl Into<String>,
        properties: Map<String, Value>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            class: class.into(),
            properties,
        }
    }

    /// Returns the record with one more property set.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// Looks a property up, exact name first.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name).or_else(|| {
            self.properties
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }

    /// Reads a scalar property as a string. Numbers and booleans are rendered.
    pub fn string(&self, name: &str) -> Result<String, CimError> {
        match self.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::Bool(b)) => Ok(b.to_string()),
            Some(Value::Null) | None => Err(self.missing(name)),
            Some(other) => Err(self.property_error(name, format!("not a scalar: {}", other))),
        }
    }

    pub fn u32(&self, name: &str) -> Result<u32, CimError> {
        let v = self.u64(name)?;
        u32::try_from(v).map_err(|_| self.property_error(name, format!("{} overflows u32", v)))
    }

    pub fn u64(&self, name: &str) -> Result<u64, CimError> {
        match self.get(name) {
            Some(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| self.property_error(name, format!("{} is not unsigned", n))),
            Some(Value::String(s)) => s
                .parse::<u64>()
                .map_err(|e| self.property_error(name, e.to_string())),
            Some(Value::Null) | None => Err(self.missing(name)),
            Some(other) => Err(self.property_error(name, format!("not a number: {}", other))),
        }
    }

    pub fn bool(&self, name: &str) -> Result<bool, CimError> {
        match self.get(name) {
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => s
                .parse::<bool>()
                .map_err(|e| self.property_error(name, e.to_string())),
            Some(Value::Null) | None => Err(self.missing(name)),
            Some(other) => Err(self.property_error(name, format!("not a bool: {}", other))),
        }
    }

    fn missing(&self, name: &str) -> CimError {
        self.property_error(name, "property is not set".to_string())
    }

    fn property_error(&self, name: &str, reason: String) -> CimError {
        CimError::Property {
            class: self.class.clone(),
            property: name.to_string(),
            reason,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.class)?;
        let scalars: Vec<String> = self
            .properties
            .iter()
            .filter(|(_, v)| matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_)))
            .take(4)
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        if !scalars.is_empty() {
            write!(f, "({})", scalars.join(","))?;
        }
        Ok(())
    }
}
